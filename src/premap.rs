//! Per-encoding pointer-space compressions.
//!
//! A few multi-byte indices allocate pointers with large structural holes
//! (unused rows or columns of the underlying 94x94-style grids). A pre-map
//! is a partial bijection that squeezes those holes out before the forward
//! table is laid out, so the table length tracks the allocated area rather
//! than the grid area. The generated decoder applies the same arithmetic,
//! so the snippets emitted into the table sources live here too.

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Premap {
    Identity,
    EucKr,
    Jis0208,
    Jis0212,
}

impl Premap {
    pub fn for_index(name: &str, premapping: bool) -> Premap {
        if !premapping {
            return Premap::Identity;
        }
        match name {
            "euc-kr" => Premap::EucKr,
            "jis0208" => Premap::Jis0208,
            "jis0212" => Premap::Jis0212,
            _ => Premap::Identity,
        }
    }

    /// Compresses a pointer, or `None` if it falls in a structural hole.
    pub fn forward(self, code: u16) -> Option<u16> {
        match self {
            Premap::Identity => Some(code),
            Premap::EucKr => {
                let r = code / 190;
                let c = code % 190;
                if c >= 96 {
                    let dr = match r {
                        0..=43 => 0,
                        44..=46 => return None,
                        47..=71 => 3,
                        72 => return None,
                        73..=124 => 4,
                        _ => return None,
                    };
                    Some((r - dr) * (190 - 96) + (c - 96))
                } else {
                    let dc = match c {
                        0..=25 => 0,
                        26..=31 => return None,
                        32..=57 => 6,
                        58..=63 => return None,
                        _ => 12,
                    };
                    Some((125 - 4) * (190 - 96) + r * (96 - 12) + (c - dc))
                }
            }
            Premap::Jis0208 => match code {
                0..=689 => Some(code),
                690..=1127 => None,
                1128..=1219 => Some(code - 438),
                1220..=1409 => None,
                1410..=7807 => Some(code - 628),
                7808..=8271 => None,
                8272..=8647 => Some(code - 1092),
                8648..=10715 => None,
                _ => Some(code - 3160),
            },
            Premap::Jis0212 => match code {
                0..=174 => Some(code),
                175..=533 => None,
                534..=1026 => Some(code - 359),
                1027..=1409 => None,
                _ => Some(code - 742),
            },
        }
    }

    /// Expands a compressed pointer back. Total over the compressed range
    /// and saturating above it; only the unoptimized backward path of the
    /// generated code needs this, the generator itself uses it for
    /// self-checks.
    pub fn backward(self, code: u16) -> u16 {
        match self {
            Premap::Identity => code,
            Premap::EucKr => {
                if code < (125 - 4) * (190 - 96) {
                    let r = code / (190 - 96);
                    let c = code % (190 - 96);
                    let dr = match r {
                        0..=43 => 0,
                        44..=68 => 3,
                        _ => 4,
                    };
                    (r + dr) * 190 + (c + 96)
                } else if code < 0xffff {
                    let code = code - (125 - 4) * (190 - 96);
                    let r = code / (96 - 12);
                    let c = code % (96 - 12);
                    let dc = match c {
                        0..=25 => 0,
                        26..=51 => 6,
                        _ => 12,
                    };
                    r * 190 + (c + dc)
                } else {
                    0xffff
                }
            }
            Premap::Jis0208 => match code {
                0..=689 => code,
                690..=781 => code + 438,
                782..=7179 => code + 628,
                7180..=7555 => code + 1092,
                _ => code.saturating_add(3160),
            },
            Premap::Jis0212 => match code {
                0..=174 => code,
                175..=667 => code + 359,
                _ => code.saturating_add(742),
            },
        }
    }

    /// The `premap_forward`/`premap_backward` source emitted into the
    /// generated table file, mirroring `forward`/`backward` above with the
    /// hole arms returning the `X` sentinel.
    pub fn emitted_code(self) -> Option<&'static str> {
        match self {
            Premap::Identity => None,
            Premap::EucKr => Some(
                "\
fn premap_forward(code: u16) -> u16 {
    let r = code / 190;
    let c = code % 190;
    if c >= 96 {
        let dr = match r {
            0..=43 => 0,
            44..=46 => return X,
            47..=71 => 3,
            72 => return X,
            73..=124 => 4,
            _ => return X,
        };
        (r - dr) * (190 - 96) + (c - 96)
    } else {
        let dc = match c {
            0..=25 => 0,
            26..=31 => return X,
            32..=57 => 6,
            58..=63 => return X,
            _ => 12,
        };
        (125 - 4) * (190 - 96) + r * (96 - 12) + (c - dc)
    }
}

#[cfg(feature = \"no-optimized-legacy-encoding\")]
fn premap_backward(code: u16) -> u16 {
    if code < (125 - 4) * (190 - 96) {
        let r = code / (190 - 96);
        let c = code % (190 - 96);
        let dr = match r {
            0..=43 => 0,
            44..=68 => 3,
            _ => 4,
        };
        (r + dr) * 190 + (c + 96)
    } else if code < X {
        let code = code - (125 - 4) * (190 - 96);
        let r = code / (96 - 12);
        let c = code % (96 - 12);
        let dc = match c {
            0..=25 => 0,
            26..=51 => 6,
            _ => 12,
        };
        r * 190 + (c + dc)
    } else {
        X
    }
}
",
            ),
            Premap::Jis0208 => Some(
                "\
fn premap_forward(code: u16) -> u16 {
    match code {
        0..=689 => code,
        690..=1127 => X,
        1128..=1219 => code - 438,
        1220..=1409 => X,
        1410..=7807 => code - 628,
        7808..=8271 => X,
        8272..=8647 => code - 1092,
        8648..=10715 => X,
        _ => code - 3160,
    }
}

#[cfg(feature = \"no-optimized-legacy-encoding\")]
fn premap_backward(code: u16) -> u16 {
    match code {
        0..=689 => code,
        690..=781 => code + 438,
        782..=7179 => code + 628,
        7180..=7555 => code + 1092,
        _ => code.saturating_add(3160),
    }
}
",
            ),
            Premap::Jis0212 => Some(
                "\
fn premap_forward(code: u16) -> u16 {
    match code {
        0..=174 => code,
        175..=533 => X,
        534..=1026 => code - 359,
        1027..=1409 => X,
        _ => code - 742,
    }
}

#[cfg(feature = \"no-optimized-legacy-encoding\")]
fn premap_backward(code: u16) -> u16 {
    match code {
        0..=174 => code,
        175..=667 => code + 359,
        _ => code.saturating_add(742),
    }
}
",
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrips(premap: Premap, limit: u16) {
        for code in 0..limit {
            if let Some(mapped) = premap.forward(code) {
                assert_eq!(
                    premap.backward(mapped),
                    code,
                    "{premap:?} round-trip failed at pointer {code}"
                );
            }
        }
    }

    #[test]
    fn euc_kr_roundtrips_on_domain() {
        roundtrips(Premap::EucKr, 125 * 190);
    }

    #[test]
    fn jis0208_roundtrips_on_domain() {
        roundtrips(Premap::Jis0208, 11280);
    }

    #[test]
    fn jis0212_roundtrips_on_domain() {
        roundtrips(Premap::Jis0212, 7211);
    }

    #[test]
    fn euc_kr_rejects_unused_rows_and_columns() {
        // row 44, double-byte area
        assert_eq!(Premap::EucKr.forward(190 * 44 + 96), None);
        // rejected column ranges of the single-byte-lead area
        assert_eq!(Premap::EucKr.forward(26), None);
        assert_eq!(Premap::EucKr.forward(63), None);
        // survivors on either side of the holes
        assert_eq!(Premap::EucKr.forward(25), Some((125 - 4) * 94 + 25));
        assert_eq!(Premap::EucKr.forward(32), Some((125 - 4) * 94 + 26));
    }

    #[test]
    fn premapped_pointers_are_injective() {
        for premap in [Premap::EucKr, Premap::Jis0208, Premap::Jis0212] {
            let mut seen = std::collections::HashSet::new();
            for code in 0..0x6000u16 {
                if let Some(mapped) = premap.forward(code) {
                    assert!(seen.insert(mapped), "{premap:?} collides at {code}");
                }
            }
        }
    }

    #[test]
    fn inverses_saturate_at_the_top() {
        assert_eq!(Premap::Jis0208.backward(0xffff), 0xffff);
        assert_eq!(Premap::Jis0212.backward(0xffff), 0xffff);
        assert_eq!(Premap::EucKr.backward(0xffff), 0xffff);
    }

    #[test]
    fn disabled_premapping_is_identity() {
        assert_eq!(Premap::for_index("euc-kr", false), Premap::Identity);
        assert_eq!(Premap::for_index("euc-kr", true), Premap::EucKr);
        assert_eq!(Premap::for_index("big5", true), Premap::Identity);
    }
}
