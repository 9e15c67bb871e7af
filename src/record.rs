use std::collections::{BTreeMap, HashMap};

use anyhow::{Result, ensure};

use crate::premap::Premap;

/// Big5 rows 0x81..0xA1 are Hong Kong Supplementary Character Set
/// additions with no backward mapping.
pub const HKSCS_LIMIT: u16 = (0xa1 - 0x81) * 157;

/// Big5 pointers reserved for the four two-code-point forward mappings;
/// the decoder special-cases them, the table only needs placeholders.
const BIG5_SPECIAL: [u16; 4] = [1133, 1135, 1164, 1166];

/// Big5 scalars mapped twice where the *later* pointer is canonical.
const BIG5_LATER_CANON: [u32; 6] = [0x2550, 0x255E, 0x2561, 0x256A, 0x5341, 0x5345];

/// JIS X 0208 carries [8272, 8836) as a Shift_JIS-only duplicate of
/// pointers allocated elsewhere; `backward` favors the EUC-JP range, so
/// Shift_JIS output consults a remap table over this window.
pub const REMAP_MIN: u16 = 8272;
pub const REMAP_MAX: u16 = 8835;

/// One multi-byte index, in original (non-pre-mapped) pointer space.
pub struct IndexRecord {
    /// pointer -> code point
    pub data: BTreeMap<u16, u32>,
    /// code point -> pointer; first occurrence wins unless an adapter
    /// swapped the canonical entry
    pub invdata: BTreeMap<u32, u16>,
    /// pointers whose code point canonically belongs to another pointer
    pub dups: Vec<u16>,
    /// excluded pointer ranges, inclusive, emitted as range literals
    pub rawdups: Vec<(u16, u16)>,
    /// some code point lies in the Supplementary Ideographic Plane
    pub morebits: bool,
}

impl IndexRecord {
    pub fn build(name: &str, entries: &[(u32, u32)]) -> Result<IndexRecord> {
        let mut record = IndexRecord {
            data: BTreeMap::new(),
            invdata: BTreeMap::new(),
            dups: Vec::new(),
            rawdups: Vec::new(),
            morebits: false,
        };
        for &(key, value) in entries {
            let key = key as u16;
            if value >= 0x10000 {
                record.morebits = true;
            }
            record.data.insert(key, value);
            if record.invdata.contains_key(&value) {
                record.dups.push(key);
            } else {
                record.invdata.insert(value, key);
            }
        }
        if name == "big5" {
            record.apply_big5()?;
        }
        Ok(record)
    }

    fn apply_big5(&mut self) -> Result<()> {
        for (value, &key) in BIG5_SPECIAL.iter().enumerate() {
            let value = value as u32;
            ensure!(
                !self.data.contains_key(&key),
                "big5 special pointer {key} is already allocated"
            );
            ensure!(
                !self.invdata.contains_key(&value),
                "big5 placeholder code point {value} is already mapped"
            );
            self.data.insert(key, value);
            // never round-trip tested
            self.dups.push(key);
        }

        // HKSCS is forward-only
        self.invdata.retain(|_, key| *key >= HKSCS_LIMIT);
        self.rawdups.push((0, HKSCS_LIMIT - 1));

        // For a handful of twice-mapped code points the later pointer is
        // the canonical one: swap it into invdata and demote the earlier.
        let old_dups = std::mem::take(&mut self.dups);
        for key in old_dups {
            let value = self.data[&key];
            if BIG5_LATER_CANON.contains(&value) {
                let earlier = self
                    .invdata
                    .insert(value, key)
                    .expect("swapped canonical code point lost its first mapping");
                self.dups.push(earlier);
            } else {
                self.dups.push(key);
            }
        }
        self.dups.retain(|&key| key >= HKSCS_LIMIT);
        Ok(())
    }

    /// The Shift_JIS remap table: for each pointer in [REMAP_MIN,
    /// REMAP_MAX], the counterpart pointer outside that window carrying
    /// the same code point, or 0xffff for unallocated slots.
    pub fn remap_table(&self) -> Vec<u16> {
        let mut inv_minus_remap: HashMap<u32, u16> = HashMap::new();
        for (&key, &value) in &self.data {
            if !(REMAP_MIN..=REMAP_MAX).contains(&key) {
                inv_minus_remap.entry(value).or_insert(key);
            }
        }
        (REMAP_MIN..=REMAP_MAX)
            .map(|key| match self.data.get(&key) {
                Some(value) => *inv_minus_remap
                    .get(value)
                    .expect("remap window pointer has no counterpart"),
                None => 0xffff,
            })
            .collect()
    }

    /// The forward map re-keyed through the pre-map. The pre-map must
    /// accept and separate every allocated pointer.
    pub fn premapped_data(&self, premap: Premap) -> BTreeMap<u16, u32> {
        let mut out = BTreeMap::new();
        for (&key, &value) in &self.data {
            let mapped = premap
                .forward(key)
                .expect("pre-map rejected an allocated pointer");
            debug_assert_eq!(premap.backward(mapped), key);
            let clash = out.insert(mapped, value);
            assert!(clash.is_none(), "pre-map collided at pointer {key}");
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_occurrence_wins_and_later_keys_become_dups() {
        let record =
            IndexRecord::build("gb18030", &[(5, 0x4e00), (6, 0x4e01), (7, 0x4e00)]).unwrap();
        assert_eq!(record.invdata[&0x4e00], 5);
        assert_eq!(record.dups, vec![7]);
        assert!(!record.morebits);
    }

    #[test]
    fn sip_code_points_set_morebits() {
        let record = IndexRecord::build("gb18030", &[(5, 0x20000)]).unwrap();
        assert!(record.morebits);
    }

    fn big5_entries() -> Vec<(u32, u32)> {
        let mut entries = vec![
            // HKSCS region: forward-only
            (100, 0x43f0),
            (101, 0x4c32),
            // regular region
            (HKSCS_LIMIT as u32 + 10, 0x3000),
            (HKSCS_LIMIT as u32 + 11, 0x2550),
            // plain duplicate: earlier pointer stays canonical
            (HKSCS_LIMIT as u32 + 12, 0x3000),
            // later-canonical duplicate
            (HKSCS_LIMIT as u32 + 13, 0x2550),
        ];
        entries.sort();
        entries
    }

    #[test]
    fn big5_synthesizes_placeholder_pointers() {
        let record = IndexRecord::build("big5", &big5_entries()).unwrap();
        for (value, key) in [(0u32, 1133u16), (1, 1135), (2, 1164), (3, 1166)] {
            assert_eq!(record.data[&key], value);
            // placeholders are excluded from round-trips, and the HKSCS
            // strip removed them from the backward map entirely
            assert!(!record.invdata.contains_key(&value));
            assert!(!record.dups.contains(&key));
        }
    }

    #[test]
    fn big5_strips_hkscs_from_backward() {
        let record = IndexRecord::build("big5", &big5_entries()).unwrap();
        assert!(!record.invdata.contains_key(&0x43f0));
        assert!(!record.invdata.contains_key(&0x4c32));
        assert_eq!(record.data[&100], 0x43f0);
        assert_eq!(record.rawdups, vec![(0, HKSCS_LIMIT - 1)]);
    }

    #[test]
    fn big5_swaps_later_canonical_duplicates() {
        let record = IndexRecord::build("big5", &big5_entries()).unwrap();
        // 0x2550 is in the swap set: the later pointer becomes canonical
        assert_eq!(record.invdata[&0x2550], HKSCS_LIMIT + 13);
        assert!(record.dups.contains(&(HKSCS_LIMIT + 11)));
        // 0x3000 is not: the earlier pointer stays canonical
        assert_eq!(record.invdata[&0x3000], HKSCS_LIMIT + 10);
        assert!(record.dups.contains(&(HKSCS_LIMIT + 12)));
    }

    #[test]
    fn jis0208_remap_points_at_counterparts() {
        let record = IndexRecord::build(
            "jis0208",
            &[
                (690, 0xff01),
                (8272, 0xff01),
                (8273, 0xff02),
                (700, 0xff02),
                (9000, 0xff03),
            ],
        )
        .unwrap();
        let remap = record.remap_table();
        assert_eq!(remap.len(), (REMAP_MAX - REMAP_MIN + 1) as usize);
        assert_eq!(remap[0], 690);
        assert_eq!(remap[1], 700);
        // unallocated slots stay at the sentinel
        assert_eq!(remap[2], 0xffff);
    }

    #[test]
    fn premapped_data_rekeys_the_forward_map() {
        let record =
            IndexRecord::build("jis0212", &[(0, 0x80), (534, 0x81), (1410, 0x82)]).unwrap();
        let data = record.premapped_data(Premap::Jis0212);
        assert_eq!(
            data.into_iter().collect::<Vec<_>>(),
            vec![(0, 0x80), (175, 0x81), (668, 0x82)]
        );
    }

    #[test]
    #[should_panic(expected = "rejected an allocated pointer")]
    fn premapped_data_rejects_pointers_in_holes() {
        let record = IndexRecord::build("jis0212", &[(175, 0x80)]).unwrap();
        record.premapped_data(Premap::Jis0212);
    }
}
