use std::collections::BTreeMap;

use anyhow::{Result, ensure};

use crate::Options;
use crate::emit::{push_header, push_wrapped, write_output};
use crate::premap::Premap;
use crate::reader::{IndexShape, read_index};
use crate::record::{IndexRecord, REMAP_MAX, REMAP_MIN};
use crate::search::make_minimal_search;
use crate::trie::make_minimal_trie;

/// Byte sizes of the tables emitted for one index: the forward table, the
/// optimized backward tables, and the search-based backward tables.
pub struct TableSizes {
    pub forward: usize,
    pub backward: usize,
    pub backward_slow: usize,
}

pub fn generate_single_byte(opts: &Options, crate_dir: &str, name: &str) -> Result<TableSizes> {
    let src = read_index(opts, crate_dir, name, IndexShape::PointerToScalar)?;
    let mut data: [Option<u16>; 128] = [None; 128];
    let mut invdata: BTreeMap<u32, u16> = BTreeMap::new();
    for &(key, value) in &src.entries {
        ensure!(
            key < 128,
            "index {name}: single-byte pointer {key} out of range"
        );
        ensure!(
            value < 0xffff,
            "index {name}: code point {value:#x} too large for a single-byte index"
        );
        data[key as usize] = Some(value as u16);
        ensure!(
            invdata.insert(value, key as u16).is_none(),
            "index {name}: code point {value:#x} is mapped twice"
        );
    }
    ensure!(!invdata.is_empty(), "index {name} is empty");

    let trie = make_minimal_trie(&invdata, 0x10000);

    // A coarse 32-bit presence bitmap lets the unoptimized backward path
    // reject absent code points without scanning the forward table.
    let max_value = *invdata.keys().next_back().unwrap();
    let mut bit_len = 0u32;
    while 1u64 << bit_len <= u64::from(max_value) {
        bit_len += 1;
    }
    let bitmap_shift = bit_len - 5;
    let mut bitmap: u32 = 0;
    for &value in invdata.keys() {
        bitmap |= 1 << (value >> bitmap_shift);
    }
    assert!(bitmap > 0xffff, "rejection bitmap degenerated");

    let mut out = String::new();
    push_header(&mut out, name, &src.comments);
    out.push_str("\n#[allow(dead_code)] const X: u16 = 0xffff;\n");

    out.push_str("\nconst FORWARD_TABLE: &'static [u16] = &[\n");
    push_wrapped(
        &mut out,
        "    ",
        data.iter().map(|slot| match slot {
            Some(value) => format!("{value}, "),
            None => "X, ".to_string(),
        }),
    );
    out.push_str(&format!("]; // {} entries\n", data.len()));

    out.push_str(
        "
/// Returns the index code point for pointer `code` in this index.
#[inline]
pub fn forward(code: u8) -> u16 {
    FORWARD_TABLE[(code - 0x80) as usize]
}
",
    );

    out.push_str(
        "\n#[cfg(not(feature = \"no-optimized-legacy-encoding\"))]\n\
         const BACKWARD_TABLE_LOWER: &'static [u8] = &[\n",
    );
    push_wrapped(
        &mut out,
        "    ",
        trie.lower.iter().map(|slot| match slot {
            Some(pointer) => format!("{}, ", pointer + 0x80),
            None => "0, ".to_string(),
        }),
    );
    out.push_str(&format!("]; // {} entries\n", trie.lower.len()));

    out.push_str(
        "\n#[cfg(not(feature = \"no-optimized-legacy-encoding\"))]\n\
         const BACKWARD_TABLE_UPPER: &'static [u16] = &[\n",
    );
    push_wrapped(&mut out, "    ", trie.upper.iter().map(|off| format!("{off}, ")));
    out.push_str(&format!("]; // {} entries\n", trie.upper.len()));

    out.push_str(&format!(
        "
/// Returns the index pointer for code point `code` in this index.
#[inline]
#[cfg(not(feature = \"no-optimized-legacy-encoding\"))]
pub fn backward(code: u32) -> u8 {{
    let offset = (code >> {bits}) as usize;
    let offset = if offset < {upper_len} {{ BACKWARD_TABLE_UPPER[offset] as usize }} else {{ 0 }};
    BACKWARD_TABLE_LOWER[offset + ((code & {mask}) as usize)]
}}
",
        bits = trie.bits,
        upper_len = trie.upper.len(),
        mask = trie.mask(),
    ));

    out.push_str(&format!(
        "
/// Returns the index pointer for code point `code` in this index.
#[cfg(feature = \"no-optimized-legacy-encoding\")]
pub fn backward(code: u32) -> u8 {{
    if code > {max_value} || (({bitmap:#x}u32 >> (code >> {bitmap_shift})) & 1) == 0 {{
        return 0;
    }}
    let code = code as u16;
    for i in 0..0x80 {{
        if FORWARD_TABLE[i as usize] == code {{
            return 0x80 + i;
        }}
    }}
    0
}}
",
    ));

    out.push_str("\n#[cfg(test)]\nsingle_byte_tests! {\n}\n");

    write_output(&opts.out_dir, crate_dir, name, &out)?;
    Ok(TableSizes {
        forward: 2 * data.len(),
        backward: trie.lower.len() + 2 * trie.upper.len(),
        backward_slow: 0,
    })
}

pub fn generate_multi_byte(opts: &Options, crate_dir: &str, name: &str) -> Result<TableSizes> {
    let src = read_index(opts, crate_dir, name, IndexShape::PointerToScalar)?;
    let record = IndexRecord::build(name, &src.entries)?;
    ensure!(!record.invdata.is_empty(), "index {name} is empty");

    let premap = Premap::for_index(name, opts.premapping);
    let remap = (name == "jis0208").then(|| record.remap_table());
    let data = record.premapped_data(premap);

    let trie = make_minimal_trie(&record.invdata, 0x10000);
    let search = make_minimal_search(&data, &record.invdata, premap, opts.max_backward_search);
    let full_linear = search.is_full_linear();
    assert!(search.lower.len() < 0x10000 && trie.lower.len() < 0x10000);

    let min_key = u32::from(*data.keys().next().unwrap());
    let max_key = u32::from(*data.keys().next_back().unwrap()) + 1;
    let data_len = (max_key - min_key) as usize;
    let max_value = *record.invdata.keys().next_back().unwrap();

    let mut out = String::new();
    push_header(&mut out, name, &src.comments);
    out.push_str("\n#[allow(dead_code)] const X: u16 = 0xffff;\n");
    if let Some(code) = premap.emitted_code() {
        out.push('\n');
        out.push_str(code);
    }

    out.push_str("\nconst FORWARD_TABLE: &'static [u16] = &[\n");
    push_wrapped(
        &mut out,
        "    ",
        (min_key..max_key).map(|key| match data.get(&(key as u16)) {
            Some(&value) => format!("{}, ", value & 0xffff),
            None => "X, ".to_string(),
        }),
    );
    out.push_str(&format!("]; // {data_len} entries\n"));

    let mut more_words = 0;
    if record.morebits {
        let mut words: Vec<u32> = Vec::with_capacity(data_len.div_ceil(32));
        let mut base = min_key;
        while base < max_key {
            let mut word = 0u32;
            for bit in 0..32u32 {
                let key = base + bit;
                if key < max_key && data.get(&(key as u16)).is_some_and(|&v| v >= 0x10000) {
                    word |= 1 << bit;
                }
            }
            words.push(word);
            base += 32;
        }
        more_words = words.len();
        out.push_str("\nconst FORWARD_TABLE_MORE: &'static [u32] = &[\n");
        push_wrapped(&mut out, "    ", words.iter().map(|word| format!("{word}, ")));
        out.push_str(&format!("]; // {more_words} entries\n"));
    }

    out.push_str(
        "
/// Returns the index code point for pointer `code` in this index.
#[inline]
pub fn forward(code: u16) -> u32 {
",
    );
    if premap.emitted_code().is_some() {
        out.push_str("    let code = premap_forward(code);\n");
    }
    if min_key != 0 {
        out.push_str(&format!(
            "    let code = (code as usize).wrapping_sub({min_key});\n"
        ));
    } else {
        out.push_str("    let code = code as usize;\n");
    }
    out.push_str(&format!("    if code < {data_len} {{\n"));
    if record.morebits {
        out.push_str(
            "        (FORWARD_TABLE[code] as u32) | (((FORWARD_TABLE_MORE[code >> 5] >> (code & 31)) & 1) << 17)\n",
        );
    } else {
        out.push_str("        FORWARD_TABLE[code] as u32\n");
    }
    out.push_str("    } else {\n        X as u32\n    }\n}\n");

    out.push_str(
        "\n#[cfg(not(feature = \"no-optimized-legacy-encoding\"))]\n\
         const BACKWARD_TABLE_LOWER: &'static [u16] = &[\n",
    );
    push_wrapped(
        &mut out,
        "    ",
        trie.lower.iter().map(|slot| match slot {
            Some(pointer) => format!("{pointer}, "),
            None => "X, ".to_string(),
        }),
    );
    out.push_str(&format!("]; // {} entries\n", trie.lower.len()));

    out.push_str(
        "\n#[cfg(not(feature = \"no-optimized-legacy-encoding\"))]\n\
         const BACKWARD_TABLE_UPPER: &'static [u16] = &[\n",
    );
    push_wrapped(&mut out, "    ", trie.upper.iter().map(|off| format!("{off}, ")));
    out.push_str(&format!("]; // {} entries\n", trie.upper.len()));

    if !full_linear {
        out.push_str(
            "\n#[cfg(feature = \"no-optimized-legacy-encoding\")]\n\
             const BACKWARD_SEARCH_LOWER: &'static [(u16, u16)] = &[\n",
        );
        push_wrapped(
            &mut out,
            "    ",
            search.lower.iter().map(|&(s, e)| format!("({s}, {e}), ")),
        );
        out.push_str(&format!("]; // {} entries\n", search.lower.len()));

        out.push_str(
            "\n#[cfg(feature = \"no-optimized-legacy-encoding\")]\n\
             const BACKWARD_SEARCH_UPPER: &'static [u16] = &[\n",
        );
        push_wrapped(&mut out, "    ", search.upper.iter().map(|off| format!("{off}, ")));
        out.push_str(&format!("]; // {} entries\n", search.upper.len()));
    }

    if let Some(remap) = &remap {
        out.push_str("\nconst BACKWARD_TABLE_REMAPPED: &'static [u16] = &[\n");
        push_wrapped(&mut out, "    ", remap.iter().map(|pointer| format!("{pointer}, ")));
        out.push_str(&format!("]; // {} entries\n", remap.len()));
    }

    out.push_str(&format!(
        "
/// Returns the index pointer for code point `code` in this index.
#[inline]
#[cfg(not(feature = \"no-optimized-legacy-encoding\"))]
pub fn backward(code: u32) -> u16 {{
    let offset = (code >> {bits}) as usize;
    let offset = if offset < {upper_len} {{ BACKWARD_TABLE_UPPER[offset] as usize }} else {{ 0 }};
    // the lower table stores original (non-pre-mapped) pointers
    BACKWARD_TABLE_LOWER[offset + ((code & {mask}) as usize)]
}}
",
        bits = trie.bits,
        upper_len = trie.upper.len(),
        mask = trie.mask(),
    ));

    // The slow path answers out of the forward table, whose slots are
    // pre-mapped, so every hit is widened back to an original pointer.
    let ret_expr = |inner: &str| -> String {
        let shifted = if min_key != 0 {
            format!("({inner}) + {min_key}")
        } else {
            inner.to_string()
        };
        if premap.emitted_code().is_some() {
            format!("premap_backward({shifted})")
        } else {
            shifted
        }
    };
    let ret_if_correct = |expr: &str| -> String {
        if record.morebits {
            format!("if let Some(found) = verify_and_map(codehi, {expr}) {{ return found; }}")
        } else {
            format!("return {};", ret_expr(expr))
        }
    };

    out.push_str(
        "
/// Returns the index pointer for code point `code` in this index.
#[cfg(feature = \"no-optimized-legacy-encoding\")]
pub fn backward(code: u32) -> u16 {
    // avoid mistaking the placeholder for an actual mapping
    if code == X as u32 {
        return 0xffff;
    }
    let codelo = (code & 0xffff) as u16;
",
    );
    if record.morebits {
        out.push_str(&format!(
            "    let codehi = code >> 16;
    #[inline]
    fn verify_and_map(codehi: u32, i: u16) -> Option<u16> {{
        let hi = ((FORWARD_TABLE_MORE[i as usize >> 5] >> (i & 31)) & 1) << 1;
        if hi != codehi {{
            return None;
        }}
        Some({expr})
    }}
",
            expr = ret_expr("i"),
        ));
    }
    if !full_linear {
        out.push_str(&format!(
            "    let offset = (code >> {bits}) as usize;
    let (start, end) = if offset < {upper_m1} {{
        (BACKWARD_SEARCH_UPPER[offset], BACKWARD_SEARCH_UPPER[offset + 1])
    }} else {{
        (0, 0)
    }};
    for &(s, e) in &BACKWARD_SEARCH_LOWER[(start as usize)..(end as usize)] {{
        if s >= 0x8000 {{
            if e == codelo {{
                {ret_single}
            }}
        }} else {{
            for i in s..e {{
                if FORWARD_TABLE[i as usize] == codelo {{
                    {ret_range}
                }}
            }}
        }}
    }}
",
            bits = search.bits,
            upper_m1 = search.upper.len() - 1,
            ret_single = ret_if_correct("s & 0x7fff"),
            ret_range = ret_if_correct("i"),
        ));
    } else {
        out.push_str(&format!(
            "    if code <= {max_value} {{
        for (i, &v) in FORWARD_TABLE.iter().enumerate() {{
            if v == codelo {{
                {ret}
            }}
        }}
    }}
",
            ret = ret_if_correct("i as u16"),
        ));
    }
    out.push_str("    X\n}\n");

    if remap.is_some() {
        out.push_str(&format!(
            "
/// Returns the index Shift_JIS pointer for code point `code`.
#[inline]
pub fn backward_remapped(code: u32) -> u16 {{
    let value = backward(code);
    if {REMAP_MIN} <= value && value <= {REMAP_MAX} {{
        BACKWARD_TABLE_REMAPPED[(value - {REMAP_MIN}) as usize]
    }} else {{
        value
    }}
}}
",
        ));
    }

    out.push_str("\n#[cfg(test)]\nmulti_byte_tests! {\n");
    if remap.is_some() {
        out.push_str(&format!("    remap = [{REMAP_MIN}, {REMAP_MAX}],\n"));
    }
    if record.dups.is_empty() && record.rawdups.is_empty() {
        out.push_str("    dups = []\n");
    } else {
        out.push_str("    dups = [\n");
        let mut dups = record.dups.clone();
        dups.sort_unstable();
        push_wrapped(
            &mut out,
            "        ",
            record
                .rawdups
                .iter()
                .map(|&(lo, hi)| format!("{lo}..={hi}, "))
                .chain(dups.iter().map(|dup| format!("{dup}, "))),
        );
        out.push_str("    ]\n");
    }
    out.push_str("}\n");

    write_output(&opts.out_dir, crate_dir, name, &out)?;

    let mut extra = 0;
    if record.morebits {
        extra += 4 * more_words;
    }
    if let Some(remap) = &remap {
        extra += 2 * remap.len();
    }
    Ok(TableSizes {
        forward: 2 * data_len,
        backward: 2 * trie.lower.len() + 2 * trie.upper.len() + extra,
        backward_slow: 2 * search.lower.len() + 4 * search.upper.len() + extra,
    })
}

pub fn generate_range_lbound(opts: &Options, crate_dir: &str, name: &str) -> Result<TableSizes> {
    let src = read_index(opts, crate_dir, name, IndexShape::RangeLbound)?;
    let mut data = src.entries.clone();
    ensure!(!data.is_empty(), "index {name} is empty");
    for pair in data.windows(2) {
        ensure!(
            pair[0].0 < pair[1].0 && pair[0].1 < pair[1].1,
            "index {name}: range entries must be strictly increasing"
        );
    }

    let (min_key, min_value) = data[0];
    let (max_key, max_value) = *data.last().unwrap();
    if data[0] != (0, 0) {
        data.insert(0, (0, 0));
    }
    let mut max_log2 = 0u32;
    while 1usize << (max_log2 + 1) <= data.len() {
        max_log2 += 1;
    }

    // gb18030 four-byte sequences cover all of Unicode on the key side and
    // the full 126 * 10 * 126 * 10 sequence space on the value side.
    let (key_ubound, value_ubound): (u32, u32) = if name == "gb18030-ranges" {
        (0x110000, 126 * 10 * 126 * 10)
    } else {
        (max_key + 1, max_value + 1)
    };

    let mut out = String::new();
    push_header(&mut out, name, &src.comments);

    out.push_str("\nconst FORWARD_TABLE: &'static [u32] = &[\n");
    push_wrapped(&mut out, "    ", data.iter().map(|&(_, value)| format!("{value}, ")));
    out.push_str(&format!("]; // {} entries\n", data.len()));

    out.push_str("\nconst BACKWARD_TABLE: &'static [u32] = &[\n");
    push_wrapped(&mut out, "    ", data.iter().map(|&(key, _)| format!("{key}, ")));
    out.push_str(&format!("]; // {} entries\n", data.len()));

    // Branch-unrolled lower-bound search: locate the greatest i with
    // fromtab[i] <= code, starting from a power-of-two window biased by
    // the overflow delta.
    out.push_str(&format!(
        "
fn search(code: u32, fromtab: &'static [u32], totab: &'static [u32]) -> u32 {{
    let mut i = if code >= fromtab[{first_off}] {{ {first_delta} }} else {{ 0 }};
",
        first_off = (1usize << max_log2) - 1,
        first_delta = data.len() - (1usize << max_log2) + 1,
    ));
    for step in (0..max_log2).rev() {
        let delta = 1usize << step;
        if step > 0 {
            out.push_str(&format!(
                "    if code >= fromtab[i + {}] {{ i += {delta}; }}\n",
                delta - 1
            ));
        } else {
            out.push_str("    if code >= fromtab[i] { i += 1; }\n");
        }
    }
    out.push_str("    (code - fromtab[i - 1]) + totab[i - 1]\n}\n");

    out.push_str(
        "
/// Returns the index code point for pointer `code` in this index.
#[inline]
pub fn forward(code: u32) -> u32 {
",
    );
    if min_key > 0 {
        out.push_str(&format!("    if code < {min_key} {{ return 0xffffffff; }}\n"));
    }
    if name == "gb18030-ranges" {
        out.push_str(
            "    if (code > 39419 && code < 189000) || code > 1237575 { return 0xffffffff; }\n",
        );
        out.push_str("    if code == 7457 { return 0xe7c7; }\n");
    }
    out.push_str("    search(code, BACKWARD_TABLE, FORWARD_TABLE)\n}\n");

    out.push_str(
        "
/// Returns the index pointer for code point `code` in this index.
#[inline]
pub fn backward(code: u32) -> u32 {
",
    );
    if min_value > 0 {
        out.push_str(&format!("    if code < {min_value} {{ return 0xffffffff; }}\n"));
    }
    if name == "gb18030-ranges" {
        out.push_str("    if code == 0xe7c7 { return 7457; }\n");
    }
    out.push_str("    search(code, FORWARD_TABLE, BACKWARD_TABLE)\n}\n");

    out.push_str(&format!(
        "
#[cfg(test)]
multi_byte_range_tests! {{
    key = [{min_key}, {max_key}], key < {key_ubound},
    value = [{min_value}, {max_value}], value < {value_ubound}
}}
",
    ));

    write_output(&opts.out_dir, crate_dir, name, &out)?;
    Ok(TableSizes {
        forward: 4 * data.len(),
        backward: 4 * data.len(),
        backward_slow: 4 * data.len(),
    })
}
