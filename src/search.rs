use std::collections::BTreeMap;

use crate::premap::Premap;

/// A compressed scalar -> pointer search index.
///
/// The scalar space is cut into super-blocks of 2^bits. `upper[i]` is the
/// start of super-block `i`'s entries in `lower` (with one trailing
/// sentinel offset equal to `lower.len()`). An entry `(s, e)` with
/// `s < 0x8000` is a half-open range of forward-table slots to scan; with
/// bit 15 set it is a verbatim witness: slot `s & 0x7fff` holds a scalar
/// whose low 16 bits are `e`.
pub struct SearchIndex {
    pub bits: u32,
    pub lower: Vec<(u16, u16)>,
    pub upper: Vec<usize>,
}

impl SearchIndex {
    /// The whole index collapsed to a single covering range, so a plain
    /// scan of the forward table does just as well.
    pub fn is_full_linear(&self) -> bool {
        self.upper == [0, 1]
    }
}

/// Builds the search index for the unoptimized backward mapping.
///
/// `data` maps pre-mapped pointers to scalars (the forward-table layout);
/// `invdata` maps scalars to original pointers. Each super-block starts
/// as one covering range and is split at the largest pointer gaps until
/// the worst-case linear scan inside it drops to `max_search` slots.
/// Sweeps super-block sizes 2^0 ..= 2^20 and keeps the cheapest by
/// `|lower| + 2 * |upper|` (upper entries are twice as wide); ties go to
/// the smaller size.
pub fn make_minimal_search(
    data: &BTreeMap<u16, u32>,
    invdata: &BTreeMap<u32, u16>,
    premap: Premap,
    max_search: u32,
) -> SearchIndex {
    let min_key = *data.keys().next().expect("empty index");
    let max_value = invdata.keys().next_back().expect("empty index") + 1;
    let mut best = usize::MAX;
    let mut best_search: Option<SearchIndex> = None;
    for bits in 0..21 {
        let size = 1u32 << bits;
        let mut lower: Vec<(u16, u16)> = Vec::new();
        let mut upper: Vec<usize> = Vec::new();
        let mut start = 0u32;
        while start < max_value {
            upper.push(lower.len());
            let mut v: Vec<u16> = invdata
                .range(start..start + size)
                .map(|(_, &pointer)| {
                    premap
                        .forward(pointer)
                        .expect("pointer outside the pre-map domain")
                })
                .collect();
            start += size;
            if v.is_empty() {
                continue;
            }
            v.sort_unstable();

            // Worst case inside one covering range is its width; shave the
            // widest gaps off until the scan budget is met.
            let mut gaps: Vec<(u16, usize)> = v
                .windows(2)
                .enumerate()
                .map(|(i, pair)| (pair[1] - pair[0], i))
                .collect();
            gaps.sort_unstable();
            let mut work = (v[v.len() - 1] - v[0]) as u32;
            let mut block = vec![v[0], v[v.len() - 1]];
            for &(gap, i) in gaps.iter().rev() {
                if work <= max_search {
                    break;
                }
                work -= gap as u32;
                block.push(v[i]);
                block.push(v[i + 1]);
            }
            block.sort_unstable();
            assert!(
                min_key <= block[0] && block[block.len() - 1] < 0x7fff,
                "search entry would collide with the tag bit"
            );

            let entries: Vec<(u16, u16)> = block
                .chunks(2)
                .map(|pair| {
                    let (a, b) = (pair[0], pair[1]);
                    if a < b {
                        (a - min_key, b - min_key + 1)
                    } else {
                        (0x8000 | (a - min_key), (data[&a] & 0xffff) as u16)
                    }
                })
                .collect();
            for pair in entries.windows(2) {
                assert_ne!(pair[0], pair[1]);
            }
            lower.extend(entries);
        }
        upper.push(lower.len());

        if best > lower.len() + 2 * upper.len() {
            best = lower.len() + 2 * upper.len();
            best_search = Some(SearchIndex { bits, lower, upper });
        }
    }
    best_search.expect("search sweep produced no candidate")
}
