use std::collections::{BTreeMap, HashMap};

use crate::packer::{Slot, optimize_overlapping_blocks};

/// A two-level decomposition of a sparse scalar -> pointer map.
///
/// `upper` maps a scalar's super-block to an offset into `lower`; the low
/// `bits` of the scalar index into the block found there. Offset 0 is a
/// synthetic all-empty block, so absent super-blocks and out-of-range
/// scalars both read the empty sentinel.
pub struct Trie {
    pub bits: u32,
    pub lower: Vec<Slot>,
    pub upper: Vec<usize>,
}

impl Trie {
    pub fn mask(&self) -> u32 {
        (1 << self.bits) - 1
    }
}

/// Sweeps every block size 2^0 ..= 2^20 and keeps the trie with the
/// smallest `|lower| + |upper|` whose lower table stays under
/// `lower_limit` (so offsets fit the emitted integer width). Ties go to
/// the smaller block size.
pub fn make_minimal_trie(invdata: &BTreeMap<u32, u16>, lower_limit: usize) -> Trie {
    let max_value = invdata.keys().next_back().expect("empty index") + 1;
    let mut best = usize::MAX;
    let mut best_trie: Option<Trie> = None;
    for bits in 0..21 {
        let size = 1u32 << bits;

        // Cut the scalar space into blocks and deduplicate them; the
        // all-empty block is not materialized at all.
        let mut blocks: Vec<Vec<Slot>> = Vec::new();
        let mut block_map: HashMap<Vec<Slot>, usize> = HashMap::new();
        let mut upper_ref: Vec<Option<usize>> = Vec::new();
        let mut start = 0u32;
        while start < max_value {
            let blk: Vec<Slot> = (start..start + size)
                .map(|value| invdata.get(&value).copied())
                .collect();
            if blk.iter().all(|slot| slot.is_none()) {
                upper_ref.push(None);
            } else if let Some(&idx) = block_map.get(&blk) {
                upper_ref.push(Some(idx));
            } else {
                let idx = blocks.len();
                block_map.insert(blk.clone(), idx);
                blocks.push(blk);
                upper_ref.push(Some(idx));
            }
            start += size;
        }

        // Seed the lower table with one empty block backing offset 0, then
        // append the packed blocks, folding each one's recorded overlap
        // into the previous tail. The overlap region must agree slot for
        // slot, otherwise the packer handed back a bogus shift.
        let mut lower: Vec<Slot> = vec![None; size as usize];
        let mut offsets: HashMap<usize, usize> = HashMap::new();
        for (idx, shift) in optimize_overlapping_blocks(&blocks) {
            let blk = &blocks[idx];
            assert!(
                shift == 0 || lower[lower.len() - shift..] == blk[..shift],
                "overlap of block {idx} is inconsistent at shift {shift}"
            );
            offsets.insert(idx, lower.len() - shift);
            lower.extend_from_slice(&blk[shift..]);
        }
        let upper: Vec<usize> = upper_ref
            .iter()
            .map(|blk| blk.map_or(0, |idx| offsets[&idx]))
            .collect();

        if lower.len() < lower_limit && best > lower.len() + upper.len() {
            best = lower.len() + upper.len();
            best_trie = Some(Trie { bits, lower, upper });
        }
    }
    best_trie.expect("no block size kept the lower table under the limit")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup(trie: &Trie, value: u32) -> Slot {
        let sup = (value >> trie.bits) as usize;
        let offset = if sup < trie.upper.len() {
            trie.upper[sup]
        } else {
            0
        };
        trie.lower[offset + (value & trie.mask()) as usize]
    }

    fn sample() -> BTreeMap<u32, u16> {
        // windows-1252-ish: a low dense run plus a couple of far outliers
        let mut invdata = BTreeMap::new();
        for (pointer, value) in (0u16..).zip([0xa0u32, 0xa1, 0xa2, 0xa3, 0xa7, 0x2c6, 0x2dc]) {
            invdata.insert(value, pointer);
        }
        invdata.insert(0x20ac, 0x20);
        invdata.insert(0x2122, 0x3a);
        invdata
    }

    #[test]
    fn lookup_contract_holds_for_every_scalar() {
        let invdata = sample();
        let trie = make_minimal_trie(&invdata, 0x10000);
        let max_value = invdata.keys().next_back().unwrap() + 1;
        for value in 0..max_value + 0x100 {
            assert_eq!(
                lookup(&trie, value),
                invdata.get(&value).copied(),
                "trie disagrees at scalar {value:#x}"
            );
        }
    }

    #[test]
    fn out_of_range_scalars_hit_the_empty_block() {
        let trie = make_minimal_trie(&sample(), 0x10000);
        assert_eq!(lookup(&trie, 0x10fffd), None);
        // offset 0 backs a full block of empty slots
        assert!(trie.lower[..1 << trie.bits].iter().all(|s| s.is_none()));
    }

    #[test]
    fn upper_offsets_fit_the_limit() {
        let trie = make_minimal_trie(&sample(), 0x10000);
        assert!(trie.lower.len() < 0x10000);
        assert!(trie.upper.iter().all(|&off| off < 0x10000));
    }

    #[test]
    fn identical_blocks_are_shared() {
        // Two super-blocks with identical contents at any power-of-two
        // stride <= 4 bits must reuse one lower block.
        let mut invdata = BTreeMap::new();
        invdata.insert(0x3, 7);
        invdata.insert(0x103, 7);
        let trie = make_minimal_trie(&invdata, 0x10000);
        if trie.bits <= 8 {
            let sup = |v: u32| trie.upper[(v >> trie.bits) as usize];
            assert_eq!(sup(0x3), sup(0x103));
        }
    }

    #[test]
    fn dense_map_prefers_wide_blocks() {
        let mut invdata = BTreeMap::new();
        for value in 0u32..0x400 {
            invdata.insert(value, value as u16);
        }
        let trie = make_minimal_trie(&invdata, 0x10000);
        for value in 0..0x400 {
            assert_eq!(lookup(&trie, value), Some(value as u16));
        }
        // one dense block plus a tiny upper beats many narrow blocks
        assert!(trie.lower.len() + trie.upper.len() <= 2 * 0x400 + 2);
    }
}
