use std::cmp::Reverse;
use std::collections::BinaryHeap;

/// One slot of a table block: either a stored pointer or an empty hole.
pub type Slot = Option<u16>;

/// Disjoint-set forest with path compression and union by rank.
struct Groups {
    parent: Vec<usize>,
    rank: Vec<u8>,
}

impl Groups {
    fn new(n: usize) -> Groups {
        Groups {
            parent: (0..n).collect(),
            rank: vec![0; n],
        }
    }

    fn find(&mut self, i: usize) -> usize {
        let mut root = i;
        while self.parent[root] != root {
            root = self.parent[root];
        }
        let mut cur = i;
        while self.parent[cur] != root {
            let next = self.parent[cur];
            self.parent[cur] = root;
            cur = next;
        }
        root
    }

    fn union(&mut self, i: usize, j: usize) {
        let i = self.find(i);
        let j = self.find(j);
        if i == j {
            return;
        }
        if self.rank[i] < self.rank[j] {
            self.parent[i] = j;
        } else if self.rank[i] > self.rank[j] {
            self.parent[j] = i;
        } else {
            self.parent[j] = i;
            self.rank[i] += 1;
        }
    }
}

/// Reorders equally sized blocks so that the trailing empty run of each
/// block absorbs the leading empty run of its successor.
///
/// Imagine three blocks of size 8:
///     [_,_,1,2,3,_,_,_], [4,_,_,5,_,_,_,_], [_,_,_,_,_,_,_,6]
/// Concatenated as is they occupy 24 slots, but overlapped orderings are
/// shorter, e.g. [4,_,_,5,_,_,_,_] + [_,_,1,2,3,...] with shift 2 and
/// [..6] with shift 3 fits in 19.
///
/// Maximizing the total overlap is the longest-Hamiltonian-path problem
/// over the pairwise savings, which is NP-hard, so this settles for a
/// greedy that repeatedly joins the block with the largest trailing gap to
/// the block with the largest leading gap, skipping joins that would close
/// a cycle. The returned list holds `(block index, shift)` pairs in
/// emission order; the first entry's shift is its own leading gap.
pub fn optimize_overlapping_blocks(blocks: &[Vec<Slot>]) -> Vec<(usize, usize)> {
    assert!(!blocks.is_empty());

    // Heaps pop the largest gap first; ties go to the smallest block index.
    let mut pregaps: BinaryHeap<(usize, Reverse<usize>)> = BinaryHeap::new();
    let mut postgaps: BinaryHeap<(usize, Reverse<usize>)> = BinaryHeap::new();
    for (idx, blk) in blocks.iter().enumerate() {
        let first = blk
            .iter()
            .position(|slot| slot.is_some())
            .expect("no empty block allowed");
        let last = blk.iter().rposition(|slot| slot.is_some()).unwrap();
        pregaps.push((first, Reverse(idx)));
        postgaps.push((blk.len() - 1 - last, Reverse(idx)));
    }

    let mut next: Vec<Option<(usize, usize)>> = vec![None; blocks.len()];
    let mut groups = Groups::new(blocks.len());
    for _ in 1..blocks.len() {
        //      <-- postgap --->
        // -----================] preblk
        // postblk [============--------
        //          <- pregap ->
        let (postgap, Reverse(preblk)) = postgaps.pop().unwrap();
        let (mut pregap, Reverse(mut postblk)) = pregaps.pop().unwrap();

        // Joining two blocks of the same chain would close a cycle; set the
        // rejected candidates aside and retry with the next best one.
        let pregroup = groups.find(preblk);
        let mut rejected = Vec::new();
        while pregroup == groups.find(postblk) {
            rejected.push((pregap, Reverse(postblk)));
            let (gap, Reverse(blk)) = pregaps.pop().unwrap();
            pregap = gap;
            postblk = blk;
        }
        for item in rejected {
            pregaps.push(item);
        }

        assert!(next[preblk].is_none());
        next[preblk] = Some((postblk, pregap.min(postgap)));
        groups.union(preblk, postblk);
    }

    // The one block left in the pregap heap never got a predecessor, so it
    // heads the chain and keeps its own leading gap as the initial shift.
    let &(pregap, Reverse(head)) = pregaps.peek().unwrap();
    let mut ret = vec![(head, pregap)];
    let mut blk = head;
    while let Some((succ, shift)) = next[blk].take() {
        ret.push((succ, shift));
        blk = succ;
    }
    assert_eq!(ret.len(), blocks.len());
    ret
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(slots: &[i32]) -> Vec<Slot> {
        slots
            .iter()
            .map(|&v| if v < 0 { None } else { Some(v as u16) })
            .collect()
    }

    // Concatenates the packed blocks the way the trie emitter does, and
    // checks the overlapped region of every join for consistency.
    fn emit(blocks: &[Vec<Slot>], order: &[(usize, usize)]) -> Vec<Slot> {
        let mut out: Vec<Slot> = Vec::new();
        for &(idx, shift) in order {
            let blk = &blocks[idx];
            assert!(shift <= out.len().max(blk.len()));
            if shift > 0 && !out.is_empty() {
                assert_eq!(&out[out.len() - shift..], &blk[..shift]);
            }
            out.extend_from_slice(&blk[shift..]);
        }
        out
    }

    #[test]
    fn docstring_example_packs_tight() {
        let blocks = vec![
            block(&[-1, -1, 1, 2, 3, -1, -1, -1]),
            block(&[4, -1, -1, 5, -1, -1, -1, -1]),
            block(&[-1, -1, -1, -1, -1, -1, -1, 6]),
        ];
        let order = optimize_overlapping_blocks(&blocks);
        // Greedy: the 7-slot leading gap of the third block is absorbed
        // first (capped by the 4-slot trailing gap of the second), then the
        // first block heads the chain with its own leading gap.
        assert_eq!(order, vec![(0, 2), (1, 0), (2, 4)]);
        assert_eq!(emit(&blocks, &order).len(), 3 * 8 - 6);
    }

    #[test]
    fn single_block_keeps_leading_gap() {
        let blocks = vec![block(&[-1, -1, -1, 9, -1])];
        assert_eq!(optimize_overlapping_blocks(&blocks), vec![(0, 3)]);
    }

    #[test]
    fn chain_is_hamiltonian() {
        // Identical gap profiles force the tie-break and cycle paths.
        let blocks: Vec<Vec<Slot>> = (0..6)
            .map(|i| block(&[-1, i, -1, -1]))
            .collect();
        let order = optimize_overlapping_blocks(&blocks);
        let mut seen: Vec<usize> = order.iter().map(|&(idx, _)| idx).collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..6).collect::<Vec<_>>());
        emit(&blocks, &order);
    }

    #[test]
    fn dense_blocks_never_overlap() {
        let blocks = vec![block(&[1, 2]), block(&[3, 4]), block(&[5, 6])];
        let order = optimize_overlapping_blocks(&blocks);
        assert!(order.iter().all(|&(_, shift)| shift == 0));
        assert_eq!(emit(&blocks, &order).len(), 6);
    }

    #[test]
    fn emitted_length_matches_recorded_shifts() {
        let blocks = vec![
            block(&[-1, 7, -1, -1]),
            block(&[-1, -1, 8, -1]),
            block(&[9, -1, -1, -1]),
            block(&[-1, -1, -1, 3]),
        ];
        let order = optimize_overlapping_blocks(&blocks);
        let total_shift: usize = order.iter().map(|&(_, s)| s).sum();
        assert_eq!(emit(&blocks, &order).len(), 4 * 4 - total_shift);
    }

    #[test]
    #[should_panic(expected = "no empty block allowed")]
    fn rejects_all_empty_block() {
        optimize_overlapping_blocks(&[block(&[-1, -1])]);
    }
}
