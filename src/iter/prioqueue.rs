//! Cardinality priority queue (spec.md §4.8): matches documents where at
//! least `cardinality` of the wrapped sub-iterators have a candidate at the
//! current docno. Shared document-level gating for both cardinality-bounded
//! joins, `within` and `contains`, and usable standalone for "match any C of
//! N terms" queries.
//!
//! Grounded on `priority-queue`, already a teacher dependency for its own
//! ranked-retrieval heap; here the same crate backs the "advance the
//! furthest-behind entries until `cardinality` of them agree" loop instead
//! of a score heap.

use crate::ids::Docno;
use crate::iter::PostingIterator;
use priority_queue::PriorityQueue;
use std::cmp::Reverse;

pub struct CardinalityQueue {
    subs: Vec<Box<dyn PostingIterator>>,
    cardinality: usize,
    docno: Docno,
    matched: Vec<usize>,
    feature_id: String,
}

impl CardinalityQueue {
    pub fn new(subs: Vec<Box<dyn PostingIterator>>, cardinality: usize) -> Self {
        let feature_id = format!(
            "cardinality({},{})",
            cardinality,
            subs.iter().map(|s| s.feature_id()).collect::<Vec<_>>().join(",")
        );
        CardinalityQueue {
            subs,
            cardinality: cardinality.max(1),
            docno: 0,
            matched: Vec::new(),
            feature_id,
        }
    }

    /// Indices (construction order) of the sub-iterators that matched the
    /// current docno.
    pub fn matched_subs(&self) -> &[usize] {
        &self.matched
    }

    /// Mutable access to the wrapped sub-iterators, for callers that need to
    /// pull positions out of the ones named by `matched_subs`.
    pub fn subs_mut(&mut self) -> &mut [Box<dyn PostingIterator>] {
        &mut self.subs
    }

    pub fn document_frequency(&self) -> u64 {
        self.subs.iter().map(|s| s.document_frequency()).min().unwrap_or(0)
    }

    pub fn feature_id(&self) -> &str {
        &self.feature_id
    }

    pub fn docno(&self) -> Docno {
        self.docno
    }

    /// Least docno >= `docno` where at least `cardinality` subs match.
    ///
    /// Entries are kept in a min-heap keyed by their next candidate docno
    /// (ascending, so a `Reverse` wrapper turns `PriorityQueue`'s max-heap
    /// into a min-heap); each round pops every entry tied at the current
    /// floor, and either accepts the floor (enough ties) or advances the
    /// tied entries and loops, which guarantees forward progress because
    /// the floor strictly increases every iteration that does not return.
    pub fn skip_doc(&mut self, docno: Docno) -> Docno {
        let mut heap: PriorityQueue<usize, Reverse<Docno>> = PriorityQueue::new();
        for (i, s) in self.subs.iter_mut().enumerate() {
            let d = s.skip_doc_candidate(docno);
            if d != 0 {
                heap.push(i, Reverse(d));
            }
        }
        loop {
            if heap.len() < self.cardinality {
                self.docno = 0;
                self.matched.clear();
                return 0;
            }
            let (_, Reverse(floor)) = *heap.peek().unwrap();
            let mut tied = Vec::new();
            while let Some((_, Reverse(d))) = heap.peek() {
                if *d == floor {
                    let (idx, _) = heap.pop().unwrap();
                    tied.push(idx);
                } else {
                    break;
                }
            }
            if tied.len() >= self.cardinality {
                self.docno = floor;
                self.matched = tied;
                self.matched.sort_unstable();
                for &i in &self.matched {
                    heap.push(i, Reverse(floor));
                }
                return floor;
            }
            for i in tied {
                let d = self.subs[i].skip_doc_candidate(floor + 1);
                if d != 0 {
                    heap.push(i, Reverse(d));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blocks::posting::PostingBlockBuilder;
    use crate::iter::term::TermIterator;
    use crate::key::{KeyBuilder, KeyPrefix};
    use crate::kv::{Kv, MemKv, WriteBatch};

    fn seed_term(kv: &MemKv, typeno: u32, termno: u32, docs: &[(u32, &[u16])]) {
        let mut b = PostingBlockBuilder::new();
        for &(d, pos) in docs {
            b.append(d, pos).unwrap();
        }
        let block = b.create_block();
        let key = KeyBuilder::new(KeyPrefix::PostingBlock)
            .id(typeno)
            .id(termno)
            .id(block.block_id())
            .into_bytes();
        let mut batch = kv.new_batch();
        batch.put(&key, &block.encode());
        kv.commit_batch(batch).unwrap();
    }

    #[test]
    fn requires_at_least_cardinality_matches() {
        let kv = MemKv::new();
        seed_term(&kv, 1, 1, &[(1, &[1]), (2, &[1])]);
        seed_term(&kv, 1, 2, &[(2, &[1]), (3, &[1])]);
        seed_term(&kv, 1, 3, &[(2, &[1])]);
        let a = Box::new(TermIterator::new(kv.snapshot(), 1, 1, 2));
        let b = Box::new(TermIterator::new(kv.snapshot(), 1, 2, 2));
        let c = Box::new(TermIterator::new(kv.snapshot(), 1, 3, 1));
        let mut q = CardinalityQueue::new(vec![a, b, c], 2);
        // doc1 has only "a" => 1 match, not enough.
        // doc2 has a,b,c => 3 matches, enough.
        assert_eq!(q.skip_doc(1), 2);
        assert_eq!(q.matched_subs(), &[0, 1, 2]);
    }

    #[test]
    fn exhausted_when_no_docno_reaches_cardinality() {
        let kv = MemKv::new();
        seed_term(&kv, 2, 1, &[(1, &[1])]);
        seed_term(&kv, 2, 2, &[(2, &[1])]);
        let a = Box::new(TermIterator::new(kv.snapshot(), 2, 1, 1));
        let b = Box::new(TermIterator::new(kv.snapshot(), 2, 2, 1));
        let mut q = CardinalityQueue::new(vec![a, b], 2);
        assert_eq!(q.skip_doc(1), 0);
    }
}
