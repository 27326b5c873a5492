//! `difference`: positions of the first argument that do not coincide with
//! any position of the second, on the same document (spec.md §4.7
//! "Difference"). A document whose positions are fully cancelled out is
//! skipped, matching the `skip_doc` contract ("least docno >= argument
//! where this posting set is non-empty").

use crate::ids::{Docno, Position};
use crate::iter::{collect_positions, PositionCache, PostingIterator};

pub struct Difference {
    first: Box<dyn PostingIterator>,
    second: Box<dyn PostingIterator>,
    docno: Docno,
    positions: PositionCache,
    feature_id: String,
}

impl Difference {
    pub fn new(first: Box<dyn PostingIterator>, second: Box<dyn PostingIterator>) -> Self {
        let feature_id = format!("difference({},{})", first.feature_id(), second.feature_id());
        Difference {
            first,
            second,
            docno: 0,
            positions: PositionCache::default(),
            feature_id,
        }
    }
}

impl PostingIterator for Difference {
    fn skip_doc(&mut self, docno: Docno) -> Docno {
        let mut target = docno;
        loop {
            let d = self.first.skip_doc(target);
            if d == 0 {
                self.docno = 0;
                self.positions.clear();
                return 0;
            }
            let first_positions = collect_positions(self.first.as_mut());
            let excluded: Vec<Position> = if self.second.skip_doc(d) == d {
                collect_positions(self.second.as_mut())
            } else {
                Vec::new()
            };
            let remaining: Vec<Position> = first_positions
                .into_iter()
                .filter(|p| !excluded.contains(p))
                .collect();
            if remaining.is_empty() {
                target = d + 1;
                continue;
            }
            self.docno = d;
            self.positions.set(remaining);
            return d;
        }
    }

    fn skip_pos(&mut self, position: Position) -> Position {
        self.positions.skip_pos(position)
    }

    fn frequency(&self) -> u32 {
        self.positions.len() as u32
    }

    fn document_frequency(&self) -> u64 {
        self.first.document_frequency()
    }

    fn feature_id(&self) -> &str {
        &self.feature_id
    }

    fn docno(&self) -> Docno {
        self.docno
    }

    fn posno(&self) -> Position {
        self.positions.current()
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
    fn difference_with_itself_is_empty() {
        let kv = MemKv::new();
        seed_term(&kv, 1, 1, &[(1, &[1, 2]), (5, &[1])]);
        let a = Box::new(TermIterator::new(kv.snapshot(), 1, 1, 2));
        let b = Box::new(TermIterator::new(kv.snapshot(), 1, 1, 2));
        let mut it = Difference::new(a, b);
        assert_eq!(it.skip_doc(1), 0);
    }

    #[test]
    fn difference_removes_shared_positions_only() {
        let kv = MemKv::new();
        seed_term(&kv, 2, 1, &[(1, &[1, 2, 3])]);
        seed_term(&kv, 2, 2, &[(1, &[2])]);
        let a = Box::new(TermIterator::new(kv.snapshot(), 2, 1, 1));
        let b = Box::new(TermIterator::new(kv.snapshot(), 2, 2, 1));
        let mut it = Difference::new(a, b);
        assert_eq!(it.skip_doc(1), 1);
        assert_eq!(collect_positions(&mut it), vec![1, 3]);
    }

    #[test]
    fn difference_skips_fully_cancelled_document() {
        let kv = MemKv::new();
        seed_term(&kv, 3, 1, &[(1, &[1]), (2, &[5])]);
        seed_term(&kv, 3, 2, &[(1, &[1])]);
        let a = Box::new(TermIterator::new(kv.snapshot(), 3, 1, 2));
        let b = Box::new(TermIterator::new(kv.snapshot(), 3, 2, 1));
        let mut it = Difference::new(a, b);
        assert_eq!(it.skip_doc(1), 2);
    }
}
