//! `succ`/`pred`: unary position-shift iterators (spec.md §4.7). `Succ`
//! shifts every position of the wrapped iterator forward by `dist`; `Pred`
//! shifts backward, collapsing any position that would go to or below 0
//! back to 0 (dropped, not wrapped), since 0 is the sentinel "no position".

use crate::ids::{Docno, Position};
use crate::iter::{collect_positions, PositionCache, PostingIterator};

pub struct Succ {
    inner: Box<dyn PostingIterator>,
    dist: u16,
    docno: Docno,
    positions: PositionCache,
    feature_id: String,
}

impl Succ {
    pub fn new(inner: Box<dyn PostingIterator>, dist: u16) -> Self {
        let feature_id = format!("succ({},{dist})", inner.feature_id());
        Succ {
            inner,
            dist,
            docno: 0,
            positions: PositionCache::default(),
            feature_id,
        }
    }
}

impl PostingIterator for Succ {
    fn skip_doc(&mut self, docno: Docno) -> Docno {
        let d = self.inner.skip_doc(docno);
        if d == 0 {
            self.docno = 0;
            self.positions.clear();
            return 0;
        }
        let shifted: Vec<Position> = collect_positions(self.inner.as_mut())
            .into_iter()
            .filter_map(|p| p.checked_add(self.dist))
            .collect();
        self.docno = d;
        self.positions.set(shifted);
        d
    }

    fn skip_pos(&mut self, position: Position) -> Position {
        self.positions.skip_pos(position)
    }

    fn frequency(&self) -> u32 {
        self.positions.len() as u32
    }

    fn document_frequency(&self) -> u64 {
        self.inner.document_frequency()
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

pub struct Pred {
    inner: Box<dyn PostingIterator>,
    dist: u16,
    docno: Docno,
    positions: PositionCache,
    feature_id: String,
}

impl Pred {
    pub fn new(inner: Box<dyn PostingIterator>, dist: u16) -> Self {
        let feature_id = format!("pred({},{dist})", inner.feature_id());
        Pred {
            inner,
            dist,
            docno: 0,
            positions: PositionCache::default(),
            feature_id,
        }
    }
}

impl PostingIterator for Pred {
    fn skip_doc(&mut self, docno: Docno) -> Docno {
        let d = self.inner.skip_doc(docno);
        if d == 0 {
            self.docno = 0;
            self.positions.clear();
            return 0;
        }
        // Positions that would shift to <= 0 collapse to 0 and are dropped,
        // not clamped: 0 is the "no position" sentinel, never a real one.
        let shifted: Vec<Position> = collect_positions(self.inner.as_mut())
            .into_iter()
            .filter_map(|p| {
                let v = p as i32 - self.dist as i32;
                if v > 0 {
                    Some(v as Position)
                } else {
                    None
                }
            })
            .collect();
        self.docno = d;
        self.positions.set(shifted);
        d
    }

    fn skip_pos(&mut self, position: Position) -> Position {
        self.positions.skip_pos(position)
    }

    fn frequency(&self) -> u32 {
        self.positions.len() as u32
    }

    fn document_frequency(&self) -> u64 {
        self.inner.document_frequency()
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
    fn succ_shifts_positions_forward() {
        let kv = MemKv::new();
        seed_term(&kv, 1, 1, &[(1, &[1, 5])]);
        let inner = Box::new(TermIterator::new(kv.snapshot(), 1, 1, 1));
        let mut it = Succ::new(inner, 2);
        assert_eq!(it.skip_doc(1), 1);
        assert_eq!(collect_positions(&mut it), vec![3, 7]);
    }

    #[test]
    fn pred_shifts_positions_backward() {
        let kv = MemKv::new();
        seed_term(&kv, 2, 1, &[(1, &[3, 7])]);
        let inner = Box::new(TermIterator::new(kv.snapshot(), 2, 1, 1));
        let mut it = Pred::new(inner, 2);
        assert_eq!(it.skip_doc(1), 1);
        assert_eq!(collect_positions(&mut it), vec![1, 5]);
    }

    #[test]
    fn pred_drops_positions_that_collapse_to_zero() {
        let kv = MemKv::new();
        seed_term(&kv, 3, 1, &[(1, &[1, 2, 5])]);
        let inner = Box::new(TermIterator::new(kv.snapshot(), 3, 1, 1));
        let mut it = Pred::new(inner, 2);
        assert_eq!(it.skip_doc(1), 1);
        assert_eq!(collect_positions(&mut it), vec![3]);
    }
}
