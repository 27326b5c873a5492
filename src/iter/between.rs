//! `between`: matches document/position pairs of `elem` whose position lies
//! inside the half-open interval `[start, end)` formed by the nearest
//! preceding `start` position and the nearest following `end` position in
//! the same document (spec.md §4.7 "Between"), e.g. matching words inside a
//! quoted span.

use crate::ids::{Docno, Position};
use crate::iter::{collect_positions, PositionCache, PostingIterator};

pub struct Between {
    start: Box<dyn PostingIterator>,
    end: Box<dyn PostingIterator>,
    elem: Box<dyn PostingIterator>,
    docno: Docno,
    positions: PositionCache,
    feature_id: String,
}

impl Between {
    pub fn new(
        start: Box<dyn PostingIterator>,
        end: Box<dyn PostingIterator>,
        elem: Box<dyn PostingIterator>,
    ) -> Self {
        let feature_id = format!(
            "between({},{},{})",
            start.feature_id(),
            end.feature_id(),
            elem.feature_id()
        );
        Between {
            start,
            end,
            elem,
            docno: 0,
            positions: PositionCache::default(),
            feature_id,
        }
    }
}

impl PostingIterator for Between {
    fn skip_doc(&mut self, docno: Docno) -> Docno {
        let mut target = docno;
        loop {
            let ds = self.start.skip_doc(target);
            let de = self.end.skip_doc(target);
            let dm = self.elem.skip_doc(target);
            if ds == 0 || de == 0 || dm == 0 {
                self.docno = 0;
                self.positions.clear();
                return 0;
            }
            let candidate = ds.max(de).max(dm);
            if ds != candidate || de != candidate || dm != candidate {
                target = candidate;
                continue;
            }
            let starts = collect_positions(self.start.as_mut());
            let ends = collect_positions(self.end.as_mut());
            let elems = collect_positions(self.elem.as_mut());
            let hits = spans(&starts, &ends, &elems);
            if hits.is_empty() {
                target = candidate + 1;
                continue;
            }
            self.docno = candidate;
            self.positions.set(hits);
            return candidate;
        }
    }

    fn skip_pos(&mut self, position: Position) -> Position {
        self.positions.skip_pos(position)
    }

    fn frequency(&self) -> u32 {
        self.positions.len() as u32
    }

    fn document_frequency(&self) -> u64 {
        self.elem.document_frequency()
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

/// For each `elem` position, finds the nearest preceding `start` and
/// nearest following `end`; keeps the position if it falls strictly between
/// them with no other `start` or `end` interleaved.
fn spans(starts: &[Position], ends: &[Position], elems: &[Position]) -> Vec<Position> {
    let mut out = Vec::new();
    for &e in elems {
        let nearest_start = starts.iter().copied().filter(|&s| s < e).max();
        let nearest_end = ends.iter().copied().filter(|&s| s > e).min();
        if let (Some(s), Some(en)) = (nearest_start, nearest_end) {
            if s < e && e < en {
                out.push(e);
            }
        }
    }
    out.sort_unstable();
    out.dedup();
    out
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
    fn between_matches_inside_quotes() {
        let kv = MemKv::new();
        seed_term(&kv, 1, 1, &[(1, &[2])]); // opening quote
        seed_term(&kv, 1, 2, &[(1, &[8])]); // closing quote
        seed_term(&kv, 1, 3, &[(1, &[5, 10])]); // "word" occurrences
        let start = Box::new(TermIterator::new(kv.snapshot(), 1, 1, 1));
        let end = Box::new(TermIterator::new(kv.snapshot(), 1, 2, 1));
        let elem = Box::new(TermIterator::new(kv.snapshot(), 1, 3, 1));
        let mut it = Between::new(start, end, elem);
        assert_eq!(it.skip_doc(1), 1);
        assert_eq!(collect_positions(&mut it), vec![5]);
    }
}
