//! `union`: matches documents present in any sub-iterator (spec.md §4.7
//! "Union"). Limited to 64 sub-iterators so the "which subs matched the
//! current docno" set fits a `u64` bitmask.

use crate::ids::{Docno, Position};
use crate::iter::{PositionCache, PostingIterator};

pub const MAX_SUBS: usize = 64;

pub struct Union {
    subs: Vec<Box<dyn PostingIterator>>,
    docno: Docno,
    mask: u64,
    positions: PositionCache,
    feature_id: String,
}

impl Union {
    pub fn new(subs: Vec<Box<dyn PostingIterator>>) -> Self {
        assert!(
            subs.len() <= MAX_SUBS,
            "union supports at most {MAX_SUBS} sub-iterators, got {}",
            subs.len()
        );
        let feature_id = format!(
            "union({})",
            subs.iter().map(|s| s.feature_id()).collect::<Vec<_>>().join(",")
        );
        Union {
            subs,
            docno: 0,
            mask: 0,
            positions: PositionCache::default(),
            feature_id,
        }
    }
}

impl PostingIterator for Union {
    fn skip_doc(&mut self, docno: Docno) -> Docno {
        let mut min_doc: Docno = 0;
        let mut results = vec![0u32; self.subs.len()];
        for (i, s) in self.subs.iter_mut().enumerate() {
            let d = s.skip_doc(docno);
            results[i] = d;
            if d != 0 && (min_doc == 0 || d < min_doc) {
                min_doc = d;
            }
        }
        if min_doc == 0 {
            self.docno = 0;
            self.mask = 0;
            self.positions.clear();
            return 0;
        }
        self.mask = 0;
        let mut merged = Vec::new();
        for (i, &d) in results.iter().enumerate() {
            if d == min_doc {
                self.mask |= 1u64 << i;
                let mut p = self.subs[i].skip_pos(0);
                while p != 0 {
                    merged.push(p);
                    p = self.subs[i].skip_pos(p + 1);
                }
            }
        }
        merged.sort_unstable();
        merged.dedup();
        self.docno = min_doc;
        self.positions.set(merged);
        min_doc
    }

    fn skip_pos(&mut self, position: Position) -> Position {
        self.positions.skip_pos(position)
    }

    fn frequency(&self) -> u32 {
        self.positions.len() as u32
    }

    fn document_frequency(&self) -> u64 {
        // Sum-of-subs upper bound: the true distinct count would require
        // walking every sub's docset, which this iterator doesn't do eagerly.
        self.subs.iter().map(|s| s.document_frequency()).sum()
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

impl Union {
    /// Bitmask of which sub-iterators (by construction-order index)
    /// matched the current docno.
    pub fn matched_mask(&self) -> u64 {
        self.mask
    }
}
