//! Posting iterators and the join algebra (spec.md §4.7-§4.9).
//!
//! Every iterator in this module implements [`PostingIterator`], the single
//! contract spec.md §4.7 states for all of them: `skip_doc`/`skip_pos` move
//! forward only, `docno`/`posno` snapshot the last move, `frequency`/
//! `document_frequency` describe the current match, and `feature_id` names
//! the iterator's shape so a query planner above this crate can cache
//! repeated sub-expressions.
//!
//! Grounded on `examples/kev1N916-keSE/src/query_processor/term_iterator.rs`
//! and its `retrieval_algorithms/` siblings for the "cursor object with
//! `advance`/`current`, composed by higher-level algorithms" shape; the
//! specific join operators (intersect/union/difference/within/sequence/
//! between/contains/succ/pred) are spec.md §4.7's, generalized from the
//! teacher's single `wand`/`max_score` merge loops to the N-ary algebra this
//! storage core must expose to its query planner.

use crate::ids::{Docno, Position};

pub mod between;
pub mod contains;
pub mod difference;
pub mod intersect;
pub mod prioqueue;
pub mod ranker;
pub mod sequence;
pub mod succpred;
pub mod term;
pub mod union;
pub mod window;
pub mod within;

/// The shared posting-iterator contract (spec.md §4.7).
pub trait PostingIterator: Send {
    /// Least docno >= `docno` where this posting set is non-empty.
    /// Returns 0 if no such document exists.
    fn skip_doc(&mut self, docno: Docno) -> Docno;

    /// Like `skip_doc`, but may return a candidate whose per-position check
    /// has not been performed yet (cheaper precheck used by the cardinality
    /// priority queue, spec.md §4.8). The default forwards to `skip_doc`.
    fn skip_doc_candidate(&mut self, docno: Docno) -> Docno {
        self.skip_doc(docno)
    }

    /// Within the current document, least position >= `position`. Returns
    /// 0 if none.
    fn skip_pos(&mut self, position: Position) -> Position;

    /// Count of positions in the current document.
    fn frequency(&self) -> u32;

    /// Number of documents containing any match, across the whole index.
    fn document_frequency(&self) -> u64;

    /// Stable string uniquely encoding this iterator's structure.
    fn feature_id(&self) -> &str;

    /// The document `skip_doc` last landed on (0 if never moved or
    /// exhausted).
    fn docno(&self) -> Docno;

    /// The position `skip_pos` last landed on (0 if never moved or
    /// exhausted within the current document).
    fn posno(&self) -> Position;

    /// Snapshot of the current document's length in this iterator's terms;
    /// defaults to `frequency()` (spec.md does not separate the two for
    /// most iterators; `PositionWindow` is the one consumer that needs a
    /// true document length and takes it as an explicit argument instead).
    fn length(&self) -> u32 {
        self.frequency()
    }
}

/// Enumerates every position of the current document by repeated
/// `skip_pos` calls, ascending. Shared by every join combinator that needs
/// a document's full position list at once (intersect restart logic aside,
/// this is the only position-enumeration idiom used in this module).
pub fn collect_positions(it: &mut dyn PostingIterator) -> Vec<Position> {
    let mut out = Vec::new();
    let mut next = 0;
    loop {
        let p = it.skip_pos(next);
        if p == 0 {
            break;
        }
        out.push(p);
        next = p + 1;
    }
    out
}

/// A position list cached for the current document, with its own
/// `skip_pos` cursor. Every combinator below stores one of these instead of
/// re-deriving positions per `skip_pos` call.
#[derive(Debug, Default, Clone)]
pub struct PositionCache {
    positions: Vec<Position>,
    idx: usize,
}

impl PositionCache {
    pub fn set(&mut self, positions: Vec<Position>) {
        self.positions = positions;
        self.idx = 0;
    }

    pub fn clear(&mut self) {
        self.positions.clear();
        self.idx = 0;
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn skip_pos(&mut self, min: Position) -> Position {
        while self.idx < self.positions.len() {
            let p = self.positions[self.idx];
            if p >= min {
                return p;
            }
            self.idx += 1;
        }
        0
    }

    pub fn current(&self) -> Position {
        if self.idx < self.positions.len() {
            self.positions[self.idx]
        } else {
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(Vec<Position>);
    impl PostingIterator for Fixed {
        fn skip_doc(&mut self, docno: Docno) -> Docno {
            docno
        }
        fn skip_pos(&mut self, position: Position) -> Position {
            self.0.iter().copied().find(|&p| p >= position).unwrap_or(0)
        }
        fn frequency(&self) -> u32 {
            self.0.len() as u32
        }
        fn document_frequency(&self) -> u64 {
            1
        }
        fn feature_id(&self) -> &str {
            "fixed"
        }
        fn docno(&self) -> Docno {
            1
        }
        fn posno(&self) -> Position {
            0
        }
    }

    #[test]
    fn collect_positions_enumerates_ascending() {
        let mut it = Fixed(vec![2, 5, 9]);
        assert_eq!(collect_positions(&mut it), vec![2, 5, 9]);
    }

    #[test]
    fn position_cache_scans_forward_only() {
        let mut cache = PositionCache::default();
        cache.set(vec![1, 4, 10]);
        assert_eq!(cache.skip_pos(0), 1);
        assert_eq!(cache.skip_pos(2), 4);
        assert_eq!(cache.skip_pos(11), 0);
    }
}
