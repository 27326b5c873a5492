//! `contains`: document-level-only join (spec.md §4.7 "Contains"). Matches
//! documents where at least `cardinality` operands have a position at all,
//! but does not track which positions matched; `posno`/`skip_pos` always
//! report the sentinel position 1 for a matching document, since this
//! operator is used purely to gate on document membership (e.g.
//! metadata-qualified feature sets) and has no position semantics of its
//! own. `cardinality == subs.len()` is the full-AND case `new` defaults to;
//! `new_with_cardinality` exposes the C-of-N form over the same
//! `CardinalityQueue` machinery `within` uses (spec.md §4.8).

use crate::ids::{Docno, Position};
use crate::iter::prioqueue::CardinalityQueue;
use crate::iter::PostingIterator;

pub struct Contains {
    queue: CardinalityQueue,
    docno: Docno,
    matched: bool,
    feature_id: String,
}

impl Contains {
    pub fn new(subs: Vec<Box<dyn PostingIterator>>) -> Self {
        let cardinality = subs.len().max(1);
        Self::new_with_cardinality(subs, cardinality)
    }

    pub fn new_with_cardinality(subs: Vec<Box<dyn PostingIterator>>, cardinality: usize) -> Self {
        let feature_id = format!(
            "contains({},{})",
            cardinality,
            subs.iter().map(|s| s.feature_id()).collect::<Vec<_>>().join(",")
        );
        let bounded_cardinality = cardinality.max(1).min(subs.len().max(1));
        Contains {
            queue: CardinalityQueue::new(subs, bounded_cardinality),
            docno: 0,
            matched: false,
            feature_id,
        }
    }
}

impl PostingIterator for Contains {
    fn skip_doc(&mut self, docno: Docno) -> Docno {
        let candidate = self.queue.skip_doc(docno);
        if candidate == 0 {
            self.docno = 0;
            self.matched = false;
            return 0;
        }
        self.docno = candidate;
        self.matched = true;
        candidate
    }

    fn skip_pos(&mut self, position: Position) -> Position {
        if self.matched && position <= 1 {
            1
        } else {
            0
        }
    }

    fn frequency(&self) -> u32 {
        if self.matched {
            1
        } else {
            0
        }
    }

    fn document_frequency(&self) -> u64 {
        self.queue.document_frequency()
    }

    fn feature_id(&self) -> &str {
        &self.feature_id
    }

    fn docno(&self) -> Docno {
        self.docno
    }

    fn posno(&self) -> Position {
        if self.matched {
            1
        } else {
            0
        }
    }
}
