//! `within`: matches documents where at least `cardinality` of the operand
//! terms' positions all fall inside a window of `range` consecutive
//! positions (spec.md §4.7 "Within"). Order of the operands within the
//! window does not matter; `sequence` is the ordered counterpart.
//!
//! Document-level gating (which docs have >= `cardinality` operands present
//! at all) is delegated to `CardinalityQueue` (spec.md §4.8), the same
//! shared machinery `contains` uses; this module only adds the
//! position-window narrowing on top.

use crate::ids::{Docno, Position};
use crate::iter::prioqueue::CardinalityQueue;
use crate::iter::{collect_positions, PositionCache, PostingIterator};

pub struct Within {
    queue: CardinalityQueue,
    range: u16,
    cardinality: usize,
    docno: Docno,
    positions: PositionCache,
    feature_id: String,
}

impl Within {
    pub fn new(subs: Vec<Box<dyn PostingIterator>>, range: u16, cardinality: usize) -> Self {
        let feature_id = format!(
            "within({},{},{})",
            range,
            cardinality,
            subs.iter().map(|s| s.feature_id()).collect::<Vec<_>>().join(",")
        );
        let bounded_cardinality = cardinality.max(1).min(subs.len().max(1));
        Within {
            queue: CardinalityQueue::new(subs, bounded_cardinality),
            range,
            cardinality: bounded_cardinality,
            docno: 0,
            positions: PositionCache::default(),
            feature_id,
        }
    }
}

impl PostingIterator for Within {
    fn skip_doc(&mut self, docno: Docno) -> Docno {
        let mut target = docno;
        loop {
            let min_doc = self.queue.skip_doc(target);
            if min_doc == 0 {
                self.docno = 0;
                self.positions.clear();
                return 0;
            }
            let matched: Vec<usize> = self.queue.matched_subs().to_vec();
            let subs = self.queue.subs_mut();
            let mut all_positions: Vec<(usize, Position)> = Vec::new();
            for &i in &matched {
                for p in collect_positions(subs[i].as_mut()) {
                    all_positions.push((i, p));
                }
            }
            let hits = window_hits(&all_positions, self.range, self.cardinality);
            if hits.is_empty() {
                target = min_doc + 1;
                continue;
            }
            self.docno = min_doc;
            self.positions.set(hits);
            return min_doc;
        }
    }

    fn skip_pos(&mut self, position: Position) -> Position {
        self.positions.skip_pos(position)
    }

    fn frequency(&self) -> u32 {
        self.positions.len() as u32
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
        self.positions.current()
    }
}

/// Only the minimal-span window per document is emitted (spec.md §4.7,
/// §8 scenario S3): for each candidate start position, walks forward just
/// far enough to pick up `cardinality` distinct subs (stopping the instant
/// that threshold is met, not at the full `range` radius), then keeps only
/// the start(s) whose resulting span is smallest. Candidates whose
/// threshold isn't met within `range` are dropped entirely.
fn window_hits(all: &[(usize, Position)], range: u16, cardinality: usize) -> Vec<Position> {
    let mut sorted = all.to_vec();
    sorted.sort_by_key(|&(_, p)| p);
    let mut candidates: Vec<(Position, Position)> = Vec::new();
    for start in 0..sorted.len() {
        let (start_idx, start_pos) = sorted[start];
        let mut distinct = std::collections::HashSet::new();
        distinct.insert(start_idx);
        let mut last_pos = start_pos;
        for &(idx, p) in &sorted[start + 1..] {
            if p >= start_pos + range {
                break;
            }
            if distinct.insert(idx) {
                last_pos = p;
                if distinct.len() >= cardinality {
                    break;
                }
            }
        }
        if distinct.len() >= cardinality {
            candidates.push((last_pos - start_pos, start_pos));
        }
    }
    let min_span = match candidates.iter().map(|&(span, _)| span).min() {
        Some(span) => span,
        None => return Vec::new(),
    };
    let mut out: Vec<Position> = candidates
        .into_iter()
        .filter(|&(span, _)| span == min_span)
        .map(|(_, start_pos)| start_pos)
        .collect();
    out.sort_unstable();
    out.dedup();
    out
}
