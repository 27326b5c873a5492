//! `intersect`: matches documents (and, within them, positions) present in
//! every sub-iterator (spec.md §4.7 "Intersect").

use crate::ids::{Docno, Position};
use crate::iter::{collect_positions, PositionCache, PostingIterator};

pub struct Intersect {
    subs: Vec<Box<dyn PostingIterator>>,
    docno: Docno,
    positions: PositionCache,
    feature_id: String,
}

impl Intersect {
    /// Orders sub-iterators ascending by document frequency (rarest
    /// first), per spec.md §4.7: "ordered on construction by ascending
    /// document frequency".
    pub fn new(mut subs: Vec<Box<dyn PostingIterator>>) -> Self {
        subs.sort_by_key(|s| s.document_frequency());
        let feature_id = format!(
            "intersect({})",
            subs.iter().map(|s| s.feature_id()).collect::<Vec<_>>().join(",")
        );
        Intersect {
            subs,
            docno: 0,
            positions: PositionCache::default(),
            feature_id,
        }
    }
}

impl PostingIterator for Intersect {
    fn skip_doc(&mut self, docno: Docno) -> Docno {
        if self.subs.is_empty() {
            self.docno = 0;
            return 0;
        }
        let mut target = docno;
        loop {
            let mut candidate = self.subs[0].skip_doc(target);
            if candidate == 0 {
                self.docno = 0;
                self.positions.clear();
                return 0;
            }
            let mut restart = false;
            for s in &mut self.subs[1..] {
                let d = s.skip_doc(candidate);
                if d == 0 {
                    self.docno = 0;
                    self.positions.clear();
                    return 0;
                }
                if d > candidate {
                    candidate = d;
                    restart = true;
                    break;
                }
            }
            if restart {
                target = candidate;
                continue;
            }
            self.docno = candidate;
            self.positions.set(positions_intersect(&mut self.subs));
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
        // An intersection's df is bounded by its rarest member; not tracked
        // exactly (would require a full scan), so the rarest sub's df is
        // used as the tightest cheap upper bound.
        self.subs.iter().map(|s| s.document_frequency()).min().unwrap_or(0)
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

/// N-way position intersection via the same restart-on-mismatch shape as
/// the docno-level algorithm above.
fn positions_intersect(subs: &mut [Box<dyn PostingIterator>]) -> Vec<Position> {
    let mut out = Vec::new();
    if subs.is_empty() {
        return out;
    }
    let mut next_min: Position = 0;
    loop {
        let mut candidate = subs[0].skip_pos(next_min);
        if candidate == 0 {
            break;
        }
        let mut restart = false;
        for s in &mut subs[1..] {
            let p = s.skip_pos(candidate);
            if p == 0 {
                return out;
            }
            if p > candidate {
                candidate = p;
                restart = true;
                break;
            }
        }
        if restart {
            next_min = candidate;
            continue;
        }
        out.push(candidate);
        next_min = candidate + 1;
    }
    out
}
