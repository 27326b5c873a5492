//! `sequence`: like `within`, but the operand positions must appear in
//! construction order inside the window (spec.md §4.7 "Sequence"). A plain
//! `Sequence` allows other positions interleaved between the matched ones;
//! `sequence_imm` (the "immediate" variant) additionally requires every
//! matched position to be exactly one past the previous operand's, i.e. the
//! terms appear as a contiguous run.

use crate::ids::{Docno, Position};
use crate::iter::{collect_positions, PositionCache, PostingIterator};

pub struct Sequence {
    subs: Vec<Box<dyn PostingIterator>>,
    range: u16,
    immediate: bool,
    docno: Docno,
    positions: PositionCache,
    feature_id: String,
}

impl Sequence {
    pub fn new(subs: Vec<Box<dyn PostingIterator>>, range: u16) -> Self {
        Self::build(subs, range, false)
    }

    /// The "immediate sequence" variant: operands must be adjacent, not just
    /// ordered within `range`.
    pub fn sequence_imm(subs: Vec<Box<dyn PostingIterator>>) -> Self {
        Self::build(subs, 1, true)
    }

    fn build(subs: Vec<Box<dyn PostingIterator>>, range: u16, immediate: bool) -> Self {
        let kind = if immediate { "sequence_imm" } else { "sequence" };
        let feature_id = format!(
            "{kind}({},{})",
            range,
            subs.iter().map(|s| s.feature_id()).collect::<Vec<_>>().join(",")
        );
        Sequence {
            subs,
            range,
            immediate,
            docno: 0,
            positions: PositionCache::default(),
            feature_id,
        }
    }
}

impl PostingIterator for Sequence {
    fn skip_doc(&mut self, docno: Docno) -> Docno {
        if self.subs.is_empty() {
            return 0;
        }
        let mut target = docno;
        loop {
            let mut candidate = self.subs[0].skip_doc_candidate(target);
            if candidate == 0 {
                self.docno = 0;
                self.positions.clear();
                return 0;
            }
            let mut restart = false;
            for s in &mut self.subs[1..] {
                let d = s.skip_doc_candidate(candidate);
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
            let per_sub: Vec<Vec<Position>> =
                self.subs.iter_mut().map(|s| collect_positions(s.as_mut())).collect();
            let hits = sequence_starts(&per_sub, self.range, self.immediate);
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

/// Starting positions of the first operand that begin a valid sequence:
/// for each candidate start in operand 0, greedily finds the next operand's
/// earliest position after the previous one (and, if `immediate`, exactly
/// one past it), all within `range` of the start.
fn sequence_starts(per_sub: &[Vec<Position>], range: u16, immediate: bool) -> Vec<Position> {
    let mut out = Vec::new();
    if per_sub.is_empty() || per_sub.iter().any(|v| v.is_empty()) {
        return out;
    }
    for &start in &per_sub[0] {
        let mut prev = start;
        let mut ok = true;
        for positions in &per_sub[1..] {
            let next = if immediate {
                positions.iter().copied().find(|&p| p == prev + 1)
            } else {
                positions.iter().copied().find(|&p| p > prev)
            };
            match next {
                Some(p) if p < start + range => prev = p,
                _ => {
                    ok = false;
                    break;
                }
            }
        }
        if ok {
            out.push(start);
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
    fn sequence_requires_operand_order() {
        let kv = MemKv::new();
        seed_term(&kv, 1, 1, &[(1, &[5])]); // "the"
        seed_term(&kv, 1, 2, &[(1, &[2])]); // "quick" appears before "the"
        let the = Box::new(TermIterator::new(kv.snapshot(), 1, 1, 1));
        let quick = Box::new(TermIterator::new(kv.snapshot(), 1, 2, 1));
        let mut it = Sequence::new(vec![the, quick], 10);
        assert_eq!(it.skip_doc(1), 0);
    }

    #[test]
    fn sequence_matches_in_order_within_range() {
        let kv = MemKv::new();
        seed_term(&kv, 2, 1, &[(1, &[2])]);
        seed_term(&kv, 2, 2, &[(1, &[4])]);
        let a = Box::new(TermIterator::new(kv.snapshot(), 2, 1, 1));
        let b = Box::new(TermIterator::new(kv.snapshot(), 2, 2, 1));
        let mut it = Sequence::new(vec![a, b], 5);
        assert_eq!(it.skip_doc(1), 1);
        assert_eq!(collect_positions(&mut it), vec![2]);
    }

    #[test]
    fn sequence_imm_requires_adjacency() {
        let kv = MemKv::new();
        seed_term(&kv, 3, 1, &[(1, &[2])]);
        seed_term(&kv, 3, 2, &[(1, &[4])]); // gap, not adjacent
        let a = Box::new(TermIterator::new(kv.snapshot(), 3, 1, 1));
        let b = Box::new(TermIterator::new(kv.snapshot(), 3, 2, 1));
        let mut it = Sequence::sequence_imm(vec![a, b]);
        assert_eq!(it.skip_doc(1), 0);
    }
}
