//! `DocSetBlock`: a compact encoding of a monotonic set of document numbers,
//! used wherever the store needs "does docno belong to this set" rather than
//! per-document payloads (spec.md §3 "Document sets": the docid block, ACL
//! membership blocks, user->doc blocks).
//!
//! Grounded on `booleanBlock.hpp`/`booleanBlock.cpp` in
//! `examples/original_source/src/lvdbstorage/`, which represents the same
//! idea as a chain of tagged range/bitfield nodes. Per SPEC_FULL.md D.1 we
//! implement only the two encodings spec.md actually specifies in its
//! byte-layout table -- a contiguous range pair and a diff list -- and skip
//! the original's `RangeField16`/`RangeField32` bitfield variant, whose
//! `append`/`merge` methods are incomplete in the original source itself.

use crate::error::{Result, StorageError};
use crate::ids::Docno;

pub const SOFT_LIMIT_BYTES: usize = 1024;

const TAG_RANGE: u8 = 0;
const TAG_DIFFS: u8 = 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocSetNode {
    /// Every docno in `first..=last` belongs to the set.
    Range { first: Docno, last: Docno },
    /// `base`, then each of `diffs` added cumulatively: sparse membership.
    Diffs { base: Docno, diffs: Vec<u16> },
}

impl DocSetNode {
    pub fn first_doc(&self) -> Docno {
        match self {
            DocSetNode::Range { first, .. } => *first,
            DocSetNode::Diffs { base, .. } => *base,
        }
    }

    pub fn last_doc(&self) -> Docno {
        match self {
            DocSetNode::Range { last, .. } => *last,
            DocSetNode::Diffs { base, diffs } => {
                base + diffs.iter().copied().map(u32::from).sum::<u32>()
            }
        }
    }

    /// All docnos held by this node, ascending.
    pub fn members(&self) -> Vec<Docno> {
        match self {
            DocSetNode::Range { first, last } => (*first..=*last).collect(),
            DocSetNode::Diffs { base, diffs } => {
                let mut out = Vec::with_capacity(diffs.len() + 1);
                let mut cur = *base;
                out.push(cur);
                for d in diffs {
                    cur += *d as u32;
                    out.push(cur);
                }
                out
            }
        }
    }

    fn encoded_size(&self) -> usize {
        match self {
            DocSetNode::Range { .. } => 1 + 4 + 4,
            DocSetNode::Diffs { diffs, .. } => 1 + 4 + 2 + diffs.len() * 2,
        }
    }

    fn encode(&self, out: &mut Vec<u8>) {
        match self {
            DocSetNode::Range { first, last } => {
                out.push(TAG_RANGE);
                out.extend_from_slice(&first.to_be_bytes());
                out.extend_from_slice(&last.to_be_bytes());
            }
            DocSetNode::Diffs { base, diffs } => {
                out.push(TAG_DIFFS);
                out.extend_from_slice(&base.to_be_bytes());
                out.extend_from_slice(&(diffs.len() as u16).to_be_bytes());
                for d in diffs {
                    out.extend_from_slice(&d.to_be_bytes());
                }
            }
        }
    }

    fn decode(buf: &[u8]) -> Result<(Self, usize)> {
        let tag = *buf
            .first()
            .ok_or_else(|| StorageError::integrity(buf, "empty docset node"))?;
        match tag {
            TAG_RANGE => {
                if buf.len() < 9 {
                    return Err(StorageError::integrity(buf, "truncated range node"));
                }
                let first = u32::from_be_bytes(buf[1..5].try_into().unwrap());
                let last = u32::from_be_bytes(buf[5..9].try_into().unwrap());
                Ok((DocSetNode::Range { first, last }, 9))
            }
            TAG_DIFFS => {
                if buf.len() < 7 {
                    return Err(StorageError::integrity(buf, "truncated diffs node"));
                }
                let base = u32::from_be_bytes(buf[1..5].try_into().unwrap());
                let count = u16::from_be_bytes(buf[5..7].try_into().unwrap()) as usize;
                let need = 7 + count * 2;
                if buf.len() < need {
                    return Err(StorageError::integrity(buf, "truncated diffs array"));
                }
                let diffs = buf[7..need]
                    .chunks_exact(2)
                    .map(|c| u16::from_be_bytes([c[0], c[1]]))
                    .collect();
                Ok((DocSetNode::Diffs { base, diffs }, need))
            }
            other => Err(StorageError::integrity(
                buf,
                format!("unknown docset node tag {other}"),
            )),
        }
    }
}

/// An immutable, already-written block of a document-number set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocSetBlock {
    nodes: Vec<DocSetNode>,
}

impl DocSetBlock {
    pub fn block_id(&self) -> Docno {
        self.nodes.last().map(|n| n.last_doc()).unwrap_or(0)
    }

    pub fn first_doc(&self) -> Docno {
        self.nodes.first().map(|n| n.first_doc()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes(&self) -> &[DocSetNode] {
        &self.nodes
    }

    pub fn contains(&self, docno: Docno) -> bool {
        let idx = self.nodes.partition_point(|n| n.last_doc() < docno);
        match self.nodes.get(idx) {
            Some(DocSetNode::Range { first, last }) => docno >= *first && docno <= *last,
            Some(node @ DocSetNode::Diffs { .. }) => node.members().binary_search(&docno).is_ok(),
            None => false,
        }
    }

    /// Least member >= `docno`, or 0 if none.
    pub fn skip_doc(&self, docno: Docno) -> Docno {
        let idx = self.nodes.partition_point(|n| n.last_doc() < docno);
        match self.nodes.get(idx) {
            Some(DocSetNode::Range { first, last }) => docno.max(*first).min(*last).max(*first),
            Some(node @ DocSetNode::Diffs { .. }) => node
                .members()
                .into_iter()
                .find(|&d| d >= docno)
                .unwrap_or(0),
            None => 0,
        }
    }

    pub fn is_this_block_address(&self, docno: Docno) -> bool {
        docno >= self.first_doc() && docno <= self.block_id()
    }

    pub fn is_follow_block_address(&self, docno: Docno) -> bool {
        let id = self.block_id();
        docno > id && docno < id + (id - self.first_doc())
    }

    pub fn encoded_size(&self) -> usize {
        2 + self.nodes.iter().map(DocSetNode::encoded_size).sum::<usize>()
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.encoded_size());
        out.extend_from_slice(&(self.nodes.len() as u16).to_be_bytes());
        for n in &self.nodes {
            n.encode(&mut out);
        }
        out
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < 2 {
            return Err(StorageError::integrity(bytes, "docset block too short"));
        }
        let count = u16::from_be_bytes([bytes[0], bytes[1]]) as usize;
        let mut off = 2usize;
        let mut nodes = Vec::with_capacity(count);
        for _ in 0..count {
            let (node, used) = DocSetNode::decode(&bytes[off..])?;
            off += used;
            nodes.push(node);
        }
        let block = DocSetBlock { nodes };
        block.check()?;
        Ok(block)
    }

    pub fn check(&self) -> Result<()> {
        let mut prev_last: Option<Docno> = None;
        for node in &self.nodes {
            if node.first_doc() > node.last_doc() {
                return Err(StorageError::integrity(&[], "docset node first > last"));
            }
            if let DocSetNode::Diffs { diffs, .. } = node {
                if diffs.iter().any(|&d| d == 0) {
                    return Err(StorageError::integrity(&[], "docset diffs must be > 0"));
                }
            }
            if let Some(prev) = prev_last {
                if node.first_doc() <= prev {
                    return Err(StorageError::integrity(
                        &[],
                        "docset nodes overlap or are non-ascending",
                    ));
                }
            }
            prev_last = Some(node.last_doc());
        }
        Ok(())
    }

    /// Merges `self` with `other`, producing one ascending, non-overlapping
    /// block (spec.md §4.4's map-builder merge step, applied here to a
    /// single block pair).
    pub fn merge(&self, other: &DocSetBlock) -> Result<DocSetBlock> {
        let mut all: Vec<Docno> = self
            .nodes
            .iter()
            .flat_map(DocSetNode::members)
            .chain(other.nodes.iter().flat_map(DocSetNode::members))
            .collect();
        all.sort_unstable();
        all.dedup();
        let mut builder = DocSetBlockBuilder::new();
        for d in all {
            builder.append(d)?;
        }
        Ok(builder.create_block())
    }
}

/// Builder accumulating a strictly ascending run of docnos into compact
/// range/diff nodes.
#[derive(Debug, Default)]
pub struct DocSetBlockBuilder {
    nodes: Vec<DocSetNode>,
    last_doc: Docno,
}

impl DocSetBlockBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn last_doc(&self) -> Docno {
        self.last_doc
    }

    fn encoded_size(&self) -> usize {
        2 + self.nodes.iter().map(DocSetNode::encoded_size).sum::<usize>()
    }

    pub fn fits(&self) -> bool {
        // Worst case a new node is opened (9 bytes for a fresh range node).
        self.encoded_size() + 9 <= SOFT_LIMIT_BYTES
    }

    pub fn full(&self) -> bool {
        self.encoded_size() >= SOFT_LIMIT_BYTES
    }

    /// Appends `docno`, which must be strictly greater than any previously
    /// appended docno. Chooses the cheapest node representation: extends a
    /// contiguous range in place, folds a non-adjacent successor into a diff
    /// list, or opens a fresh range node.
    pub fn append(&mut self, docno: Docno) -> Result<()> {
        if !self.nodes.is_empty() && docno <= self.last_doc {
            return Err(StorageError::IntegrityError {
                key: Vec::new(),
                detail: format!(
                    "non-ascending docno in docset builder: {docno} after {}",
                    self.last_doc
                ),
            });
        }

        enum Action {
            ExtendRange,
            ConvertToDiffs(u16),
            PushDiff(u16),
            NewRange,
        }

        let action = match self.nodes.last() {
            Some(DocSetNode::Range { first, last }) => {
                if docno == *last + 1 {
                    Action::ExtendRange
                } else if *first == *last && docno - *last <= u16::MAX as u32 {
                    Action::ConvertToDiffs((docno - *last) as u16)
                } else {
                    Action::NewRange
                }
            }
            Some(DocSetNode::Diffs { .. }) => {
                if docno - self.last_doc <= u16::MAX as u32 {
                    Action::PushDiff((docno - self.last_doc) as u16)
                } else {
                    Action::NewRange
                }
            }
            None => Action::NewRange,
        };

        match action {
            Action::ExtendRange => {
                if let Some(DocSetNode::Range { last, .. }) = self.nodes.last_mut() {
                    *last = docno;
                }
            }
            Action::ConvertToDiffs(d) => {
                if let Some(DocSetNode::Range { first, .. }) = self.nodes.last() {
                    let base = *first;
                    *self.nodes.last_mut().unwrap() = DocSetNode::Diffs {
                        base,
                        diffs: vec![d],
                    };
                }
            }
            Action::PushDiff(d) => {
                if let Some(DocSetNode::Diffs { diffs, .. }) = self.nodes.last_mut() {
                    diffs.push(d);
                }
            }
            Action::NewRange => {
                self.nodes.push(DocSetNode::Range {
                    first: docno,
                    last: docno,
                });
            }
        }
        self.last_doc = docno;
        Ok(())
    }

    pub fn create_block(self) -> DocSetBlock {
        DocSetBlock { nodes: self.nodes }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contiguous_run_becomes_one_range_node() {
        let mut b = DocSetBlockBuilder::new();
        for d in 1..=10u32 {
            b.append(d).unwrap();
        }
        let block = b.create_block();
        block.check().unwrap();
        assert_eq!(block.nodes().len(), 1);
        assert!(matches!(block.nodes()[0], DocSetNode::Range { first: 1, last: 10 }));
    }

    #[test]
    fn sparse_run_uses_diffs() {
        let mut b = DocSetBlockBuilder::new();
        for d in [1u32, 5, 9, 20] {
            b.append(d).unwrap();
        }
        let block = b.create_block();
        block.check().unwrap();
        assert!(block.contains(5));
        assert!(!block.contains(6));
        assert_eq!(block.skip_doc(6), 9);
    }

    #[test]
    fn mixed_ranges_and_gaps() {
        let mut b = DocSetBlockBuilder::new();
        for d in [1u32, 2, 3, 4, 10, 11, 12, 50] {
            b.append(d).unwrap();
        }
        let block = b.create_block();
        block.check().unwrap();
        for d in [1, 2, 3, 4, 10, 11, 12, 50] {
            assert!(block.contains(d), "expected {d} to be a member");
        }
        assert!(!block.contains(5));
        assert!(!block.contains(13));
    }

    #[test]
    fn round_trip_encode_decode() {
        let mut b = DocSetBlockBuilder::new();
        for d in [1u32, 2, 3, 7, 8, 100] {
            b.append(d).unwrap();
        }
        let block = b.create_block();
        let bytes = block.encode();
        let decoded = DocSetBlock::decode(&bytes).unwrap();
        assert_eq!(block, decoded);
    }

    #[test]
    fn merge_unions_two_sorted_sets() {
        let mut a = DocSetBlockBuilder::new();
        for d in [1u32, 2, 3] {
            a.append(d).unwrap();
        }
        let mut b = DocSetBlockBuilder::new();
        for d in [2u32, 5, 6] {
            b.append(d).unwrap();
        }
        let merged = a.create_block().merge(&b.create_block()).unwrap();
        merged.check().unwrap();
        for d in [1, 2, 3, 5, 6] {
            assert!(merged.contains(d));
        }
        assert!(!merged.contains(4));
    }

    #[test]
    fn rejects_non_ascending_append() {
        let mut b = DocSetBlockBuilder::new();
        b.append(5).unwrap();
        assert!(b.append(5).is_err());
        assert!(b.append(3).is_err());
    }

    #[test]
    fn block_boundary_predicates() {
        let mut b = DocSetBlockBuilder::new();
        for d in [10u32, 20, 30] {
            b.append(d).unwrap();
        }
        let block = b.create_block();
        assert!(block.is_this_block_address(15));
        assert!(!block.is_this_block_address(5));
        assert!(block.is_follow_block_address(40));
        assert!(!block.is_follow_block_address(51));
    }
}
