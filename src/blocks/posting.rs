//! `PostingBlock`: document + positions (spec.md §3 "Posting index", §4.2,
//! §6 "Block payloads").
//!
//! Grounded on `posinfoBlock.hpp`/`posinfoBlock.cpp` in
//! `examples/original_source/src/lvdbstorage/` for the role this block
//! plays (a chain of blocks per term, keyed by the block's maximum docno,
//! searched with `find`/`upper_bound`), generalized here to spec.md's
//! explicit index-node layout rather than the original's relative-varint
//! stream.
//!
//! Open question resolved (see SPEC_FULL.md D): spec.md states the
//! `IndexNode` wire layout as `u32 base, u16 deltas[6], u16 posref_idx[7]`
//! but separately states the node size as 29 bytes; those two statements
//! are inconsistent (4 + 6*2 + 7*2 = 30, not 29). We keep the explicit field
//! layout (it is unambiguous) and treat "29 bytes" as a documentation slip;
//! `IndexNode::ENCODED_SIZE` below is computed from the fields, not quoted
//! from the prose.

use crate::error::{Result, StorageError};
use crate::ids::{Docno, Position};

/// Sentinel marking an unused delta slot in a partially filled node.
const UNUSED_DELTA: u16 = u16::MAX;

/// Soft size limit for a posting block, in bytes (spec.md §3).
pub const SOFT_LIMIT_BYTES: usize = 1024;

/// Maximum number of documents referenced by one index node (spec.md §3:
/// "up to N=7 document deltas").
pub const NODES_PER_DOC_GROUP: usize = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexNode {
    pub base: Docno,
    pub deltas: [u16; NODES_PER_DOC_GROUP - 1],
    pub posref_idx: [u16; NODES_PER_DOC_GROUP],
}

impl IndexNode {
    pub const ENCODED_SIZE: usize = 4 + 2 * (NODES_PER_DOC_GROUP - 1) + 2 * NODES_PER_DOC_GROUP;

    fn empty(base: Docno) -> Self {
        IndexNode {
            base,
            deltas: [UNUSED_DELTA; NODES_PER_DOC_GROUP - 1],
            posref_idx: [0; NODES_PER_DOC_GROUP],
        }
    }

    /// Number of valid document slots in this node (1..=7).
    pub fn doc_count(&self) -> usize {
        1 + self.deltas.iter().take_while(|&&d| d != UNUSED_DELTA).count()
    }

    /// Document number at slot `i` (0-based, `i < doc_count()`).
    pub fn doc_at(&self, i: usize) -> Docno {
        if i == 0 {
            self.base
        } else {
            self.base + self.deltas[i - 1] as u32
        }
    }

    /// Last (largest) document number held by this node.
    pub fn last_doc(&self) -> Docno {
        self.doc_at(self.doc_count() - 1)
    }
}

/// A cursor into a `PostingBlock`: which node, and which document slot
/// inside that node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor {
    pub node_idx: usize,
    pub doc_idx: usize,
}

/// An immutable, already-written block of postings for a contiguous run of
/// documents of one term (spec.md §3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostingBlock {
    nodes: Vec<IndexNode>,
    positions: Vec<u16>,
}

impl PostingBlock {
    /// The block's key: the largest document number it contains.
    pub fn block_id(&self) -> Docno {
        self.nodes.last().map(|n| n.last_doc()).unwrap_or(0)
    }

    pub fn first_doc(&self) -> Docno {
        self.nodes.first().map(|n| n.base).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes(&self) -> &[IndexNode] {
        &self.nodes
    }

    pub fn positions_raw(&self) -> &[u16] {
        &self.positions
    }

    /// Cursor at the first document of the block, or `None` if empty.
    pub fn first_cursor(&self) -> Option<Cursor> {
        if self.nodes.is_empty() {
            None
        } else {
            Some(Cursor {
                node_idx: 0,
                doc_idx: 0,
            })
        }
    }

    pub fn docno_at(&self, cur: Cursor) -> Docno {
        self.nodes[cur.node_idx].doc_at(cur.doc_idx)
    }

    /// Advances the cursor to the next document in the block, returning
    /// `None` past the last document.
    pub fn next_cursor(&self, cur: Cursor) -> Option<Cursor> {
        let node = &self.nodes[cur.node_idx];
        if cur.doc_idx + 1 < node.doc_count() {
            Some(Cursor {
                node_idx: cur.node_idx,
                doc_idx: cur.doc_idx + 1,
            })
        } else if cur.node_idx + 1 < self.nodes.len() {
            Some(Cursor {
                node_idx: cur.node_idx + 1,
                doc_idx: 0,
            })
        } else {
            None
        }
    }

    /// Binary search over `doc_index` for the least document >= `docno`
    /// (spec.md §4.2 "skip_doc"). Returns 0 if no such document exists in
    /// this block.
    pub fn skip_doc(&self, docno: Docno) -> (Docno, Option<Cursor>) {
        if self.nodes.is_empty() {
            return (0, None);
        }
        // Find leftmost node whose last doc >= docno.
        let mut lo = 0usize;
        let mut hi = self.nodes.len();
        while lo < hi {
            let mid = (lo + hi) / 2;
            if self.nodes[mid].last_doc() >= docno {
                hi = mid;
            } else {
                lo = mid + 1;
            }
        }
        if lo == self.nodes.len() {
            return (0, None);
        }
        let node = &self.nodes[lo];
        for i in 0..node.doc_count() {
            if node.doc_at(i) >= docno {
                let cur = Cursor {
                    node_idx: lo,
                    doc_idx: i,
                };
                return (node.doc_at(i), Some(cur));
            }
        }
        (0, None)
    }

    /// Number of positions recorded for the document at `cur`.
    pub fn frequency_at(&self, cur: Cursor) -> u32 {
        let off = self.nodes[cur.node_idx].posref_idx[cur.doc_idx] as usize;
        self.positions[off] as u32
    }

    /// The ascending position slice for the document at `cur`.
    pub fn positions_at(&self, cur: Cursor) -> &[Position] {
        let off = self.nodes[cur.node_idx].posref_idx[cur.doc_idx] as usize;
        let len = self.positions[off] as usize;
        &self.positions[off + 1..off + 1 + len]
    }

    pub fn position_scanner_at(&self, cur: Cursor) -> PositionScanner<'_> {
        PositionScanner {
            positions: self.positions_at(cur),
            idx: 0,
        }
    }

    /// Whether `docno`, if it exists at all, would fall inside this block.
    pub fn is_this_block_address(&self, docno: Docno) -> bool {
        docno >= self.first_doc() && docno <= self.block_id()
    }

    /// Whether `docno` is likely to be found in the block reached by a
    /// single store-iterator `Next()` from this one (SPEC_FULL.md D.2).
    pub fn is_follow_block_address(&self, docno: Docno) -> bool {
        let id = self.block_id();
        docno > id && docno < id + (id - self.first_doc())
    }

    /// Encoded byte size of this block (spec.md §6).
    pub fn encoded_size(&self) -> usize {
        2 + self.nodes.len() * IndexNode::ENCODED_SIZE + self.positions.len() * 2
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.encoded_size());
        out.extend_from_slice(&(self.nodes.len() as u16).to_be_bytes());
        for n in &self.nodes {
            out.extend_from_slice(&n.base.to_be_bytes());
            for d in n.deltas {
                out.extend_from_slice(&d.to_be_bytes());
            }
            for p in n.posref_idx {
                out.extend_from_slice(&p.to_be_bytes());
            }
        }
        for p in &self.positions {
            out.extend_from_slice(&p.to_be_bytes());
        }
        out
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < 2 {
            return Err(StorageError::integrity(bytes, "posting block too short"));
        }
        let nof_nodes = u16::from_be_bytes([bytes[0], bytes[1]]) as usize;
        let mut off = 2usize;
        let mut nodes = Vec::with_capacity(nof_nodes);
        for _ in 0..nof_nodes {
            if off + IndexNode::ENCODED_SIZE > bytes.len() {
                return Err(StorageError::integrity(bytes, "truncated index node"));
            }
            let base = u32::from_be_bytes(bytes[off..off + 4].try_into().unwrap());
            off += 4;
            let mut deltas = [0u16; NODES_PER_DOC_GROUP - 1];
            for d in deltas.iter_mut() {
                *d = u16::from_be_bytes(bytes[off..off + 2].try_into().unwrap());
                off += 2;
            }
            let mut posref_idx = [0u16; NODES_PER_DOC_GROUP];
            for p in posref_idx.iter_mut() {
                *p = u16::from_be_bytes(bytes[off..off + 2].try_into().unwrap());
                off += 2;
            }
            nodes.push(IndexNode {
                base,
                deltas,
                posref_idx,
            });
        }
        let rest = &bytes[off..];
        if rest.len() % 2 != 0 {
            return Err(StorageError::integrity(bytes, "odd-length positions array"));
        }
        let positions = rest
            .chunks_exact(2)
            .map(|c| u16::from_be_bytes([c[0], c[1]]))
            .collect();
        let block = PostingBlock { nodes, positions };
        block.check()?;
        Ok(block)
    }

    /// Debug/integrity self-check instantiating the invariants of spec.md
    /// §8 (1) and (2), mirroring `BooleanBlock::check()` in the original
    /// (`booleanBlock.hpp`).
    pub fn check(&self) -> Result<()> {
        let mut prev_last: Option<Docno> = None;
        for node in &self.nodes {
            if let Some(prev) = prev_last {
                if node.base <= prev {
                    return Err(StorageError::integrity(
                        &[],
                        "posting block nodes not strictly ascending",
                    ));
                }
            }
            let mut prev_doc = None;
            for i in 0..node.doc_count() {
                let d = node.doc_at(i);
                if let Some(p) = prev_doc {
                    if d <= p {
                        return Err(StorageError::integrity(
                            &[],
                            "posting block docs not strictly ascending within node",
                        ));
                    }
                }
                let off = node.posref_idx[i] as usize;
                let len = *self.positions.get(off).ok_or_else(|| {
                    StorageError::integrity(&[], "posref_idx out of bounds")
                })? as usize;
                if off + 1 + len > self.positions.len() {
                    return Err(StorageError::integrity(&[], "position run overruns block"));
                }
                let slice = &self.positions[off + 1..off + 1 + len];
                if !slice.windows(2).all(|w| w[0] < w[1]) {
                    return Err(StorageError::integrity(
                        &[],
                        "positions not strictly ascending",
                    ));
                }
                prev_doc = Some(d);
            }
            prev_last = Some(node.last_doc());
        }
        Ok(())
    }
}

/// Cursor over one document's position array (spec.md §4.2
/// "position_scanner").
pub struct PositionScanner<'a> {
    positions: &'a [Position],
    idx: usize,
}

impl<'a> PositionScanner<'a> {
    pub fn current(&self) -> Option<Position> {
        self.positions.get(self.idx).copied()
    }

    /// Linear scan (positions are small and clustered, per spec.md §4.2) to
    /// the least position >= `min`. Returns 0 if none.
    pub fn skip_pos(&mut self, min: Position) -> Position {
        while let Some(&p) = self.positions.get(self.idx) {
            if p >= min {
                return p;
            }
            self.idx += 1;
        }
        0
    }
}

/// Builder accumulating documents for one posting block chain.
#[derive(Debug, Default)]
pub struct PostingBlockBuilder {
    nodes: Vec<IndexNode>,
    positions: Vec<u16>,
    last_doc: Docno,
}

impl PostingBlockBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether adding `n_positions` more positions for a new document would
    /// keep the block under the soft size limit.
    pub fn fits(&self, n_positions: usize) -> bool {
        let needs_new_node = self
            .nodes
            .last()
            .map(|n| n.doc_count() >= NODES_PER_DOC_GROUP)
            .unwrap_or(true);
        let extra_node_bytes = if needs_new_node {
            IndexNode::ENCODED_SIZE
        } else {
            0
        };
        let extra_pos_bytes = (1 + n_positions) * 2;
        self.encoded_size() + extra_node_bytes + extra_pos_bytes <= SOFT_LIMIT_BYTES
    }

    pub fn full(&self) -> bool {
        self.encoded_size() >= SOFT_LIMIT_BYTES
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn last_doc(&self) -> Docno {
        self.last_doc
    }

    fn encoded_size(&self) -> usize {
        2 + self.nodes.len() * IndexNode::ENCODED_SIZE + self.positions.len() * 2
    }

    /// Appends a new document's ascending positions. `docno` must be
    /// strictly greater than any previously appended document.
    pub fn append(&mut self, docno: Docno, positions: &[Position]) -> Result<()> {
        if !self.nodes.is_empty() && docno <= self.last_doc {
            return Err(StorageError::IntegrityError {
                key: Vec::new(),
                detail: format!(
                    "non-ascending docno in posting block builder: {docno} after {}",
                    self.last_doc
                ),
            });
        }
        if !positions.windows(2).all(|w| w[0] < w[1]) {
            return Err(StorageError::InvalidArgument(
                "position list must be strictly ascending".into(),
            ));
        }

        let delta = self
            .nodes
            .last()
            .map(|n| docno.checked_sub(n.base))
            .flatten();
        let can_extend = self
            .nodes
            .last()
            .map(|n| n.doc_count() < NODES_PER_DOC_GROUP)
            .unwrap_or(false)
            && delta.map(|d| d <= u16::MAX as u32 && d != 0).unwrap_or(false);

        let posref = self.positions.len() as u16;
        if can_extend {
            let node = self.nodes.last_mut().unwrap();
            let slot = node.doc_count();
            node.deltas[slot - 1] = delta.unwrap() as u16;
            node.posref_idx[slot] = posref;
        } else {
            let mut node = IndexNode::empty(docno);
            node.posref_idx[0] = posref;
            self.nodes.push(node);
        }

        self.positions.push(positions.len() as u16);
        self.positions.extend_from_slice(positions);
        self.last_doc = docno;
        Ok(())
    }

    /// Freezes the builder into an immutable block.
    pub fn create_block(self) -> PostingBlock {
        PostingBlock {
            nodes: self.nodes,
            positions: self.positions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_and_read_back_single_doc() {
        let mut b = PostingBlockBuilder::new();
        b.append(1, &[1, 2, 3]).unwrap();
        let block = b.create_block();
        assert_eq!(block.block_id(), 1);
        assert_eq!(block.first_doc(), 1);
        let cur = block.first_cursor().unwrap();
        assert_eq!(block.docno_at(cur), 1);
        assert_eq!(block.frequency_at(cur), 3);
        assert_eq!(block.positions_at(cur), &[1, 2, 3]);
    }

    #[test]
    fn spans_multiple_nodes() {
        let mut b = PostingBlockBuilder::new();
        for d in 1..=20u32 {
            b.append(d, &[d as u16]).unwrap();
        }
        let block = b.create_block();
        block.check().unwrap();
        assert_eq!(block.nodes().len(), 3); // 7 + 7 + 6
        assert_eq!(block.block_id(), 20);
    }

    #[test]
    fn skip_doc_finds_least_upper_bound() {
        let mut b = PostingBlockBuilder::new();
        for d in [1u32, 3, 5, 9, 20, 21, 22, 50] {
            b.append(d, &[1]).unwrap();
        }
        let block = b.create_block();
        let (found, cur) = block.skip_doc(6);
        assert_eq!(found, 9);
        assert_eq!(block.docno_at(cur.unwrap()), 9);

        let (found, _) = block.skip_doc(1);
        assert_eq!(found, 1);

        let (found, _) = block.skip_doc(51);
        assert_eq!(found, 0);
    }

    #[test]
    fn rejects_non_ascending_docno() {
        let mut b = PostingBlockBuilder::new();
        b.append(5, &[1]).unwrap();
        assert!(b.append(5, &[2]).is_err());
        assert!(b.append(4, &[2]).is_err());
    }

    #[test]
    fn rejects_non_ascending_positions() {
        let mut b = PostingBlockBuilder::new();
        assert!(b.append(1, &[3, 2]).is_err());
    }

    #[test]
    fn round_trip_encode_decode() {
        let mut b = PostingBlockBuilder::new();
        for d in 1..=15u32 {
            b.append(d, &[d as u16, d as u16 + 1]).unwrap();
        }
        let block = b.create_block();
        let bytes = block.encode();
        let decoded = PostingBlock::decode(&bytes).unwrap();
        assert_eq!(block, decoded);
    }

    #[test]
    fn block_boundary_predicates() {
        let mut b = PostingBlockBuilder::new();
        for d in [10u32, 20, 30] {
            b.append(d, &[1]).unwrap();
        }
        let block = b.create_block();
        assert!(block.is_this_block_address(20));
        assert!(!block.is_this_block_address(5));
        assert!(!block.is_this_block_address(31));
        // id=30, first=10 -> follow window is (30, 30+(30-10)) = (30, 50)
        assert!(block.is_follow_block_address(40));
        assert!(!block.is_follow_block_address(51));
        assert!(!block.is_follow_block_address(30));
    }

    #[test]
    fn fits_and_full_track_soft_limit() {
        let mut b = PostingBlockBuilder::new();
        let mut d = 1u32;
        while b.fits(1) {
            b.append(d, &[1]).unwrap();
            d += 1;
        }
        assert!(b.full() || !b.fits(1));
    }
}
