//! `ForwardBlock`: the forward index, mapping `(typeno, docno, position) ->
//! original term text` so that phrase highlighting and snippet
//! reconstruction don't need to re-tokenize the source document (spec.md §3
//! "Forward index").
//!
//! Grounded on the same `posinfoBlock`-style chained-block shape as
//! `blocks::posting`, generalized per spec.md §6: entries hold delta-encoded
//! positions paired with UTF-8 strings, terminated with a `0xFE` marker byte
//! rather than a length prefix (spec.md explicitly calls out the marker
//! byte, distinct from the original's length-prefixed `forwardIndexBlock`).

use crate::error::{Result, StorageError};
use crate::ids::{Docno, Position};

pub const SOFT_LIMIT_BYTES: usize = 1024;
const NODES_PER_DOC_GROUP: usize = 7;
const UNUSED_DELTA: u16 = u16::MAX;
/// Separates one entry's UTF-8 text from the next. Term text must not
/// itself contain this byte (invalid as a standalone UTF-8 code unit, so
/// ordinary text never collides with it).
const TEXT_TERMINATOR: u8 = 0xFE;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardEntry {
    pub position: Position,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FwdIndexNode {
    base: Docno,
    deltas: [u16; NODES_PER_DOC_GROUP - 1],
    data_off: [u32; NODES_PER_DOC_GROUP],
}

impl FwdIndexNode {
    fn empty(base: Docno) -> Self {
        FwdIndexNode {
            base,
            deltas: [UNUSED_DELTA; NODES_PER_DOC_GROUP - 1],
            data_off: [0; NODES_PER_DOC_GROUP],
        }
    }

    fn doc_count(&self) -> usize {
        1 + self.deltas.iter().take_while(|&&d| d != UNUSED_DELTA).count()
    }

    fn doc_at(&self, i: usize) -> Docno {
        if i == 0 {
            self.base
        } else {
            self.base + self.deltas[i - 1] as u32
        }
    }

    fn last_doc(&self) -> Docno {
        self.doc_at(self.doc_count() - 1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor {
    node_idx: usize,
    doc_idx: usize,
}

/// An immutable, already-written block of the forward index covering a
/// contiguous run of documents for one type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardBlock {
    nodes: Vec<FwdIndexNode>,
    data: Vec<u8>,
}

impl ForwardBlock {
    pub fn block_id(&self) -> Docno {
        self.nodes.last().map(|n| n.last_doc()).unwrap_or(0)
    }

    pub fn first_doc(&self) -> Docno {
        self.nodes.first().map(|n| n.base).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

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

    pub fn skip_doc(&self, docno: Docno) -> (Docno, Option<Cursor>) {
        if self.nodes.is_empty() {
            return (0, None);
        }
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
                return (node.doc_at(i), Some(Cursor { node_idx: lo, doc_idx: i }));
            }
        }
        (0, None)
    }

    /// All `(position, text)` entries recorded for the document at `cur`,
    /// in ascending position order.
    pub fn entries_at(&self, cur: Cursor) -> Result<Vec<ForwardEntry>> {
        let off = self.nodes[cur.node_idx].data_off[cur.doc_idx] as usize;
        decode_entries(&self.data, off)
    }

    pub fn is_this_block_address(&self, docno: Docno) -> bool {
        docno >= self.first_doc() && docno <= self.block_id()
    }

    pub fn is_follow_block_address(&self, docno: Docno) -> bool {
        let id = self.block_id();
        docno > id && docno < id + (id - self.first_doc())
    }

    pub fn encoded_size(&self) -> usize {
        2 + self.nodes.len() * (4 + 2 * (NODES_PER_DOC_GROUP - 1) + 4 * NODES_PER_DOC_GROUP)
            + self.data.len()
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.encoded_size());
        out.extend_from_slice(&(self.nodes.len() as u16).to_be_bytes());
        for n in &self.nodes {
            out.extend_from_slice(&n.base.to_be_bytes());
            for d in n.deltas {
                out.extend_from_slice(&d.to_be_bytes());
            }
            for off in n.data_off {
                out.extend_from_slice(&off.to_be_bytes());
            }
        }
        out.extend_from_slice(&self.data);
        out
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < 2 {
            return Err(StorageError::integrity(bytes, "forward block too short"));
        }
        let nof_nodes = u16::from_be_bytes([bytes[0], bytes[1]]) as usize;
        let node_size = 4 + 2 * (NODES_PER_DOC_GROUP - 1) + 4 * NODES_PER_DOC_GROUP;
        let mut off = 2usize;
        let mut nodes = Vec::with_capacity(nof_nodes);
        for _ in 0..nof_nodes {
            if off + node_size > bytes.len() {
                return Err(StorageError::integrity(bytes, "truncated forward index node"));
            }
            let base = u32::from_be_bytes(bytes[off..off + 4].try_into().unwrap());
            off += 4;
            let mut deltas = [0u16; NODES_PER_DOC_GROUP - 1];
            for d in deltas.iter_mut() {
                *d = u16::from_be_bytes(bytes[off..off + 2].try_into().unwrap());
                off += 2;
            }
            let mut data_off = [0u32; NODES_PER_DOC_GROUP];
            for o in data_off.iter_mut() {
                *o = u32::from_be_bytes(bytes[off..off + 4].try_into().unwrap());
                off += 4;
            }
            nodes.push(FwdIndexNode {
                base,
                deltas,
                data_off,
            });
        }
        let data = bytes[off..].to_vec();
        let block = ForwardBlock { nodes, data };
        block.check()?;
        Ok(block)
    }

    pub fn check(&self) -> Result<()> {
        let mut prev_last: Option<Docno> = None;
        for node in &self.nodes {
            if let Some(prev) = prev_last {
                if node.base <= prev {
                    return Err(StorageError::integrity(
                        &[],
                        "forward block nodes not strictly ascending",
                    ));
                }
            }
            for i in 0..node.doc_count() {
                let entries = decode_entries(&self.data, node.data_off[i] as usize)?;
                if !entries.windows(2).all(|w| w[0].position < w[1].position) {
                    return Err(StorageError::integrity(
                        &[],
                        "forward entries not strictly ascending by position",
                    ));
                }
            }
            prev_last = Some(node.last_doc());
        }
        Ok(())
    }
}

fn decode_entries(data: &[u8], mut off: usize) -> Result<Vec<ForwardEntry>> {
    if off + 2 > data.len() {
        return Err(StorageError::integrity(data, "truncated forward entry count"));
    }
    let count = u16::from_be_bytes([data[off], data[off + 1]]) as usize;
    off += 2;
    let mut out = Vec::with_capacity(count);
    let mut pos: u32 = 0;
    for _ in 0..count {
        if off + 2 > data.len() {
            return Err(StorageError::integrity(data, "truncated position delta"));
        }
        let delta = u16::from_be_bytes([data[off], data[off + 1]]) as u32;
        off += 2;
        pos += delta;
        let start = off;
        while off < data.len() && data[off] != TEXT_TERMINATOR {
            off += 1;
        }
        if off >= data.len() {
            return Err(StorageError::integrity(data, "missing text terminator"));
        }
        let text = String::from_utf8(data[start..off].to_vec())
            .map_err(|e| StorageError::integrity(data, format!("invalid utf8 text: {e}")))?;
        off += 1; // skip terminator
        out.push(ForwardEntry {
            position: pos as Position,
            text,
        });
    }
    Ok(out)
}

/// Builder accumulating forward-index entries for one block chain.
#[derive(Debug, Default)]
pub struct ForwardBlockBuilder {
    nodes: Vec<FwdIndexNode>,
    data: Vec<u8>,
    last_doc: Docno,
}

impl ForwardBlockBuilder {
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
        2 + self.nodes.len() * (4 + 2 * (NODES_PER_DOC_GROUP - 1) + 4 * NODES_PER_DOC_GROUP)
            + self.data.len()
    }

    pub fn fits(&self, entries: &[ForwardEntry]) -> bool {
        let needs_new_node = self
            .nodes
            .last()
            .map(|n| n.doc_count() >= NODES_PER_DOC_GROUP)
            .unwrap_or(true);
        let node_bytes = if needs_new_node {
            4 + 2 * (NODES_PER_DOC_GROUP - 1) + 4 * NODES_PER_DOC_GROUP
        } else {
            0
        };
        let entry_bytes: usize = 2 + entries.iter().map(|e| 2 + e.text.len() + 1).sum::<usize>();
        self.encoded_size() + node_bytes + entry_bytes <= SOFT_LIMIT_BYTES
    }

    pub fn full(&self) -> bool {
        self.encoded_size() >= SOFT_LIMIT_BYTES
    }

    /// Appends one document's forward entries, ascending by position.
    pub fn append(&mut self, docno: Docno, entries: &[ForwardEntry]) -> Result<()> {
        if !self.nodes.is_empty() && docno <= self.last_doc {
            return Err(StorageError::IntegrityError {
                key: Vec::new(),
                detail: format!("non-ascending docno in forward block builder: {docno}"),
            });
        }
        if !entries.windows(2).all(|w| w[0].position < w[1].position) {
            return Err(StorageError::InvalidArgument(
                "forward entries must be strictly ascending by position".into(),
            ));
        }
        // 0xFE is never a valid standalone UTF-8 byte, so a `String`'s bytes
        // can never collide with the terminator; no runtime check needed.

        let delta = self
            .nodes
            .last()
            .and_then(|n| docno.checked_sub(n.base));
        let can_extend = self
            .nodes
            .last()
            .map(|n| n.doc_count() < NODES_PER_DOC_GROUP)
            .unwrap_or(false)
            && delta.map(|d| d <= u16::MAX as u32 && d != 0).unwrap_or(false);

        let data_off = self.data.len() as u32;
        if can_extend {
            let node = self.nodes.last_mut().unwrap();
            let slot = node.doc_count();
            node.deltas[slot - 1] = delta.unwrap() as u16;
            node.data_off[slot] = data_off;
        } else {
            let mut node = FwdIndexNode::empty(docno);
            node.data_off[0] = data_off;
            self.nodes.push(node);
        }

        self.data
            .extend_from_slice(&(entries.len() as u16).to_be_bytes());
        let mut prev = 0u32;
        for e in entries {
            let delta = e.position as u32 - prev;
            self.data.extend_from_slice(&(delta as u16).to_be_bytes());
            self.data.extend_from_slice(e.text.as_bytes());
            self.data.push(TEXT_TERMINATOR);
            prev = e.position as u32;
        }
        self.last_doc = docno;
        Ok(())
    }

    pub fn create_block(self) -> ForwardBlock {
        ForwardBlock {
            nodes: self.nodes,
            data: self.data,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entries(pairs: &[(u16, &str)]) -> Vec<ForwardEntry> {
        pairs
            .iter()
            .map(|(p, t)| ForwardEntry {
                position: *p,
                text: t.to_string(),
            })
            .collect()
    }

    #[test]
    fn append_and_read_back() {
        let mut b = ForwardBlockBuilder::new();
        b.append(1, &entries(&[(1, "the"), (2, "quick"), (3, "fox")]))
            .unwrap();
        let block = b.create_block();
        let cur = block.first_cursor().unwrap();
        let got = block.entries_at(cur).unwrap();
        assert_eq!(got, entries(&[(1, "the"), (2, "quick"), (3, "fox")]));
    }

    #[test]
    fn round_trip_encode_decode() {
        let mut b = ForwardBlockBuilder::new();
        for d in 1..=10u32 {
            b.append(d, &entries(&[(1, "a"), (5, "bb")])).unwrap();
        }
        let block = b.create_block();
        let bytes = block.encode();
        let decoded = ForwardBlock::decode(&bytes).unwrap();
        assert_eq!(block, decoded);
    }

    #[test]
    fn skip_doc_and_multi_node() {
        let mut b = ForwardBlockBuilder::new();
        for d in 1..=15u32 {
            b.append(d, &entries(&[(1, "x")])).unwrap();
        }
        let block = b.create_block();
        let (found, cur) = block.skip_doc(8);
        assert_eq!(found, 8);
        assert_eq!(block.docno_at(cur.unwrap()), 8);
    }

    #[test]
    fn rejects_non_ascending_positions() {
        let mut b = ForwardBlockBuilder::new();
        assert!(b.append(1, &entries(&[(3, "a"), (1, "b")])).is_err());
    }
}
