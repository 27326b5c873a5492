//! `InvTermBlock`: the per-document inverse term list, `(typeno, termno,
//! ff, first_pos)` tuples recording which terms occur in a document without
//! needing to scan every term's posting chain (spec.md §3 "Inverted terms
//! per document", used to delete a document's postings at commit time and
//! to answer "what terms does this document contain").
//!
//! Grounded on the general shape of a per-document inverse index as used by
//! `examples/original_source/src/lvdbstorage/` to drive document deletion
//! (the original walks exactly this kind of per-doc term list when a
//! document is removed, so every posting chain it appears in can be
//! updated); the tuple shape itself -- `(typeno, termno, ff, first_pos)` --
//! is spec.md §6's explicit payload.

use crate::error::{Result, StorageError};
use crate::ids::{Docno, Position, Termno, Typeno};
use crate::key::{pack_u32, unpack_u32};

pub const SOFT_LIMIT_BYTES: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvTermEntry {
    pub typeno: Typeno,
    pub termno: Termno,
    /// Feature frequency: number of occurrences of this term in the
    /// document.
    pub ff: u32,
    pub first_pos: Position,
}

/// The inverse term list for exactly one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvTermBlock {
    docno: Docno,
    entries: Vec<InvTermEntry>,
}

impl InvTermBlock {
    pub fn new(docno: Docno, mut entries: Vec<InvTermEntry>) -> Self {
        entries.sort_by_key(|e| (e.typeno, e.termno));
        InvTermBlock { docno, entries }
    }

    pub fn docno(&self) -> Docno {
        self.docno
    }

    pub fn entries(&self) -> &[InvTermEntry] {
        &self.entries
    }

    pub fn find(&self, typeno: Typeno, termno: Termno) -> Option<&InvTermEntry> {
        self.entries
            .binary_search_by_key(&(typeno, termno), |e| (e.typeno, e.termno))
            .ok()
            .map(|i| &self.entries[i])
    }

    pub fn encoded_size(&self) -> usize {
        4 + 2 + self.entries.len() * 14 // generous upper bound; packed ints vary
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&self.docno.to_be_bytes());
        out.extend_from_slice(&(self.entries.len() as u16).to_be_bytes());
        for e in &self.entries {
            pack_u32(e.typeno, &mut out);
            pack_u32(e.termno, &mut out);
            pack_u32(e.ff, &mut out);
            out.extend_from_slice(&e.first_pos.to_be_bytes());
        }
        out
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < 6 {
            return Err(StorageError::integrity(bytes, "invterm block too short"));
        }
        let docno = u32::from_be_bytes(bytes[0..4].try_into().unwrap());
        let count = u16::from_be_bytes([bytes[4], bytes[5]]) as usize;
        let mut off = 6usize;
        let mut entries = Vec::with_capacity(count);
        for _ in 0..count {
            let (typeno, used) = unpack_u32(&bytes[off..])?;
            off += used;
            let (termno, used) = unpack_u32(&bytes[off..])?;
            off += used;
            let (ff, used) = unpack_u32(&bytes[off..])?;
            off += used;
            if off + 2 > bytes.len() {
                return Err(StorageError::integrity(bytes, "truncated invterm entry"));
            }
            let first_pos = u16::from_be_bytes([bytes[off], bytes[off + 1]]);
            off += 2;
            entries.push(InvTermEntry {
                typeno,
                termno,
                ff,
                first_pos,
            });
        }
        Ok(InvTermBlock { docno, entries })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn find_locates_entry_by_type_and_term() {
        let block = InvTermBlock::new(
            1,
            vec![
                InvTermEntry {
                    typeno: 1,
                    termno: 5,
                    ff: 3,
                    first_pos: 2,
                },
                InvTermEntry {
                    typeno: 1,
                    termno: 2,
                    ff: 1,
                    first_pos: 9,
                },
            ],
        );
        let e = block.find(1, 2).unwrap();
        assert_eq!(e.ff, 1);
        assert_eq!(e.first_pos, 9);
        assert!(block.find(1, 99).is_none());
    }

    #[test]
    fn round_trip_encode_decode() {
        let block = InvTermBlock::new(
            42,
            vec![
                InvTermEntry {
                    typeno: 1,
                    termno: 100_000,
                    ff: 7,
                    first_pos: 12,
                },
                InvTermEntry {
                    typeno: 2,
                    termno: 3,
                    ff: 1,
                    first_pos: 0,
                },
            ],
        );
        let bytes = block.encode();
        let decoded = InvTermBlock::decode(&bytes).unwrap();
        assert_eq!(block, decoded);
    }
}
