//! Map builder for metadata: one fixed-width record per document, packed
//! contiguously (spec.md §4.4, applied to `blocks::meta`).
//!
//! Metadata blocks are exactly-contiguous (unlike postings or forward
//! entries, every document has a record), so a "delete" here cannot leave a
//! gap the way it does for the other three families: it zero-fills the
//! slot in place instead of removing it. That keeps `rebuild_chain`'s
//! generic capacity-splitting logic usable unchanged.

use super::{merge_with_pending, rebuild_chain, ChainBuilder, PendingOp};
use crate::blocks::meta::{MetaBlock, MetaBlockBuilder};
use crate::error::Result;
use crate::ids::Docno;

struct MetaChainBuilder {
    inner: MetaBlockBuilder,
    record_width: usize,
}

impl ChainBuilder for MetaChainBuilder {
    type Item = Vec<u8>;

    fn append(&mut self, docno: Docno, item: &Vec<u8>) -> Result<()> {
        self.inner.append(docno, item)
    }

    fn fits(&self, _item: &Vec<u8>) -> bool {
        self.inner.fits()
    }

    fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

fn decode_existing(blocks: &[MetaBlock]) -> Vec<(Docno, Vec<u8>)> {
    let mut out = Vec::new();
    for block in blocks {
        for i in 0..block.nof_records() {
            let docno = block.first_doc() + i as u32;
            out.push((docno, block.record(docno).unwrap().to_vec()));
        }
    }
    out
}

/// Rebuilds a metadata block chain. `pending` deletes are translated into
/// zero-filled upserts before merging so the resulting docno range stays
/// contiguous.
pub fn merge_metadata_records(
    existing: &[MetaBlock],
    record_width: usize,
    pending: Vec<PendingOp<Vec<u8>>>,
) -> Result<Vec<MetaBlock>> {
    let pending: Vec<_> = pending
        .into_iter()
        .map(|op| match op {
            PendingOp::Delete(d) => PendingOp::Upsert(d, vec![0u8; record_width]),
            other => other,
        })
        .collect();
    let items = merge_with_pending(&decode_existing(existing), pending);
    let chains = rebuild_chain(&items, || MetaChainBuilder {
        inner: MetaBlockBuilder::new(record_width),
        record_width,
    })?;
    Ok(chains.into_iter().map(|c| c.inner.create_block()).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delete_zero_fills_instead_of_leaving_a_gap() {
        let first = merge_metadata_records(
            &[],
            4,
            vec![
                PendingOp::Upsert(1, vec![0, 0, 0, 1]),
                PendingOp::Upsert(2, vec![0, 0, 0, 2]),
            ],
        )
        .unwrap();
        let second = merge_metadata_records(&first, 4, vec![PendingOp::Delete(1)]).unwrap();
        assert_eq!(second[0].record(1), Some([0, 0, 0, 0].as_slice()));
        assert_eq!(second[0].record(2), Some([0, 0, 0, 2].as_slice()));
        assert_eq!(second[0].first_doc(), 1);
        assert_eq!(second[0].block_id(), 2);
    }

    #[test]
    fn upsert_overwrites_existing_record() {
        let first =
            merge_metadata_records(&[], 4, vec![PendingOp::Upsert(1, vec![0, 0, 0, 1])]).unwrap();
        let second =
            merge_metadata_records(&first, 4, vec![PendingOp::Upsert(1, vec![0, 0, 0, 9])]).unwrap();
        assert_eq!(second[0].record(1), Some([0, 0, 0, 9].as_slice()));
    }
}
