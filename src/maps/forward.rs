//! Map builder for the forward index: one block chain per type, holding
//! every document's `(position, text)` entries (spec.md §4.4, applied to
//! `blocks::forward`).

use super::{merge_with_pending, rebuild_chain, ChainBuilder, PendingOp};
use crate::blocks::forward::{ForwardBlock, ForwardBlockBuilder, ForwardEntry};
use crate::error::Result;
use crate::ids::Docno;

struct ForwardChainBuilder(ForwardBlockBuilder);

impl ChainBuilder for ForwardChainBuilder {
    type Item = Vec<ForwardEntry>;

    fn append(&mut self, docno: Docno, item: &Vec<ForwardEntry>) -> Result<()> {
        self.0.append(docno, item)
    }

    fn fits(&self, item: &Vec<ForwardEntry>) -> bool {
        self.0.fits(item)
    }

    fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

fn decode_existing(blocks: &[ForwardBlock]) -> Result<Vec<(Docno, Vec<ForwardEntry>)>> {
    let mut out = Vec::new();
    for block in blocks {
        let mut cur = block.first_cursor();
        while let Some(c) = cur {
            out.push((block.docno_at(c), block.entries_at(c)?));
            cur = block.next_cursor(c);
        }
    }
    Ok(out)
}

pub fn merge_forward_entries(
    existing: &[ForwardBlock],
    pending: Vec<PendingOp<Vec<ForwardEntry>>>,
) -> Result<Vec<ForwardBlock>> {
    let items = merge_with_pending(&decode_existing(existing)?, pending);
    let chains = rebuild_chain(&items, || ForwardChainBuilder(ForwardBlockBuilder::new()))?;
    Ok(chains.into_iter().map(|c| c.0.create_block()).collect())
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
    fn insert_then_delete_document() {
        let first = merge_forward_entries(
            &[],
            vec![
                PendingOp::Upsert(1, entries(&[(1, "a")])),
                PendingOp::Upsert(2, entries(&[(1, "b")])),
            ],
        )
        .unwrap();
        let second = merge_forward_entries(&first, vec![PendingOp::Delete(1)]).unwrap();
        let cur = second[0].first_cursor().unwrap();
        assert_eq!(second[0].docno_at(cur), 2);
    }
}
