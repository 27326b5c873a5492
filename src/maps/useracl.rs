//! Map builder for ACL/user membership sets: one docset block chain per
//! user, or per document for the inverse direction (spec.md §3 "ACL",
//! §4.4, applied to `blocks::docset`).

use super::{rebuild_chain, ChainBuilder};
use crate::blocks::docset::{DocSetBlock, DocSetBlockBuilder};
use crate::error::Result;
use crate::ids::Docno;

struct DocSetChainBuilder(DocSetBlockBuilder);

impl ChainBuilder for DocSetChainBuilder {
    type Item = ();

    fn append(&mut self, docno: Docno, _item: &()) -> Result<()> {
        self.0.append(docno)
    }

    fn fits(&self, _item: &()) -> bool {
        self.0.fits()
    }

    fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

fn decode_existing(blocks: &[DocSetBlock]) -> Vec<Docno> {
    let mut out = Vec::new();
    for block in blocks {
        out.extend(block.nodes().iter().flat_map(|n| n.members()));
    }
    out
}

/// Rebuilds a membership set's block chain, adding `grants` and removing
/// `revokes`.
pub fn merge_membership(
    existing: &[DocSetBlock],
    grants: &[Docno],
    revokes: &[Docno],
) -> Result<Vec<DocSetBlock>> {
    let mut members = decode_existing(existing);
    members.extend_from_slice(grants);
    members.sort_unstable();
    members.dedup();
    let revoke_set: std::collections::HashSet<Docno> = revokes.iter().copied().collect();
    members.retain(|d| !revoke_set.contains(d));

    let items: Vec<(Docno, ())> = members.into_iter().map(|d| (d, ())).collect();
    let chains = rebuild_chain(&items, || DocSetChainBuilder(DocSetBlockBuilder::new()))?;
    Ok(chains.into_iter().map(|c| c.0.create_block()).collect())
}
