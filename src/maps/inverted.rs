//! Map builder for the inverted index: one posting block chain per
//! `(typeno, termno)` (spec.md §4.4, applied to `blocks::posting`).

use super::{merge_with_pending, rebuild_chain, ChainBuilder, PendingOp};
use crate::blocks::docset::DocSetBlock;
use crate::blocks::posting::{PostingBlock, PostingBlockBuilder};
use crate::error::Result;
use crate::ids::{Docno, Position};

struct PostingChainBuilder(PostingBlockBuilder);

impl ChainBuilder for PostingChainBuilder {
    type Item = Vec<Position>;

    fn append(&mut self, docno: Docno, item: &Vec<Position>) -> Result<()> {
        self.0.append(docno, item)
    }

    fn fits(&self, item: &Vec<Position>) -> bool {
        self.0.fits(item.len())
    }

    fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

fn decode_existing(blocks: &[PostingBlock]) -> Vec<(Docno, Vec<Position>)> {
    let mut out = Vec::new();
    for block in blocks {
        let mut cur = block.first_cursor();
        while let Some(c) = cur {
            out.push((block.docno_at(c), block.positions_at(c).to_vec()));
            cur = block.next_cursor(c);
        }
    }
    out
}

/// Rebuilds a term's posting block chain, applying `pending` document
/// inserts/deletes against the already-decoded `existing` blocks.
pub fn merge_term_postings(
    existing: &[PostingBlock],
    pending: Vec<PendingOp<Vec<Position>>>,
) -> Result<Vec<PostingBlock>> {
    let items = merge_with_pending(&decode_existing(existing), pending);
    let chains = rebuild_chain(&items, || PostingChainBuilder(PostingBlockBuilder::new()))?;
    Ok(chains.into_iter().map(|c| c.0.create_block()).collect())
}

/// Rebuilds a term's document-set chain (spec.md §3 "Document-set index":
/// the `'b'`-prefix `DocSetBlock` chain kept alongside each term's posting
/// chain so `skip_doc`/`df` don't need to decode posting blocks just to
/// learn which documents contain the term). Same membership-set algorithm
/// as the ACL chains (`maps::useracl::merge_membership`), applied per
/// `(typeno, termno)` instead of per user/document.
pub fn merge_term_docset(
    existing: &[DocSetBlock],
    grants: &[Docno],
    revokes: &[Docno],
) -> Result<Vec<DocSetBlock>> {
    super::useracl::merge_membership(existing, grants, revokes)
}
