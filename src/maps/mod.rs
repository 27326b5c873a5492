//! Shared write-path merge machinery (spec.md §4.4): every block family's
//! map builder buffers pending per-document operations, merges them against
//! the decoded contents of whichever blocks they touch, and re-encodes the
//! result as a run of blocks under that family's soft size limit. Only the
//! last block of a rebuilt run may end up under-full; every block before it
//! is filled to capacity by construction, which is what lets `skip_doc`
//! binary search treat "block is full" as the common case.
//!
//! Grounded on the target-block-lookup + merge/split sketch in spec.md
//! §4.4 and on the original's `LvdbBlockStorage`-style map classes in
//! `examples/original_source/src/lvdbstorage/` (e.g. `posinfoBlock.cpp`'s
//! `merge`/`split`), generalized behind one `ChainBuilder` trait so the
//! four concrete map builders (`inverted`, `forward`, `metadata`,
//! `useracl`) share this driver instead of repeating it.

use crate::error::Result;
use crate::ids::Docno;

pub mod forward;
pub mod inverted;
pub mod metadata;
pub mod useracl;

/// One pending change to a document's entry within some family, merged
/// against the family's existing on-disk items in docno order.
#[derive(Debug, Clone)]
pub enum PendingOp<T> {
    Upsert(Docno, T),
    Delete(Docno),
}

impl<T> PendingOp<T> {
    fn docno(&self) -> Docno {
        match self {
            PendingOp::Upsert(d, _) => *d,
            PendingOp::Delete(d) => *d,
        }
    }
}

/// Merges `existing` (ascending, deduplicated by docno) with `pending`
/// (need not be pre-sorted) into one ascending, deduplicated item list.
/// A pending op always wins over an existing entry for the same docno:
/// `Upsert` replaces it, `Delete` removes it.
pub fn merge_with_pending<T: Clone>(
    existing: &[(Docno, T)],
    mut pending: Vec<PendingOp<T>>,
) -> Vec<(Docno, T)> {
    pending.sort_by_key(PendingOp::docno);

    let mut out = Vec::with_capacity(existing.len() + pending.len());
    let mut ei = 0usize;
    let mut pi = 0usize;
    while ei < existing.len() || pi < pending.len() {
        let next_existing = existing.get(ei).map(|(d, _)| *d);
        let next_pending = pending.get(pi).map(PendingOp::docno);
        match (next_existing, next_pending) {
            (Some(ed), Some(pd)) if ed < pd => {
                out.push(existing[ei].clone());
                ei += 1;
            }
            (Some(ed), Some(pd)) if ed > pd => {
                apply_one(&mut out, &pending[pi]);
                pi += 1;
            }
            (Some(_), Some(_)) => {
                // same docno: pending wins, existing entry is dropped.
                apply_one(&mut out, &pending[pi]);
                ei += 1;
                pi += 1;
            }
            (Some(_), None) => {
                out.push(existing[ei].clone());
                ei += 1;
            }
            (None, Some(_)) => {
                apply_one(&mut out, &pending[pi]);
                pi += 1;
            }
            (None, None) => unreachable!(),
        }
    }
    out
}

fn apply_one<T: Clone>(out: &mut Vec<(Docno, T)>, op: &PendingOp<T>) {
    if let PendingOp::Upsert(d, v) = op {
        out.push((*d, v.clone()));
    }
}

/// A block-family-specific builder, generalized so `rebuild_chain` can drive
/// any of them the same way.
pub trait ChainBuilder: Sized {
    type Item;

    fn append(&mut self, docno: Docno, item: &Self::Item) -> Result<()>;
    /// Whether one more `item` still fits under this family's soft limit.
    fn fits(&self, item: &Self::Item) -> bool;
    fn is_empty(&self) -> bool;
}

/// Feeds `items` (ascending by docno) through freshly made builders,
/// starting a new block whenever the current one would exceed its soft
/// limit. Every returned builder but the last is filled to capacity.
pub fn rebuild_chain<CB: ChainBuilder>(
    items: &[(Docno, CB::Item)],
    make_builder: impl Fn() -> CB,
) -> Result<Vec<CB>> {
    let mut out = Vec::new();
    let mut cur = make_builder();
    for (docno, item) in items {
        if !cur.is_empty() && !cur.fits(item) {
            out.push(cur);
            cur = make_builder();
        }
        cur.append(*docno, item)?;
    }
    if !cur.is_empty() {
        out.push(cur);
    }
    Ok(out)
}
