//! KV store adapter (spec.md §4.1): a thin facade over an ordered
//! byte-keyed store. The underlying store itself is out of scope for this
//! crate (spec.md §1); only its contract is specified here, plus one
//! in-memory reference implementation (`MemKv`) sufficient to exercise the
//! rest of the core end-to-end (SPEC_FULL.md D.5).

use crate::error::Result;
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

/// Read-only snapshot-consistent view of the store at the point it was
/// created (spec.md §5 ordering guarantees: "a posting iterator created at
/// time T sees exactly the blocks persisted at time T").
pub trait Snapshot: Send + Sync {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>>;

    /// Returns a cursor over all keys `k` with `lower <= k < upper`. An
    /// empty `upper` means "no upper bound".
    fn range_scan(&self, lower: &[u8], upper: &[u8]) -> Box<dyn Cursor + '_>;
}

/// A cursor over a key range. Positions are stable across `next`/`prev`;
/// `valid()` reports whether the cursor currently sits on an entry.
pub trait Cursor {
    fn valid(&self) -> bool;
    fn key(&self) -> &[u8];
    fn value(&self) -> &[u8];
    fn seek(&mut self, key: &[u8]);
    fn seek_to_last(&mut self);
    fn next(&mut self);
    fn prev(&mut self);
}

/// A batched atomic write against the store. This is the store's own
/// atomic-commit unit, distinct from `crate::txn::Transaction` (spec.md
/// §4.1: "Transactions are the store's atomic commit, not the storage
/// engine's transactions").
pub trait WriteBatch: std::any::Any {
    fn put(&mut self, key: &[u8], value: &[u8]);
    fn delete(&mut self, key: &[u8]);
    fn as_any(self: Box<Self>) -> Box<dyn std::any::Any>;
}

/// The KV store adapter itself.
pub trait Kv: Send + Sync {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>>;
    fn range_scan(&self, lower: &[u8], upper: &[u8]) -> Box<dyn Cursor + '_>;
    /// Returns a reference-counted snapshot so posting iterators can hold
    /// their own point-in-time view of the store without borrowing `self`
    /// (spec.md §5: iterators capture a snapshot at construction, not a
    /// live cursor into a store that may see later commits).
    fn snapshot(&self) -> Arc<dyn Snapshot>;
    fn new_batch(&self) -> Box<dyn WriteBatch>;
    fn commit_batch(&self, batch: Box<dyn WriteBatch>) -> Result<()>;
}

/// In-memory reference `Kv` implementation backed by a `BTreeMap`, so that
/// byte-lexical iteration matches the ordering the on-disk format depends
/// on. Grounded on the contract spec.md §4.1 specifies for the external KV
/// store; not intended as a production backend.
#[derive(Default)]
pub struct MemKv {
    inner: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl MemKv {
    pub fn new() -> Self {
        Self::default()
    }
}

struct MemSnapshot {
    data: BTreeMap<Vec<u8>, Vec<u8>>,
}

impl Snapshot for MemSnapshot {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.data.get(key).cloned()
    }

    fn range_scan(&self, lower: &[u8], upper: &[u8]) -> Box<dyn Cursor + '_> {
        Box::new(MemCursor::new(&self.data, lower, upper))
    }
}

struct MemCursor<'a> {
    entries: Vec<(&'a [u8], &'a [u8])>,
    pos: Option<usize>,
}

impl<'a> MemCursor<'a> {
    fn new(data: &'a BTreeMap<Vec<u8>, Vec<u8>>, lower: &[u8], upper: &[u8]) -> Self {
        let entries: Vec<(&[u8], &[u8])> = data
            .range(lower.to_vec()..)
            .take_while(|(k, _)| upper.is_empty() || k.as_slice() < upper)
            .map(|(k, v)| (k.as_slice(), v.as_slice()))
            .collect();
        let pos = if entries.is_empty() { None } else { Some(0) };
        MemCursor { entries, pos }
    }
}

impl<'a> Cursor for MemCursor<'a> {
    fn valid(&self) -> bool {
        self.pos.map(|p| p < self.entries.len()).unwrap_or(false)
    }

    fn key(&self) -> &[u8] {
        self.entries[self.pos.expect("cursor not valid")].0
    }

    fn value(&self) -> &[u8] {
        self.entries[self.pos.expect("cursor not valid")].1
    }

    fn seek(&mut self, key: &[u8]) {
        self.pos = self.entries.iter().position(|(k, _)| *k >= key);
    }

    fn seek_to_last(&mut self) {
        self.pos = if self.entries.is_empty() {
            None
        } else {
            Some(self.entries.len() - 1)
        };
    }

    fn next(&mut self) {
        if let Some(p) = self.pos {
            let np = p + 1;
            self.pos = if np < self.entries.len() {
                Some(np)
            } else {
                None
            };
        }
    }

    fn prev(&mut self) {
        match self.pos {
            Some(0) | None => self.pos = None,
            Some(p) => self.pos = Some(p - 1),
        }
    }
}

enum Op {
    Put(Vec<u8>, Vec<u8>),
    Delete(Vec<u8>),
}

#[derive(Default)]
struct MemBatch {
    ops: Vec<Op>,
}

impl WriteBatch for MemBatch {
    fn put(&mut self, key: &[u8], value: &[u8]) {
        self.ops.push(Op::Put(key.to_vec(), value.to_vec()));
    }

    fn delete(&mut self, key: &[u8]) {
        self.ops.push(Op::Delete(key.to_vec()));
    }

    fn as_any(self: Box<Self>) -> Box<dyn std::any::Any> {
        self
    }
}

impl Kv for MemKv {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.inner.read().unwrap().get(key).cloned()
    }

    fn range_scan(&self, lower: &[u8], upper: &[u8]) -> Box<dyn Cursor + '_> {
        // Snapshot the relevant range up front: readers never block on a
        // concurrent commit (spec.md §5 "the read path is never blocked").
        let guard = self.inner.read().unwrap();
        let entries: Vec<(Vec<u8>, Vec<u8>)> = guard
            .range(lower.to_vec()..)
            .take_while(|(k, _)| upper.is_empty() || k.as_slice() < upper)
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        Box::new(OwnedCursor::new(entries))
    }

    fn snapshot(&self) -> Arc<dyn Snapshot> {
        let data = self.inner.read().unwrap().clone();
        Arc::new(MemSnapshot { data })
    }

    fn new_batch(&self) -> Box<dyn WriteBatch> {
        Box::new(MemBatch::default())
    }

    fn commit_batch(&self, batch: Box<dyn WriteBatch>) -> Result<()> {
        let batch = batch
            .as_any()
            .downcast::<MemBatch>()
            .expect("MemKv::commit_batch called with a foreign WriteBatch");
        let mut guard = self.inner.write().unwrap();
        for op in batch.ops {
            match op {
                Op::Put(k, v) => {
                    guard.insert(k, v);
                }
                Op::Delete(k) => {
                    guard.remove(&k);
                }
            }
        }
        Ok(())
    }
}

struct OwnedCursor {
    entries: Vec<(Vec<u8>, Vec<u8>)>,
    pos: Option<usize>,
}

impl OwnedCursor {
    fn new(entries: Vec<(Vec<u8>, Vec<u8>)>) -> Self {
        let pos = if entries.is_empty() { None } else { Some(0) };
        OwnedCursor { entries, pos }
    }
}

impl Cursor for OwnedCursor {
    fn valid(&self) -> bool {
        self.pos.map(|p| p < self.entries.len()).unwrap_or(false)
    }

    fn key(&self) -> &[u8] {
        &self.entries[self.pos.expect("cursor not valid")].0
    }

    fn value(&self) -> &[u8] {
        &self.entries[self.pos.expect("cursor not valid")].1
    }

    fn seek(&mut self, key: &[u8]) {
        self.pos = self.entries.iter().position(|(k, _)| k.as_slice() >= key);
    }

    fn seek_to_last(&mut self) {
        self.pos = if self.entries.is_empty() {
            None
        } else {
            Some(self.entries.len() - 1)
        };
    }

    fn next(&mut self) {
        if let Some(p) = self.pos {
            let np = p + 1;
            self.pos = if np < self.entries.len() {
                Some(np)
            } else {
                None
            };
        }
    }

    fn prev(&mut self) {
        match self.pos {
            Some(0) | None => self.pos = None,
            Some(p) => self.pos = Some(p - 1),
        }
    }
}
