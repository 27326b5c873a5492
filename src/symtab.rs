//! Symbol tables: name <-> dense id maps for term values, term types, user
//! names and document ids (spec.md §4.5).
//!
//! Grounded on `keyMap.hpp`/`keyMap.cpp` in
//! `examples/original_source/src/lvdbstorage/`: `lookUp` (read-only),
//! `getOrCreate` (allocate-if-missing), and the "immediate" vs "LRU batched"
//! allocation strategies the original's `KeyMap` constructor switches on.
//! Generalized here behind one `IdAllocator` trait so the two strategies
//! share the read path and differ only in how an id is minted.

use crate::ids::NONE;
use rustc_hash::FxHashMap;
use std::sync::{Mutex, RwLock};

/// How a symbol table mints ids for names it has not seen before.
pub trait IdAllocator: Send + Sync {
    /// Reserve the next id. Implementations differ in whether this id is
    /// considered final immediately or only after a pending batch commits.
    fn next_id(&self) -> u32;

    /// The highest id minted or reserved so far, for persisting `NextXxx`
    /// counters (spec.md §3 "Global variables") without minting a new one.
    fn current(&self) -> u32;
}

/// Allocates ids immediately and irrevocably, in `next_id()` call order.
/// Matches the original's "immediate" `KeyMap` mode: simple, but every
/// aborted transaction leaks the ids it reserved.
#[derive(Default)]
pub struct ImmediateAllocator {
    counter: Mutex<u32>,
}

impl ImmediateAllocator {
    pub fn new(start: u32) -> Self {
        ImmediateAllocator {
            counter: Mutex::new(start),
        }
    }
}

impl IdAllocator for ImmediateAllocator {
    fn next_id(&self) -> u32 {
        let mut c = self.counter.lock().unwrap();
        *c += 1;
        *c
    }

    fn current(&self) -> u32 {
        *self.counter.lock().unwrap()
    }
}

/// Allocates ids from a pre-reserved batch, handing back ids only up to a
/// high-water mark set by `reserve_batch`. Matches the original's deferred
/// mode, where a block of ids is reserved once per transaction and handed
/// out to new names as they're encountered, so an aborted transaction's
/// unused reservations are simply dropped rather than leaked one at a time.
#[derive(Default)]
pub struct DeferredAllocator {
    next: Mutex<u32>,
    high_water: Mutex<u32>,
}

impl DeferredAllocator {
    pub fn new(start: u32) -> Self {
        DeferredAllocator {
            next: Mutex::new(start),
            high_water: Mutex::new(start),
        }
    }

    /// Reserves `count` additional ids for use by the current transaction.
    pub fn reserve_batch(&self, count: u32) {
        let mut hw = self.high_water.lock().unwrap();
        *hw += count;
    }
}

impl IdAllocator for DeferredAllocator {
    fn next_id(&self) -> u32 {
        let mut next = self.next.lock().unwrap();
        let hw = self.high_water.lock().unwrap();
        assert!(*next < *hw, "DeferredAllocator exhausted its reserved batch");
        *next += 1;
        *next
    }

    fn current(&self) -> u32 {
        *self.high_water.lock().unwrap()
    }
}

/// A name <-> dense-id symbol table. Reads never block writers and vice
/// versa beyond the lock's own critical section (spec.md §5: "single-writer,
/// multi-reader symbol tables").
pub struct SymbolTable<A: IdAllocator> {
    forward: RwLock<FxHashMap<Vec<u8>, u32>>,
    inverse: RwLock<FxHashMap<u32, Vec<u8>>>,
    allocator: A,
}

impl<A: IdAllocator> SymbolTable<A> {
    pub fn new(allocator: A) -> Self {
        SymbolTable {
            forward: RwLock::new(FxHashMap::default()),
            inverse: RwLock::new(FxHashMap::default()),
            allocator,
        }
    }

    /// Read-only lookup; returns `NONE` (0) if `name` is unknown.
    pub fn look_up(&self, name: &[u8]) -> u32 {
        self.forward
            .read()
            .unwrap()
            .get(name)
            .copied()
            .unwrap_or(NONE)
    }

    pub fn name_of(&self, id: u32) -> Option<Vec<u8>> {
        self.inverse.read().unwrap().get(&id).cloned()
    }

    /// Returns `name`'s id, minting a new one via the allocator if `name`
    /// has not been seen before.
    pub fn get_or_create(&self, name: &[u8]) -> u32 {
        if let Some(id) = self.forward.read().unwrap().get(name) {
            return *id;
        }
        let mut fwd = self.forward.write().unwrap();
        // Re-check under the write lock: another writer may have raced us.
        if let Some(id) = fwd.get(name) {
            return *id;
        }
        let id = self.allocator.next_id();
        fwd.insert(name.to_vec(), id);
        self.inverse.write().unwrap().insert(id, name.to_vec());
        id
    }

    /// The highest id this table's allocator has minted or reserved so far.
    pub fn current_id(&self) -> u32 {
        self.allocator.current()
    }

    pub fn len(&self) -> usize {
        self.forward.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Restores a mapping loaded from the store at startup.
    pub fn insert_known(&self, name: &[u8], id: u32) {
        self.forward.write().unwrap().insert(name.to_vec(), id);
        self.inverse.write().unwrap().insert(id, name.to_vec());
    }

    /// Removes a name/id pair (spec.md §4.6 `delete_document`: the document
    /// id itself is freed along with its postings).
    pub fn remove(&self, name: &[u8]) {
        if let Some(id) = self.forward.write().unwrap().remove(name) {
            self.inverse.write().unwrap().remove(&id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_or_create_is_stable() {
        let t = SymbolTable::new(ImmediateAllocator::new(0));
        let a = t.get_or_create(b"hello");
        let b = t.get_or_create(b"hello");
        assert_eq!(a, b);
        assert_eq!(t.look_up(b"hello"), a);
        assert_eq!(t.name_of(a), Some(b"hello".to_vec()));
    }

    #[test]
    fn unknown_name_looks_up_to_none() {
        let t: SymbolTable<ImmediateAllocator> = SymbolTable::new(ImmediateAllocator::new(0));
        assert_eq!(t.look_up(b"nope"), NONE);
    }

    #[test]
    fn distinct_names_get_distinct_ids() {
        let t = SymbolTable::new(ImmediateAllocator::new(0));
        let a = t.get_or_create(b"a");
        let b = t.get_or_create(b"b");
        assert_ne!(a, b);
    }

    #[test]
    fn deferred_allocator_respects_reservation() {
        let alloc = DeferredAllocator::new(0);
        alloc.reserve_batch(2);
        assert_eq!(alloc.next_id(), 1);
        assert_eq!(alloc.next_id(), 2);
    }

    #[test]
    #[should_panic(expected = "exhausted")]
    fn deferred_allocator_panics_past_reservation() {
        let alloc = DeferredAllocator::new(0);
        alloc.reserve_batch(1);
        alloc.next_id();
        alloc.next_id();
    }

    #[test]
    fn remove_frees_the_name_and_id() {
        let t = SymbolTable::new(ImmediateAllocator::new(0));
        let id = t.get_or_create(b"doc1");
        t.remove(b"doc1");
        assert_eq!(t.look_up(b"doc1"), NONE);
        assert_eq!(t.name_of(id), None);
    }
}
