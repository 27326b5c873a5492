//! In-memory document-frequency cache: `(typeno, termno) -> df` (spec.md
//! §3, §4.6).
//!
//! Grounded on `examples/kev1N916-keSE/src/query_processor/query_processor.rs`,
//! which keeps a term-count table alongside the term index rather than
//! recomputing counts per query; unlike an LFU cache this table must never
//! evict (a missing df must mean "zero", not "unknown"), so it is plain
//! `rustc_hash`-keyed storage rather than a cache crate, with updates
//! applied as signed deltas at commit time instead of rebuilding the whole
//! table.

use rustc_hash::FxHashMap;
use std::sync::RwLock;

/// Cached document frequencies, keyed by `(typeno, termno)`.
#[derive(Default)]
pub struct DfCache {
    table: RwLock<FxHashMap<(u32, u32), u32>>,
}

impl DfCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, typeno: u32, termno: u32) -> u32 {
        self.table
            .read()
            .unwrap()
            .get(&(typeno, termno))
            .copied()
            .unwrap_or(0)
    }

    pub fn set(&self, typeno: u32, termno: u32, df: u32) {
        self.table.write().unwrap().insert((typeno, termno), df);
    }

    /// Applies a signed delta, used when a commit's statistics say a term
    /// gained or lost `delta` documents (spec.md §4.6 "StatisticsBuilder").
    pub fn apply_delta(&self, typeno: u32, termno: u32, delta: i64) {
        let mut table = self.table.write().unwrap();
        let entry = table.entry((typeno, termno)).or_insert(0);
        *entry = (*entry as i64 + delta).max(0) as u32;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_term_has_zero_df() {
        let c = DfCache::new();
        assert_eq!(c.get(1, 1), 0);
    }

    #[test]
    fn set_then_get() {
        let c = DfCache::new();
        c.set(1, 2, 40);
        assert_eq!(c.get(1, 2), 40);
    }

    #[test]
    fn delta_accumulates_and_floors_at_zero() {
        let c = DfCache::new();
        c.set(1, 2, 5);
        c.apply_delta(1, 2, 3);
        assert_eq!(c.get(1, 2), 8);
        c.apply_delta(1, 2, -100);
        assert_eq!(c.get(1, 2), 0);
    }
}
