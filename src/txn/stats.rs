//! Per-commit statistics: document-frequency deltas and the net change in
//! document count, applied to the shared caches once a transaction commits
//! (spec.md §4.6 "StatisticsBuilder").

use rustc_hash::FxHashMap;

#[derive(Debug, Default)]
pub struct StatisticsBuilder {
    df_delta: FxHashMap<(u32, u32), i64>,
    nof_docs_delta: i64,
}

impl StatisticsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_df_delta(&mut self, typeno: u32, termno: u32, delta: i64) {
        *self.df_delta.entry((typeno, termno)).or_insert(0) += delta;
    }

    pub fn add_document(&mut self) {
        self.nof_docs_delta += 1;
    }

    pub fn remove_document(&mut self) {
        self.nof_docs_delta -= 1;
    }

    pub fn df_deltas(&self) -> impl Iterator<Item = (u32, u32, i64)> + '_ {
        self.df_delta.iter().map(|(&(t, n), &d)| (t, n, d))
    }

    pub fn nof_docs_delta(&self) -> i64 {
        self.nof_docs_delta
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulates_deltas_per_term() {
        let mut s = StatisticsBuilder::new();
        s.add_df_delta(1, 1, 1);
        s.add_df_delta(1, 1, 1);
        s.add_df_delta(1, 2, -1);
        s.add_document();
        s.add_document();
        s.remove_document();
        let deltas: FxHashMap<_, _> = s.df_deltas().map(|(t, n, d)| ((t, n), d)).collect();
        assert_eq!(deltas[&(1, 1)], 2);
        assert_eq!(deltas[&(1, 2)], -1);
        assert_eq!(s.nof_docs_delta(), 1);
    }
}
