//! Position window enumerator (spec.md §4.9), used by the summarization
//! proximity scorer to find the densest span of a document for a set of
//! matched terms rather than to filter documents the way the join
//! operators above do.

use crate::ids::Position;

/// One window over a document: `start`/`end` bound the span (`end`
/// exclusive), `hits` is the number of distinct operand positions it
/// covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Window {
    pub start: Position,
    pub end: Position,
    pub hits: usize,
}

/// Slides a window of `size` positions across the sorted, deduplicated
/// union of all operand positions and reports every window along with how
/// many distinct positions fall inside it. Mirrors the join operators'
/// two-pointer shape: the window's trailing edge only ever advances.
pub fn enumerate_windows(mut positions: Vec<Position>, size: u16) -> Vec<Window> {
    positions.sort_unstable();
    positions.dedup();
    let mut out = Vec::with_capacity(positions.len());
    let mut tail = 0usize;
    for head in 0..positions.len() {
        let start = positions[head];
        while tail < positions.len() && positions[tail] < start {
            tail += 1;
        }
        let mut end_idx = tail;
        while end_idx < positions.len() && positions[end_idx] < start + size {
            end_idx += 1;
        }
        out.push(Window {
            start,
            end: start + size,
            hits: end_idx - tail,
        });
    }
    out
}

/// The densest window (most hits; ties broken by the earliest start),
/// or `None` if `positions` is empty.
pub fn densest_window(positions: Vec<Position>, size: u16) -> Option<Window> {
    enumerate_windows(positions, size)
        .into_iter()
        .max_by(|a, b| a.hits.cmp(&b.hits).then(b.start.cmp(&a.start)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enumerate_windows_counts_hits_per_start() {
        let windows = enumerate_windows(vec![1, 2, 3, 20], 5);
        assert_eq!(windows[0], Window { start: 1, end: 6, hits: 3 });
        assert_eq!(windows[3], Window { start: 20, end: 25, hits: 1 });
    }

    #[test]
    fn densest_window_picks_earliest_tie() {
        let w = densest_window(vec![1, 2, 10, 11], 3).unwrap();
        assert_eq!(w.hits, 2);
        assert_eq!(w.start, 1);
    }

    #[test]
    fn empty_positions_have_no_window() {
        assert!(densest_window(Vec::new(), 5).is_none());
    }
}
