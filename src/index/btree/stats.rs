//! Tree mutation statistics.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Structural events counted by a [`BTree`](super::BTree).
///
/// Counters are atomic so that a tree shared behind `&` can still report.
/// `Ordering::Relaxed` is enough: the counters are independent and only
/// read for display.
///
/// # Example
/// ```
/// use cowbtree::TreeStats;
/// use std::sync::atomic::Ordering;
///
/// let stats = TreeStats::new();
/// stats.splits.fetch_add(1, Ordering::Relaxed);
/// assert_eq!(stats.snapshot().splits, 1);
/// ```
#[derive(Debug, Default)]
pub struct TreeStats {
    /// Nodes that overflowed and were split (root included).
    pub splits: AtomicU64,

    /// Sibling pairs merged after a delete.
    pub merges: AtomicU64,

    /// Times a new root was placed above the old one.
    pub root_splits: AtomicU64,

    /// Times a single-child root was replaced by its child.
    pub root_collapses: AtomicU64,

    /// Pages handed to the page store.
    pub pages_allocated: AtomicU64,

    /// Superseded pages released back to the page store.
    pub pages_freed: AtomicU64,
}

impl TreeStats {
    /// Create a new stats tracker with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub(crate) fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Get a snapshot of current statistics.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            splits: self.splits.load(Ordering::Relaxed),
            merges: self.merges.load(Ordering::Relaxed),
            root_splits: self.root_splits.load(Ordering::Relaxed),
            root_collapses: self.root_collapses.load(Ordering::Relaxed),
            pages_allocated: self.pages_allocated.load(Ordering::Relaxed),
            pages_freed: self.pages_freed.load(Ordering::Relaxed),
        }
    }

    /// Reset all counters to zero.
    pub fn reset(&self) {
        self.splits.store(0, Ordering::Relaxed);
        self.merges.store(0, Ordering::Relaxed);
        self.root_splits.store(0, Ordering::Relaxed);
        self.root_collapses.store(0, Ordering::Relaxed);
        self.pages_allocated.store(0, Ordering::Relaxed);
        self.pages_freed.store(0, Ordering::Relaxed);
    }
}

/// A point-in-time copy of [`TreeStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub splits: u64,
    pub merges: u64,
    pub root_splits: u64,
    pub root_collapses: u64,
    pub pages_allocated: u64,
    pub pages_freed: u64,
}

impl StatsSnapshot {
    /// Pages allocated but not yet freed since the last reset.
    pub fn net_pages(&self) -> i64 {
        self.pages_allocated as i64 - self.pages_freed as i64
    }
}

impl fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Stats {{ splits: {}, merges: {}, root splits: {}, root collapses: {}, pages: +{} -{} }}",
            self.splits,
            self.merges,
            self.root_splits,
            self.root_collapses,
            self.pages_allocated,
            self.pages_freed
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_new() {
        let stats = TreeStats::new();
        assert_eq!(stats.snapshot(), StatsSnapshot::default());
    }

    #[test]
    fn test_stats_snapshot_and_reset() {
        let stats = TreeStats::new();
        TreeStats::bump(&stats.pages_allocated);
        TreeStats::bump(&stats.pages_allocated);
        TreeStats::bump(&stats.pages_freed);

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.pages_allocated, 2);
        assert_eq!(snapshot.net_pages(), 1);

        stats.reset();
        assert_eq!(stats.snapshot().pages_allocated, 0);
    }

    #[test]
    fn test_stats_display() {
        let stats = TreeStats::new();
        stats.splits.fetch_add(3, Ordering::Relaxed);
        stats.pages_allocated.fetch_add(12, Ordering::Relaxed);

        let display = format!("{}", stats.snapshot());
        assert!(display.contains("splits: 3"));
        assert!(display.contains("pages: +12 -0"));
    }
}
