//! World-owned instrumentation.
//!
//! Counters live on the [`World`](crate::world::World) that produces them.
//! The skip and visit counters are updated through a shared reference by the
//! matching iterator handed to systems, so they use [`Cell`].

use std::cell::Cell;

use serde::{Deserialize, Serialize};

/// Live counters of one world.
#[derive(Debug, Default)]
pub struct WorldMetrics {
    pub(crate) ticks: u64,
    pub(crate) refreshes: u64,
    pub(crate) entities_visited: Cell<u64>,
    pub(crate) entities_skipped: Cell<u64>,
}

impl WorldMetrics {
    #[inline]
    pub(crate) fn record_visit(&self) {
        self.entities_visited.set(self.entities_visited.get() + 1);
    }

    #[inline]
    pub(crate) fn record_skip(&self) {
        self.entities_skipped.set(self.entities_skipped.get() + 1);
    }

    pub(crate) fn reset_iteration_counters(&self) {
        self.entities_visited.set(0);
        self.entities_skipped.set(0);
    }

    pub(crate) fn snapshot(&self, recycle_faults: u64) -> MetricsSnapshot {
        MetricsSnapshot {
            ticks: self.ticks,
            refreshes: self.refreshes,
            entities_visited: self.entities_visited.get(),
            entities_skipped: self.entities_skipped.get(),
            recycle_faults,
        }
    }
}

/// Point-in-time copy of a world's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Completed `update` calls.
    pub ticks: u64,
    /// Completed `refresh` calls, including the ones run by `update`.
    pub refreshes: u64,
    /// Entities yielded to systems by matching iteration.
    pub entities_visited: u64,
    /// Entity records passed over by matching iteration (dead or unmatched).
    pub entities_skipped: u64,
    /// Allocations that minted a fresh id because `dead_count` was
    /// inconsistent with the entity records.
    pub recycle_faults: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate_and_reset() {
        let metrics = WorldMetrics::default();
        metrics.record_visit();
        metrics.record_visit();
        metrics.record_skip();

        let snap = metrics.snapshot(3);
        assert_eq!(snap.entities_visited, 2);
        assert_eq!(snap.entities_skipped, 1);
        assert_eq!(snap.recycle_faults, 3);

        metrics.reset_iteration_counters();
        assert_eq!(metrics.snapshot(0), MetricsSnapshot::default());
    }
}
