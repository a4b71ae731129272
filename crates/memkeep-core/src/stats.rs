//! Manager statistics.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::collector::SweepResult;
use crate::compactor::CompactionResult;

/// Running counters kept by the memory manager.
///
/// Counters are updated with relaxed atomics after the guarded operation
/// completes; they are for monitoring, not for synchronization.
#[derive(Debug, Default)]
pub struct ManagerStats {
    allocations: AtomicU64,
    failed_allocations: AtomicU64,
    bytes_allocated: AtomicU64,
    reads: AtomicU64,
    writes: AtomicU64,
    collector_cycles: AtomicU64,
    blocks_reclaimed: AtomicU64,
    compactions: AtomicU64,
    bytes_moved: AtomicU64,
    entries_removed: AtomicU64,
}

impl ManagerStats {
    /// Creates zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an allocation attempt.
    pub fn record_allocation(&self, size: usize, succeeded: bool) {
        if succeeded {
            self.allocations.fetch_add(1, Ordering::Relaxed);
            self.bytes_allocated.fetch_add(size as u64, Ordering::Relaxed);
        } else {
            self.failed_allocations.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Records a read.
    pub fn record_read(&self) {
        self.reads.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a write.
    pub fn record_write(&self) {
        self.writes.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a collector cycle.
    pub fn record_sweep(&self, result: &SweepResult) {
        self.collector_cycles.fetch_add(1, Ordering::Relaxed);
        self.blocks_reclaimed.fetch_add(result.reclaimed_blocks as u64, Ordering::Relaxed);
    }

    /// Records a compaction pass.
    pub fn record_compaction(&self, result: &CompactionResult) {
        self.compactions.fetch_add(1, Ordering::Relaxed);
        self.bytes_moved.fetch_add(result.bytes_moved as u64, Ordering::Relaxed);
        self.entries_removed.fetch_add(result.entries_removed as u64, Ordering::Relaxed);
    }

    /// Returns a plain copy of the counters.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            allocations: self.allocations.load(Ordering::Relaxed),
            failed_allocations: self.failed_allocations.load(Ordering::Relaxed),
            bytes_allocated: self.bytes_allocated.load(Ordering::Relaxed),
            reads: self.reads.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
            collector_cycles: self.collector_cycles.load(Ordering::Relaxed),
            blocks_reclaimed: self.blocks_reclaimed.load(Ordering::Relaxed),
            compactions: self.compactions.load(Ordering::Relaxed),
            bytes_moved: self.bytes_moved.load(Ordering::Relaxed),
            entries_removed: self.entries_removed.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`ManagerStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    /// Successful allocations.
    pub allocations: u64,
    /// Allocations rejected with `OutOfMemory`.
    pub failed_allocations: u64,
    /// Bytes handed out by successful allocations.
    pub bytes_allocated: u64,
    /// Successful reads.
    pub reads: u64,
    /// Successful writes.
    pub writes: u64,
    /// Collector cycles run, background or manual.
    pub collector_cycles: u64,
    /// Blocks reclaimed by the collector.
    pub blocks_reclaimed: u64,
    /// Compaction passes.
    pub compactions: u64,
    /// Bytes moved by compaction.
    pub bytes_moved: u64,
    /// Reclaimed entries dropped by compaction.
    pub entries_removed: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_start_at_zero() {
        let stats = ManagerStats::new();
        assert_eq!(stats.snapshot(), StatsSnapshot::default());
    }

    #[test]
    fn test_record_allocation() {
        let stats = ManagerStats::new();
        stats.record_allocation(10, true);
        stats.record_allocation(20, true);
        stats.record_allocation(99, false);

        let snap = stats.snapshot();
        assert_eq!(snap.allocations, 2);
        assert_eq!(snap.bytes_allocated, 30);
        assert_eq!(snap.failed_allocations, 1);
    }

    #[test]
    fn test_record_maintenance() {
        let stats = ManagerStats::new();
        stats.record_sweep(&SweepResult {
            reclaimed_blocks: 3,
            reclaimed_bytes: 30,
        });
        stats.record_compaction(&CompactionResult {
            blocks_moved: 2,
            bytes_moved: 64,
            entries_removed: 3,
            frontier_before: 100,
            frontier_after: 70,
        });

        let snap = stats.snapshot();
        assert_eq!(snap.collector_cycles, 1);
        assert_eq!(snap.blocks_reclaimed, 3);
        assert_eq!(snap.compactions, 1);
        assert_eq!(snap.bytes_moved, 64);
        assert_eq!(snap.entries_removed, 3);
    }
}
