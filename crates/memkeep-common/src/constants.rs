//! System-wide constants for memkeep.

use std::time::Duration;

// =============================================================================
// Arena Constants
// =============================================================================

/// Bytes in one megabyte, used when capacities are given in MB.
pub const BYTES_PER_MB: usize = 1024 * 1024;

/// Default arena capacity (1 MB).
pub const DEFAULT_ARENA_CAPACITY: usize = BYTES_PER_MB;

/// Largest arena capacity the manager will try to reserve (4 GB).
pub const MAX_ARENA_CAPACITY: usize = 4 * 1024 * BYTES_PER_MB;

// =============================================================================
// Collector Constants
// =============================================================================

/// Default wake interval of the background collector, in milliseconds.
pub const DEFAULT_COLLECTOR_INTERVAL_MS: u64 = 5_000;

/// Default wake interval of the background collector.
pub const DEFAULT_COLLECTOR_INTERVAL: Duration =
    Duration::from_millis(DEFAULT_COLLECTOR_INTERVAL_MS);

/// Name given to the collector thread.
pub const COLLECTOR_THREAD_NAME: &str = "memkeep-gc";

// =============================================================================
// Wire Constants
// =============================================================================

/// Maximum payload carried by a single wire frame (16 MB).
pub const MAX_FRAME_PAYLOAD: usize = 16 * BYTES_PER_MB;

/// Default port of the memkeep daemon.
pub const DEFAULT_PORT: u16 = 50_051;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_consistent() {
        assert_eq!(DEFAULT_ARENA_CAPACITY, BYTES_PER_MB);
        assert!(DEFAULT_ARENA_CAPACITY <= MAX_ARENA_CAPACITY);
        assert_eq!(DEFAULT_COLLECTOR_INTERVAL, Duration::from_secs(5));
    }
}
