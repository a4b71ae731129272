//! Memory manager configuration.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{
    BYTES_PER_MB, DEFAULT_ARENA_CAPACITY, DEFAULT_COLLECTOR_INTERVAL_MS, MAX_ARENA_CAPACITY,
};
use crate::error::{MemoryError, MemoryResult};

/// Configuration accepted by the memory manager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagerConfig {
    /// Total arena capacity in bytes.
    #[serde(default = "default_capacity")]
    pub capacity: usize,

    /// Wake interval of the background collector, in milliseconds.
    #[serde(default = "default_collector_interval_ms")]
    pub collector_interval_ms: u64,

    /// Whether to run the background collector at all.
    ///
    /// With the collector disabled, zero-refcount blocks are only reclaimed
    /// by explicit `collect_garbage` calls.
    #[serde(default = "default_true")]
    pub collector_enabled: bool,

    /// Directory that receives diagnostic snapshots.
    #[serde(default)]
    pub dump_dir: Option<PathBuf>,

    /// Write a snapshot after every mutating operation.
    #[serde(default)]
    pub dump_on_mutation: bool,
}

fn default_capacity() -> usize {
    DEFAULT_ARENA_CAPACITY
}

fn default_collector_interval_ms() -> u64 {
    DEFAULT_COLLECTOR_INTERVAL_MS
}

fn default_true() -> bool {
    true
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            collector_interval_ms: default_collector_interval_ms(),
            collector_enabled: true,
            dump_dir: None,
            dump_on_mutation: false,
        }
    }
}

impl ManagerConfig {
    /// Creates a configuration for an arena of `capacity` bytes.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            ..Self::default()
        }
    }

    /// Creates a configuration for an arena of `megabytes` MB.
    #[must_use]
    pub fn from_megabytes(megabytes: usize) -> Self {
        Self::new(megabytes.saturating_mul(BYTES_PER_MB))
    }

    /// Sets the collector wake interval.
    #[must_use]
    pub fn with_collector_interval(mut self, interval: Duration) -> Self {
        self.collector_interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Enables or disables the background collector.
    #[must_use]
    pub fn with_collector(mut self, enabled: bool) -> Self {
        self.collector_enabled = enabled;
        self
    }

    /// Sets the snapshot directory.
    #[must_use]
    pub fn with_dump_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dump_dir = Some(dir.into());
        self
    }

    /// Enables or disables a snapshot after every mutating operation.
    #[must_use]
    pub fn with_dump_on_mutation(mut self, enabled: bool) -> Self {
        self.dump_on_mutation = enabled;
        self
    }

    /// Returns the collector wake interval.
    #[must_use]
    pub fn collector_interval(&self) -> Duration {
        Duration::from_millis(self.collector_interval_ms)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::Config`] describing the first invalid field.
    pub fn validate(&self) -> MemoryResult<()> {
        if self.capacity == 0 {
            return Err(MemoryError::config("capacity must be > 0"));
        }
        if self.capacity > MAX_ARENA_CAPACITY {
            return Err(MemoryError::config(format!(
                "capacity {} exceeds maximum {MAX_ARENA_CAPACITY}",
                self.capacity
            )));
        }
        if self.collector_interval_ms == 0 {
            return Err(MemoryError::config("collector_interval_ms must be > 0"));
        }
        if self.dump_on_mutation && self.dump_dir.is_none() {
            return Err(MemoryError::config(
                "dump_on_mutation requires dump_dir to be set",
            ));
        }
        Ok(())
    }
}
