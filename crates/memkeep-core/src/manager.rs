//! The memory manager.
//!
//! [`MemoryManager`] is the public entry point. It owns a shared [`Core`]
//! (the arena behind one mutex, plus statistics and the optional snapshot
//! writer) and the background collector thread.
//!
//! ```text
//!   caller threads ──┐
//!   Handle<T> ───────┼──► Core { Mutex<ArenaState> } ◄── collector thread
//!   MemoryService ───┘
//! ```
//!
//! Every operation takes the lock exactly once, so each one is a single
//! atomic critical section. Snapshot files are written after the lock has
//! been released.

use std::path::PathBuf;
use std::sync::Arc;

use memkeep_common::{BlockId, ManagerConfig, MemoryError, MemoryResult};
use parking_lot::Mutex;
use tracing::{info, warn};

use crate::arena::{ArenaState, ArenaUsage, BlockInfo};
use crate::collector::{Collector, SweepResult};
use crate::compactor::CompactionResult;
use crate::snapshot::{ArenaSnapshot, SnapshotWriter};
use crate::stats::{ManagerStats, StatsSnapshot};

// =============================================================================
// Core
// =============================================================================

/// State shared by the manager, its handles and the collector thread.
#[derive(Debug)]
pub(crate) struct Core {
    state: Mutex<ArenaState>,
    stats: ManagerStats,
    snapshots: Option<SnapshotWriter>,
    dump_on_mutation: bool,
}

impl Core {
    pub(crate) fn new(config: &ManagerConfig) -> MemoryResult<Self> {
        Ok(Self {
            state: Mutex::new(ArenaState::with_capacity(config.capacity)?),
            stats: ManagerStats::new(),
            snapshots: config.dump_dir.clone().map(SnapshotWriter::new),
            dump_on_mutation: config.dump_on_mutation,
        })
    }

    pub(crate) fn create(&self, size: usize) -> MemoryResult<BlockId> {
        let (result, snapshot) = {
            let mut state = self.state.lock();
            let result = state.allocate(size);
            let snapshot = self.capture_if(&state, "create", result.is_ok());
            (result, snapshot)
        };
        self.stats.record_allocation(size, result.is_ok());
        self.persist(snapshot);
        result
    }

    pub(crate) fn write(&self, id: BlockId, data: &[u8]) -> MemoryResult<()> {
        let (result, snapshot) = {
            let mut state = self.state.lock();
            let result = state.write(id, data);
            let snapshot = self.capture_if(&state, "set", result.is_ok());
            (result, snapshot)
        };
        if result.is_ok() {
            self.stats.record_write();
        }
        self.persist(snapshot);
        result
    }

    pub(crate) fn read(&self, id: BlockId, size: usize) -> MemoryResult<Vec<u8>> {
        let result = self.state.lock().read(id, size);
        if result.is_ok() {
            self.stats.record_read();
        }
        result
    }

    pub(crate) fn increase_ref(&self, id: BlockId) -> MemoryResult<u32> {
        let (result, snapshot) = {
            let mut state = self.state.lock();
            let result = state.increase_ref(id);
            let snapshot = self.capture_if(&state, "increase_ref", result.is_ok());
            (result, snapshot)
        };
        self.persist(snapshot);
        result
    }

    pub(crate) fn decrease_ref(&self, id: BlockId) -> MemoryResult<u32> {
        let (result, snapshot) = {
            let mut state = self.state.lock();
            let result = state.decrease_ref(id);
            let snapshot = self.capture_if(&state, "decrease_ref", result.is_ok());
            (result, snapshot)
        };
        self.persist(snapshot);
        result
    }

    /// Runs one collector cycle.
    pub(crate) fn collect(&self) -> SweepResult {
        let (result, snapshot) = {
            let mut state = self.state.lock();
            let result = state.sweep();
            let snapshot = self.capture_if(&state, "collect", result.did_work());
            (result, snapshot)
        };
        self.stats.record_sweep(&result);
        self.persist(snapshot);
        result
    }

    pub(crate) fn defragment(&self) -> CompactionResult {
        let (result, snapshot) = {
            let mut state = self.state.lock();
            let result = state.compact();
            let snapshot = self.capture_if(&state, "defragment", true);
            (result, snapshot)
        };
        self.stats.record_compaction(&result);
        self.persist(snapshot);
        result
    }

    pub(crate) fn snapshot(&self, operation: &str) -> ArenaSnapshot {
        ArenaSnapshot::capture(&self.state.lock(), operation)
    }

    pub(crate) fn usage(&self) -> ArenaUsage {
        self.state.lock().usage()
    }

    pub(crate) fn live_ref_count(&self, id: BlockId) -> Option<u32> {
        self.state.lock().table().live(id).ok().map(|block| block.ref_count())
    }

    pub(crate) fn block_info(&self, id: BlockId) -> Option<BlockInfo> {
        self.state.lock().block(id).map(|block| block.info())
    }

    pub(crate) fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    fn capture_if(
        &self,
        state: &ArenaState,
        operation: &str,
        changed: bool,
    ) -> Option<ArenaSnapshot> {
        (changed && self.dump_on_mutation && self.snapshots.is_some())
            .then(|| ArenaSnapshot::capture(state, operation))
    }

    fn persist(&self, snapshot: Option<ArenaSnapshot>) {
        let (Some(snapshot), Some(writer)) = (snapshot, &self.snapshots) else {
            return;
        };
        if let Err(e) = writer.write(&snapshot) {
            warn!(operation = %snapshot.operation, error = %e, "failed to write snapshot");
        }
    }
}

// =============================================================================
// Memory Manager
// =============================================================================

/// A fixed-capacity, reference-counted, compacting memory manager.
///
/// # Example
///
/// ```rust
/// use memkeep_common::{ManagerConfig, MemoryError};
/// use memkeep_core::MemoryManager;
///
/// let manager = MemoryManager::new(ManagerConfig::new(1024).with_collector(false)).unwrap();
/// let id = manager.create(5).unwrap();
/// manager.set(id, b"Hola\0").unwrap();
/// assert_eq!(manager.get(id, 5).unwrap(), b"Hola\0");
///
/// manager.decrease_ref_count(id);
/// manager.collect_garbage();
/// assert!(matches!(manager.get(id, 5), Err(MemoryError::InvalidBlock { .. })));
/// ```
#[derive(Debug)]
pub struct MemoryManager {
    core: Arc<Core>,
    collector: Mutex<Option<Collector>>,
    config: ManagerConfig,
}

impl MemoryManager {
    /// Creates a manager and starts its collector thread.
    ///
    /// # Errors
    ///
    /// - [`MemoryError::Config`] if the configuration is invalid
    /// - [`MemoryError::AllocationFailure`] if the arena cannot be reserved
    /// - [`MemoryError::Io`] if the collector thread cannot be spawned
    pub fn new(config: ManagerConfig) -> MemoryResult<Self> {
        config.validate()?;
        let core = Arc::new(Core::new(&config)?);

        let collector = if config.collector_enabled {
            Some(Collector::spawn(Arc::clone(&core), config.collector_interval())?)
        } else {
            None
        };

        info!(
            capacity = config.capacity,
            collector = config.collector_enabled,
            dump_dir = ?config.dump_dir,
            "memory manager started"
        );
        Ok(Self {
            core,
            collector: Mutex::new(collector),
            config,
        })
    }

    /// Creates a manager with a `capacity`-byte arena and default settings.
    ///
    /// # Errors
    ///
    /// See [`MemoryManager::new`].
    pub fn with_capacity(capacity: usize) -> MemoryResult<Self> {
        Self::new(ManagerConfig::new(capacity))
    }

    pub(crate) fn core(&self) -> &Arc<Core> {
        &self.core
    }

    /// Returns the configuration the manager was built with.
    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    // =========================================================================
    // Block Operations
    // =========================================================================

    /// Allocates a block of `size` bytes holding one reference.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::OutOfMemory`] if the arena has no room left.
    pub fn create(&self, size: usize) -> MemoryResult<BlockId> {
        self.core.create(size)
    }

    /// Writes `data` at the start of the block.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::InvalidBlock`] or [`MemoryError::SizeMismatch`].
    pub fn set(&self, id: BlockId, data: &[u8]) -> MemoryResult<()> {
        self.core.write(id, data)
    }

    /// Reads the first `size` bytes of the block.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::InvalidBlock`] or [`MemoryError::SizeMismatch`].
    pub fn get(&self, id: BlockId, size: usize) -> MemoryResult<Vec<u8>> {
        self.core.read(id, size)
    }

    /// Adds a reference. Returns the new count, or `None` (logged) if the
    /// block is unknown or reclaimed.
    pub fn increase_ref_count(&self, id: BlockId) -> Option<u32> {
        log_refcount_miss(id, "increase", self.core.increase_ref(id))
    }

    /// Drops a reference. Returns the new count, or `None` (logged) if the
    /// block is unknown or reclaimed.
    pub fn decrease_ref_count(&self, id: BlockId) -> Option<u32> {
        log_refcount_miss(id, "decrease", self.core.decrease_ref(id))
    }

    /// Returns the reference count of a live block.
    pub fn ref_count(&self, id: BlockId) -> Option<u32> {
        self.core.live_ref_count(id)
    }

    /// Returns metadata for a block still present in the table.
    pub fn block_info(&self, id: BlockId) -> Option<BlockInfo> {
        self.core.block_info(id)
    }

    // =========================================================================
    // Maintenance
    // =========================================================================

    /// Runs one collector cycle now, on the calling thread.
    pub fn collect_garbage(&self) -> SweepResult {
        self.core.collect()
    }

    /// Compacts the arena.
    pub fn defragment(&self) -> CompactionResult {
        self.core.defragment()
    }

    // =========================================================================
    // Diagnostics
    // =========================================================================

    /// Returns current arena usage.
    pub fn usage(&self) -> ArenaUsage {
        self.core.usage()
    }

    /// Returns the manager's counters.
    pub fn stats(&self) -> StatsSnapshot {
        self.core.stats()
    }

    /// Takes a metadata snapshot tagged with `operation`.
    pub fn snapshot(&self, operation: &str) -> ArenaSnapshot {
        self.core.snapshot(operation)
    }

    /// Takes a snapshot and writes it to the configured dump directory.
    ///
    /// # Errors
    ///
    /// - [`MemoryError::Config`] if no dump directory is configured
    /// - [`MemoryError::Io`] if the file cannot be written
    pub fn dump(&self, operation: &str) -> MemoryResult<PathBuf> {
        let writer = self
            .core
            .snapshots
            .as_ref()
            .ok_or_else(|| MemoryError::config("no dump directory configured"))?;
        let snapshot = self.core.snapshot(operation);
        writer.write(&snapshot)
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Returns true while the background collector is running.
    pub fn is_collector_running(&self) -> bool {
        self.collector
            .lock()
            .as_ref()
            .is_some_and(Collector::is_running)
    }

    /// Stops the collector and waits for its thread to exit.
    ///
    /// Idempotent. Block operations keep working afterwards; only the
    /// automatic reclamation stops.
    pub fn shutdown(&self) {
        let collector = self.collector.lock().take();
        if let Some(mut collector) = collector {
            collector.stop();
            info!("memory manager shut down");
        }
    }
}

impl Drop for MemoryManager {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn log_refcount_miss(id: BlockId, action: &str, result: MemoryResult<u32>) -> Option<u32> {
    match result {
        Ok(count) => Some(count),
        Err(e) => {
            warn!(%id, action, error = %e, "reference count change ignored");
            None
        }
    }
}
