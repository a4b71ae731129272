//! The garbage collector.
//!
//! Collection is a single sweep over the block table: every live block
//! whose reference count has dropped to zero is marked reclaimed. The bytes
//! stay where they are until the compactor runs.
//!
//! ```text
//!   Allocated ──(rc → 0)──► Collectible ──(sweep)──► Reclaimed ──(compact)──► gone
//!        ▲                       │
//!        └───────(rc + 1)────────┘
//! ```
//!
//! The manager runs the sweep on a background thread at a fixed interval.
//! The thread sleeps on a condition variable so that shutdown wakes it
//! immediately instead of waiting out the interval.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use memkeep_common::{MemoryError, MemoryResult, COLLECTOR_THREAD_NAME};
use parking_lot::{Condvar, Mutex};
use tracing::{debug, info, warn};

use crate::arena::ArenaState;
use crate::manager::Core;

/// What one collector cycle reclaimed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepResult {
    /// Blocks marked reclaimed.
    pub reclaimed_blocks: usize,
    /// Bytes held by those blocks.
    pub reclaimed_bytes: usize,
}

impl SweepResult {
    /// Returns true if anything was reclaimed.
    pub fn did_work(&self) -> bool {
        self.reclaimed_blocks > 0
    }
}

impl ArenaState {
    /// Marks every collectible block as reclaimed.
    pub fn sweep(&mut self) -> SweepResult {
        let mut result = SweepResult::default();
        for block in self.table.iter_mut() {
            if block.is_collectible() {
                block.live = false;
                result.reclaimed_blocks += 1;
                result.reclaimed_bytes += block.length;
                debug!(id = %block.id, length = block.length, "reclaimed block");
            }
        }
        result
    }
}

// =============================================================================
// Background Thread
// =============================================================================

#[derive(Debug, Default)]
struct StopSignal {
    stopped: Mutex<bool>,
    wake: Condvar,
}

/// Handle to the background collector thread.
#[derive(Debug)]
pub(crate) struct Collector {
    signal: Arc<StopSignal>,
    thread: Option<JoinHandle<()>>,
}

impl Collector {
    /// Starts the collector thread.
    pub(crate) fn spawn(core: Arc<Core>, interval: Duration) -> MemoryResult<Self> {
        let signal = Arc::new(StopSignal::default());
        let thread_signal = Arc::clone(&signal);

        let thread = thread::Builder::new()
            .name(COLLECTOR_THREAD_NAME.to_string())
            .spawn(move || run(&core, &thread_signal, interval))
            .map_err(|source| MemoryError::Io { source })?;

        info!(interval_ms = interval.as_millis() as u64, "collector started");
        Ok(Self {
            signal,
            thread: Some(thread),
        })
    }

    /// Returns true until [`Collector::stop`] has joined the thread.
    pub(crate) fn is_running(&self) -> bool {
        self.thread.is_some()
    }

    /// Signals the thread to exit and waits for it.
    pub(crate) fn stop(&mut self) {
        let Some(thread) = self.thread.take() else {
            return;
        };

        *self.signal.stopped.lock() = true;
        self.signal.wake.notify_all();

        if thread.join().is_err() {
            warn!("collector thread panicked");
        } else {
            info!("collector stopped");
        }
    }
}

impl Drop for Collector {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run(core: &Core, signal: &StopSignal, interval: Duration) {
    loop {
        let deadline = Instant::now() + interval;
        {
            let mut stopped = signal.stopped.lock();
            while !*stopped {
                if signal.wake.wait_until(&mut stopped, deadline).timed_out() {
                    break;
                }
            }
            if *stopped {
                return;
            }
        }

        let result = core.collect();
        if result.did_work() {
            debug!(
                blocks = result.reclaimed_blocks,
                bytes = result.reclaimed_bytes,
                "collector cycle"
            );
        }
    }
}
