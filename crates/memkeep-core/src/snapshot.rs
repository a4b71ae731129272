//! Arena snapshots.
//!
//! A snapshot is a plain-text picture of the arena taken under the manager
//! lock: a header with the time, the triggering operation and the byte
//! totals, then one line per block entry.
//!
//! ```text
//! timestamp: 2024-05-01 12:00:00.123456789
//! operation: create
//! capacity: 1048576
//! used: 64
//! free: 1048512
//! blocks: 2
//! id=1 offset=0 size=32 refcount=1 state=allocated
//! id=2 offset=32 size=32 refcount=0 state=collectible
//! ```
//!
//! [`SnapshotWriter`] stores each snapshot in its own file named after the
//! time it was taken.

use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::{self, Write as _};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use memkeep_common::MemoryResult;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::arena::{ArenaState, BlockInfo};

/// Timestamp format used for snapshot file names.
const FILE_TIME_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// A point-in-time copy of the arena's metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArenaSnapshot {
    /// When the snapshot was taken.
    pub taken_at: DateTime<Local>,
    /// Operation that triggered it.
    pub operation: String,
    /// Arena capacity in bytes.
    pub capacity: usize,
    /// Bytes below the frontier.
    pub used: usize,
    /// Bytes past the frontier.
    pub free: usize,
    /// Every block entry, ordered by id.
    pub blocks: Vec<BlockInfo>,
}

impl ArenaSnapshot {
    /// Captures the current state of the arena.
    pub fn capture(state: &ArenaState, operation: impl Into<String>) -> Self {
        let usage = state.usage();
        Self {
            taken_at: Local::now(),
            operation: operation.into(),
            capacity: usage.capacity,
            used: usage.used,
            free: usage.free,
            blocks: state.block_infos(),
        }
    }

    /// Renders the snapshot in its text form.
    pub fn render(&self) -> String {
        let mut out = String::with_capacity(128 + self.blocks.len() * 64);
        // Writing into a String cannot fail
        let _ = self.write_text(&mut out);
        out
    }

    /// File name for this snapshot, unique to the nanosecond.
    pub fn file_name(&self) -> String {
        format!(
            "{}-{}.txt",
            self.taken_at.format(FILE_TIME_FORMAT),
            self.taken_at.timestamp_subsec_nanos()
        )
    }

    fn write_text(&self, out: &mut impl fmt::Write) -> fmt::Result {
        writeln!(
            out,
            "timestamp: {}",
            self.taken_at.format("%Y-%m-%d %H:%M:%S%.9f")
        )?;
        writeln!(out, "operation: {}", self.operation)?;
        writeln!(out, "capacity: {}", self.capacity)?;
        writeln!(out, "used: {}", self.used)?;
        writeln!(out, "free: {}", self.free)?;
        writeln!(out, "blocks: {}", self.blocks.len())?;
        for block in &self.blocks {
            writeln!(
                out,
                "id={} offset={} size={} refcount={} state={}",
                block.id, block.offset, block.length, block.ref_count, block.state
            )?;
        }
        Ok(())
    }
}

impl fmt::Display for ArenaSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_text(f)
    }
}

// =============================================================================
// Snapshot Writer
// =============================================================================

/// Writes snapshots into a directory, one file each.
#[derive(Debug, Clone)]
pub struct SnapshotWriter {
    dir: PathBuf,
}

impl SnapshotWriter {
    /// Creates a writer for `dir`. The directory is created on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Returns the target directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Writes `snapshot` and returns the path of the new file.
    ///
    /// Existing files are never overwritten; a numeric suffix is added if
    /// the time-based name is already taken.
    ///
    /// # Errors
    ///
    /// Returns [`memkeep_common::MemoryError::Io`] if the directory or file
    /// cannot be created or written.
    pub fn write(&self, snapshot: &ArenaSnapshot) -> MemoryResult<PathBuf> {
        fs::create_dir_all(&self.dir)?;

        let base = snapshot.file_name();
        let mut path = self.dir.join(&base);
        let mut attempt = 0u32;
        let mut file = loop {
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => break file,
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    attempt += 1;
                    let stem = base.trim_end_matches(".txt");
                    path = self.dir.join(format!("{stem}-{attempt}.txt"));
                }
                Err(e) => return Err(e.into()),
            }
        };

        file.write_all(snapshot.render().as_bytes())?;
        file.flush()?;
        debug!(path = %path.display(), operation = %snapshot.operation, "snapshot written");
        Ok(path)
    }
}
