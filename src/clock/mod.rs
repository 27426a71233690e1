//! Per-tier clock markers with atomic, durable writes.
//!
//! Each tier has one small JSON marker file, `<state_dir>/<tier>.json`,
//! recording the slot most recently written and the timestamp of the last
//! successful signoff:
//!
//! ```json
//! {"schema_version":1,"slot":3,"last_run":"2026-08-29T04:00:00Z"}
//! ```
//!
//! # Atomic Writes
//!
//! Markers are written using a write-to-temp-then-rename pattern:
//! 1. Write to `<tier>.json.tmp`
//! 2. fsync the file
//! 3. Rename to `<tier>.json`
//! 4. fsync the directory
//!
//! A crash mid-signoff therefore leaves either the old marker or the new
//! one, never a partial write.
//!
//! # Bootstrap vs. corruption
//!
//! A missing marker means the tier has never run; that is the bootstrap
//! case, not an error. A marker that exists but does not parse is fatal
//! [`ClockError::Corrupt`]: silently defaulting would risk overwriting
//! slot 0's retained history.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::types::{SlotNumber, Tier, TierName};

/// Current marker schema version. Increment when making breaking changes.
pub const SCHEMA_VERSION: u32 = 1;

/// Errors that can occur during clock marker operations.
#[derive(Debug, Error)]
pub enum ClockError {
    /// IO error during file operations.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// A marker exists but cannot be trusted. Fatal: the engine halts
    /// rather than guess at a slot number.
    #[error("corrupt clock marker for tier '{tier}': {reason}")]
    Corrupt { tier: TierName, reason: String },
}

/// Result type for clock marker operations.
pub type Result<T> = std::result::Result<T, ClockError>;

/// The persisted record for one tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClockRecord {
    /// Schema version for forward-compatible migrations.
    pub schema_version: u32,

    /// The slot most recently written. Never a slot not yet written.
    pub slot: SlotNumber,

    /// Timestamp of the last successful signoff (the pass start time).
    pub last_run: DateTime<Utc>,
}

/// Reads and writes per-tier clock markers in a local state directory.
///
/// Markers are mutated only by signoff, only after successful work, and
/// only once per pass per tier; the run guard excludes concurrent writers,
/// so no further locking is needed here.
pub struct ClockStore {
    dir: PathBuf,
}

impl ClockStore {
    /// Opens a store rooted at `dir`, creating the directory if needed.
    pub fn open(dir: impl Into<PathBuf>) -> io::Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(ClockStore { dir })
    }

    fn marker_path(&self, tier: &TierName) -> PathBuf {
        self.dir.join(format!("{}.json", tier.as_str()))
    }

    /// Reads a tier's record. `Ok(None)` means the tier has never run.
    ///
    /// An unreadable marker is treated as never-run too (bootstrap case);
    /// only a marker that exists and fails to parse is an error.
    pub fn read(&self, tier: &TierName) -> Result<Option<ClockRecord>> {
        let path = self.marker_path(tier);
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                warn!(tier = %tier, error = %e, "clock marker unreadable, treating as never run");
                return Ok(None);
            }
        };

        let record: ClockRecord =
            serde_json::from_slice(&bytes).map_err(|e| ClockError::Corrupt {
                tier: tier.clone(),
                reason: e.to_string(),
            })?;

        if record.schema_version != SCHEMA_VERSION {
            return Err(ClockError::Corrupt {
                tier: tier.clone(),
                reason: format!(
                    "schema version mismatch: expected {}, got {}",
                    SCHEMA_VERSION, record.schema_version
                ),
            });
        }

        Ok(Some(record))
    }

    /// Reads the records for every configured tier. Tiers that have never
    /// run are simply absent from the map.
    pub fn read_all(&self, tiers: &[Tier]) -> Result<HashMap<TierName, ClockRecord>> {
        let mut records = HashMap::new();
        for tier in tiers {
            if let Some(record) = self.read(&tier.name)? {
                records.insert(tier.name.clone(), record);
            }
        }
        Ok(records)
    }

    /// Durably records a tier's completed run.
    ///
    /// `at` is the pass start time, shared by every tier signed off in the
    /// same pass.
    pub fn write_signoff(
        &self,
        tier: &TierName,
        slot: SlotNumber,
        at: DateTime<Utc>,
    ) -> Result<()> {
        let record = ClockRecord {
            schema_version: SCHEMA_VERSION,
            slot,
            last_run: at,
        };

        let path = self.marker_path(tier);
        let tmp_path = self.dir.join(format!("{}.json.tmp", tier.as_str()));

        let json = serde_json::to_vec(&record).map_err(|e| ClockError::Corrupt {
            tier: tier.clone(),
            reason: e.to_string(),
        })?;

        let mut file = File::create(&tmp_path)?;
        file.write_all(&json)?;
        fsync_file(&file)?;
        std::fs::rename(&tmp_path, &path)?;
        fsync_dir(&self.dir)?;

        Ok(())
    }
}

/// Syncs a file's contents and metadata to disk.
fn fsync_file(file: &File) -> io::Result<()> {
    file.sync_all()
}

/// Syncs a directory to disk, ensuring the renamed marker entry survives
/// a power loss. Without this the rename may not be durable even though the
/// file contents were synced.
fn fsync_dir(dir_path: &Path) -> io::Result<()> {
    let dir = OpenOptions::new().read(true).open(dir_path)?;
    dir.sync_all()
}
