//! Single-instance guard via an advisory file lock.
//!
//! At most one pass may be active at a time. The guard takes an exclusive
//! lock on `<state_dir>/ringmirror.lock` once, at the very start, before
//! any state is read; it is not re-checked mid-run. A second invocation
//! finding the lock held exits silently with no side effects: that is a
//! benign skip, not an error.
//!
//! The lock is advisory and released automatically when the process exits,
//! so a killed pass never leaves a stale lock behind.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use fs2::FileExt;
use tracing::debug;

/// Holds the single-instance lock for the lifetime of a pass.
///
/// Dropping the guard (or exiting the process) releases the lock.
#[derive(Debug)]
pub struct RunGuard {
    // Held only for its lock; released on drop.
    _file: File,
    path: PathBuf,
}

impl RunGuard {
    /// Tries to acquire the lock.
    ///
    /// Returns `Ok(None)` when another invocation already holds it; the
    /// caller must exit without side effects. Any other failure to create
    /// or lock the file is an IO error.
    pub fn acquire(path: &Path) -> io::Result<Option<RunGuard>> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new().create(true).write(true).open(path)?;

        match file.try_lock_exclusive() {
            Ok(()) => {
                debug!(path = %path.display(), "acquired run lock");
                Ok(Some(RunGuard {
                    _file: file,
                    path: path.to_path_buf(),
                }))
            }
            Err(e) if e.raw_os_error() == fs2::lock_contended_error().raw_os_error() => {
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// The lock file path, for logging.
    pub fn path(&self) -> &Path {
        &self.path
    }
}
