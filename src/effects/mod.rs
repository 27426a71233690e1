//! Effects-as-data for remote mirror and host collaborator operations.
//!
//! This module defines effect types that describe operations without
//! executing them. This enables:
//! - Pure orchestration logic that emits effects as data
//! - Testability via mock interpreters
//! - Logging/tracing of intended transfers
//!
//! The real interpreters shell out to rsync and to configured host
//! commands; see [`rsync`] and [`hostcmd`].

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

pub mod hostcmd;
pub mod interpreter;
pub mod rsync;

pub use hostcmd::{CommandDumper, CommandInventory, HostCmdError};
pub use interpreter::{DatabaseDumper, PackageInventory, SyncInterpreter};
pub use rsync::{RsyncError, RsyncTransport};

/// A single remote-mirror operation, described as data.
///
/// Destinations and retain directories are paths relative to the remote
/// target root; the interpreter resolves them against the configured remote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "effect_type", rename_all = "snake_case")]
pub enum SyncEffect {
    /// Mirror the *contents* of a local directory into `dest` (trailing-slash
    /// semantics: the directory's contents, not the directory itself).
    ///
    /// Files the transfer is about to overwrite or delete are diverted into
    /// `retain_dir` instead of being discarded; this is how each due tier's
    /// pass siphons the changes made since last time into its numbered slot
    /// while `dest` stays the always-current mirror.
    Mirror {
        source: PathBuf,
        dest: String,
        retain_dir: Option<String>,
        /// Whether files absent from the source are removed from `dest`
        /// (diverted into `retain_dir` when one is set).
        delete_extraneous: bool,
    },

    /// Ensure every path in `dests` exists on the remote without deleting
    /// or pruning anything already there. Used to build the destination
    /// skeleton before the first transfer of a pass; the whole skeleton is
    /// staged locally and pushed in one deletion-safe sync.
    EnsureTree { dests: Vec<String> },
}

/// Outcome of a sync effect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Every path transferred.
    Complete,

    /// The transfer ran but some paths failed. The affected tier must not
    /// be signed off for this pass.
    Partial { failed_paths: Vec<String> },
}

impl SyncOutcome {
    pub fn is_complete(&self) -> bool {
        matches!(self, SyncOutcome::Complete)
    }
}
