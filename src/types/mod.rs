//! Newtype wrappers and core domain types for the rotation engine.
//!
//! These types prevent accidental mixing of different values (e.g., using a
//! raw integer where a SlotNumber is expected) and make the code more
//! self-documenting.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The name of a retention tier (e.g. "daily").
///
/// The tier set is configuration-driven; hourly/daily/weekly/monthly/yearly
/// are the conventional values, not a closed enum.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TierName(pub String);

impl TierName {
    pub fn new(s: impl Into<String>) -> Self {
        TierName(s.into())
    }

    /// Returns the name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TierName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for TierName {
    fn from(s: &str) -> Self {
        TierName(s.to_string())
    }
}

impl From<String> for TierName {
    fn from(s: String) -> Self {
        TierName(s)
    }
}

/// A numbered slot within a tier's rotation ring.
///
/// Valid slots for a tier with ring size `N` are `0..=N` inclusive; see
/// [`crate::schedule::slot::next_slot`] for the wrap rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SlotNumber(pub u32);

impl fmt::Display for SlotNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for SlotNumber {
    fn from(n: u32) -> Self {
        SlotNumber(n)
    }
}

/// A retention tier: a named cadence with a bounded rotation ring.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tier {
    pub name: TierName,

    /// The highest slot number in the tier's ring. The ring cycles through
    /// `ring_size + 1` numbered slots (`0..=ring_size`). Zero disables the
    /// tier entirely: it is never due, regardless of elapsed time.
    pub ring_size: u32,

    /// Minimum number of seconds that must elapse after a signoff before the
    /// tier is due again. The boundary is exclusive: exactly `period_secs`
    /// elapsed is not yet due.
    pub period_secs: u64,
}

impl Tier {
    pub fn new(name: impl Into<TierName>, ring_size: u32, period_secs: u64) -> Self {
        Tier {
            name: name.into(),
            ring_size,
            period_secs,
        }
    }

    /// A tier with ring size zero is configured but switched off.
    pub fn is_disabled(&self) -> bool {
        self.ring_size == 0
    }
}

/// A directory configured for mirroring.
///
/// The destination name is the source path flattened to a single-level
/// identifier, so that `/var/mail` and `/var/spool` land in sibling remote
/// directories instead of a nested tree whose levels could collide.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupSource {
    /// Absolute local path to mirror.
    pub path: PathBuf,

    /// Single-level remote directory name derived from `path`.
    pub dest_name: String,
}

impl BackupSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let dest_name = flatten_path(&path);
        BackupSource { path, dest_name }
    }
}

/// Collapses a path to a single-level identifier: components joined by `_`,
/// leading separator dropped. The filesystem root itself flattens to "root".
fn flatten_path(path: &Path) -> String {
    let parts: Vec<String> = path
        .components()
        .filter_map(|c| match c {
            std::path::Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();

    if parts.is_empty() {
        "root".to_string()
    } else {
        parts.join("_")
    }
}

/// Ephemeral per-invocation context.
///
/// `started_at` is captured once, before any transfer, and is the timestamp
/// recorded by every signoff of the pass. All tiers signed off in one pass
/// therefore share an identical recorded time, so a slow transfer cannot
/// shift subsequent due-calculations.
#[derive(Debug, Clone)]
pub struct RunContext {
    /// When the pass began. Used for every signoff in the pass.
    pub started_at: DateTime<Utc>,

    /// The tiers computed as due at pass start.
    pub due: Vec<Tier>,

    /// The slot allocated for each due tier, computed once and reused for
    /// every source in that tier, so one pass writes all sources into the
    /// same numbered slot.
    pub slots: HashMap<TierName, SlotNumber>,
}

impl RunContext {
    /// Returns the slot allocated for a due tier.
    ///
    /// # Panics
    ///
    /// Panics if `name` is not in the due set; the context is constructed
    /// with a slot for every due tier.
    pub fn slot_for(&self, name: &TierName) -> SlotNumber {
        self.slots[name]
    }
}
