//! The rotation engine: one scheduled pass per invocation.
//!
//! Control flow: run guard → due calculation → (slot allocation + transfer
//! orchestration per due tier) → signoff. Data flows one way: persisted
//! clock state → due set → slot numbers → transfer destinations → new
//! clock state.

use std::collections::HashMap;
use std::io;
use std::path::Path;

use chrono::Utc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::clock::{ClockError, ClockStore};
use crate::config::Config;
use crate::effects::{
    CommandDumper, CommandInventory, DatabaseDumper, PackageInventory, RsyncTransport,
};
use crate::guard::RunGuard;
use crate::schedule::{compute_due, next_slot};
use crate::types::{RunContext, SlotNumber, TierName};

pub mod pass;
pub mod scratch;
pub mod signoff;


pub use pass::{Orchestrator, PairFailure, PassResult};
pub use scratch::ScratchFiles;
pub use signoff::sign_off;

/// Default staging file name for the database dump ride-along.
const DEFAULT_DUMP_FILE: &str = "database.dump";

/// Default staging file name for the package inventory ride-along.
const DEFAULT_INVENTORY_FILE: &str = "packages.txt";

/// Errors that abort the whole invocation.
///
/// Per-pair transfer failures never abort a pass; only corrupt clock state
/// and IO failures around the engine's own bookkeeping do.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Clock marker error (corrupt state is fatal).
    #[error("clock state error: {0}")]
    Clock(#[from] ClockError),

    /// IO error during engine bookkeeping.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;

/// What an invocation did.
#[derive(Debug)]
pub enum InvocationOutcome {
    /// Another pass holds the run lock; nothing was done. Benign.
    AlreadyRunning,

    /// No tier's retention window has elapsed; nothing was done.
    NothingDue,

    /// Dry run: the due set and allocated slots, with no transfers and no
    /// signoffs.
    Planned { due: Vec<(TierName, SlotNumber)> },

    /// A pass ran to completion (possibly with per-tier failures).
    Completed {
        signed_off: Vec<TierName>,
        attempted: u32,
        failures: usize,
    },
}

/// Runs one scheduled pass.
pub fn run_invocation(config: &Config, dry_run: bool) -> Result<InvocationOutcome> {
    let Some(_guard) = RunGuard::acquire(&config.lock_path())? else {
        info!("another pass is already running, skipping");
        return Ok(InvocationOutcome::AlreadyRunning);
    };

    let store = ClockStore::open(&config.state_dir)?;
    let tiers = config.tiers();
    let started_at = Utc::now();

    let records = store.read_all(&tiers)?;
    let due = compute_due(started_at, &records, &tiers);
    if due.is_empty() {
        debug!("no tiers due");
        return Ok(InvocationOutcome::NothingDue);
    }

    let slots: HashMap<TierName, SlotNumber> = due
        .iter()
        .map(|tier| {
            let last = records.get(&tier.name).map(|r| r.slot);
            (tier.name.clone(), next_slot(last, tier.ring_size))
        })
        .collect();

    let ctx = RunContext {
        started_at,
        due,
        slots,
    };
    for tier in &ctx.due {
        info!(tier = %tier.name, slot = %ctx.slot_for(&tier.name), "due");
    }

    if dry_run {
        return Ok(InvocationOutcome::Planned {
            due: ctx
                .due
                .iter()
                .map(|t| (t.name.clone(), ctx.slot_for(&t.name)))
                .collect(),
        });
    }

    std::fs::create_dir_all(&config.staging_dir)?;
    collect_ride_alongs(config);

    // Scratch files are removed on drop, on every exit path below.
    let scratch = ScratchFiles::materialize(
        &config.staging_dir,
        &config.excludes,
        config.auth_secret.as_deref(),
    )?;

    let transport = RsyncTransport::new(
        &config.remote,
        config.state_dir.join("skeleton"),
        Some(scratch.exclude_file().to_path_buf()),
        scratch.password_file().map(Path::to_path_buf),
    );

    let sources = config.backup_sources();
    let orchestrator = Orchestrator::new(&transport, &sources);
    let result = orchestrator.run_pass(&ctx);

    let signed_off = sign_off(&store, &ctx, &result)?;

    info!(
        signed_off = signed_off.len(),
        attempted = result.attempted,
        failures = result.failures.len(),
        "pass complete"
    );

    Ok(InvocationOutcome::Completed {
        signed_off,
        attempted: result.attempted,
        failures: result.failures.len(),
    })
}

/// Captures the database dump and package inventory into the staging
/// directory, so they ride the mirror like any other file.
///
/// An unconfigured collaborator is skipped with a notice; a failing one is
/// a warning. Neither ever fails a tier.
fn collect_ride_alongs(config: &Config) {
    match &config.database {
        Some(db) => {
            let file = db.file.as_deref().unwrap_or(DEFAULT_DUMP_FILE);
            let dumper = CommandDumper::new(db.command.clone());
            match dumper.dump() {
                Ok(bytes) => write_ride_along(config, file, &bytes),
                Err(e) => warn!(error = %e, "database dump unavailable, continuing without it"),
            }
        }
        None => debug!("database backup not configured, skipping"),
    }

    match &config.inventory {
        Some(inv) => {
            let file = inv.file.as_deref().unwrap_or(DEFAULT_INVENTORY_FILE);
            let inventory = CommandInventory::new(inv.command.clone());
            match inventory.list() {
                Ok(text) => write_ride_along(config, file, text.as_bytes()),
                Err(e) => {
                    warn!(error = %e, "package inventory unavailable, continuing without it")
                }
            }
        }
        None => debug!("package inventory not configured, skipping"),
    }
}

fn write_ride_along(config: &Config, file: &str, bytes: &[u8]) {
    let path = config.staging_dir.join(file);
    match std::fs::write(&path, bytes) {
        Ok(()) => debug!(path = %path.display(), bytes = bytes.len(), "staged ride-along"),
        Err(e) => warn!(path = %path.display(), error = %e, "failed to stage ride-along"),
    }
}
