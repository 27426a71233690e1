//! The transfer orchestration pass.
//!
//! For every due tier and every configured source, the orchestrator emits a
//! mirror transfer whose superseded files are diverted into the tier's slot
//! directory. Before the first transfer the remote directory skeleton is
//! built with the deletion-safe sync variant, so preparation can never
//! prune existing remote content.
//!
//! # Failure isolation
//!
//! A failure for one (tier, source) pair is logged and the pass continues
//! to other pairs; the affected tier is recorded in the result so signoff
//! is withheld for it. Only that tier loses its signoff, never the whole
//! run.

use std::fmt;
use std::path::PathBuf;

use tracing::{debug, info, warn};

use crate::effects::{SyncEffect, SyncInterpreter, SyncOutcome};
use crate::types::{BackupSource, RunContext, SlotNumber, Tier, TierName};

/// One failed (tier, source) transfer.
#[derive(Debug, Clone)]
pub struct PairFailure {
    pub tier: TierName,
    pub source: PathBuf,
    pub reason: String,
}

/// Accounting for a single pass.
#[derive(Debug, Default)]
pub struct PassResult {
    /// Number of mirror transfers attempted.
    pub attempted: u32,

    /// Per-pair failures. A tier appearing here must not be signed off.
    pub failures: Vec<PairFailure>,
}

impl PassResult {
    /// True when the tier had zero transfer failures across all sources.
    pub fn tier_clean(&self, name: &TierName) -> bool {
        !self.failures.iter().any(|f| &f.tier == name)
    }

    fn record(&mut self, tier: &TierName, source: &BackupSource, reason: String) {
        warn!(tier = %tier, source = %source.path.display(), %reason, "transfer failed");
        self.failures.push(PairFailure {
            tier: tier.clone(),
            source: source.path.clone(),
            reason,
        });
    }
}

/// Drives the per-pass transfer loop against an injected sync interpreter.
pub struct Orchestrator<'a, S> {
    transport: &'a S,
    sources: &'a [BackupSource],
}

impl<'a, S> Orchestrator<'a, S>
where
    S: SyncInterpreter,
    S::Error: fmt::Display,
{
    pub fn new(transport: &'a S, sources: &'a [BackupSource]) -> Self {
        Orchestrator { transport, sources }
    }

    /// Runs the full transfer loop for the pass.
    ///
    /// Tiers are independent; the iteration order is configuration order
    /// for log readability, not a semantic requirement.
    pub fn run_pass(&self, ctx: &RunContext) -> PassResult {
        let mut result = PassResult::default();

        // The skeleton is prepared in one deletion-safe sync. If that
        // fails, every transfer of the pass would fail against the missing
        // tree, so all pairs are recorded as failed and nothing is mirrored.
        if !self.prepare_skeleton(ctx, &mut result) {
            return result;
        }

        for tier in &ctx.due {
            let slot = ctx.slot_for(&tier.name);
            info!(tier = %tier.name, slot = %slot, sources = self.sources.len(), "transferring");

            for source in self.sources {
                result.attempted += 1;
                let effect = SyncEffect::Mirror {
                    source: source.path.clone(),
                    dest: current_dest(source),
                    retain_dir: Some(retain_dest(tier, slot, source)),
                    delete_extraneous: true,
                };

                match self.transport.interpret(effect) {
                    Ok(SyncOutcome::Complete) => {
                        debug!(tier = %tier.name, source = %source.path.display(), "transferred");
                    }
                    Ok(SyncOutcome::Partial { failed_paths }) => {
                        result.record(
                            &tier.name,
                            source,
                            format!("{} paths failed to transfer", failed_paths.len()),
                        );
                    }
                    Err(e) => {
                        result.record(&tier.name, source, e.to_string());
                    }
                }
            }
        }

        result
    }

    /// Ensures the destination skeleton exists before the first transfer:
    /// the current mirror location for every source, plus each due tier's
    /// slot directory for every source, pushed in a single deletion-safe
    /// sync.
    ///
    /// Returns false when preparation failed; the failure is recorded
    /// against every (tier, source) pair of the pass.
    fn prepare_skeleton(&self, ctx: &RunContext, result: &mut PassResult) -> bool {
        let mut dests: Vec<String> =
            self.sources.iter().map(current_dest).collect();
        for tier in &ctx.due {
            let slot = ctx.slot_for(&tier.name);
            for source in self.sources {
                dests.push(retain_dest(tier, slot, source));
            }
        }

        let reason = match self.transport.interpret(SyncEffect::EnsureTree { dests }) {
            Ok(SyncOutcome::Complete) => return true,
            Ok(SyncOutcome::Partial { .. }) => "skeleton preparation incomplete".to_string(),
            Err(e) => format!("skeleton preparation failed: {e}"),
        };

        for tier in &ctx.due {
            for source in self.sources {
                result.record(&tier.name, source, reason.clone());
            }
        }
        false
    }
}

/// The always-current mirror location for a source.
fn current_dest(source: &BackupSource) -> String {
    format!("current/{}", source.dest_name)
}

/// The slot-specific retain directory for a (tier, source) pair.
fn retain_dest(tier: &Tier, slot: SlotNumber, source: &BackupSource) -> String {
    format!("{}/{}/{}", tier.name, slot, source.dest_name)
}
