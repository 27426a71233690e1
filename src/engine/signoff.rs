//! Durable signoff after a successful pass.
//!
//! A tier's clock marker is advanced only after every one of its transfers
//! succeeded. The recorded timestamp is the pass's single captured start
//! time for all tiers, so a slow pass cannot silently shorten the next
//! interval's window, and tiers signed off together share an identical
//! recorded time.
//!
//! A tier with any failure keeps its old marker untouched: the same slot
//! is re-offered on the next invocation, so a failed attempt leaves no gap
//! in the ring and skips no interval.

use tracing::{info, warn};

use crate::clock::{ClockStore, Result};
use crate::engine::pass::PassResult;
use crate::types::{RunContext, TierName};

/// Signs off every due tier that had zero transfer failures.
///
/// Returns the names of the tiers signed off.
pub fn sign_off(
    store: &ClockStore,
    ctx: &RunContext,
    result: &PassResult,
) -> Result<Vec<TierName>> {
    let mut signed_off = Vec::new();

    for tier in &ctx.due {
        if result.tier_clean(&tier.name) {
            let slot = ctx.slot_for(&tier.name);
            store.write_signoff(&tier.name, slot, ctx.started_at)?;
            info!(tier = %tier.name, slot = %slot, "signed off");
            signed_off.push(tier.name.clone());
        } else {
            warn!(
                tier = %tier.name,
                "transfer failures this pass, withholding signoff; slot will be re-offered"
            );
        }
    }

    Ok(signed_off)
}
