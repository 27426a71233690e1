//! Determines which tiers' retention windows have elapsed.

use std::collections::HashMap;

use chrono::{DateTime, TimeDelta, Utc};

use crate::clock::ClockRecord;
use crate::types::{Tier, TierName};

/// Computes the set of tiers due at `now`, in configuration order.
///
/// A tier is due iff its elapsed time since the last signoff is *strictly*
/// greater than its period; a tier exactly at the boundary is not yet due,
/// which avoids rapid re-triggering under a fast-repeating invoker. A tier
/// that has never run is always due. Disabled tiers (`ring_size == 0`) are
/// never due, even if a period is configured, so an operator can switch a
/// tier off without deleting its configuration.
pub fn compute_due(
    now: DateTime<Utc>,
    records: &HashMap<TierName, ClockRecord>,
    tiers: &[Tier],
) -> Vec<Tier> {
    tiers
        .iter()
        .filter(|tier| !tier.is_disabled())
        .filter(|tier| match records.get(&tier.name) {
            None => true,
            Some(record) => {
                // A period too large to represent can never elapse. Config
                // validation rejects such values; this keeps the function
                // total for arbitrary tiers.
                let period = i64::try_from(tier.period_secs)
                    .ok()
                    .and_then(TimeDelta::try_seconds);
                match period {
                    Some(period) => now - record.last_run > period,
                    None => false,
                }
            }
        })
        .cloned()
        .collect()
}
