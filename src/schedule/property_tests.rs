//! Property-based tests for the scheduling core.
//!
//! **Property**: the slot sequence over successive signoffs is the cycle
//! `0, 1, ..., ring_size, 0, ...` with period `ring_size + 1`, never
//! skipping or repeating out of cyclic order.
//!
//! **Property**: disabled tiers never appear in a due set.
//!
//! **Property**: due-ness is exactly `elapsed > period`, boundary exclusive.

use std::collections::HashMap;

use chrono::{TimeDelta, Utc};
use proptest::prelude::*;

use crate::clock::{ClockRecord, SCHEMA_VERSION};
use crate::schedule::{compute_due, next_slot};
use crate::types::{SlotNumber, Tier, TierName};

proptest! {
    #[test]
    fn slot_sequence_is_the_full_cycle(ring_size in 1u32..50) {
        let cycle_len = (ring_size + 1) as usize;

        let mut slot = next_slot(None, ring_size);
        let mut seen = vec![slot];
        for _ in 0..(3 * cycle_len - 1) {
            slot = next_slot(Some(slot), ring_size);
            seen.push(slot);
        }

        let expected: Vec<SlotNumber> = (0..=ring_size)
            .cycle()
            .take(3 * cycle_len)
            .map(SlotNumber)
            .collect();
        prop_assert_eq!(seen, expected);
    }

    #[test]
    fn allocated_slot_always_in_range(last in 0u32..200, ring_size in 1u32..200) {
        let slot = next_slot(Some(SlotNumber(last)), ring_size);
        prop_assert!(slot.0 <= ring_size);
    }

    #[test]
    fn disabled_tier_never_due(elapsed_secs in 0i64..100_000_000, period in 1u64..10_000_000) {
        let now = Utc::now();
        let tier = Tier::new("disabled", 0, period);

        let mut records = HashMap::new();
        records.insert(
            tier.name.clone(),
            ClockRecord {
                schema_version: SCHEMA_VERSION,
                slot: SlotNumber(0),
                last_run: now - TimeDelta::seconds(elapsed_secs),
            },
        );

        prop_assert!(compute_due(now, &records, &[tier.clone()]).is_empty());
        // Never-run is not due either.
        prop_assert!(compute_due(now, &HashMap::new(), &[tier]).is_empty());
    }

    #[test]
    fn due_iff_elapsed_strictly_exceeds_period(
        elapsed_secs in 0i64..1_000_000,
        period in 1u64..1_000_000,
    ) {
        let now = Utc::now();
        let tier = Tier::new("tier", 3, period);

        let mut records = HashMap::new();
        records.insert(
            tier.name.clone(),
            ClockRecord {
                schema_version: SCHEMA_VERSION,
                slot: SlotNumber(1),
                last_run: now - TimeDelta::seconds(elapsed_secs),
            },
        );

        let due = compute_due(now, &records, &[tier]);
        let expected = elapsed_secs > period as i64;
        prop_assert_eq!(!due.is_empty(), expected);
    }

    #[test]
    fn due_set_is_a_subset_of_enabled_tiers(
        ring_sizes in proptest::collection::vec(0u32..10, 1..6),
    ) {
        let now = Utc::now();
        let tiers: Vec<Tier> = ring_sizes
            .iter()
            .enumerate()
            .map(|(i, &ring)| Tier::new(format!("tier{i}"), ring, 3600))
            .collect();

        let due = compute_due(now, &HashMap::new(), &tiers);
        for tier in &due {
            prop_assert!(!tier.is_disabled());
        }
        let enabled = tiers.iter().filter(|t| !t.is_disabled()).count();
        prop_assert_eq!(due.len(), enabled);
    }
}

#[test]
fn slot_reoffered_when_signoff_withheld() {
    // A failed pass does not advance the record, so the same slot is
    // allocated again on the next invocation: no gap, no duplicate-skip.
    let record = Some(SlotNumber(4));
    let first = next_slot(record, 7);
    let retry = next_slot(record, 7);
    assert_eq!(first, retry);
}

#[test]
fn never_run_tier_due_then_slot_zero() {
    // A daily tier with ring_size=7 that has never run: the first run is
    // due and gets slot 0.
    let now = Utc::now();
    let daily = Tier::new("daily", 7, 86_400);

    let due = compute_due(now, &HashMap::new(), &[daily]);
    assert_eq!(due.len(), 1);
    assert_eq!(next_slot(None, 7), SlotNumber(0));
}

#[test]
fn due_tier_names_unaffected_by_other_records() {
    let now = Utc::now();
    let tiers = [Tier::new("hourly", 4, 3600), Tier::new("daily", 7, 86_400)];

    let mut records = HashMap::new();
    records.insert(
        TierName::new("daily"),
        ClockRecord {
            schema_version: SCHEMA_VERSION,
            slot: SlotNumber(2),
            last_run: now,
        },
    );

    let due = compute_due(now, &records, &tiers);
    let names: Vec<&str> = due.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, ["hourly"]);
}
