//! Rotating slot allocation.

use crate::types::SlotNumber;

/// Computes the next slot for a tier's ring.
///
/// A tier that has never run starts at slot 0. Afterwards the allocator
/// advances by one and wraps to 0 once the candidate *exceeds* `ring_size`,
/// so the ring cycles through `ring_size + 1` distinct slots:
///
/// ```text
/// 0, 1, 2, ..., ring_size, 0, 1, ...
/// ```
///
/// `ring_size` is configured as "number of increments to keep", but the
/// ring deliberately holds one more numbered destination than that. This is
/// defined, reproducible behavior: retained-history directories on the
/// remote are addressed by these exact numbers, so the wrap condition must
/// not be changed to `>=`.
pub fn next_slot(last: Option<SlotNumber>, ring_size: u32) -> SlotNumber {
    match last {
        None => SlotNumber(0),
        Some(SlotNumber(last)) => {
            let next = last + 1;
            if next > ring_size {
                SlotNumber(0)
            } else {
                SlotNumber(next)
            }
        }
    }
}
