//! Due-calculation and slot allocation for the rotation rings.
//!
//! Both operations are pure functions over a snapshot of the clock records
//! read at pass start, so the scheduling logic is testable without touching
//! the filesystem or a transport.

pub mod due;
pub mod slot;

#[cfg(test)]
mod property_tests;

pub use due::compute_due;
pub use slot::next_slot;
