//! ringmirror - a rotating multi-tier incremental backup mirror.
//!
//! This library provides the retention/rotation scheduling engine: deciding
//! which tiers are due on each invocation, allocating rotating slots,
//! orchestrating transfers, and durably signing off completed tiers.

pub mod clock;
pub mod config;
pub mod effects;
pub mod engine;
pub mod guard;
pub mod schedule;
pub mod types;
