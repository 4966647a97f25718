//! Resilience helpers.
//!
//! # Data Flow
//! ```text
//! Event gateway connection lost:
//!     → backoff.rs (exponential delay + jitter, capped)
//!     → reconnect, reset on a clean session
//! ```
//!
//! Reconciliation cycles are never retried here: a failed cycle leaves its
//! notification unacknowledged and redelivery is the bus's concern.

pub mod backoff;

pub use backoff::{calculate_backoff, Backoff};
