//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Shutdown::trigger()
//!
//! Shutdown (shutdown.rs):
//!     trigger() → readiness loop stops waiting
//!               → event listeners stop receiving
//!               → in-flight reconciliation finishes, then exit
//! ```
//!
//! Cancellation is observed at loop boundaries only; no network call is
//! interrupted midway.

pub mod shutdown;
pub mod signals;

pub use shutdown::{Shutdown, ShutdownSignal};
