//! Reconciliation engine.
//!
//! # Data Flow
//! ```text
//! run():
//!     Initializing → wait_for_ready (bounded probes)
//!     Ready        → initial unconditional cycle (failure logged only)
//!     Listening    → subscribe topics, listen
//!
//! per delivery (DeliveryHandler):
//!     event type create|update|delete?  no → drop (debug), ack
//!     is_targeted(managed id)?          no → drop (debug), ack
//!     Reconciling → fetch → synthesize → validate → apply → ack
//!                   any failure → message left unacknowledged
//! ```
//!
//! Cycles are serialized: at most one synthesize/apply is in flight.

pub mod readiness;
pub mod reconciler;
pub mod state;
pub mod targeting;

use thiserror::Error;

use crate::dataplane::DataPlaneError;
use crate::events::EventsError;
use crate::haproxy::{SynthesisError, TemplateError};
use crate::lbapi::LbApiError;

pub use readiness::{wait_for_ready, Readiness, ReadinessPolicy};
pub use reconciler::{Reconciler, ReconcilerSettings};
pub use state::ReconcilerState;
pub use targeting::is_targeted;

/// Failures of the reconciler, classified by how the process reacts.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// Missing or invalid settings. Fatal at startup.
    #[error("invalid reconciler configuration: {0}")]
    Config(String),

    /// The proxy control API never became ready. Fatal at startup.
    #[error("dataplane api not ready after {attempts} attempts")]
    NotReady { attempts: u32 },

    /// Subscribing to or listening on the event bus failed.
    #[error("event subscription failed: {0}")]
    Subscribe(#[source] EventsError),

    #[error("failed to fetch desired state: {0}")]
    Fetch(#[from] LbApiError),

    #[error("failed to load base config template: {0}")]
    Template(#[from] TemplateError),

    #[error("failed to synthesize config: {0}")]
    Synthesis(#[from] SynthesisError),

    #[error("config rejected by validation: {0}")]
    Validate(#[source] DataPlaneError),

    #[error("failed to apply config: {0}")]
    Apply(#[source] DataPlaneError),

    #[error("failed to acknowledge message: {0}")]
    Ack(#[source] EventsError),
}

impl ReconcileError {
    /// Whether the process must exit.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ReconcileError::Config(_) | ReconcileError::NotReady { .. } | ReconcileError::Subscribe(_)
        )
    }
}
