//! Reconciler lifecycle states.

use std::fmt;

use serde::Serialize;

/// Observable lifecycle of the reconciler.
///
/// `Initializing → Ready → Listening ⇄ Reconciling`, with `Shutdown`
/// reachable from any state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReconcilerState {
    /// Waiting for the proxy control API.
    Initializing,
    /// Proxy answered; initial cycle pending.
    Ready,
    /// Subscribed and waiting for notifications.
    Listening,
    /// A cycle is in flight.
    Reconciling,
    Shutdown,
}

impl ReconcilerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReconcilerState::Initializing => "initializing",
            ReconcilerState::Ready => "ready",
            ReconcilerState::Listening => "listening",
            ReconcilerState::Reconciling => "reconciling",
            ReconcilerState::Shutdown => "shutdown",
        }
    }

    /// Whether the manager is serving notifications.
    pub fn is_serving(&self) -> bool {
        matches!(self, ReconcilerState::Listening | ReconcilerState::Reconciling)
    }
}

impl fmt::Display for ReconcilerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
