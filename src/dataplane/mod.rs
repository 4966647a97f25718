//! HAProxy Data Plane API (proxy control) client.
//!
//! # Data Flow
//! ```text
//! Reconciler
//!     → ProxyControl::ready()     (startup gate)
//!     → ProxyControl::validate()  (only_validate=true, nothing applied)
//!     → ProxyControl::apply()     (raw configuration replace + reload)
//! ```
//!
//! Applying identical text twice leaves the proxy unchanged.

pub mod client;

use async_trait::async_trait;
use thiserror::Error;

pub use client::{Credentials, DataPlaneClient};

/// Errors returned by the proxy control API.
#[derive(Debug, Error)]
pub enum DataPlaneError {
    /// The proxy rejected the candidate configuration.
    #[error("dataplane api rejected configuration: {0}")]
    Rejected(String),

    #[error("dataplane api received unauthorized request")]
    Unauthorized,

    /// Non-success status not covered above.
    #[error("dataplane api http error: status {status}: {body}")]
    Http { status: u16, body: String },

    #[error("dataplane api transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("invalid dataplane api url: {0}")]
    InvalidUrl(String),
}

/// Result type for proxy control operations.
pub type DataPlaneResult<T> = Result<T, DataPlaneError>;

/// Control surface of the managed proxy.
#[async_trait]
pub trait ProxyControl: Send + Sync {
    /// Whether the control API is up and answering.
    async fn ready(&self) -> bool;

    /// Check `config` without applying it.
    async fn validate(&self, config: &str) -> DataPlaneResult<()>;

    /// Replace the running configuration with `config`.
    async fn apply(&self, config: &str) -> DataPlaneResult<()>;
}
