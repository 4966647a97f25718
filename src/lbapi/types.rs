//! Desired-state types and error definitions.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A load balancer's complete desired configuration.
///
/// Ordering of ports, pools and origins is the order the API returned them in
/// and determines section and server ordering in the generated config.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadBalancer {
    /// Prefixed identifier, e.g. `loadbal-...`.
    pub id: String,
    pub name: String,
    pub ports: Vec<Port>,
}

/// A listening port and the pools serving it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Port {
    pub id: String,
    pub name: String,
    /// Kept wider than `u16` so out-of-range values surface as synthesis
    /// errors rather than decode failures.
    pub number: u32,
    pub pools: Vec<Pool>,
}

/// A named group of origins.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pool {
    pub id: String,
    pub name: String,
    pub protocol: String,
    pub origins: Vec<Origin>,
}

/// A single backend server.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Origin {
    pub id: String,
    pub name: String,
    /// IP address or hostname.
    pub target: String,
    pub port_number: u32,
    pub weight: u32,
    pub active: bool,
}

impl LoadBalancer {
    /// Total number of origins across every port and pool.
    pub fn origin_count(&self) -> usize {
        self.ports.iter().map(Port::origin_count).sum()
    }
}

impl Port {
    /// Number of origins across all pools of this port.
    pub fn origin_count(&self) -> usize {
        self.pools.iter().map(|p| p.origins.len()).sum()
    }

    /// Origins of every pool, in pool order then origin order.
    pub fn origins(&self) -> impl Iterator<Item = &Origin> {
        self.pools.iter().flat_map(|p| p.origins.iter())
    }
}

/// Errors returned by the load balancer API client.
#[derive(Debug, Error)]
pub enum LbApiError {
    /// The load balancer does not exist.
    #[error("load balancer {0} not found")]
    NotFound(String),

    /// The API rejected our credentials.
    #[error("load balancer api received unauthorized request")]
    Unauthorized,

    /// Connection, timeout or other transport failure.
    #[error("load balancer api transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Non-success HTTP status.
    #[error("load balancer api http error: status {status}: {body}")]
    Http { status: u16, body: String },

    /// The GraphQL response carried errors.
    #[error("load balancer api graphql error: {0}")]
    GraphQl(String),

    /// The response body did not match the expected shape.
    #[error("failed to decode load balancer: {0}")]
    Decode(String),

    /// Fetching an OAuth2 access token failed.
    #[error("failed to obtain access token: {0}")]
    Token(String),
}

/// Result type for load balancer API operations.
pub type LbApiResult<T> = Result<T, LbApiError>;
