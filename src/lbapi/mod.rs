//! Load balancer API (desired state) client.
//!
//! # Data Flow
//! ```text
//! Reconciler
//!     → DesiredStateSource::fetch(loadbalancer id)
//!     → client.rs (GraphQL query over reqwest, optional bearer via auth.rs)
//!     → types.rs (LoadBalancer → Ports → Pools → Origins, order preserved)
//! ```

pub mod auth;
pub mod client;
pub mod types;

use async_trait::async_trait;

pub use auth::{ClientCredentials, TokenSource};
pub use client::LbApiClient;
pub use types::{LbApiError, LbApiResult, LoadBalancer, Origin, Pool, Port};

/// Source of a load balancer's desired state.
#[async_trait]
pub trait DesiredStateSource: Send + Sync {
    /// Fetch the complete desired state of one load balancer.
    ///
    /// Must return [`LbApiError::NotFound`] for unknown ids so callers can tell
    /// it apart from transport failures.
    async fn fetch(&self, id: &str) -> LbApiResult<LoadBalancer>;
}
