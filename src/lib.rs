//! HAProxy load balancer manager.
//!
//! Keeps one HAProxy instance's configuration in sync with the desired state
//! of one load balancer, driven by change notifications.

// Core
pub mod dataplane;
pub mod events;
pub mod haproxy;
pub mod lbapi;
pub mod reconcile;

// Cross-cutting concerns
pub mod admin;
pub mod cli;
pub mod config;
pub mod lifecycle;
pub mod observability;
pub mod resilience;

pub use config::ManagerConfig;
pub use lifecycle::Shutdown;
pub use reconcile::{ReconcileError, Reconciler, ReconcilerSettings, ReconcilerState};
