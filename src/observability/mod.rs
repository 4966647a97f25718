//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Reconciler, clients, subscribers produce:
//!     → logging.rs (structured tracing events, pretty or JSON)
//!     → metrics.rs (event, cycle and readiness counters/gauges)
//!
//! Consumers:
//!     → stdout log collection
//!     → Prometheus scrape (when enabled)
//! ```

pub mod logging;
pub mod metrics;
