//! Startup readiness gate for the proxy control API.

use std::time::Duration;

use crate::dataplane::ProxyControl;
use crate::lifecycle::ShutdownSignal;
use crate::observability::metrics;

/// Bounded, fixed-interval probing policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadinessPolicy {
    /// Total probes before giving up. Zero is treated as one.
    pub retry_limit: u32,
    /// Sleep between failed probes.
    pub retry_interval: Duration,
}

impl Default for ReadinessPolicy {
    fn default() -> Self {
        Self {
            retry_limit: 10,
            retry_interval: Duration::from_secs(1),
        }
    }
}

/// Result of waiting for readiness.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    Ready { attempts: u32 },
    Exhausted { attempts: u32 },
    Cancelled,
}

/// Probe `proxy` until it reports ready, the budget runs out, or shutdown
/// is signalled. No sleep follows the final failed probe.
pub async fn wait_for_ready(
    proxy: &dyn ProxyControl,
    policy: &ReadinessPolicy,
    shutdown: &mut ShutdownSignal,
) -> Readiness {
    let limit = policy.retry_limit.max(1);

    for attempt in 1..=limit {
        if shutdown.is_triggered() {
            return Readiness::Cancelled;
        }

        if proxy.ready().await {
            tracing::info!(attempt, "Data Plane API is ready");
            metrics::record_proxy_ready(true);
            return Readiness::Ready { attempts: attempt };
        }

        if attempt == limit {
            break;
        }

        tracing::info!(
            attempt,
            retry_limit = limit,
            retry_interval_ms = policy.retry_interval.as_millis() as u64,
            "Waiting for Data Plane API to become ready"
        );

        tokio::select! {
            biased;
            _ = shutdown.recv() => return Readiness::Cancelled,
            _ = tokio::time::sleep(policy.retry_interval) => {}
        }
    }

    metrics::record_proxy_ready(false);
    Readiness::Exhausted { attempts: limit }
}
