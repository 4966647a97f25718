//! Metrics collection and exposition.
//!
//! # Metrics
//! - `lbmanager_events_total` (counter): notifications by outcome
//!   (`reconciled`, `failed`, `untargeted`, `ignored`)
//! - `lbmanager_reconcile_total` (counter): cycles by result (`success`, `error`)
//! - `lbmanager_reconcile_duration_seconds` (histogram): cycle latency
//! - `lbmanager_proxy_ready` (gauge): 1 once the Data Plane API answered
//!
//! Recording is a no-op until a recorder is installed.

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter listening on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), metrics_exporter_prometheus::BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

/// Outcome of one delivered notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    Reconciled,
    Failed,
    Untargeted,
    Ignored,
}

impl EventOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventOutcome::Reconciled => "reconciled",
            EventOutcome::Failed => "failed",
            EventOutcome::Untargeted => "untargeted",
            EventOutcome::Ignored => "ignored",
        }
    }
}

pub fn record_event(outcome: EventOutcome) {
    counter!("lbmanager_events_total", "outcome" => outcome.as_str()).increment(1);
}

pub fn record_reconcile(success: bool, start: Instant) {
    let result = if success { "success" } else { "error" };
    counter!("lbmanager_reconcile_total", "result" => result).increment(1);
    histogram!("lbmanager_reconcile_duration_seconds").record(start.elapsed().as_secs_f64());
}

pub fn record_proxy_ready(ready: bool) {
    gauge!("lbmanager_proxy_ready").set(if ready { 1.0 } else { 0.0 });
}
