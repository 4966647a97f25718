use std::sync::Arc;

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

use crate::reconcile::{Reconciler, ReconcilerState};

#[derive(Debug, Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub state: ReconcilerState,
    pub loadbalancer_id: String,
    pub has_applied_config: bool,
}

pub async fn get_health(State(reconciler): State<Arc<Reconciler>>) -> (StatusCode, &'static str) {
    let state = reconciler.state();
    if state.is_serving() {
        (StatusCode::OK, state.as_str())
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, state.as_str())
    }
}

pub async fn get_status(State(reconciler): State<Arc<Reconciler>>) -> Json<SystemStatus> {
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        state: reconciler.state(),
        loadbalancer_id: reconciler.loadbalancer_id().to_string(),
        has_applied_config: reconciler.last_applied().is_some(),
    })
}

pub async fn get_config(
    State(reconciler): State<Arc<Reconciler>>,
) -> Result<String, StatusCode> {
    reconciler
        .last_applied()
        .map(|config| config.as_str().to_string())
        .ok_or(StatusCode::NOT_FOUND)
}
