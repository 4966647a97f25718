//! Read-only status endpoint.
//!
//! - `GET /healthz`: 200 while serving notifications, 503 otherwise
//! - `GET /status`: reconciler state as JSON
//! - `GET /config`: last applied configuration text, 404 before the first apply

pub mod handlers;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{routing::get, Router};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::lifecycle::ShutdownSignal;
use crate::reconcile::Reconciler;

use self::handlers::*;

pub fn setup_status_router(reconciler: Arc<Reconciler>) -> Router {
    Router::new()
        .route("/healthz", get(get_health))
        .route("/status", get(get_status))
        .route("/config", get(get_config))
        .layer(TraceLayer::new_for_http())
        .with_state(reconciler)
}

/// Serve the status router on `addr` until shutdown.
pub async fn serve_status(
    addr: SocketAddr,
    reconciler: Arc<Reconciler>,
    mut shutdown: ShutdownSignal,
) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(address = %listener.local_addr()?, "Status endpoint listening");

    axum::serve(listener, setup_status_router(reconciler))
        .with_graceful_shutdown(async move { shutdown.recv().await })
        .await
}
