//! HAProxy load balancer manager.
//!
//! ```text
//!   event gateway ──change messages──▶ ┌────────────────────────────┐
//!                                      │        reconciler          │
//!   load balancer API ◀──fetch──────── │ target → synthesize →      │
//!                                      │ validate → apply → ack     │
//!   base haproxy.cfg ──read──────────▶ │                            │
//!                                      └─────────────┬──────────────┘
//!                                                    │ raw config
//!                                                    ▼
//!                                          HAProxy Data Plane API
//! ```

use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use url::Url;

use haproxy_lb_manager::admin;
use haproxy_lb_manager::cli::Cli;
use haproxy_lb_manager::config::{load_config, validate_config, ManagerConfig};
use haproxy_lb_manager::dataplane::{Credentials, DataPlaneClient};
use haproxy_lb_manager::events::WsSubscriber;
use haproxy_lb_manager::lbapi::{ClientCredentials, LbApiClient, TokenSource};
use haproxy_lb_manager::lifecycle::{signals, Shutdown};
use haproxy_lb_manager::observability::{logging, metrics};
use haproxy_lb_manager::reconcile::{Reconciler, ReconcilerSettings};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => match load_config(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("haproxy-lb-manager: {e}");
                return ExitCode::FAILURE;
            }
        },
        None => ManagerConfig::default(),
    };
    cli.apply(&mut config);

    if let Err(e) = logging::init(&config.observability) {
        eprintln!("haproxy-lb-manager: failed to initialize logging: {e}");
    }

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "haproxy-lb-manager starting");

    if let Err(errors) = validate_config(&config) {
        for error in &errors {
            tracing::error!(error = %error, "Invalid configuration");
        }
        return ExitCode::FAILURE;
    }

    match run(config).await {
        Ok(()) => {
            tracing::info!("Shutdown complete");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "Manager exited with error");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: ManagerConfig) -> Result<(), BoxError> {
    tracing::info!(
        loadbalancer.id = %config.manager.loadbalancer_id,
        base_config = %config.haproxy.base_config_path.display(),
        dataplane_url = %config.dataplane.url,
        lbapi_url = %config.lbapi.url,
        events_url = %config.events.url,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        let addr: SocketAddr = config.observability.metrics_address.parse()?;
        metrics::init_metrics(addr)?;
    }

    let dataplane = DataPlaneClient::new(
        Url::parse(&config.dataplane.url)?,
        Credentials {
            username: config.dataplane.username.clone(),
            password: config.dataplane.password.clone(),
        },
        config.dataplane.timeout(),
    )?;

    let mut lbapi = LbApiClient::new(Url::parse(&config.lbapi.url)?, config.lbapi.timeout())?;
    if let Some(oauth) = &config.lbapi.oauth {
        let http = reqwest::Client::builder()
            .timeout(config.lbapi.timeout())
            .build()?;
        let tokens = TokenSource::new(
            http,
            ClientCredentials {
                client_id: oauth.client_id.clone(),
                client_secret: oauth.client_secret.clone(),
                token_url: Url::parse(&oauth.token_url)?,
            },
        );
        lbapi = lbapi.with_token_source(Arc::new(tokens));
    }

    let reconciler = Arc::new(Reconciler::new(
        ReconcilerSettings::from_config(&config),
        Arc::new(lbapi),
        Arc::new(dataplane),
    ));

    let shutdown = Shutdown::new();
    signals::spawn_signal_handler(shutdown.clone());

    let status = if config.observability.status_enabled {
        let addr: SocketAddr = config.observability.status_address.parse()?;
        let reconciler = reconciler.clone();
        let signal = shutdown.subscribe();
        Some(tokio::spawn(async move {
            if let Err(e) = admin::serve_status(addr, reconciler, signal).await {
                tracing::error!(error = %e, "Status endpoint failed");
            }
        }))
    } else {
        None
    };

    let mut subscriber = WsSubscriber::new(Url::parse(&config.events.url)?);
    let topics = config.events.prefixed_topics();

    let result = reconciler
        .run(&mut subscriber, &topics, shutdown.subscribe())
        .await;

    shutdown.trigger();
    if let Some(status) = status {
        let _ = status.await;
    }

    result.map_err(Into::into)
}
