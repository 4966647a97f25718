//! The reconciler: readiness, initial sync and per-notification cycles.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use tokio::sync::{watch, Mutex};

use crate::config::ManagerConfig;
use crate::dataplane::ProxyControl;
use crate::events::{Delivery, DeliveryHandler, EventSubscriber, HandlerError};
use crate::haproxy::{synthesize_with_family, BaseTemplate};
use crate::lbapi::DesiredStateSource;
use crate::lifecycle::ShutdownSignal;
use crate::observability::metrics::{self, EventOutcome};
use crate::reconcile::readiness::{wait_for_ready, Readiness, ReadinessPolicy};
use crate::reconcile::state::ReconcilerState;
use crate::reconcile::targeting::is_targeted;
use crate::reconcile::ReconcileError;

/// Static settings of one reconciler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcilerSettings {
    pub loadbalancer_id: String,
    pub base_config_path: PathBuf,
    pub address_family: String,
    pub readiness: ReadinessPolicy,
}

impl ReconcilerSettings {
    pub fn from_config(config: &ManagerConfig) -> Self {
        Self {
            loadbalancer_id: config.manager.loadbalancer_id.trim().to_string(),
            base_config_path: config.haproxy.base_config_path.clone(),
            address_family: config.haproxy.address_family.clone(),
            readiness: ReadinessPolicy {
                retry_limit: config.dataplane.retry_limit,
                retry_interval: config.dataplane.retry_interval(),
            },
        }
    }
}

/// Keeps the proxy's configuration in line with the desired state of one
/// load balancer.
pub struct Reconciler {
    settings: ReconcilerSettings,
    desired: Arc<dyn DesiredStateSource>,
    proxy: Arc<dyn ProxyControl>,
    last_applied: ArcSwapOption<String>,
    state: watch::Sender<ReconcilerState>,
    cycle: Mutex<()>,
}

impl Reconciler {
    pub fn new(
        settings: ReconcilerSettings,
        desired: Arc<dyn DesiredStateSource>,
        proxy: Arc<dyn ProxyControl>,
    ) -> Self {
        let (state, _) = watch::channel(ReconcilerState::Initializing);
        Self {
            settings,
            desired,
            proxy,
            last_applied: ArcSwapOption::empty(),
            state,
            cycle: Mutex::new(()),
        }
    }

    pub fn loadbalancer_id(&self) -> &str {
        &self.settings.loadbalancer_id
    }

    pub fn state(&self) -> ReconcilerState {
        *self.state.borrow()
    }

    /// Watch lifecycle transitions.
    pub fn watch_state(&self) -> watch::Receiver<ReconcilerState> {
        self.state.subscribe()
    }

    /// The most recently applied configuration text.
    pub fn last_applied(&self) -> Option<Arc<String>> {
        self.last_applied.load_full()
    }

    fn set_state(&self, next: ReconcilerState) {
        let previous = self.state.send_replace(next);
        if previous != next {
            tracing::debug!(from = %previous, to = %next, "Reconciler state changed");
        }
    }

    /// Drive the full lifecycle until shutdown.
    ///
    /// Returns an error only for startup failures: readiness budget exhausted,
    /// empty load balancer id, or a subscription that could not be opened.
    pub async fn run(
        self: Arc<Self>,
        subscriber: &mut dyn EventSubscriber,
        topics: &[String],
        mut shutdown: ShutdownSignal,
    ) -> Result<(), ReconcileError> {
        self.set_state(ReconcilerState::Initializing);

        match wait_for_ready(self.proxy.as_ref(), &self.settings.readiness, &mut shutdown).await {
            Readiness::Ready { .. } => {}
            Readiness::Exhausted { attempts } => {
                self.set_state(ReconcilerState::Shutdown);
                return Err(ReconcileError::NotReady { attempts });
            }
            Readiness::Cancelled => {
                self.set_state(ReconcilerState::Shutdown);
                return Ok(());
            }
        }

        self.set_state(ReconcilerState::Ready);

        if self.settings.loadbalancer_id.is_empty() {
            self.set_state(ReconcilerState::Shutdown);
            return Err(ReconcileError::Config(
                "load balancer id must not be empty".to_string(),
            ));
        }

        if let Err(e) = self.reconcile().await {
            tracing::error!(
                loadbalancer.id = %self.settings.loadbalancer_id,
                error = %e,
                "Initial reconciliation failed, continuing to listen"
            );
        }

        if shutdown.is_triggered() {
            self.set_state(ReconcilerState::Shutdown);
            return Ok(());
        }

        for topic in topics {
            if let Err(e) = subscriber.subscribe(topic).await {
                self.set_state(ReconcilerState::Shutdown);
                return Err(ReconcileError::Subscribe(e));
            }
            tracing::info!(topic = %topic, "Subscribed to change events");
        }

        self.set_state(ReconcilerState::Listening);
        tracing::info!(
            loadbalancer.id = %self.settings.loadbalancer_id,
            topics = topics.len(),
            "Listening for change events"
        );

        let handler: Arc<dyn DeliveryHandler> = self.clone();
        let result = subscriber.listen(handler, shutdown).await;

        self.set_state(ReconcilerState::Shutdown);
        result.map_err(ReconcileError::Subscribe)
    }

    /// Run one fetch → synthesize → validate → apply cycle.
    pub async fn reconcile(&self) -> Result<(), ReconcileError> {
        let id = self.settings.loadbalancer_id.as_str();
        if id.is_empty() {
            return Err(ReconcileError::Config(
                "load balancer id must not be empty".to_string(),
            ));
        }

        let _guard = self.cycle.lock().await;

        let resume_listening = self.state() == ReconcilerState::Listening;
        if resume_listening {
            self.set_state(ReconcilerState::Reconciling);
        }

        let start = Instant::now();
        let result = self.run_cycle(id).await;
        metrics::record_reconcile(result.is_ok(), start);

        if resume_listening {
            self.state.send_if_modified(|state| {
                if *state == ReconcilerState::Reconciling {
                    *state = ReconcilerState::Listening;
                    true
                } else {
                    false
                }
            });
        }

        result
    }

    async fn run_cycle(&self, id: &str) -> Result<(), ReconcileError> {
        let desired = self.desired.fetch(id).await?;
        let base = BaseTemplate::load(&self.settings.base_config_path)?;
        let config = synthesize_with_family(&base, &desired, &self.settings.address_family)?;

        self.proxy
            .validate(&config)
            .await
            .map_err(ReconcileError::Validate)?;
        self.proxy
            .apply(&config)
            .await
            .map_err(ReconcileError::Apply)?;

        tracing::info!(
            loadbalancer.id = %id,
            ports = desired.ports.len(),
            origins = desired.origin_count(),
            "Config successfully updated"
        );
        self.last_applied.store(Some(Arc::new(config)));

        Ok(())
    }

    /// Handle one notification. Dropped notifications are acknowledged as
    /// consumed; failed cycles are not.
    pub async fn process(&self, delivery: &Delivery) -> Result<EventOutcome, ReconcileError> {
        let message = delivery.message();

        let outcome = match message.kind() {
            Err(e) => {
                tracing::debug!(
                    subject_id = %message.subject_id,
                    error = %e,
                    "Ignoring change message"
                );
                EventOutcome::Ignored
            }
            Ok(_) if !is_targeted(message, &self.settings.loadbalancer_id) => {
                tracing::debug!(
                    subject_id = %message.subject_id,
                    event_type = %message.event_type,
                    "Change message not targeted at this load balancer"
                );
                EventOutcome::Untargeted
            }
            Ok(event_type) => {
                tracing::info!(
                    loadbalancer.id = %self.settings.loadbalancer_id,
                    subject_id = %message.subject_id,
                    event_type = %event_type,
                    topic = %delivery.topic(),
                    "Reconciling on change message"
                );
                self.reconcile().await?;
                EventOutcome::Reconciled
            }
        };

        delivery.ack().await.map_err(ReconcileError::Ack)?;
        Ok(outcome)
    }
}

#[async_trait]
impl DeliveryHandler for Reconciler {
    async fn handle(&self, delivery: &Delivery) -> Result<(), HandlerError> {
        match self.process(delivery).await {
            Ok(outcome) => {
                metrics::record_event(outcome);
                Ok(())
            }
            Err(e) => {
                metrics::record_event(EventOutcome::Failed);
                Err(Box::new(e))
            }
        }
    }
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("settings", &self.settings)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
