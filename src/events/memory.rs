//! In-process event bus.
//!
//! Used by tests and by embedders that already have change notifications in
//! hand. Each subscription gets its own queue; a published message is copied
//! to every subscription whose pattern matches the topic.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinSet;

use crate::events::message::ChangeMessage;
use crate::events::topic;
use crate::events::{
    dispatch, Acker, Delivery, DeliveryHandler, EventSubscriber, EventsError, EventsResult,
};
use crate::lifecycle::ShutdownSignal;

struct Envelope {
    topic: String,
    message: ChangeMessage,
    state: Arc<ReceiptState>,
}

struct Subscription {
    pattern: String,
    tx: mpsc::UnboundedSender<Envelope>,
}

#[derive(Default)]
struct ReceiptState {
    acks: AtomicUsize,
    notify: Notify,
}

/// Handle on a published message's acknowledgements.
#[derive(Clone)]
pub struct Receipt {
    state: Arc<ReceiptState>,
    delivered: usize,
}

impl Receipt {
    /// Number of subscriptions the message was queued for.
    pub fn delivered(&self) -> usize {
        self.delivered
    }

    pub fn acks(&self) -> usize {
        self.state.acks.load(Ordering::SeqCst)
    }

    pub fn is_acked(&self) -> bool {
        self.acks() > 0
    }

    /// Wait up to `timeout` for at least one acknowledgement.
    pub async fn wait_acked(&self, timeout: Duration) -> bool {
        let wait = async {
            loop {
                let notified = self.state.notify.notified();
                if self.is_acked() {
                    return;
                }
                notified.await;
            }
        };
        tokio::time::timeout(timeout, wait).await.is_ok()
    }
}

struct MemoryAcker {
    state: Arc<ReceiptState>,
    acked: AtomicBool,
}

#[async_trait]
impl Acker for MemoryAcker {
    async fn ack(&self) -> EventsResult<()> {
        if !self.acked.swap(true, Ordering::SeqCst) {
            self.state.acks.fetch_add(1, Ordering::SeqCst);
            self.state.notify.notify_waiters();
        }
        Ok(())
    }
}

/// Shared in-memory bus. Clones refer to the same bus.
#[derive(Clone, Default)]
pub struct MemoryBus {
    subscriptions: Arc<Mutex<Vec<Subscription>>>,
}

impl MemoryBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// A subscriber attached to this bus.
    pub fn subscriber(&self) -> MemorySubscriber {
        MemorySubscriber {
            bus: self.clone(),
            queues: Vec::new(),
        }
    }

    /// Publish `message` on the concrete `topic`.
    pub fn publish(&self, topic: &str, message: ChangeMessage) -> Receipt {
        let state = Arc::new(ReceiptState::default());
        let mut subscriptions = self
            .subscriptions
            .lock()
            .unwrap_or_else(|e| e.into_inner());

        subscriptions.retain(|s| !s.tx.is_closed());

        let mut delivered = 0;
        for sub in subscriptions.iter() {
            if !topic::matches(&sub.pattern, topic) {
                continue;
            }
            let envelope = Envelope {
                topic: topic.to_string(),
                message: message.clone(),
                state: state.clone(),
            };
            if sub.tx.send(envelope).is_ok() {
                delivered += 1;
            }
        }

        tracing::trace!(topic, delivered, "Published change message");
        Receipt { state, delivered }
    }

    /// Number of live subscriptions.
    pub fn subscription_count(&self) -> usize {
        let mut subscriptions = self
            .subscriptions
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        subscriptions.retain(|s| !s.tx.is_closed());
        subscriptions.len()
    }

    fn register(&self, pattern: &str) -> mpsc::UnboundedReceiver<Envelope> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscriptions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(Subscription {
                pattern: pattern.to_string(),
                tx,
            });
        rx
    }
}

/// [`EventSubscriber`] over a [`MemoryBus`].
///
/// Messages published after `subscribe` are queued until `listen` runs.
pub struct MemorySubscriber {
    bus: MemoryBus,
    queues: Vec<(String, mpsc::UnboundedReceiver<Envelope>)>,
}

#[async_trait]
impl EventSubscriber for MemorySubscriber {
    async fn subscribe(&mut self, pattern: &str) -> EventsResult<()> {
        topic::validate(pattern)?;
        let rx = self.bus.register(pattern);
        self.queues.push((pattern.to_string(), rx));
        tracing::debug!(topic = pattern, "Subscribed to memory bus topic");
        Ok(())
    }

    async fn listen(
        &mut self,
        handler: Arc<dyn DeliveryHandler>,
        shutdown: ShutdownSignal,
    ) -> EventsResult<()> {
        if self.queues.is_empty() {
            return Err(EventsError::NoSubscriptions);
        }

        let mut tasks = JoinSet::new();
        for (pattern, rx) in self.queues.drain(..) {
            tasks.spawn(listen_queue(pattern, rx, handler.clone(), shutdown.clone()));
        }

        while let Some(result) = tasks.join_next().await {
            if let Err(e) = result {
                tracing::error!(error = %e, "Memory bus listener task failed");
            }
        }

        Ok(())
    }
}

async fn listen_queue(
    pattern: String,
    mut rx: mpsc::UnboundedReceiver<Envelope>,
    handler: Arc<dyn DeliveryHandler>,
    mut shutdown: ShutdownSignal,
) {
    loop {
        tokio::select! {
            biased;
            _ = shutdown.recv() => break,
            envelope = rx.recv() => {
                let Some(envelope) = envelope else { break };
                let acker = Arc::new(MemoryAcker {
                    state: envelope.state,
                    acked: AtomicBool::new(false),
                });
                let delivery = Delivery::new(envelope.topic, envelope.message, acker);
                dispatch(handler.as_ref(), delivery).await;
            }
        }
    }

    tracing::debug!(topic = %pattern, "Memory bus listener stopped");
}
