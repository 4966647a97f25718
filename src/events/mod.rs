//! Change-notification subscription.
//!
//! # Data Flow
//! ```text
//! EventSubscriber::subscribe(topic)   (once per configured topic)
//! EventSubscriber::listen(handler)
//!     → one listener task per topic
//!     → ChangeMessage decoded into a Delivery
//!     → DeliveryHandler::handle(&delivery)
//!         Ok  → handler has acknowledged via Delivery::ack()
//!         Err → logged, message left unacknowledged for redelivery
//! ```
//!
//! Transports:
//! - websocket.rs: event gateway over WebSocket, one connection per topic
//! - memory.rs: in-process bus with NATS-style wildcard topics

pub mod memory;
pub mod message;
pub mod topic;
pub mod websocket;

use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::lifecycle::ShutdownSignal;

pub use memory::{MemoryBus, MemorySubscriber, Receipt};
pub use message::{ChangeMessage, EventType, UnknownEventType};
pub use websocket::WsSubscriber;

/// Errors raised by event subscribers.
#[derive(Debug, Error)]
pub enum EventsError {
    #[error("listen called without any subscribed topic")]
    NoSubscriptions,

    #[error("invalid topic: {0:?}")]
    InvalidTopic(String),

    #[error("failed to decode change message: {0}")]
    Decode(String),

    #[error("event gateway connection error: {0}")]
    Connection(String),

    #[error("event gateway closed the subscription: {0}")]
    Closed(String),

    #[error("failed to acknowledge message: {0}")]
    Ack(String),
}

pub type EventsResult<T> = Result<T, EventsError>;

/// Error type returned by delivery handlers.
pub type HandlerError = Box<dyn StdError + Send + Sync>;

/// Transport-specific acknowledgement of one delivery.
#[async_trait]
pub trait Acker: Send + Sync {
    async fn ack(&self) -> EventsResult<()>;
}

/// One change notification delivered on a topic.
pub struct Delivery {
    topic: String,
    message: ChangeMessage,
    acker: Arc<dyn Acker>,
}

impl Delivery {
    pub fn new(topic: impl Into<String>, message: ChangeMessage, acker: Arc<dyn Acker>) -> Self {
        Self {
            topic: topic.into(),
            message,
            acker,
        }
    }

    /// Concrete topic the message arrived on.
    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn message(&self) -> &ChangeMessage {
        &self.message
    }

    /// Acknowledge the message to the bus.
    pub async fn ack(&self) -> EventsResult<()> {
        self.acker.ack().await
    }
}

impl fmt::Debug for Delivery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Delivery")
            .field("topic", &self.topic)
            .field("message", &self.message)
            .finish_non_exhaustive()
    }
}

/// Receiver of deliveries. Responsible for acknowledging on success.
#[async_trait]
pub trait DeliveryHandler: Send + Sync {
    async fn handle(&self, delivery: &Delivery) -> Result<(), HandlerError>;
}

/// A subscription-capable event bus client.
#[async_trait]
pub trait EventSubscriber: Send {
    /// Register interest in `topic`. Must be called before [`listen`](Self::listen).
    async fn subscribe(&mut self, topic: &str) -> EventsResult<()>;

    /// Deliver messages from all subscribed topics to `handler` until
    /// `shutdown` fires. Blocks for the lifetime of the subscription.
    async fn listen(
        &mut self,
        handler: Arc<dyn DeliveryHandler>,
        shutdown: ShutdownSignal,
    ) -> EventsResult<()>;
}

/// Hand a delivery to the handler; failures are logged and leave the message
/// unacknowledged.
pub(crate) async fn dispatch(handler: &dyn DeliveryHandler, delivery: Delivery) {
    if let Err(e) = handler.handle(&delivery).await {
        tracing::warn!(
            topic = %delivery.topic(),
            subject_id = %delivery.message().subject_id,
            event_type = %delivery.message().event_type,
            error = %e,
            "Failed to process change message, leaving unacknowledged"
        );
    }
}
