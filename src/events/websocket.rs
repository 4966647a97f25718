//! Event gateway subscriber over WebSocket.
//!
//! # Protocol
//! ```text
//! client → {"type":"subscribe","topic":"com.example.changes.*.load-balancer"}
//! server → {"type":"message","id":"42","topic":"…","payload":{ChangeMessage}}
//! client → {"type":"ack","id":"42"}
//! server → {"type":"error","message":"…"}           (subscription refused)
//! ```
//!
//! One connection per subscribed topic. A dropped connection is re-established
//! with exponential backoff; unacknowledged messages are the gateway's to
//! redeliver.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_tungstenite::tungstenite::Message;
use url::Url;

use crate::events::message::ChangeMessage;
use crate::events::topic;
use crate::events::{
    dispatch, Acker, Delivery, DeliveryHandler, EventSubscriber, EventsError, EventsResult,
};
use crate::lifecycle::ShutdownSignal;
use crate::resilience::Backoff;

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase")]
enum ClientFrame {
    Subscribe { topic: String },
    Ack { id: String },
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum ServerFrame {
    Message {
        id: String,
        topic: String,
        payload: ChangeMessage,
    },
    Error {
        message: String,
    },
    #[serde(other)]
    Unknown,
}

/// [`EventSubscriber`] backed by an event gateway WebSocket endpoint.
#[derive(Debug, Clone)]
pub struct WsSubscriber {
    url: Url,
    topics: Vec<String>,
    reconnect_base: Duration,
    reconnect_max: Duration,
}

impl WsSubscriber {
    pub fn new(url: Url) -> Self {
        Self {
            url,
            topics: Vec::new(),
            reconnect_base: Duration::from_millis(500),
            reconnect_max: Duration::from_secs(30),
        }
    }

    /// Override the reconnect backoff bounds.
    pub fn with_reconnect(mut self, base: Duration, max: Duration) -> Self {
        self.reconnect_base = base;
        self.reconnect_max = max;
        self
    }
}

#[async_trait]
impl EventSubscriber for WsSubscriber {
    async fn subscribe(&mut self, pattern: &str) -> EventsResult<()> {
        topic::validate(pattern)?;
        self.topics.push(pattern.to_string());
        Ok(())
    }

    async fn listen(
        &mut self,
        handler: Arc<dyn DeliveryHandler>,
        shutdown: ShutdownSignal,
    ) -> EventsResult<()> {
        if self.topics.is_empty() {
            return Err(EventsError::NoSubscriptions);
        }

        let mut tasks = JoinSet::new();
        for pattern in &self.topics {
            let backoff = Backoff::new(self.reconnect_base, self.reconnect_max);
            tasks.spawn(topic_loop(
                self.url.clone(),
                pattern.clone(),
                handler.clone(),
                backoff,
                shutdown.clone(),
            ));
        }

        while let Some(result) = tasks.join_next().await {
            if let Err(e) = result {
                tracing::error!(error = %e, "Event listener task failed");
            }
        }

        Ok(())
    }
}

/// Connect → read → on error, backoff → reconnect.
async fn topic_loop(
    url: Url,
    pattern: String,
    handler: Arc<dyn DeliveryHandler>,
    mut backoff: Backoff,
    mut shutdown: ShutdownSignal,
) {
    loop {
        if shutdown.is_triggered() {
            break;
        }

        match session(&url, &pattern, handler.as_ref(), &mut shutdown).await {
            Ok(()) if shutdown.is_triggered() => break,
            Ok(()) => {
                tracing::info!(topic = %pattern, "Event gateway disconnected, reconnecting");
                backoff.reset();
            }
            Err(e) => {
                let delay = backoff.next_delay();
                tracing::warn!(
                    topic = %pattern,
                    error = %e,
                    attempt = backoff.attempt(),
                    delay_ms = delay.as_millis() as u64,
                    "Event gateway connection failed"
                );

                tokio::select! {
                    biased;
                    _ = shutdown.recv() => break,
                    _ = tokio::time::sleep(delay) => {}
                }
            }
        }
    }

    tracing::debug!(topic = %pattern, "Event listener stopped");
}

/// One connection lifetime. `Ok` on a clean close or shutdown.
async fn session(
    url: &Url,
    pattern: &str,
    handler: &dyn DeliveryHandler,
    shutdown: &mut ShutdownSignal,
) -> EventsResult<()> {
    let (stream, _response) = tokio_tungstenite::connect_async(url.as_str())
        .await
        .map_err(|e| EventsError::Connection(e.to_string()))?;
    let (mut write, mut read) = stream.split();

    send_frame(
        &mut write,
        &ClientFrame::Subscribe {
            topic: pattern.to_string(),
        },
    )
    .await?;
    tracing::info!(url = %url, topic = pattern, "Subscribed to event gateway");

    let (ack_tx, mut ack_rx) = mpsc::unbounded_channel::<String>();

    loop {
        tokio::select! {
            biased;
            _ = shutdown.recv() => {
                while let Ok(id) = ack_rx.try_recv() {
                    send_frame(&mut write, &ClientFrame::Ack { id }).await?;
                }
                let _ = write.send(Message::Close(None)).await;
                return Ok(());
            }
            Some(id) = ack_rx.recv() => {
                send_frame(&mut write, &ClientFrame::Ack { id }).await?;
            }
            frame = read.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    match serde_json::from_str::<ServerFrame>(text.as_str()) {
                        Ok(ServerFrame::Message { id, topic, payload }) => {
                            let acker = Arc::new(WsAcker {
                                id,
                                tx: ack_tx.clone(),
                                acked: AtomicBool::new(false),
                            });
                            dispatch(handler, Delivery::new(topic, payload, acker)).await;
                        }
                        Ok(ServerFrame::Error { message }) => {
                            return Err(EventsError::Closed(message));
                        }
                        Ok(ServerFrame::Unknown) => {
                            tracing::trace!(topic = pattern, "Ignoring unknown gateway frame");
                        }
                        Err(e) => {
                            tracing::warn!(
                                topic = pattern,
                                id = frame_id(text.as_str()).as_deref().unwrap_or("-"),
                                error = %e,
                                "Dropping undecodable gateway frame"
                            );
                        }
                    }
                }
                Some(Ok(Message::Close(frame))) => {
                    tracing::info!(topic = pattern, frame = ?frame, "Event gateway closed connection");
                    return Ok(());
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(EventsError::Connection(e.to_string())),
                None => return Ok(()),
            },
        }
    }
}

async fn send_frame<S>(write: &mut S, frame: &ClientFrame) -> EventsResult<()>
where
    S: futures_util::Sink<Message> + Unpin,
    S::Error: std::fmt::Display,
{
    let text = serde_json::to_string(frame).map_err(|e| EventsError::Connection(e.to_string()))?;
    write
        .send(Message::text(text))
        .await
        .map_err(|e| EventsError::Connection(e.to_string()))
}

/// Best-effort id of a frame that failed to decode.
fn frame_id(text: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(text).ok()?;
    match value.get("id")? {
        serde_json::Value::String(id) => Some(id.clone()),
        other => Some(other.to_string()),
    }
}

struct WsAcker {
    id: String,
    tx: mpsc::UnboundedSender<String>,
    acked: AtomicBool,
}

#[async_trait]
impl Acker for WsAcker {
    async fn ack(&self) -> EventsResult<()> {
        if self.acked.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.tx.send(self.id.clone()).map_err(|_| {
            self.acked.store(false, Ordering::SeqCst);
            EventsError::Ack(format!("connection closed before ack of {}", self.id))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::HandlerError;
    use crate::lifecycle::Shutdown;
    use tokio::net::TcpListener;

    struct AckAll;

    #[async_trait]
    impl DeliveryHandler for AckAll {
        async fn handle(&self, delivery: &Delivery) -> Result<(), HandlerError> {
            if delivery.message().subject_id == "loadbal-reject" {
                return Err("rejected".into());
            }
            delivery.ack().await?;
            Ok(())
        }
    }

    #[test]
    fn test_client_frames() {
        let sub = serde_json::to_value(ClientFrame::Subscribe { topic: "a.*".into() }).unwrap();
        assert_eq!(sub, serde_json::json!({"type": "subscribe", "topic": "a.*"}));
        let ack = serde_json::to_value(ClientFrame::Ack { id: "7".into() }).unwrap();
        assert_eq!(ack, serde_json::json!({"type": "ack", "id": "7"}));
    }

    #[test]
    fn test_server_frames() {
        let frame: ServerFrame = serde_json::from_str(
            r#"{"type":"message","id":"1","topic":"a.b","payload":{"subjectID":"loadbal-1","eventType":"create"}}"#,
        )
        .unwrap();
        assert!(matches!(frame, ServerFrame::Message { ref id, .. } if id == "1"));

        let frame: ServerFrame = serde_json::from_str(r#"{"type":"heartbeat"}"#).unwrap();
        assert!(matches!(frame, ServerFrame::Unknown));
    }

    #[tokio::test]
    async fn test_listen_without_subscriptions() {
        let mut subscriber = WsSubscriber::new(Url::parse("ws://127.0.0.1:1/").unwrap());
        let shutdown = Shutdown::new();
        let err = subscriber
            .listen(Arc::new(AckAll), shutdown.subscribe())
            .await
            .unwrap_err();
        assert!(matches!(err, EventsError::NoSubscriptions));
    }

    #[tokio::test]
    async fn test_gateway_round_trip() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let gateway = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();

            let subscribe = ws.next().await.unwrap().unwrap();
            let subscribe: ClientFrame =
                serde_json::from_str(subscribe.into_text().unwrap().as_str()).unwrap();
            assert_eq!(
                subscribe,
                ClientFrame::Subscribe {
                    topic: "com.example.changes.*.load-balancer".into()
                }
            );

            for (id, subject) in [("1", "loadbal-reject"), ("2", "loadbal-ok")] {
                let frame = serde_json::json!({
                    "type": "message",
                    "id": id,
                    "topic": "com.example.changes.update.load-balancer",
                    "payload": { "subjectID": subject, "eventType": "update" }
                });
                ws.send(Message::text(frame.to_string())).await.unwrap();
            }

            let ack = ws.next().await.unwrap().unwrap();
            serde_json::from_str::<ClientFrame>(ack.into_text().unwrap().as_str()).unwrap()
        });

        let shutdown = Shutdown::new();
        let mut subscriber = WsSubscriber::new(Url::parse(&format!("ws://{addr}/")).unwrap())
            .with_reconnect(Duration::from_millis(10), Duration::from_millis(50));
        subscriber
            .subscribe("com.example.changes.*.load-balancer")
            .await
            .unwrap();

        let signal = shutdown.subscribe();
        let listen = tokio::spawn(async move { subscriber.listen(Arc::new(AckAll), signal).await });

        let ack = tokio::time::timeout(Duration::from_secs(5), gateway)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(ack, ClientFrame::Ack { id: "2".into() });

        shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(5), listen)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
    }

    async fn accept_subscriber(
        listener: TcpListener,
    ) -> tokio_tungstenite::WebSocketStream<tokio::net::TcpStream> {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        let subscribe = ws.next().await.unwrap().unwrap();
        let subscribe: ClientFrame =
            serde_json::from_str(subscribe.into_text().unwrap().as_str()).unwrap();
        assert!(matches!(subscribe, ClientFrame::Subscribe { .. }));
        ws
    }

    async fn subscriber_for(addr: std::net::SocketAddr) -> WsSubscriber {
        let mut subscriber = WsSubscriber::new(Url::parse(&format!("ws://{addr}/")).unwrap())
            .with_reconnect(Duration::from_millis(10), Duration::from_millis(50));
        subscriber
            .subscribe("com.example.changes.*.load-balancer")
            .await
            .unwrap();
        subscriber
    }

    #[test]
    fn test_frame_id() {
        assert_eq!(frame_id(r#"{"type":"message","id":"17","payload":{}}"#).as_deref(), Some("17"));
        assert_eq!(frame_id(r#"{"type":"message","id":17}"#).as_deref(), Some("17"));
        assert_eq!(frame_id(r#"{"type":"message"}"#), None);
        assert_eq!(frame_id("not json"), None);
    }

    #[tokio::test]
    async fn test_undecodable_frame_does_not_stop_session() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let gateway = tokio::spawn(async move {
            let mut ws = accept_subscriber(listener).await;
            let broken = serde_json::json!({
                "type": "message",
                "id": "1",
                "topic": "com.example.changes.update.load-balancer",
                "payload": { "subjectID": 42, "eventType": "update" }
            });
            let valid = serde_json::json!({
                "type": "message",
                "id": "2",
                "topic": "com.example.changes.update.load-balancer",
                "payload": {
                    "subjectID": "loadbal-ok",
                    "eventType": "update",
                    "additionalSubjectIDs": null
                }
            });
            ws.send(Message::text(broken.to_string())).await.unwrap();
            ws.send(Message::text(valid.to_string())).await.unwrap();

            let ack = ws.next().await.unwrap().unwrap();
            serde_json::from_str::<ClientFrame>(ack.into_text().unwrap().as_str()).unwrap()
        });

        let shutdown = Shutdown::new();
        let mut subscriber = subscriber_for(addr).await;
        let signal = shutdown.subscribe();
        let listen = tokio::spawn(async move { subscriber.listen(Arc::new(AckAll), signal).await });

        let ack = tokio::time::timeout(Duration::from_secs(5), gateway)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(ack, ClientFrame::Ack { id: "2".into() });

        shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(5), listen)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
    }

    struct AckDuringShutdown(Shutdown);

    #[async_trait]
    impl DeliveryHandler for AckDuringShutdown {
        async fn handle(&self, delivery: &Delivery) -> Result<(), HandlerError> {
            self.0.trigger();
            delivery.ack().await?;
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_pending_ack_sent_before_close() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let gateway = tokio::spawn(async move {
            let mut ws = accept_subscriber(listener).await;
            let frame = serde_json::json!({
                "type": "message",
                "id": "9",
                "topic": "com.example.changes.delete.load-balancer",
                "payload": { "subjectID": "loadbal-ok", "eventType": "delete" }
            });
            ws.send(Message::text(frame.to_string())).await.unwrap();

            let first = ws.next().await.unwrap().unwrap();
            let second = ws.next().await.unwrap().unwrap();
            (first, second)
        });

        let shutdown = Shutdown::new();
        let mut subscriber = subscriber_for(addr).await;
        let handler = Arc::new(AckDuringShutdown(shutdown.clone()));
        let signal = shutdown.subscribe();
        let listen = tokio::spawn(async move { subscriber.listen(handler, signal).await });

        let (first, second) = tokio::time::timeout(Duration::from_secs(5), gateway)
            .await
            .unwrap()
            .unwrap();
        let ack: ClientFrame = serde_json::from_str(first.into_text().unwrap().as_str()).unwrap();
        assert_eq!(ack, ClientFrame::Ack { id: "9".into() });
        assert!(matches!(second, Message::Close(_)));

        tokio::time::timeout(Duration::from_secs(5), listen)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
    }
}
