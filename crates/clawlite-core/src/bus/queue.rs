//! Async message bus — the central nervous system of ClawLite.
//!
//! Uses `tokio::sync::mpsc` bounded channels for the inbound/outbound
//! queues, plus two pieces of shared dispatch state that sit alongside
//! the queues rather than inside them: a per-session semaphore gate (one
//! in-flight turn per session) and an outbound idempotency cache
//! (collapse duplicate sends within a configurable window).

use super::types::{InboundMessage, OutboundMessage};
use crate::types::SessionId;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Mutex, OwnedSemaphorePermit, Semaphore};

/// The message bus connecting channels <-> agent loop.
///
/// - Channels publish to `inbound` (user messages arriving)
/// - Agent loop consumes from `inbound`, processes, publishes to `outbound`
/// - Channel manager consumes from `outbound` and routes to correct channel
pub struct MessageBus {
    inbound_tx: mpsc::Sender<InboundMessage>,
    inbound_rx: Mutex<mpsc::Receiver<InboundMessage>>,
    outbound_tx: mpsc::Sender<OutboundMessage>,
    outbound_rx: Mutex<mpsc::Receiver<OutboundMessage>>,
    session_gate: SessionDispatchGate,
    idempotency: IdempotencyCache,
}

impl MessageBus {
    /// Create a new message bus with the given buffer capacity and
    /// idempotency dedup window.
    pub fn new(buffer_size: usize, idempotency_window: Duration) -> Self {
        let (inbound_tx, inbound_rx) = mpsc::channel(buffer_size);
        let (outbound_tx, outbound_rx) = mpsc::channel(buffer_size);

        MessageBus {
            inbound_tx,
            inbound_rx: Mutex::new(inbound_rx),
            outbound_tx,
            outbound_rx: Mutex::new(outbound_rx),
            session_gate: SessionDispatchGate::new(),
            idempotency: IdempotencyCache::new(idempotency_window),
        }
    }

    /// Publish a message from a channel to the agent (inbound).
    pub async fn publish_inbound(
        &self,
        msg: InboundMessage,
    ) -> Result<(), mpsc::error::SendError<InboundMessage>> {
        self.inbound_tx.send(msg).await
    }

    /// Consume the next inbound message (blocks until available).
    /// Returns None if all senders are dropped.
    pub async fn consume_inbound(&self) -> Option<InboundMessage> {
        let mut rx = self.inbound_rx.lock().await;
        rx.recv().await
    }

    /// Publish a response from the agent to a channel (outbound). Drops
    /// the message instead of sending if an identical idempotency key
    /// was seen within the dedup window.
    pub async fn publish_outbound(
        &self,
        msg: OutboundMessage,
    ) -> Result<(), mpsc::error::SendError<OutboundMessage>> {
        if let Some(key) = &msg.idempotency_key {
            if !self.idempotency.should_dispatch(key).await {
                return Ok(());
            }
        }
        self.outbound_tx.send(msg).await
    }

    /// Consume the next outbound message (blocks until available).
    /// Returns None if all senders are dropped.
    pub async fn consume_outbound(&self) -> Option<OutboundMessage> {
        let mut rx = self.outbound_rx.lock().await;
        rx.recv().await
    }

    /// Get a clone of the inbound sender (for channels to use).
    pub fn inbound_sender(&self) -> mpsc::Sender<InboundMessage> {
        self.inbound_tx.clone()
    }

    /// Get a clone of the outbound sender (for the agent loop to use).
    pub fn outbound_sender(&self) -> mpsc::Sender<OutboundMessage> {
        self.outbound_tx.clone()
    }

    /// Acquire the single dispatch permit for `session`, serializing
    /// concurrent turns against the same session.
    pub async fn acquire_session_permit(&self, session: &SessionId) -> OwnedSemaphorePermit {
        self.session_gate.acquire(session).await
    }
}

/// One permit per session, handed out from a lazily-created semaphore.
/// Guarantees the agent loop never runs two turns for the same session
/// concurrently, without serializing unrelated sessions against each
/// other.
struct SessionDispatchGate {
    semaphores: Mutex<HashMap<SessionId, Arc<Semaphore>>>,
}

impl SessionDispatchGate {
    fn new() -> Self {
        Self {
            semaphores: Mutex::new(HashMap::new()),
        }
    }

    async fn acquire(&self, session: &SessionId) -> OwnedSemaphorePermit {
        let sem = {
            let mut map = self.semaphores.lock().await;
            map.entry(session.clone())
                .or_insert_with(|| Arc::new(Semaphore::new(1)))
                .clone()
        };
        sem.acquire_owned().await.expect("session semaphore never closed")
    }
}

/// Dedup cache for outbound sends. Entries older than the window are
/// swept on each check rather than on a background timer, since the
/// channel manager's send volume is low enough that this stays cheap.
struct IdempotencyCache {
    window: Duration,
    seen: Mutex<HashMap<String, Instant>>,
}

impl IdempotencyCache {
    fn new(window: Duration) -> Self {
        Self {
            window,
            seen: Mutex::new(HashMap::new()),
        }
    }

    async fn should_dispatch(&self, key: &str) -> bool {
        let now = Instant::now();
        let mut seen = self.seen.lock().await;
        seen.retain(|_, at| now.duration_since(*at) < self.window);

        if seen.contains_key(key) {
            false
        } else {
            seen.insert(key.to_string(), now);
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bus(buffer: usize) -> MessageBus {
        MessageBus::new(buffer, Duration::from_secs(300))
    }

    #[tokio::test]
    async fn test_inbound_message_flow() {
        let bus = bus(10);

        let msg = InboundMessage::new("telegram", "user_1", "chat_1", "Hello!");
        bus.publish_inbound(msg).await.unwrap();

        let received = bus.consume_inbound().await.unwrap();
        assert_eq!(received.channel, "telegram");
        assert_eq!(received.content, "Hello!");
    }

    #[tokio::test]
    async fn test_outbound_message_flow() {
        let bus = bus(10);

        let msg = OutboundMessage::new("cli", "chat_42", "Response here");
        bus.publish_outbound(msg).await.unwrap();

        let received = bus.consume_outbound().await.unwrap();
        assert_eq!(received.channel, "cli");
        assert_eq!(received.content, "Response here");
    }

    #[tokio::test]
    async fn test_message_ordering() {
        let bus = bus(10);

        for i in 1..=3 {
            let msg = InboundMessage::new("cli", "local", "default", format!("msg-{}", i));
            bus.publish_inbound(msg).await.unwrap();
        }

        let m1 = bus.consume_inbound().await.unwrap();
        let m2 = bus.consume_inbound().await.unwrap();
        let m3 = bus.consume_inbound().await.unwrap();

        assert_eq!(m1.content, "msg-1");
        assert_eq!(m2.content, "msg-2");
        assert_eq!(m3.content, "msg-3");
    }

    #[tokio::test]
    async fn test_sender_clone_works() {
        let bus = bus(10);
        let sender = bus.inbound_sender();

        let msg = InboundMessage::new("telegram", "user_x", "channel_y", "From clone");
        sender.send(msg).await.unwrap();

        let received = bus.consume_inbound().await.unwrap();
        assert_eq!(received.channel, "telegram");
        assert_eq!(received.content, "From clone");
    }

    #[tokio::test]
    async fn test_full_round_trip() {
        let bus = Arc::new(bus(10));

        let inbound = InboundMessage::new("telegram", "user_42", "chat_99", "What is 2+2?");
        bus.publish_inbound(inbound).await.unwrap();

        let received = bus.consume_inbound().await.unwrap();
        assert_eq!(received.content, "What is 2+2?");

        let response = OutboundMessage::new(
            received.channel.clone(),
            received.chat_id.clone(),
            "The answer is 4.",
        );
        bus.publish_outbound(response).await.unwrap();

        let outbound = bus.consume_outbound().await.unwrap();
        assert_eq!(outbound.channel, "telegram");
        assert_eq!(outbound.chat_id, "chat_99");
        assert_eq!(outbound.content, "The answer is 4.");
    }

    #[tokio::test]
    async fn test_idempotency_key_dedups_within_window() {
        let bus = bus(10);

        let a = OutboundMessage::new("telegram", "chat_1", "hello").with_idempotency_key("job-1");
        let b = OutboundMessage::new("telegram", "chat_1", "hello").with_idempotency_key("job-1");

        bus.publish_outbound(a).await.unwrap();
        bus.publish_outbound(b).await.unwrap();

        assert!(bus.consume_outbound().await.is_some());
        assert!(bus.outbound_rx.try_lock().unwrap().try_recv().is_err());
    }

    #[tokio::test]
    async fn test_session_gate_serializes_same_session() {
        let bus = bus(10);
        let session = SessionId::new("telegram", "chat_1");

        let permit1 = bus.acquire_session_permit(&session).await;
        assert_eq!(
            bus.session_gate
                .semaphores
                .lock()
                .await
                .get(&session)
                .unwrap()
                .available_permits(),
            0
        );
        drop(permit1);

        let _permit2 = bus.acquire_session_permit(&session).await;
    }
}
