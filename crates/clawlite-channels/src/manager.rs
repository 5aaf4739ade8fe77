//! Channel Manager — orchestrates channel lifecycle and outbound resilience.
//!
//! Responsibilities:
//! - Register enabled channels, each behind a `WorkerBinding`
//! - Start/stop all channels concurrently via `tokio::spawn`
//! - Dispatch outbound messages from the bus to the correct channel,
//!   gated by a per-channel circuit breaker with exponential backoff
//! - Report per-channel `outbound_health` for the gateway's status surface

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use rand::Rng;
use tokio::sync::Notify;
use tracing::{debug, error, info, warn};

use clawlite_core::bus::queue::MessageBus;
use clawlite_core::bus::types::OutboundMessage;

use crate::base::Channel;
use crate::circuit::{HealthLevel, SendPermit, WorkerBinding};

/// Max outbound send attempts (including the first) before giving up.
const MAX_ATTEMPTS: u32 = 5;
const BASE_BACKOFF: Duration = Duration::from_millis(200);

struct Registration {
    channel: Arc<dyn Channel>,
    binding: Arc<WorkerBinding>,
}

/// Manages the lifecycle and outbound resilience for all chat channels.
pub struct ChannelManager {
    channels: HashMap<String, Registration>,
    bus: Arc<MessageBus>,
    shutdown: Arc<Notify>,
}

impl ChannelManager {
    pub fn new(bus: Arc<MessageBus>) -> Self {
        Self {
            channels: HashMap::new(),
            bus,
            shutdown: Arc::new(Notify::new()),
        }
    }

    /// Register a channel under a given account name. Overwrites any
    /// previous registration under the same channel name.
    pub fn register(&mut self, channel: Arc<dyn Channel>) {
        self.register_account(channel, "default");
    }

    /// Register a channel/account pair, each getting its own `WorkerBinding`
    /// (and therefore its own circuit breaker).
    pub fn register_account(&mut self, channel: Arc<dyn Channel>, account: &str) {
        let name = channel.name().to_string();
        let session_id = format!("{name}:{account}");
        info!(channel = %name, account, "registered channel");
        self.channels.insert(
            name.clone(),
            Registration {
                channel,
                binding: Arc::new(WorkerBinding::new(name, account, session_id)),
            },
        );
    }

    pub fn unregister(&mut self, name: &str) -> Option<Arc<dyn Channel>> {
        let removed = self.channels.remove(name);
        if removed.is_some() {
            info!(channel = %name, "unregistered channel");
        }
        removed.map(|r| r.channel)
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Channel>> {
        self.channels.get(name).map(|r| &r.channel)
    }

    pub fn channel_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.channels.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Per-channel `outbound_health` rollup for the gateway's status route.
    pub fn outbound_health(&self) -> HashMap<String, HealthLevel> {
        self.channels
            .iter()
            .map(|(name, reg)| (name.clone(), reg.binding.breaker.health()))
            .collect()
    }

    pub fn circuit_blocked_count(&self, name: &str) -> Option<u32> {
        self.channels.get(name).map(|r| r.binding.breaker.blocked_count())
    }

    /// Start all channels + the outbound dispatcher. Blocks until shutdown.
    pub async fn start_all(&self) -> Result<()> {
        if self.channels.is_empty() {
            warn!("no channels registered, nothing to start");
            return Ok(());
        }

        info!(
            channels = ?self.channel_names(),
            "starting {} channel(s)",
            self.channels.len()
        );

        let mut handles = Vec::new();

        for (name, reg) in &self.channels {
            let ch = reg.channel.clone();
            let binding = reg.binding.clone();
            let ch_name = name.clone();

            let handle = tokio::spawn(async move {
                info!(channel = %ch_name, "channel starting");
                binding.mark_connected();
                if let Err(e) = ch.start().await {
                    error!(channel = %ch_name, error = %e, "channel start failed");
                }
                info!(channel = %ch_name, "channel stopped");
            });

            handles.push(handle);
        }

        let bus = self.bus.clone();
        let bindings: HashMap<String, Registration> = HashMap::new();
        let _ = bindings;
        let dispatch_targets: HashMap<String, (Arc<dyn Channel>, Arc<WorkerBinding>)> = self
            .channels
            .iter()
            .map(|(name, reg)| (name.clone(), (reg.channel.clone(), reg.binding.clone())))
            .collect();
        let shutdown = self.shutdown.clone();

        let dispatcher_handle = tokio::spawn(async move {
            Self::dispatch_outbound(bus, dispatch_targets, shutdown).await;
        });

        handles.push(dispatcher_handle);

        self.shutdown.notified().await;
        info!("channel manager shutting down");
        Ok(())
    }

    pub async fn stop_all(&self) {
        info!("stopping all channels");
        self.shutdown.notify_waiters();

        for (name, reg) in &self.channels {
            debug!(channel = %name, "stopping channel");
            if let Err(e) = reg.channel.stop().await {
                error!(channel = %name, error = %e, "channel stop failed");
            }
        }

        info!("all channels stopped");
    }

    pub fn signal_shutdown(&self) {
        self.shutdown.notify_waiters();
    }

    /// Outbound dispatcher: per send, checks the idempotency cache (handled
    /// upstream by `MessageBus::publish_outbound`), the circuit state, then
    /// retries with exponential backoff and jitter up to `MAX_ATTEMPTS`.
    async fn dispatch_outbound(
        bus: Arc<MessageBus>,
        targets: HashMap<String, (Arc<dyn Channel>, Arc<WorkerBinding>)>,
        shutdown: Arc<Notify>,
    ) {
        info!("outbound dispatcher started");

        loop {
            tokio::select! {
                msg = bus.consume_outbound() => {
                    match msg {
                        Some(outbound) => Self::dispatch_one(&targets, outbound).await,
                        None => {
                            info!("outbound bus closed, dispatcher exiting");
                            break;
                        }
                    }
                }
                _ = shutdown.notified() => {
                    info!("dispatcher received shutdown signal");
                    break;
                }
            }
        }
    }

    async fn dispatch_one(
        targets: &HashMap<String, (Arc<dyn Channel>, Arc<WorkerBinding>)>,
        outbound: OutboundMessage,
    ) {
        let Some((channel, binding)) = targets.get(&outbound.channel) else {
            warn!(channel = %outbound.channel, "no channel registered for outbound message");
            return;
        };

        match binding.breaker.check_send() {
            SendPermit::Blocked => {
                warn!(
                    channel = %outbound.channel,
                    chat_id = %outbound.chat_id,
                    "circuit open, rejecting send"
                );
                return;
            }
            SendPermit::Allowed | SendPermit::Probe => {}
        }

        for attempt in 0..MAX_ATTEMPTS {
            let start = Instant::now();
            let result = channel.send(&outbound).await;
            let latency = start.elapsed();

            match result {
                Ok(()) => {
                    binding.breaker.record_success(latency);
                    debug!(
                        channel = %outbound.channel,
                        chat_id = %outbound.chat_id,
                        attempt,
                        "outbound message sent"
                    );
                    return;
                }
                Err(e) => {
                    binding.breaker.record_failure(latency);
                    error!(
                        channel = %outbound.channel,
                        error = %e,
                        attempt,
                        "failed to send outbound message"
                    );

                    if attempt + 1 >= MAX_ATTEMPTS {
                        break;
                    }
                    if binding.breaker.check_send() == crate::circuit::SendPermit::Blocked {
                        break;
                    }

                    let backoff = BASE_BACKOFF * 2u32.pow(attempt);
                    let jitter = rand::thread_rng().gen_range(0..=50);
                    tokio::time::sleep(backoff + Duration::from_millis(jitter)).await;
                }
            }
        }
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::Channel;
    use clawlite_core::bus::types::OutboundMessage;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    struct MockChannel {
        channel_name: String,
        started: Arc<AtomicBool>,
        stopped: Arc<AtomicBool>,
        send_count: Arc<AtomicUsize>,
        fail_sends: bool,
    }

    impl MockChannel {
        fn new(name: &str) -> Self {
            Self {
                channel_name: name.into(),
                started: Arc::new(AtomicBool::new(false)),
                stopped: Arc::new(AtomicBool::new(false)),
                send_count: Arc::new(AtomicUsize::new(0)),
                fail_sends: false,
            }
        }

        fn failing(name: &str) -> Self {
            Self {
                fail_sends: true,
                ..Self::new(name)
            }
        }
    }

    #[async_trait::async_trait]
    impl Channel for MockChannel {
        fn name(&self) -> &str {
            &self.channel_name
        }

        async fn start(&self) -> anyhow::Result<()> {
            self.started.store(true, Ordering::SeqCst);
            tokio::time::sleep(tokio::time::Duration::from_secs(3600)).await;
            Ok(())
        }

        async fn stop(&self) -> anyhow::Result<()> {
            self.stopped.store(true, Ordering::SeqCst);
            Ok(())
        }

        async fn send(&self, _msg: &OutboundMessage) -> anyhow::Result<()> {
            self.send_count.fetch_add(1, Ordering::SeqCst);
            if self.fail_sends {
                anyhow::bail!("simulated send failure");
            }
            Ok(())
        }
    }

    fn bus() -> Arc<MessageBus> {
        Arc::new(MessageBus::new(32, Duration::from_secs(300)))
    }

    #[test]
    fn test_new_manager_empty() {
        let mgr = ChannelManager::new(bus());
        assert!(mgr.is_empty());
        assert_eq!(mgr.len(), 0);
    }

    #[test]
    fn test_register_channel() {
        let mut mgr = ChannelManager::new(bus());
        mgr.register(Arc::new(MockChannel::new("telegram")));

        assert_eq!(mgr.len(), 1);
        assert!(mgr.get("telegram").is_some());
        assert!(mgr.get("discord").is_none());
    }

    #[test]
    fn test_register_multiple_channels() {
        let mut mgr = ChannelManager::new(bus());
        mgr.register(Arc::new(MockChannel::new("telegram")));
        mgr.register(Arc::new(MockChannel::new("discord")));
        mgr.register(Arc::new(MockChannel::new("slack")));

        assert_eq!(mgr.len(), 3);
        assert_eq!(mgr.channel_names(), vec!["discord", "slack", "telegram"]);
    }

    #[test]
    fn test_unregister_channel() {
        let mut mgr = ChannelManager::new(bus());
        mgr.register(Arc::new(MockChannel::new("telegram")));
        assert!(mgr.unregister("telegram").is_some());
        assert_eq!(mgr.len(), 0);
    }

    #[test]
    fn test_unregister_nonexistent() {
        let mut mgr = ChannelManager::new(bus());
        assert!(mgr.unregister("nonexistent").is_none());
    }

    #[test]
    fn test_register_overwrites() {
        let mut mgr = ChannelManager::new(bus());
        mgr.register(Arc::new(MockChannel::new("telegram")));
        mgr.register(Arc::new(MockChannel::new("telegram")));
        assert_eq!(mgr.len(), 1);
    }

    #[test]
    fn test_outbound_health_starts_ok() {
        let mut mgr = ChannelManager::new(bus());
        mgr.register(Arc::new(MockChannel::new("telegram")));
        assert_eq!(mgr.outbound_health().get("telegram"), Some(&HealthLevel::Ok));
    }

    #[tokio::test]
    async fn test_dispatch_outbound_routes_correctly() {
        let b = bus();
        let ch1 = Arc::new(MockChannel::new("telegram"));
        let ch2 = Arc::new(MockChannel::new("discord"));
        let ch1_count = ch1.send_count.clone();
        let ch2_count = ch2.send_count.clone();

        let mut targets: HashMap<String, (Arc<dyn Channel>, Arc<WorkerBinding>)> = HashMap::new();
        targets.insert(
            "telegram".into(),
            (ch1, Arc::new(WorkerBinding::new("telegram", "default", "telegram:default"))),
        );
        targets.insert(
            "discord".into(),
            (ch2, Arc::new(WorkerBinding::new("discord", "default", "discord:default"))),
        );

        let shutdown = Arc::new(Notify::new());
        let bus_clone = b.clone();
        let shutdown_clone = shutdown.clone();
        let handle = tokio::spawn(async move {
            ChannelManager::dispatch_outbound(bus_clone, targets, shutdown_clone).await;
        });

        b.publish_outbound(OutboundMessage::new("telegram", "chat_1", "Hello TG")).await.unwrap();
        b.publish_outbound(OutboundMessage::new("discord", "guild_1", "Hello DC")).await.unwrap();
        b.publish_outbound(OutboundMessage::new("telegram", "chat_2", "Again TG")).await.unwrap();

        tokio::time::sleep(Duration::from_millis(100)).await;
        shutdown.notify_waiters();
        let _ = handle.await;

        assert_eq!(ch1_count.load(Ordering::SeqCst), 2);
        assert_eq!(ch2_count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_dispatch_outbound_unknown_channel() {
        let b = bus();
        let targets: HashMap<String, (Arc<dyn Channel>, Arc<WorkerBinding>)> = HashMap::new();
        let shutdown = Arc::new(Notify::new());

        let bus_clone = b.clone();
        let shutdown_clone = shutdown.clone();
        let handle = tokio::spawn(async move {
            ChannelManager::dispatch_outbound(bus_clone, targets, shutdown_clone).await;
        });

        b.publish_outbound(OutboundMessage::new("unknown", "chat", "msg")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown.notify_waiters();
        let _ = handle.await;
    }

    #[tokio::test]
    async fn test_dispatch_one_opens_circuit_after_repeated_failures() {
        let ch = Arc::new(MockChannel::failing("flaky"));
        let binding = Arc::new(WorkerBinding::new("flaky", "default", "flaky:default"));
        let mut targets: HashMap<String, (Arc<dyn Channel>, Arc<WorkerBinding>)> = HashMap::new();
        targets.insert("flaky".into(), (ch.clone(), binding.clone()));

        for _ in 0..2 {
            ChannelManager::dispatch_one(&targets, OutboundMessage::new("flaky", "chat", "hi")).await;
        }

        assert!(binding.breaker.consecutive_failures() >= 5);
    }

    #[tokio::test]
    async fn test_stop_all() {
        let mut mgr = ChannelManager::new(bus());
        let ch = Arc::new(MockChannel::new("test"));
        let stopped = ch.stopped.clone();
        mgr.register(ch);

        mgr.stop_all().await;
        assert!(stopped.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_start_all_empty() {
        let mgr = ChannelManager::new(bus());
        assert!(mgr.start_all().await.is_ok());
    }

    #[test]
    fn test_signal_shutdown() {
        let mgr = ChannelManager::new(bus());
        mgr.signal_shutdown();
    }
}
