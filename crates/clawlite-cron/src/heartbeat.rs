//! Heartbeat — periodic decide/act loop driving proactive messages.
//!
//! Two phases per tick: **decide**, where the engine is asked whether
//! anything needs proactive attention, and, only if it answers `run`,
//! **act**, where a follow-up engine call produces the message that gets
//! dispatched to the most recently active session. At most one proactive
//! message is ever sent per interval.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tokio::sync::Notify;
use tracing::{debug, error, info, warn};

use clawlite_core::bus::queue::MessageBus;
use clawlite_core::bus::types::OutboundMessage;
use clawlite_core::session::manager::SessionManager;

/// Default interval: 30 minutes.
pub const DEFAULT_HEARTBEAT_INTERVAL_S: u64 = 30 * 60;

/// The decide-phase prompt. The assistant must answer with exactly the
/// structured JSON decision, nothing else.
pub const DECIDE_PROMPT: &str = r#"This is a scheduled check-in, not a message from the user. Decide whether anything needs your proactive attention right now (a pending task, a promise to follow up, something time-sensitive). Respond with exactly one JSON object and nothing else: {"action": "skip"|"run", "reason": "..."}"#;

/// The act-phase prompt, sent only after a `run` decision.
pub const ACT_PROMPT: &str = "Send the proactive message you decided was needed. Keep it brief.";

/// Session id prefixes that are never treated as "the currently active
/// channel/session" for heartbeat dispatch — they're synthetic sessions
/// used by the scheduler and subagent machinery, not real chat channels.
const SYNTHETIC_SESSION_PREFIXES: &[&str] = &["system:", "cron:", "cli:"];

// ─────────────────────────────────────────────
// HeartbeatDecision
// ─────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HeartbeatAction {
    Skip,
    Run,
}

#[derive(Clone, Debug, Deserialize)]
struct RawDecision {
    action: String,
    #[serde(default)]
    reason: String,
}

/// The decide phase's structured output.
#[derive(Clone, Debug)]
pub struct HeartbeatDecision {
    pub action: HeartbeatAction,
    pub reason: String,
}

impl HeartbeatDecision {
    /// Parse the decide-phase assistant output. Any shape other than the
    /// expected `{"action": "skip"|"run", "reason": "..."}` object — missing
    /// braces, invalid JSON, an unrecognized `action` value — is treated as
    /// `Skip` rather than propagated as an error, matching the "never send
    /// more than one proactive message" guarantee: when in doubt, skip.
    pub fn parse(text: &str) -> Self {
        let trimmed = text.trim();
        let candidate = extract_json_object(trimmed).unwrap_or(trimmed);

        match serde_json::from_str::<RawDecision>(candidate) {
            Ok(raw) if raw.action.eq_ignore_ascii_case("run") => HeartbeatDecision {
                action: HeartbeatAction::Run,
                reason: raw.reason,
            },
            Ok(raw) => HeartbeatDecision {
                action: HeartbeatAction::Skip,
                reason: raw.reason,
            },
            Err(e) => {
                warn!(error = %e, raw = %trimmed, "malformed heartbeat decision, treating as skip");
                HeartbeatDecision {
                    action: HeartbeatAction::Skip,
                    reason: "malformed decision".to_string(),
                }
            }
        }
    }
}

fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&text[start..=end])
}

// ─────────────────────────────────────────────
// Engine callback
// ─────────────────────────────────────────────

/// Invokes the engine for a given session with a given prompt, returning
/// its response text. Used for both the decide and act phases; the binary
/// wiring the heartbeat service up supplies a closure over `AgentLoop`.
pub type EngineFn = Arc<
    dyn Fn(String, String) -> Pin<Box<dyn Future<Output = anyhow::Result<String>> + Send>>
        + Send
        + Sync,
>;

// ─────────────────────────────────────────────
// HeartbeatService
// ─────────────────────────────────────────────

pub struct HeartbeatService {
    sessions: Arc<SessionManager>,
    bus: Arc<MessageBus>,
    on_decide: Option<EngineFn>,
    on_act: Option<EngineFn>,
    interval_s: u64,
    enabled: bool,
    shutdown: Arc<Notify>,
}

impl HeartbeatService {
    pub fn new(sessions: Arc<SessionManager>, bus: Arc<MessageBus>, interval_s: Option<u64>, enabled: bool) -> Self {
        Self {
            sessions,
            bus,
            on_decide: None,
            on_act: None,
            interval_s: interval_s.unwrap_or(DEFAULT_HEARTBEAT_INTERVAL_S),
            enabled,
            shutdown: Arc::new(Notify::new()),
        }
    }

    pub fn set_on_decide(&mut self, f: EngineFn) {
        self.on_decide = Some(f);
    }

    pub fn set_on_act(&mut self, f: EngineFn) {
        self.on_act = Some(f);
    }

    /// Run the heartbeat loop until `stop()` is called.
    pub async fn start(&self) -> anyhow::Result<()> {
        if !self.enabled {
            info!("heartbeat disabled");
            self.shutdown.notified().await;
            return Ok(());
        }

        info!(interval_s = self.interval_s, "heartbeat service started");

        loop {
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_secs(self.interval_s)) => {
                    self.tick().await;
                }
                _ = self.shutdown.notified() => {
                    info!("heartbeat service shutting down");
                    return Ok(());
                }
            }
        }
    }

    pub fn stop(&self) {
        info!("stopping heartbeat service");
        self.shutdown.notify_waiters();
    }

    /// Most recently active real chat session ("channel:chat_id"), ignoring
    /// synthetic sessions (`cron:*`, `system:*`, `cli:*`). `None` means no
    /// channel session exists yet — nothing to wake up for.
    fn active_session_id(&self) -> Option<String> {
        self.sessions
            .list_sessions()
            .into_iter()
            .map(|s| s.key)
            .find(|key| !SYNTHETIC_SESSION_PREFIXES.iter().any(|p| key.starts_with(p)))
    }

    async fn tick(&self) {
        let Some(session_id) = self.active_session_id() else {
            debug!("heartbeat: no active session, skipping tick");
            return;
        };

        let Some(ref decide) = self.on_decide else {
            debug!("heartbeat: no decide callback configured, skipping tick");
            return;
        };

        let raw = match decide(session_id.clone(), DECIDE_PROMPT.to_string()).await {
            Ok(text) => text,
            Err(e) => {
                error!(error = %e, "heartbeat decide phase failed");
                return;
            }
        };

        let decision = HeartbeatDecision::parse(&raw);
        if decision.action == HeartbeatAction::Skip {
            info!(reason = %decision.reason, "heartbeat: skip");
            return;
        }

        info!(reason = %decision.reason, session_id = %session_id, "heartbeat: run");
        self.act(&session_id).await;
    }

    async fn act(&self, session_id: &str) {
        let Some(ref act) = self.on_act else {
            warn!("heartbeat: run decided but no act callback configured");
            return;
        };

        let text = match act(session_id.to_string(), ACT_PROMPT.to_string()).await {
            Ok(text) => text,
            Err(e) => {
                error!(error = %e, "heartbeat act phase failed");
                return;
            }
        };

        let Some((channel, chat_id)) = session_id.split_once(':') else {
            warn!(session_id = %session_id, "heartbeat: malformed session id, cannot dispatch");
            return;
        };

        let outbound = OutboundMessage::new(channel, chat_id, text);
        if let Err(e) = self.bus.publish_outbound(outbound).await {
            error!(error = %e, "failed to publish heartbeat message");
        }
    }

    /// Run the decide phase once, synchronously, without acting on the
    /// result. Used by manual triggers (CLI/tests).
    pub async fn trigger_decide(&self) -> Option<HeartbeatDecision> {
        let session_id = self.active_session_id()?;
        let decide = self.on_decide.as_ref()?;
        let raw = decide(session_id, DECIDE_PROMPT.to_string()).await.ok()?;
        Some(HeartbeatDecision::parse(&raw))
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
