//! Shared state handed to every Axum handler as `State<Arc<AppState>>`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use clawlite_agent::AgentLoop;
use clawlite_channels::ChannelManager;
use clawlite_cron::CronService;

/// Central shared state for the gateway's router.
///
/// Exposes:
/// - `GET /health` — unauthenticated liveness;
/// - `POST /v1/chat` — bearer-authed turn, `{session_id, text}`;
/// - `WS /v1/ws` — bearer-authed, streaming variant of chat;
/// - `POST /v1/cron/add`, `GET /v1/cron/list`, `DELETE /v1/cron/{job_id}`;
/// - `GET /v1/status` — read-only status surface for dashboards.
pub struct AppState {
    pub bearer_token: String,
    pub agent: Arc<AgentLoop>,
    pub cron: Arc<CronService>,
    pub channels: Arc<ChannelManager>,
    started_at: std::time::Instant,
    ws_connections: AtomicU64,
}

impl AppState {
    pub fn new(
        bearer_token: String,
        agent: Arc<AgentLoop>,
        cron: Arc<CronService>,
        channels: Arc<ChannelManager>,
    ) -> Self {
        Self {
            bearer_token,
            agent,
            cron,
            channels,
            started_at: std::time::Instant::now(),
            ws_connections: AtomicU64::new(0),
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    pub fn connections(&self) -> u64 {
        self.ws_connections.load(Ordering::Relaxed)
    }

    pub(crate) fn ws_connected(&self) -> u64 {
        self.ws_connections.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub(crate) fn ws_disconnected(&self) {
        self.ws_connections.fetch_sub(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clawlite_core::bus::queue::MessageBus;
    use clawlite_core::config::schema::Config;

    fn make_state() -> AppState {
        let bus = Arc::new(MessageBus::new(16, std::time::Duration::from_secs(300)));
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.agents.defaults.model = "gpt-test".into();
        config.providers.openai.api_key = "test-key".into();
        config.workspace = dir.path().join("workspace").to_string_lossy().into_owned();
        config.state = dir.path().join("state").to_string_lossy().into_owned();
        let agent = Arc::new(AgentLoop::new(bus.clone(), &config, None, None).unwrap());
        let cron = Arc::new(CronService::new(bus.clone(), None));
        let channels = Arc::new(ChannelManager::new(bus));
        AppState::new("secret".into(), agent, cron, channels)
    }

    #[test]
    fn test_uptime_starts_near_zero() {
        let state = make_state();
        assert!(state.uptime_seconds() < 2);
    }

    #[test]
    fn test_connections_track_connect_disconnect() {
        let state = make_state();
        assert_eq!(state.connections(), 0);
        state.ws_connected();
        state.ws_connected();
        assert_eq!(state.connections(), 2);
        state.ws_disconnected();
        assert_eq!(state.connections(), 1);
    }
}
