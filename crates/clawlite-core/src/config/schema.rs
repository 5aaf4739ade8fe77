//! Configuration schema — the on-disk document plus its typed Rust model.
//!
//! Hierarchy: `Config` → `AgentsConfig`, `ProvidersConfig`, `ChannelsConfig`,
//! `ToolsConfig`, `GatewayConfig`, `SchedulerConfig`.
//!
//! JSON on disk uses **camelCase** keys; Rust uses snake_case, handled by
//! `#[serde(rename_all = "camelCase")]`.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ─────────────────────────────────────────────
// Root Config
// ─────────────────────────────────────────────

/// Root configuration document, loaded from `<state>/config.json` plus
/// environment variable overrides.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    /// Directory holding operator-editable identity files and user skills.
    pub workspace: String,
    /// Directory holding session logs, the memory index, and the cron table.
    pub state: String,
    pub agents: AgentsConfig,
    pub providers: ProvidersConfig,
    pub channels: ChannelsConfig,
    pub tools: ToolsConfig,
    pub gateway: GatewayConfig,
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub transcription: TranscriptionConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            workspace: "~/.clawlite/workspace".to_string(),
            state: "~/.clawlite/state".to_string(),
            agents: AgentsConfig::default(),
            providers: ProvidersConfig::default(),
            channels: ChannelsConfig::default(),
            tools: ToolsConfig::default(),
            gateway: GatewayConfig::default(),
            scheduler: SchedulerConfig::default(),
            transcription: TranscriptionConfig::default(),
        }
    }
}

// ─────────────────────────────────────────────
// Agents
// ─────────────────────────────────────────────

/// Agent configuration container.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AgentsConfig {
    pub defaults: AgentDefaults,
}

/// Default agent settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AgentDefaults {
    /// Primary provider selection, `vendor/model` (e.g. `anthropic/claude-sonnet-4-20250514`).
    pub model: String,
    /// Ordered fallback providers tried on `provider_timeout`/`rate_limit`/`auth_missing`.
    #[serde(default)]
    pub fallback: Vec<String>,
    /// Local/offline model used when every remote provider is unreachable.
    #[serde(default)]
    pub offline_model: Option<String>,
    pub max_tokens: u32,
    pub temperature: f64,
    /// Bound on the tool-call loop (`spec.md` §4.3's `max_turns`).
    pub max_turns: u32,
    /// Top-K memory snippets injected into the prompt.
    pub memory_top_k: u32,
    /// Last-M session messages injected into the prompt.
    pub history_window: u32,
}

impl Default for AgentDefaults {
    fn default() -> Self {
        Self {
            model: "anthropic/claude-sonnet-4-20250514".to_string(),
            fallback: Vec::new(),
            offline_model: None,
            max_tokens: 8192,
            temperature: 0.7,
            max_turns: 8,
            memory_top_k: 5,
            history_window: 20,
        }
    }
}

// ─────────────────────────────────────────────
// Providers
// ─────────────────────────────────────────────

/// Configuration for a single LLM provider (API key, base URL, headers).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProviderConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra_headers: Option<HashMap<String, String>>,
}

impl ProviderConfig {
    pub fn is_configured(&self) -> bool {
        !self.api_key.is_empty()
    }
}

/// All provider configurations, credentials env-first / file-fallback
/// (see `config/loader.rs`).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub anthropic: ProviderConfig,
    #[serde(default)]
    pub openai: ProviderConfig,
    #[serde(default)]
    pub openrouter: ProviderConfig,
    #[serde(default)]
    pub deepseek: ProviderConfig,
    #[serde(default)]
    pub groq: ProviderConfig,
    #[serde(default)]
    pub gemini: ProviderConfig,
    #[serde(default)]
    pub local: ProviderConfig,
}

impl ProvidersConfig {
    pub fn get_by_name(&self, name: &str) -> Option<&ProviderConfig> {
        match name {
            "anthropic" => Some(&self.anthropic),
            "openai" => Some(&self.openai),
            "openrouter" => Some(&self.openrouter),
            "deepseek" => Some(&self.deepseek),
            "groq" => Some(&self.groq),
            "gemini" => Some(&self.gemini),
            "local" => Some(&self.local),
            _ => None,
        }
    }

    pub fn to_map(&self) -> HashMap<String, ProviderConfig> {
        let entries: &[(&str, &ProviderConfig)] = &[
            ("anthropic", &self.anthropic),
            ("openai", &self.openai),
            ("openrouter", &self.openrouter),
            ("deepseek", &self.deepseek),
            ("groq", &self.groq),
            ("gemini", &self.gemini),
            ("local", &self.local),
        ];
        entries
            .iter()
            .map(|(name, config)| (name.to_string(), (*config).clone()))
            .collect()
    }
}

// ─────────────────────────────────────────────
// Channels
// ─────────────────────────────────────────────

/// All channel configurations. Telegram is the reference implementation
/// (§1); other channels are reached through the same `Channel` trait but
/// are not shipped in this core.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChannelsConfig {
    #[serde(default)]
    pub telegram: TelegramConfig,
    /// Outbound idempotency-key dedup window, shared across channels.
    #[serde(default = "default_idempotency_window")]
    pub idempotency_window_seconds: u64,
}

fn default_idempotency_window() -> u64 {
    300
}

/// A single Telegram bot account descriptor.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TelegramAccount {
    /// Short name for this account (used in logs/status).
    #[serde(default = "default_account_name")]
    pub name: String,
    pub token: String,
    /// Allowlist of sender ids/usernames. Empty = allow everyone.
    #[serde(default)]
    pub allowed_users: Vec<String>,
}

fn default_account_name() -> String {
    "default".to_string()
}

/// Telegram channel config: enable flag plus one or more accounts.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TelegramConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub accounts: Vec<TelegramAccount>,
    /// Long-poll timeout in seconds.
    #[serde(default = "default_poll_timeout")]
    pub poll_timeout_seconds: u64,
}

fn default_poll_timeout() -> u64 {
    30
}

// ─────────────────────────────────────────────
// Tools
// ─────────────────────────────────────────────

/// Tool configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ToolsConfig {
    #[serde(default)]
    pub web: WebToolsConfig,
    #[serde(default)]
    pub exec: ExecToolConfig,
    #[serde(default)]
    pub skills: SkillsConfig,
    #[serde(default)]
    pub mcp: McpConfig,
    /// Whether to restrict file/exec operations to the workspace directory.
    #[serde(default)]
    pub restrict_to_workspace: bool,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            web: WebToolsConfig::default(),
            exec: ExecToolConfig::default(),
            skills: SkillsConfig::default(),
            mcp: McpConfig::default(),
            restrict_to_workspace: false,
        }
    }
}

/// One pre-configured MCP server the `mcp_call` tool is allowed to reach.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct McpServerConfig {
    pub name: String,
    pub url: String,
}

/// MCP call tool configuration — a nickname-addressed allowlist, never a
/// raw LLM-supplied URL.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct McpConfig {
    #[serde(default)]
    pub servers: Vec<McpServerConfig>,
}

/// Web tools configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WebToolsConfig {
    #[serde(default)]
    pub search: WebSearchConfig,
}

/// Web search configuration (Brave API).
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WebSearchConfig {
    #[serde(default)]
    pub api_key: String,
    pub max_results: u32,
}

impl Default for WebSearchConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            max_results: 5,
        }
    }
}

/// Shell exec tool configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExecToolConfig {
    pub timeout: u64,
}

impl Default for ExecToolConfig {
    fn default() -> Self {
        Self { timeout: 60 }
    }
}

/// Skill registry/execution configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SkillsConfig {
    /// Path to the local marketplace root (third discovery tier).
    #[serde(default)]
    pub marketplace_path: Option<String>,
    /// Hard timeout for `run_skill` invocations, in seconds.
    #[serde(default = "default_skill_timeout")]
    pub timeout_seconds: u64,
    /// Reject unknown frontmatter fields instead of warn-and-carry.
    #[serde(default)]
    pub strict_frontmatter: bool,
}

fn default_skill_timeout() -> u64 {
    120
}

impl Default for SkillsConfig {
    fn default() -> Self {
        Self {
            marketplace_path: None,
            timeout_seconds: default_skill_timeout(),
            strict_frontmatter: false,
        }
    }
}

// ─────────────────────────────────────────────
// Scheduler
// ─────────────────────────────────────────────

/// Scheduler (cron + heartbeat) configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SchedulerConfig {
    /// Heartbeat period. 0 disables the heartbeat loop entirely.
    pub heartbeat_interval_seconds: u64,
    /// IANA timezone name cron expressions are evaluated in.
    pub timezone: String,
    /// Idle window after which a session is eligible for memory
    /// consolidation (§4.6).
    pub session_idle_timeout_seconds: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval_seconds: 3600,
            timezone: "UTC".to_string(),
            session_idle_timeout_seconds: 1800,
        }
    }
}

// ─────────────────────────────────────────────
// Transcription
// ─────────────────────────────────────────────

/// Voice transcription configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TranscriptionConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_groq")]
    pub provider: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_whisper_model")]
    pub model: String,
}

fn default_true() -> bool {
    true
}
fn default_groq() -> String {
    "groq".into()
}
fn default_whisper_model() -> String {
    "whisper-large-v3".into()
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            provider: "groq".into(),
            api_key: String::new(),
            model: "whisper-large-v3".into(),
        }
    }
}

// ─────────────────────────────────────────────
// Gateway
// ─────────────────────────────────────────────

/// HTTP + WebSocket gateway configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
    /// Bearer token required on every route except `/health`. Generated
    /// and persisted on first run if absent (see `config/loader.rs`).
    #[serde(default)]
    pub bearer_token: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 18790,
            bearer_token: String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.agents.defaults.max_tokens, 8192);
        assert_eq!(config.agents.defaults.max_turns, 8);
        assert_eq!(config.gateway.port, 18790);
        assert_eq!(config.scheduler.timezone, "UTC");
        assert!(!config.tools.restrict_to_workspace);
    }

    #[test]
    fn test_config_from_json_camel_case() {
        let json = serde_json::json!({
            "agents": {
                "defaults": {
                    "model": "gpt-4o",
                    "maxTokens": 4096,
                    "temperature": 0.5,
                    "maxTurns": 10
                }
            },
            "gateway": {
                "host": "127.0.0.1",
                "port": 9090
            }
        });

        let config: Config = serde_json::from_value(json).unwrap();
        assert_eq!(config.agents.defaults.model, "gpt-4o");
        assert_eq!(config.agents.defaults.max_tokens, 4096);
        assert_eq!(config.agents.defaults.max_turns, 10);
        assert_eq!(config.gateway.host, "127.0.0.1");
        assert_eq!(config.gateway.port, 9090);
        assert!(!config.tools.restrict_to_workspace);
    }

    #[test]
    fn test_config_serialization_round_trip() {
        let config = Config::default();
        let json_str = serde_json::to_string_pretty(&config).unwrap();
        let deserialized: Config = serde_json::from_str(&json_str).unwrap();
        assert_eq!(deserialized.agents.defaults.model, config.agents.defaults.model);
        assert_eq!(deserialized.gateway.port, config.gateway.port);
        assert_eq!(deserialized.scheduler.timezone, config.scheduler.timezone);
    }

    #[test]
    fn test_config_json_uses_camel_case() {
        let config = Config::default();
        let json = serde_json::to_value(&config).unwrap();
        assert!(json["agents"]["defaults"].get("maxTokens").is_some());
        assert!(json["tools"].get("restrictToWorkspace").is_some());
        assert!(json["scheduler"].get("heartbeatIntervalSeconds").is_some());
        assert!(json["agents"]["defaults"].get("max_tokens").is_none());
    }

    #[test]
    fn test_provider_config_is_configured() {
        let empty = ProviderConfig::default();
        assert!(!empty.is_configured());

        let with_key = ProviderConfig {
            api_key: "sk-123".to_string(),
            ..Default::default()
        };
        assert!(with_key.is_configured());
    }

    #[test]
    fn test_providers_get_by_name() {
        let mut providers = ProvidersConfig::default();
        providers.anthropic.api_key = "sk-ant-123".to_string();

        assert!(providers.get_by_name("anthropic").unwrap().is_configured());
        assert!(!providers.get_by_name("openai").unwrap().is_configured());
        assert!(providers.get_by_name("nonexistent").is_none());
    }

    #[test]
    fn test_telegram_accounts_from_json() {
        let json = serde_json::json!({
            "channels": {
                "telegram": {
                    "enabled": true,
                    "accounts": [
                        {"name": "primary", "token": "bot123:ABC", "allowedUsers": ["user1"]}
                    ]
                }
            }
        });

        let config: Config = serde_json::from_value(json).unwrap();
        assert!(config.channels.telegram.enabled);
        assert_eq!(config.channels.telegram.accounts.len(), 1);
        assert_eq!(config.channels.telegram.accounts[0].token, "bot123:ABC");
        assert_eq!(config.channels.idempotency_window_seconds, 300);
    }

    #[test]
    fn test_tools_config_from_json() {
        let json = serde_json::json!({
            "tools": {
                "web": {"search": {"apiKey": "brave-key-123", "maxResults": 10}},
                "exec": {"timeout": 120},
                "restrictToWorkspace": true
            }
        });

        let config: Config = serde_json::from_value(json).unwrap();
        assert_eq!(config.tools.web.search.api_key, "brave-key-123");
        assert_eq!(config.tools.exec.timeout, 120);
        assert!(config.tools.restrict_to_workspace);
    }

    #[test]
    fn test_empty_json_gives_defaults() {
        let config: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(config.agents.defaults.model, "anthropic/claude-sonnet-4-20250514");
        assert_eq!(config.agents.defaults.max_tokens, 8192);
        assert_eq!(config.gateway.port, 18790);
    }
}
