//! Config loader — reads `<state>/config.json`, merges env vars, and
//! generates a bearer token on first run.
//!
//! # Loading precedence
//! 1. Defaults (from `Config::default()`)
//! 2. JSON file at `<state>/config.json`
//! 3. Named environment variables (`CLAWLITE_MODEL`, `CLAWLITE_WORKSPACE`,
//!    `CLAWLITE_GATEWAY_HOST`, `CLAWLITE_GATEWAY_PORT`, ...) — override JSON
//! 4. Generic per-provider fallback (`CLAWLITE_PROVIDERS__<NAME>__API_KEY`)
//!    for credentials that have no dedicated named variable.

use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::schema::Config;

/// Default config file path, under the state directory.
pub fn get_config_path() -> PathBuf {
    crate::utils::get_state_path().join("config.json")
}

/// Load configuration from the default path + env vars.
///
/// Falls back to `Config::default()` if the file doesn't exist or can't be parsed.
pub fn load_config(path: Option<&Path>) -> Config {
    let config_path = path.map(PathBuf::from).unwrap_or_else(get_config_path);
    load_config_from_path(&config_path)
}

/// Load config from a specific file path.
fn load_config_from_path(path: &Path) -> Config {
    if !path.exists() {
        info!("No config file found at {}, using defaults", path.display());
        return apply_env_overrides(Config::default());
    }

    debug!("Loading config from {}", path.display());

    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            warn!("Failed to read config file {}: {}", path.display(), e);
            return apply_env_overrides(Config::default());
        }
    };

    let config: Config = match serde_json::from_str(&content) {
        Ok(c) => c,
        Err(e) => {
            warn!("Failed to parse config JSON: {}", e);
            return apply_env_overrides(Config::default());
        }
    };

    apply_env_overrides(config)
}

/// Load config and ensure it carries a persisted bearer token, writing the
/// file back if one had to be generated. Called once at startup by the
/// gateway/CLI entrypoints; `load_config` alone never mutates disk.
pub fn load_or_init_config(path: Option<&Path>) -> Config {
    let config_path = path.map(PathBuf::from).unwrap_or_else(get_config_path);
    let mut config = load_config_from_path(&config_path);

    if config.gateway.bearer_token.is_empty() {
        config.gateway.bearer_token = generate_bearer_token();
        info!("Generated new gateway bearer token on first run");
        if let Err(e) = save_config(&config, Some(&config_path)) {
            warn!("Failed to persist generated bearer token: {}", e);
        }
    }

    config
}

/// Generate a CSPRNG bearer token. Uses the `rand` crate pulled in
/// transitively by `reqwest`'s TLS stack rather than a dedicated
/// dependency.
fn generate_bearer_token() -> String {
    use rand::RngCore;
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Save configuration to disk (pretty-printed JSON with camelCase keys).
pub fn save_config(config: &Config, path: Option<&Path>) -> std::io::Result<()> {
    let config_path = path.map(PathBuf::from).unwrap_or_else(get_config_path);

    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let json = serde_json::to_string_pretty(config)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;

    std::fs::write(&config_path, json)?;
    debug!("Config saved to {}", config_path.display());
    Ok(())
}

/// Apply environment variable overrides on top of a loaded config.
///
/// Named overrides take priority (`CLAWLITE_MODEL`, `CLAWLITE_WORKSPACE`,
/// `CLAWLITE_GATEWAY_HOST`, `CLAWLITE_GATEWAY_PORT`). Anything without a
/// named variable falls back to the generic `CLAWLITE_<SECTION>__<FIELD>`
/// scheme, matching vendor-credential conventions used elsewhere in the
/// provider config.
fn apply_env_overrides(mut config: Config) -> Config {
    if let Ok(val) = std::env::var("CLAWLITE_MODEL") {
        config.agents.defaults.model = val;
    }
    if let Ok(val) = std::env::var("CLAWLITE_WORKSPACE") {
        config.workspace = val;
    }
    if let Ok(val) = std::env::var("CLAWLITE_STATE") {
        config.state = val;
    }
    if let Ok(val) = std::env::var("CLAWLITE_GATEWAY_HOST") {
        config.gateway.host = val;
    }
    if let Ok(val) = std::env::var("CLAWLITE_GATEWAY_PORT") {
        if let Ok(p) = val.parse::<u16>() {
            config.gateway.port = p;
        }
    }
    if let Ok(val) = std::env::var("CLAWLITE_GATEWAY_BEARER_TOKEN") {
        config.gateway.bearer_token = val;
    }

    // Generic fallback for fields with no dedicated named variable.
    if let Ok(val) = std::env::var("CLAWLITE_AGENTS__DEFAULTS__MAX_TOKENS") {
        if let Ok(n) = val.parse::<u32>() {
            config.agents.defaults.max_tokens = n;
        }
    }
    if let Ok(val) = std::env::var("CLAWLITE_AGENTS__DEFAULTS__TEMPERATURE") {
        if let Ok(t) = val.parse::<f64>() {
            config.agents.defaults.temperature = t;
        }
    }
    if let Ok(val) = std::env::var("CLAWLITE_AGENTS__DEFAULTS__MAX_TURNS") {
        if let Ok(n) = val.parse::<u32>() {
            config.agents.defaults.max_turns = n;
        }
    }

    apply_provider_env(&mut config.providers.anthropic, "ANTHROPIC");
    apply_provider_env(&mut config.providers.openai, "OPENAI");
    apply_provider_env(&mut config.providers.openrouter, "OPENROUTER");
    apply_provider_env(&mut config.providers.deepseek, "DEEPSEEK");
    apply_provider_env(&mut config.providers.groq, "GROQ");
    apply_provider_env(&mut config.providers.gemini, "GEMINI");
    apply_provider_env(&mut config.providers.local, "LOCAL");

    if let Ok(val) = std::env::var("CLAWLITE_TOOLS__RESTRICT_TO_WORKSPACE") {
        config.tools.restrict_to_workspace = val == "true" || val == "1";
    }

    if let Ok(val) = std::env::var("CLAWLITE_CHANNELS__TELEGRAM__TOKEN") {
        if config.channels.telegram.accounts.is_empty() {
            config.channels.telegram.accounts.push(super::schema::TelegramAccount {
                name: "default".to_string(),
                token: val,
                allowed_users: Vec::new(),
            });
            config.channels.telegram.enabled = true;
        } else {
            config.channels.telegram.accounts[0].token = val;
        }
    }

    config
}

/// Apply the generic `CLAWLITE_PROVIDERS__<NAME>__*` fallback for a single
/// provider's credentials.
fn apply_provider_env(provider: &mut super::schema::ProviderConfig, name: &str) {
    if let Ok(val) = std::env::var(format!("CLAWLITE_PROVIDERS__{name}__API_KEY")) {
        provider.api_key = val;
    }
    if let Ok(val) = std::env::var(format!("CLAWLITE_PROVIDERS__{name}__API_BASE")) {
        provider.api_base = Some(val);
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
