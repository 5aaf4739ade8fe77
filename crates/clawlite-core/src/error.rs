//! Typed error taxonomy shared across every component boundary.
//!
//! Call sites match on `ClawLiteError` variants instead of string-sniffing
//! an `anyhow::Error`'s message. Errors raised *inside* a tool call are
//! converted to a plain string and returned to the model as a tool result
//! (see `clawlite-agent::tools::registry`); only errors that cross a
//! component boundary outside the tool-call loop use this type directly.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ClawLiteError {
    #[error("config invalid: {0}")]
    ConfigInvalid(String),

    #[error("authentication credential missing: {0}")]
    AuthMissing(String),

    #[error("authentication credential invalid: {0}")]
    AuthInvalid(String),

    #[error("provider request timed out")]
    ProviderTimeout,

    #[error("provider rate limited")]
    ProviderRateLimited,

    #[error("provider send failed: {0}")]
    ProviderSendFailed(String),

    #[error("provider circuit open")]
    ProviderCircuitOpen,

    #[error("channel '{0}' unavailable")]
    ChannelUnavailable(String),

    #[error("tool '{0}' not found")]
    ToolNotFound(String),

    #[error("invalid arguments for tool '{0}': {1}")]
    ToolInvalidArgs(String, String),

    #[error("tool '{0}' timed out")]
    ToolTimeout(String),

    #[error("tool '{0}' failed: {1}")]
    ToolFailed(String, String),

    #[error("session cancelled")]
    SessionCancelled,

    #[error("cron expression invalid: {0}")]
    CronExpressionInvalid(String),
}

impl ClawLiteError {
    /// The taxonomy kind name used in structured logs, matching the
    /// error-kind vocabulary of the external interface documentation.
    pub fn kind(&self) -> &'static str {
        match self {
            ClawLiteError::ConfigInvalid(_) => "config_invalid",
            ClawLiteError::AuthMissing(_) => "auth_missing",
            ClawLiteError::AuthInvalid(_) => "auth_invalid",
            ClawLiteError::ProviderTimeout => "provider_timeout",
            ClawLiteError::ProviderRateLimited => "provider_rate_limited",
            ClawLiteError::ProviderSendFailed(_) => "provider_send_failed",
            ClawLiteError::ProviderCircuitOpen => "provider_circuit_open",
            ClawLiteError::ChannelUnavailable(_) => "channel_unavailable",
            ClawLiteError::ToolNotFound(_) => "tool_not_found",
            ClawLiteError::ToolInvalidArgs(_, _) => "tool_invalid_args",
            ClawLiteError::ToolTimeout(_) => "tool_timeout",
            ClawLiteError::ToolFailed(_, _) => "tool_failed",
            ClawLiteError::SessionCancelled => "session_cancelled",
            ClawLiteError::CronExpressionInvalid(_) => "cron_expression_invalid",
        }
    }

    /// Whether this error should be retried as part of a provider
    /// fallback chain (§4.3: timeout, rate limit, missing auth).
    pub fn triggers_fallback(&self) -> bool {
        matches!(
            self,
            ClawLiteError::ProviderTimeout
                | ClawLiteError::ProviderRateLimited
                | ClawLiteError::AuthMissing(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_names() {
        assert_eq!(ClawLiteError::ProviderTimeout.kind(), "provider_timeout");
        assert_eq!(
            ClawLiteError::ToolNotFound("x".into()).kind(),
            "tool_not_found"
        );
        assert_eq!(
            ClawLiteError::CronExpressionInvalid("bad".into()).kind(),
            "cron_expression_invalid"
        );
    }

    #[test]
    fn test_triggers_fallback() {
        assert!(ClawLiteError::ProviderTimeout.triggers_fallback());
        assert!(ClawLiteError::ProviderRateLimited.triggers_fallback());
        assert!(ClawLiteError::AuthMissing("k".into()).triggers_fallback());
        assert!(!ClawLiteError::ProviderSendFailed("x".into()).triggers_fallback());
    }

    #[test]
    fn test_display() {
        let e = ClawLiteError::ChannelUnavailable("telegram".into());
        assert_eq!(e.to_string(), "channel 'telegram' unavailable");
    }
}
