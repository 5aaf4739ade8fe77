//! Provider fallback chain.
//!
//! Tries the agent's primary model, then each entry of its configured
//! fallback list in order, then the local/offline model as a last resort.
//! Only errors that `ClawLiteError::triggers_fallback()` marks retryable
//! (timeout, rate limit, missing auth) advance to the next model — any
//! other failure (bad request, tool schema rejected, etc.) is returned
//! immediately since trying a different provider would not fix it.

use std::collections::HashMap;

use clawlite_core::error::ClawLiteError;
use clawlite_core::types::{LlmResponse, Message, ProviderMode, ToolDefinition};
use tracing::warn;

use crate::http_provider::{create_provider, HttpProvider};
use crate::registry::{self, ProviderConfig};
use crate::traits::{LlmProvider, LlmRequestConfig};

/// Result of a `FallbackChain::chat` call: the response plus which model
/// and provider mode actually produced it, so callers can surface
/// `online|fallback|offline` on the run's metadata.
#[derive(Debug)]
pub struct FallbackOutcome {
    pub response: LlmResponse,
    pub model: String,
    pub mode: ProviderMode,
}

/// Orders a primary model, an ordered fallback list, and an optional
/// offline model into a single retry sequence.
pub struct FallbackChain {
    primary: String,
    fallback: Vec<String>,
    offline_model: Option<String>,
    providers: HashMap<String, ProviderConfig>,
}

impl FallbackChain {
    pub fn new(
        primary: impl Into<String>,
        fallback: Vec<String>,
        offline_model: Option<String>,
        providers: HashMap<String, ProviderConfig>,
    ) -> Self {
        Self {
            primary: primary.into(),
            fallback,
            offline_model,
            providers,
        }
    }

    /// Models to try in order, tagged with the mode each represents.
    fn attempts(&self) -> Vec<(String, ProviderMode)> {
        let mut out = vec![(self.primary.clone(), ProviderMode::Online)];
        out.extend(
            self.fallback
                .iter()
                .cloned()
                .map(|m| (m, ProviderMode::Fallback)),
        );
        if let Some(offline) = &self.offline_model {
            out.push((offline.clone(), ProviderMode::Offline));
        }
        out
    }

    /// Build the provider for one attempt. The offline slot always routes
    /// through the `local` registry entry regardless of model keywords,
    /// since `find_by_model` deliberately skips `is_local` specs.
    fn provider_for(&self, model: &str, mode: ProviderMode) -> Result<HttpProvider, ClawLiteError> {
        if mode == ProviderMode::Offline {
            let spec = registry::find_by_name("local")
                .ok_or_else(|| ClawLiteError::ConfigInvalid("local provider spec missing".into()))?;
            let config = self.providers.get("local").ok_or_else(|| {
                ClawLiteError::AuthMissing("local provider not configured".to_string())
            })?;
            Ok(HttpProvider::new(config, spec, model))
        } else {
            create_provider(model, &self.providers)
        }
    }

    /// Run the chain, returning the first successful response or the last
    /// retryable error if every attempt was exhausted.
    pub async fn chat(
        &self,
        messages: &[Message],
        tools: Option<&[ToolDefinition]>,
        config: &LlmRequestConfig,
    ) -> Result<FallbackOutcome, ClawLiteError> {
        let mut last_err: Option<ClawLiteError> = None;

        for (model, mode) in self.attempts() {
            let provider = match self.provider_for(&model, mode) {
                Ok(p) => p,
                Err(e) => {
                    last_err = Some(e);
                    continue;
                }
            };

            match provider.chat(messages, tools, &model, config).await {
                Ok(response) => return Ok(FallbackOutcome { response, model, mode }),
                Err(e) if e.triggers_fallback() => {
                    warn!(model = %model, mode = ?mode, error = %e, "provider failed, trying next");
                    last_err = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_err
            .unwrap_or_else(|| ClawLiteError::AuthMissing("no providers configured".to_string())))
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider_config(key: &str, base: &str) -> ProviderConfig {
        ProviderConfig {
            api_key: key.to_string(),
            api_base: Some(base.to_string()),
            extra_headers: None,
        }
    }

    async fn ok_server(content: &str) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"role": "assistant", "content": content}}]
            })))
            .mount(&server)
            .await;
        server
    }

    async fn rate_limited_server() -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
            .mount(&server)
            .await;
        server
    }

    #[tokio::test]
    async fn test_primary_success_is_online() {
        let server = ok_server("hi from primary").await;
        let mut providers = HashMap::new();
        providers.insert("openai".to_string(), provider_config("k", &server.uri()));

        let chain = FallbackChain::new("gpt-4o", vec![], None, providers);
        let outcome = chain
            .chat(&[Message::user("hi")], None, &LlmRequestConfig::default())
            .await
            .unwrap();

        assert_eq!(outcome.mode, ProviderMode::Online);
        assert_eq!(outcome.model, "gpt-4o");
        assert_eq!(outcome.response.content.as_deref(), Some("hi from primary"));
    }

    #[tokio::test]
    async fn test_falls_back_after_rate_limit() {
        let primary = rate_limited_server().await;
        let fallback = ok_server("hi from fallback").await;

        let mut providers = HashMap::new();
        providers.insert("openai".to_string(), provider_config("k", &primary.uri()));
        providers.insert("anthropic".to_string(), provider_config("k2", &fallback.uri()));

        let chain = FallbackChain::new(
            "gpt-4o",
            vec!["claude-sonnet-4-20250514".to_string()],
            None,
            providers,
        );
        let outcome = chain
            .chat(&[Message::user("hi")], None, &LlmRequestConfig::default())
            .await
            .unwrap();

        assert_eq!(outcome.mode, ProviderMode::Fallback);
        assert_eq!(outcome.model, "claude-sonnet-4-20250514");
    }

    #[tokio::test]
    async fn test_falls_through_to_offline() {
        let primary = rate_limited_server().await;
        let local = ok_server("hi from local").await;

        let mut providers = HashMap::new();
        providers.insert("openai".to_string(), provider_config("k", &primary.uri()));
        providers.insert("local".to_string(), provider_config("", &local.uri()));

        let chain = FallbackChain::new("gpt-4o", vec![], Some("llama3.1".to_string()), providers);
        let outcome = chain
            .chat(&[Message::user("hi")], None, &LlmRequestConfig::default())
            .await
            .unwrap();

        assert_eq!(outcome.mode, ProviderMode::Offline);
        assert_eq!(outcome.model, "llama3.1");
    }

    #[tokio::test]
    async fn test_non_retryable_error_stops_chain() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(400).set_body_string("bad request"))
            .mount(&server)
            .await;

        let mut providers = HashMap::new();
        providers.insert("openai".to_string(), provider_config("k", &server.uri()));
        providers.insert("anthropic".to_string(), provider_config("k2", &server.uri()));

        let chain = FallbackChain::new(
            "gpt-4o",
            vec!["claude-sonnet-4-20250514".to_string()],
            None,
            providers,
        );
        let err = chain
            .chat(&[Message::user("hi")], None, &LlmRequestConfig::default())
            .await
            .unwrap_err();

        assert!(matches!(err, ClawLiteError::ProviderSendFailed(_)));
    }

    #[tokio::test]
    async fn test_exhausted_chain_returns_last_error() {
        let a = rate_limited_server().await;
        let b = rate_limited_server().await;

        let mut providers = HashMap::new();
        providers.insert("openai".to_string(), provider_config("k", &a.uri()));
        providers.insert("anthropic".to_string(), provider_config("k2", &b.uri()));

        let chain = FallbackChain::new(
            "gpt-4o",
            vec!["claude-sonnet-4-20250514".to_string()],
            None,
            providers,
        );
        let err = chain
            .chat(&[Message::user("hi")], None, &LlmRequestConfig::default())
            .await
            .unwrap_err();

        assert!(matches!(err, ClawLiteError::ProviderRateLimited));
    }

    #[tokio::test]
    async fn test_no_providers_configured() {
        let chain = FallbackChain::new("gpt-4o", vec![], None, HashMap::new());
        let err = chain
            .chat(&[Message::user("hi")], None, &LlmRequestConfig::default())
            .await
            .unwrap_err();

        assert!(matches!(err, ClawLiteError::AuthMissing(_)));
    }
}
