//! LLM provider trait — the core abstraction every chat backend
//! (OpenAI-compatible HTTP API, or a future non-HTTP backend) implements.
//!
//! `HttpProvider` in `http_provider.rs` covers every OpenAI-compatible
//! API (OpenAI, Anthropic via its `/v1/messages`-to-chat shim, OpenRouter,
//! DeepSeek, Groq, Gemini's OpenAI-compatible endpoint, local vLLM).

use async_trait::async_trait;
use clawlite_core::error::ClawLiteError;
use clawlite_core::types::{LlmResponse, Message, ToolDefinition};

/// Configuration passed to each LLM call.
#[derive(Clone, Debug)]
pub struct LlmRequestConfig {
    pub max_tokens: u32,
    pub temperature: f64,
}

impl Default for LlmRequestConfig {
    fn default() -> Self {
        Self {
            max_tokens: 4096,
            temperature: 0.7,
        }
    }
}

/// Trait that all LLM providers must implement.
///
/// Unlike a swallow-errors-into-content convention, `chat` propagates a
/// typed `ClawLiteError` so the fallback chain can inspect
/// `triggers_fallback()` and decide whether to retry against the next
/// provider.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Send a chat completion request.
    ///
    /// # Arguments
    /// * `messages` — Conversation history in OpenAI format.
    /// * `tools`    — Optional list of tool definitions the LLM can call.
    /// * `model`    — Model identifier (e.g. `"claude-sonnet-4-20250514"`, `"gpt-4o"`).
    /// * `config`   — Temperature, max_tokens, etc.
    async fn chat(
        &self,
        messages: &[Message],
        tools: Option<&[ToolDefinition]>,
        model: &str,
        config: &LlmRequestConfig,
    ) -> Result<LlmResponse, ClawLiteError>;

    /// The default model for this provider instance.
    fn default_model(&self) -> &str;

    /// Display name for logging.
    fn display_name(&self) -> &str;
}
