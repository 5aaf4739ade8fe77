//! POST /v1/chat — one-shot, non-streaming chat turn.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use clawlite_agent::AssistantResult;
use clawlite_core::bus::types::InboundMessage;
use clawlite_core::types::ProviderMode;

use crate::error::GatewayError;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct ChatRequest {
    pub session_id: String,
    pub text: String,
}

#[derive(Serialize)]
pub struct ChatResponseMeta {
    pub model: String,
    pub mode: &'static str,
    pub reason: String,
    pub tokens: Option<Value>,
    pub cost: Option<f64>,
}

#[derive(Serialize)]
pub struct ChatResponse {
    pub text: String,
    pub meta: ChatResponseMeta,
}

pub(crate) fn mode_str(mode: ProviderMode) -> &'static str {
    match mode {
        ProviderMode::Online => "online",
        ProviderMode::Fallback => "fallback",
        ProviderMode::Offline => "offline",
    }
}

pub(crate) fn to_response(result: AssistantResult) -> ChatResponse {
    ChatResponse {
        text: result.text,
        meta: ChatResponseMeta {
            model: result.meta.model,
            mode: mode_str(result.meta.mode),
            reason: result.meta.reason,
            tokens: result.meta.tokens.map(|t| serde_json::to_value(t).unwrap_or(Value::Null)),
            cost: result.meta.cost,
        },
    }
}

pub async fn chat_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, GatewayError> {
    if req.session_id.trim().is_empty() || req.text.trim().is_empty() {
        return Err(GatewayError::bad_request(
            "invalid_request",
            "session_id and text must both be non-empty",
        ));
    }

    let msg = InboundMessage::new("http", &req.session_id, &req.session_id, &req.text);
    let result = state.agent.respond(&msg).await?;
    Ok(Json(to_response(result)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clawlite_agent::AssistantMeta;

    #[test]
    fn test_mode_str() {
        assert_eq!(mode_str(ProviderMode::Online), "online");
        assert_eq!(mode_str(ProviderMode::Offline), "offline");
    }

    #[test]
    fn test_to_response_carries_text_and_meta() {
        let result = AssistantResult {
            text: "hi there".into(),
            meta: AssistantMeta {
                model: "gpt-test".into(),
                mode: ProviderMode::Online,
                reason: "stop".into(),
                tokens: None,
                cost: None,
                turns: 1,
            },
        };
        let resp = to_response(result);
        assert_eq!(resp.text, "hi there");
        assert_eq!(resp.meta.model, "gpt-test");
        assert_eq!(resp.meta.mode, "online");
    }
}
