//! Maps the engine's error taxonomy onto HTTP status codes.
//!
//! Per the propagation policy: tool-level errors never reach here (the
//! agent loop resolves them inside the ReAct loop). What does reach here
//! is provider/config/cancellation errors crossing the engine boundary,
//! plus this crate's own request-validation failures.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use clawlite_core::error::ClawLiteError;
use serde_json::json;

/// A gateway-facing error: an HTTP status plus the taxonomy kind name
/// and a short, plain-language message. The structured error is always
/// logged by the caller before this is constructed; this type only
/// carries what the HTTP response needs.
#[derive(Debug)]
pub struct GatewayError {
    pub status: StatusCode,
    pub kind: &'static str,
    pub message: String,
}

impl GatewayError {
    pub fn bad_request(kind: &'static str, message: impl Into<String>) -> Self {
        Self { status: StatusCode::BAD_REQUEST, kind, message: message.into() }
    }

    pub fn not_found(kind: &'static str, message: impl Into<String>) -> Self {
        Self { status: StatusCode::NOT_FOUND, kind, message: message.into() }
    }

    pub fn service_unavailable(kind: &'static str, message: impl Into<String>) -> Self {
        Self { status: StatusCode::SERVICE_UNAVAILABLE, kind, message: message.into() }
    }

    pub fn internal(kind: &'static str, message: impl Into<String>) -> Self {
        Self { status: StatusCode::INTERNAL_SERVER_ERROR, kind, message: message.into() }
    }
}

impl From<ClawLiteError> for GatewayError {
    fn from(e: ClawLiteError) -> Self {
        let kind = e.kind();
        match &e {
            ClawLiteError::ProviderTimeout
            | ClawLiteError::ProviderRateLimited
            | ClawLiteError::ProviderCircuitOpen
            | ClawLiteError::ChannelUnavailable(_) => {
                Self::service_unavailable(kind, e.to_string())
            }
            ClawLiteError::AuthMissing(_) | ClawLiteError::AuthInvalid(_) => {
                Self { status: StatusCode::UNAUTHORIZED, kind, message: e.to_string() }
            }
            ClawLiteError::CronExpressionInvalid(_) => Self::bad_request(kind, e.to_string()),
            ClawLiteError::SessionCancelled => {
                Self { status: StatusCode::OK, kind, message: e.to_string() }
            }
            _ => Self::internal(kind, e.to_string()),
        }
    }
}

/// Any `anyhow` error that escapes the agent loop is a provider/transport
/// failure outside the tool-call loop; surfaced as 503 so the caller can
/// retry once a provider is reachable again.
impl From<anyhow::Error> for GatewayError {
    fn from(e: anyhow::Error) -> Self {
        Self::service_unavailable("provider_send_failed", e.to_string())
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.kind, "message": self.message }))).into_response()
    }
}
