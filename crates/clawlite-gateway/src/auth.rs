//! Bearer-token authentication middleware.
//!
//! A single process-wide token, checked against the `Authorization:
//! Bearer <token>` header or a `?token=` query parameter (the latter so
//! browsers can authenticate the WebSocket upgrade, which can't set
//! arbitrary headers from JS without a dedicated subprotocol dance).

use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderMap, Request, Uri};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::state::AppState;

/// Extracts the bearer token from either the `Authorization` header or a
/// `token` query parameter on the request URI.
pub fn extract_token(req: &Request<Body>) -> Option<String> {
    extract_token_from(req.headers(), req.uri())
}

/// Same extraction, usable from handlers that only have the pieces
/// (headers/URI extractors) rather than the full request — needed for
/// the WebSocket upgrade handler, where `WebSocketUpgrade` already
/// consumes the request parts.
pub fn extract_token_from(headers: &HeaderMap, uri: &Uri) -> Option<String> {
    if let Some(header) = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
    {
        return Some(header.to_string());
    }

    uri.query().and_then(query_token)
}

/// Pulls `token=...` out of a raw query string. Bearer tokens are
/// generated as hex (see `config::loader::generate_bearer_token`), so no
/// percent-decoding is needed for the values this crate ever produces.
fn query_token(query: &str) -> Option<String> {
    query.split('&').find_map(|pair| {
        let (key, value) = pair.split_once('=')?;
        (key == "token").then(|| value.to_string())
    })
}

fn unauthorized() -> Response {
    (
        axum::http::StatusCode::UNAUTHORIZED,
        axum::Json(json!({ "error": "auth_missing", "message": "missing or invalid bearer token" })),
    )
        .into_response()
}

/// Axum middleware enforcing the bearer token on every protected route.
pub async fn require_bearer_token(
    State(state): State<Arc<AppState>>,
    req: Request<Body>,
    next: Next,
) -> Response {
    match extract_token(&req) {
        Some(token) if token == state.bearer_token => next.run(req).await,
        _ => unauthorized(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_token_from_header() {
        let req = Request::builder()
            .uri("/v1/chat")
            .header("authorization", "Bearer abc123")
            .body(Body::empty())
            .unwrap();
        assert_eq!(extract_token(&req).as_deref(), Some("abc123"));
    }

    #[test]
    fn test_extract_token_from_query() {
        let req = Request::builder()
            .uri("/v1/ws?token=xyz789")
            .body(Body::empty())
            .unwrap();
        assert_eq!(extract_token(&req).as_deref(), Some("xyz789"));
    }

    #[test]
    fn test_extract_token_missing() {
        let req = Request::builder().uri("/v1/chat").body(Body::empty()).unwrap();
        assert!(extract_token(&req).is_none());
    }

    #[test]
    fn test_header_takes_priority_over_query() {
        let req = Request::builder()
            .uri("/v1/ws?token=query-token")
            .header("authorization", "Bearer header-token")
            .body(Body::empty())
            .unwrap();
        assert_eq!(extract_token(&req).as_deref(), Some("header-token"));
    }
}
