//! Assembles the full Axum router.

use std::sync::Arc;

use axum::routing::{delete, get, post};
use axum::{middleware, Router};

use crate::auth::require_bearer_token;
use crate::routes::{chat, cron, health, status};
use crate::state::AppState;
use crate::ws::ws_handler;

/// Build the gateway's router. `/health` is unauthenticated; every other
/// route requires the bearer token (the WebSocket route checks it itself
/// during the upgrade, since it needs to reject before the 101 response).
pub fn build_router(state: Arc<AppState>) -> Router {
    let protected = Router::new()
        .route("/v1/chat", post(chat::chat_handler))
        .route("/v1/cron/add", post(cron::add_handler))
        .route("/v1/cron/list", get(cron::list_handler))
        .route("/v1/cron/{job_id}", delete(cron::remove_handler))
        .route("/v1/status", get(status::status_handler))
        .layer(middleware::from_fn_with_state(state.clone(), require_bearer_token));

    Router::new()
        .route("/health", get(health::health_handler))
        .route("/v1/ws", get(ws_handler))
        .merge(protected)
        .with_state(state)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use clawlite_channels::ChannelManager;
    use clawlite_core::bus::queue::MessageBus;
    use clawlite_core::config::schema::Config;
    use clawlite_cron::CronService;
    use tower::ServiceExt;

    fn make_state() -> Arc<AppState> {
        let dir = tempfile::tempdir().unwrap();
        let bus = Arc::new(MessageBus::new(16, std::time::Duration::from_secs(300)));
        let mut config = Config::default();
        config.agents.defaults.model = "gpt-test".into();
        config.providers.openai.api_key = "test-key".into();
        config.workspace = dir.path().join("workspace").to_string_lossy().into_owned();
        config.state = dir.path().join("state").to_string_lossy().into_owned();
        let agent = Arc::new(clawlite_agent::AgentLoop::new(bus.clone(), &config, None, None).unwrap());
        let cron = Arc::new(CronService::new(bus.clone(), None));
        let channels = Arc::new(ChannelManager::new(bus));
        Arc::new(AppState::new("secret-token".into(), agent, cron, channels))
    }

    #[tokio::test]
    async fn test_health_is_unauthenticated() {
        let router = build_router(make_state());
        let resp = router
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_protected_route_without_token_is_401() {
        let router = build_router(make_state());
        let resp = router
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri("/v1/status")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_protected_route_with_token_is_200() {
        let router = build_router(make_state());
        let resp = router
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri("/v1/status")
                    .header("authorization", "Bearer secret-token")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_cron_add_then_list_roundtrip() {
        let router = build_router(make_state());
        let add_body = serde_json::json!({
            "session_id": "telegram:1",
            "expression": "every 60 seconds",
            "prompt": "ping",
        });
        let resp = router
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/v1/cron/add")
                    .header("authorization", "Bearer secret-token")
                    .header("content-type", "application/json")
                    .body(Body::from(add_body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let resp = router
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri("/v1/cron/list?session_id=telegram:1")
                    .header("authorization", "Bearer secret-token")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_cron_add_rejects_bad_expression() {
        let router = build_router(make_state());
        let add_body = serde_json::json!({
            "session_id": "telegram:1",
            "expression": "every 0 seconds",
            "prompt": "ping",
        });
        let resp = router
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/v1/cron/add")
                    .header("authorization", "Bearer secret-token")
                    .header("content-type", "application/json")
                    .body(Body::from(add_body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}
