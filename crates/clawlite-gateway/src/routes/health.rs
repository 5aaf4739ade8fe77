//! GET /health — unauthenticated liveness probe.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

use crate::state::AppState;

pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "ok": true,
        "uptime_seconds": state.uptime_seconds(),
        "connections": state.connections(),
    }))
}
