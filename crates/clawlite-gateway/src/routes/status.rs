//! GET /v1/status — read-only status surface for dashboards.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

use crate::state::AppState;

pub async fn status_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    let channel_health: Value = state
        .channels
        .outbound_health()
        .into_iter()
        .map(|(name, level)| (name, json!(format!("{level:?}").to_lowercase())))
        .collect();

    let jobs = state.cron.list_jobs().await;
    let enabled_jobs = jobs.iter().filter(|j| j.enabled).count();

    Json(json!({
        "model": state.agent.model(),
        "uptime_seconds": state.uptime_seconds(),
        "connections": state.connections(),
        "channels": channel_health,
        "cron": {
            "total": jobs.len(),
            "enabled": enabled_jobs,
        },
    }))
}
