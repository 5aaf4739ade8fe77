//! `POST /v1/cron/add`, `GET /v1/cron/list`, `DELETE /v1/cron/{job_id}`.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use clawlite_agent::tools::cron_tool::{CronJobSummary, CronScheduler};

use crate::cron_adapter::CronServiceAdapter;
use crate::error::GatewayError;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct AddRequest {
    pub session_id: String,
    pub expression: String,
    pub prompt: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Serialize)]
pub struct AddResponse {
    pub job_id: String,
}

pub async fn add_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AddRequest>,
) -> Result<Json<AddResponse>, GatewayError> {
    let adapter = CronServiceAdapter::new(state.cron.clone());
    let job_id = adapter
        .add_job(&req.session_id, &req.expression, &req.prompt, req.name.as_deref())
        .await
        .map_err(|e| GatewayError::bad_request("cron_expression_invalid", e.to_string()))?;
    Ok(Json(AddResponse { job_id }))
}

#[derive(Deserialize)]
pub struct ListQuery {
    pub session_id: String,
}

#[derive(Serialize)]
pub struct ListResponse {
    pub jobs: Vec<CronJobSummaryDto>,
}

/// `CronJobSummary` isn't `Serialize` (it crosses from the agent crate,
/// which has no reason to depend on serde_json for it); mirror its shape
/// here for the wire format.
#[derive(Serialize)]
pub struct CronJobSummaryDto {
    pub id: String,
    pub session_id: String,
    pub expression: String,
    pub prompt: String,
    pub name: Option<String>,
    pub enabled: bool,
    pub next_fire_at: Option<String>,
    pub last_fire_at: Option<String>,
    pub created_at: String,
}

impl From<CronJobSummary> for CronJobSummaryDto {
    fn from(j: CronJobSummary) -> Self {
        Self {
            id: j.id,
            session_id: j.session_id,
            expression: j.expression,
            prompt: j.prompt,
            name: j.name,
            enabled: j.enabled,
            next_fire_at: j.next_fire_at,
            last_fire_at: j.last_fire_at,
            created_at: j.created_at,
        }
    }
}

pub async fn list_handler(
    State(state): State<Arc<AppState>>,
    Query(q): Query<ListQuery>,
) -> Json<ListResponse> {
    let adapter = CronServiceAdapter::new(state.cron.clone());
    let jobs = adapter.list_jobs(&q.session_id).await.into_iter().map(Into::into).collect();
    Json(ListResponse { jobs })
}

#[derive(Serialize)]
pub struct RemoveResponse {
    pub removed: String,
}

pub async fn remove_handler(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<String>,
) -> Result<Json<RemoveResponse>, GatewayError> {
    let adapter = CronServiceAdapter::new(state.cron.clone());
    if adapter.remove_job(&job_id).await {
        Ok(Json(RemoveResponse { removed: job_id }))
    } else {
        Err(GatewayError::not_found("cron_job_not_found", format!("no job with id '{job_id}'")))
    }
}
