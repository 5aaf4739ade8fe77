//! Cron tool — lets the agent schedule, list, and cancel its own cron jobs.
//!
//! The tool itself holds only a trait object (`CronScheduler`); the concrete
//! job store and tick loop live in the scheduler crate and are wired in by
//! whichever binary constructs the `AgentLoop`. This keeps the agent engine
//! decoupled from the scheduler's storage format, the same way it only
//! depends on `LlmProvider` rather than a concrete HTTP client.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::Mutex;

use super::base::{optional_string, require_string, Tool};

// ─────────────────────────────────────────────
// CronScheduler trait
// ─────────────────────────────────────────────

/// A scheduled job as surfaced to the agent (and, via the gateway, to API clients).
#[derive(Clone, Debug)]
pub struct CronJobSummary {
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

/// Error returned when a job expression fails to parse.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct CronExpressionError(pub String);

/// Minimal interface the agent needs from the scheduler crate.
#[async_trait]
pub trait CronScheduler: Send + Sync {
    /// Schedule a new job. `expression` follows the `every <N seconds>` /
    /// `at <RFC3339>` / 5-field cron grammar; malformed expressions are
    /// rejected here rather than stored.
    async fn add_job(
        &self,
        session_id: &str,
        expression: &str,
        prompt: &str,
        name: Option<&str>,
    ) -> Result<String, CronExpressionError>;

    /// List jobs belonging to a session.
    async fn list_jobs(&self, session_id: &str) -> Vec<CronJobSummary>;

    /// Remove a job by id. Returns whether it existed.
    async fn remove_job(&self, job_id: &str) -> bool;
}

// ─────────────────────────────────────────────
// CronTool
// ─────────────────────────────────────────────

/// Lets the agent manage its own scheduled jobs via a single `action` tool.
pub struct CronTool {
    scheduler: Arc<dyn CronScheduler>,
    /// Session id set per-interaction by the agent loop, so jobs created
    /// without an explicit `session_id` argument attach to the current chat.
    session_id: Mutex<String>,
}

impl CronTool {
    pub fn new(scheduler: Arc<dyn CronScheduler>) -> Self {
        Self {
            scheduler,
            session_id: Mutex::new("cli:direct".to_string()),
        }
    }

    pub async fn set_context(&self, session_id: &str) {
        *self.session_id.lock().await = session_id.to_string();
    }
}

#[async_trait]
impl Tool for CronTool {
    fn name(&self) -> &str {
        "cron"
    }

    fn description(&self) -> &str {
        "Manage scheduled jobs for this session. Actions: 'add' (schedule a prompt to \
         run later), 'list' (show scheduled jobs), 'remove' (cancel a job by id). \
         Expressions: 'every <N> seconds', 'at <RFC3339 timestamp>' (fires once), \
         or a standard 5-field cron expression."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "action": {
                    "type": "string",
                    "enum": ["add", "list", "remove"],
                    "description": "Which operation to perform"
                },
                "expression": {
                    "type": "string",
                    "description": "Required for 'add'. e.g. 'every 3600 seconds', 'at 2026-01-01T00:00:00Z', or '0 9 * * *'"
                },
                "prompt": {
                    "type": "string",
                    "description": "Required for 'add'. The prompt run when the job fires"
                },
                "name": {
                    "type": "string",
                    "description": "Optional display name for 'add'"
                },
                "job_id": {
                    "type": "string",
                    "description": "Required for 'remove'"
                }
            },
            "required": ["action"]
        })
    }

    async fn execute(&self, params: HashMap<String, Value>) -> anyhow::Result<String> {
        let action = require_string(&params, "action")?;
        let session_id = self.session_id.lock().await.clone();

        match action.as_str() {
            "add" => {
                let expression = require_string(&params, "expression")?;
                let prompt = require_string(&params, "prompt")?;
                let name = optional_string(&params, "name");

                match self
                    .scheduler
                    .add_job(&session_id, &expression, &prompt, name.as_deref())
                    .await
                {
                    Ok(job_id) => Ok(format!("Scheduled job {job_id} ({expression})")),
                    Err(e) => Ok(format!("Error: invalid cron expression: {e}")),
                }
            }
            "list" => {
                let jobs = self.scheduler.list_jobs(&session_id).await;
                if jobs.is_empty() {
                    return Ok("No scheduled jobs.".into());
                }
                let lines: Vec<String> = jobs
                    .iter()
                    .map(|j| {
                        format!(
                            "- {} [{}] {} (next: {})",
                            j.id,
                            if j.enabled { "enabled" } else { "disabled" },
                            j.expression,
                            j.next_fire_at.as_deref().unwrap_or("unknown")
                        )
                    })
                    .collect();
                Ok(lines.join("\n"))
            }
            "remove" => {
                let job_id = require_string(&params, "job_id")?;
                if self.scheduler.remove_job(&job_id).await {
                    Ok(format!("Removed job {job_id}"))
                } else {
                    Ok(format!("Error: job {job_id} not found"))
                }
            }
            other => anyhow::bail!("Unknown cron action: {other}"),
        }
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
