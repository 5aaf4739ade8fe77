//! Adapts `clawlite_cron::CronService` to the `CronScheduler` trait the
//! agent's `cron` tool depends on. Lives here (not in `clawlite-cron`)
//! because the trait itself lives in `clawlite-agent` — wiring the two
//! crates together is the job of whichever binary constructs the
//! `AgentLoop`, per `CronTool`'s own doc comment.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};

use clawlite_agent::tools::cron_tool::{CronExpressionError, CronJobSummary, CronScheduler};
use clawlite_cron::types::{parse_expression, CronPayload, CronSchedule, ScheduleKind};
use clawlite_cron::{CronJob, CronService};

/// Thin wrapper so `CronService` (owned by the binary's process wiring)
/// can also be reached as a `dyn CronScheduler` by the agent's `cron`
/// tool and the gateway's `/v1/cron/*` routes.
pub struct CronServiceAdapter {
    service: Arc<CronService>,
}

impl CronServiceAdapter {
    pub fn new(service: Arc<CronService>) -> Self {
        Self { service }
    }
}

fn format_expression(schedule: &CronSchedule) -> String {
    match schedule.kind {
        ScheduleKind::Every => {
            let secs = schedule.every_ms.unwrap_or(60_000) / 1000;
            format!("every {secs} seconds")
        }
        ScheduleKind::At => {
            let ts = schedule.at_ms.and_then(|ms| Utc.timestamp_millis_opt(ms).single());
            match ts {
                Some(dt) => format!("at {}", dt.to_rfc3339()),
                None => "at <invalid>".to_string(),
            }
        }
        ScheduleKind::Cron => schedule.expr.clone().unwrap_or_default(),
    }
}

fn ms_to_rfc3339(ms: Option<i64>) -> Option<String> {
    ms.and_then(|v| Utc.timestamp_millis_opt(v).single())
        .map(|dt| dt.to_rfc3339())
}

fn to_summary(job: &CronJob) -> CronJobSummary {
    CronJobSummary {
        id: job.id.clone(),
        session_id: job.session_id.clone(),
        expression: format_expression(&job.schedule),
        prompt: job.payload.message.clone(),
        name: Some(job.name.clone()),
        enabled: job.enabled,
        next_fire_at: ms_to_rfc3339(job.state.next_run_at_ms),
        last_fire_at: ms_to_rfc3339(job.state.last_run_at_ms),
        created_at: ms_to_rfc3339(Some(job.created_at_ms)).unwrap_or_default(),
    }
}

#[async_trait]
impl CronScheduler for CronServiceAdapter {
    async fn add_job(
        &self,
        session_id: &str,
        expression: &str,
        prompt: &str,
        name: Option<&str>,
    ) -> Result<String, CronExpressionError> {
        let schedule = parse_expression(expression, None)
            .map_err(|e| CronExpressionError(e.to_string()))?;
        let payload = CronPayload {
            message: prompt.to_string(),
            deliver: true,
            channel: session_id.split_once(':').map(|(ch, _)| ch.to_string()),
            to: session_id.split_once(':').map(|(_, chat)| chat.to_string()),
        };
        let job_name = name.unwrap_or("job").to_string();
        let job = CronJob::new(job_name, schedule, payload).with_session(session_id);
        let id = job.id.clone();
        self.service
            .add_job(job)
            .await
            .map_err(|e| CronExpressionError(e.to_string()))?;
        Ok(id)
    }

    async fn list_jobs(&self, session_id: &str) -> Vec<CronJobSummary> {
        self.service
            .list_jobs()
            .await
            .iter()
            .filter(|j| j.session_id == session_id)
            .map(to_summary)
            .collect()
    }

    async fn remove_job(&self, job_id: &str) -> bool {
        self.service.remove_job(job_id).await.unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clawlite_core::bus::queue::MessageBus;

    fn make_adapter() -> CronServiceAdapter {
        let bus = Arc::new(MessageBus::new(16, std::time::Duration::from_secs(300)));
        CronServiceAdapter::new(Arc::new(CronService::new(bus, None)))
    }

    #[tokio::test]
    async fn test_add_and_list_scoped_to_session() {
        let adapter = make_adapter();
        adapter
            .add_job("telegram:42", "every 60 seconds", "say hi", Some("greet"))
            .await
            .unwrap();
        adapter
            .add_job("telegram:99", "every 60 seconds", "say bye", None)
            .await
            .unwrap();

        let mine = adapter.list_jobs("telegram:42").await;
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].prompt, "say hi");
        assert_eq!(mine[0].name.as_deref(), Some("greet"));
    }

    #[tokio::test]
    async fn test_add_rejects_malformed_expression() {
        let adapter = make_adapter();
        let err = adapter
            .add_job("telegram:42", "every 0 seconds", "x", None)
            .await
            .unwrap_err();
        assert!(!err.0.is_empty());
    }

    #[tokio::test]
    async fn test_remove_job() {
        let adapter = make_adapter();
        let id = adapter
            .add_job("telegram:42", "every 60 seconds", "x", None)
            .await
            .unwrap();
        assert!(adapter.remove_job(&id).await);
        assert!(!adapter.remove_job(&id).await);
    }

    #[test]
    fn test_format_expression_every() {
        assert_eq!(format_expression(&CronSchedule::every(60_000)), "every 60 seconds");
    }

    #[test]
    fn test_format_expression_cron() {
        assert_eq!(format_expression(&CronSchedule::cron("0 9 * * *")), "0 9 * * *");
    }
}
