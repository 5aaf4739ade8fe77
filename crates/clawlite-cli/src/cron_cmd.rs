//! `clawlite cron` — manage scheduled tasks from the CLI.
//!
//! - `clawlite cron list [--all] [--session ID]` — list scheduled jobs
//! - `clawlite cron add --name NAME --message MSG --expression EXPR [--session ID]` — add a job
//! - `clawlite cron remove <ID>` — remove a job
//! - `clawlite cron enable <ID> [--disable]` — enable/disable a job
//! - `clawlite cron run <ID>` — manually trigger a job
//!
//! `--expression` accepts the same grammar as the `cron` agent tool and the
//! gateway's `/v1/cron/add` route: `"every <N> [seconds]"`, `"at
//! <RFC3339 timestamp>"`, or a bare 5-field cron expression.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;

use clawlite_core::bus::queue::MessageBus;
use clawlite_core::bus::types::InboundMessage;
use clawlite_core::utils::get_state_path;
use clawlite_cron::types::{parse_expression, CronJob, CronPayload, ScheduleKind};
use clawlite_cron::CronService;

/// Cron subcommands.
#[derive(Subcommand)]
pub enum CronCommands {
    /// List scheduled jobs
    List {
        /// Include disabled jobs
        #[arg(short, long, default_value_t = false)]
        all: bool,

        /// Restrict to jobs owned by this session
        #[arg(long)]
        session: Option<String>,
    },

    /// Add a new scheduled job
    Add {
        /// Job name
        #[arg(short, long)]
        name: String,

        /// Prompt message for the agent
        #[arg(short, long)]
        message: String,

        /// Schedule expression: "every N [seconds]", "at <RFC3339>", or a cron expression
        #[arg(short, long)]
        expression: String,

        /// Owning session (format: "channel:chat_id")
        #[arg(short, long, default_value = "cli:default")]
        session: String,

        /// Deliver the agent's response to the session's channel
        #[arg(short, long, default_value_t = false)]
        deliver: bool,
    },

    /// Remove a scheduled job by ID
    Remove {
        /// Job ID (8-character hex)
        job_id: String,
    },

    /// Enable or disable a job
    Enable {
        /// Job ID (8-character hex)
        job_id: String,

        /// Disable instead of enable
        #[arg(long, default_value_t = false)]
        disable: bool,
    },

    /// Manually run a job now
    Run {
        /// Job ID (8-character hex)
        job_id: String,
    },
}

/// Dispatch a cron subcommand.
pub async fn dispatch(cmd: CronCommands) -> Result<()> {
    match cmd {
        CronCommands::List { all, session } => list_jobs(all, session).await,
        CronCommands::Add { name, message, expression, session, deliver } => {
            add_job(name, message, expression, session, deliver).await
        }
        CronCommands::Remove { job_id } => remove_job(&job_id).await,
        CronCommands::Enable { job_id, disable } => enable_job(&job_id, !disable).await,
        CronCommands::Run { job_id } => run_job(&job_id).await,
    }
}

/// Create a `CronService` over the default store path. No bus traffic is
/// expected for CLI-only operations, so a minimal bus is enough.
fn make_service() -> CronService {
    let store_path = get_state_path().join("cron.db");
    let bus = Arc::new(MessageBus::new(1, std::time::Duration::from_secs(300)));
    CronService::new(bus, Some(store_path))
}

/// Format milliseconds as a human-readable duration.
fn format_duration_ms(ms: i64) -> String {
    let secs = ms / 1000;
    if secs < 60 {
        format!("{secs}s")
    } else if secs < 3600 {
        format!("{}m", secs / 60)
    } else if secs < 86400 {
        format!("{}h", secs / 3600)
    } else {
        format!("{}d", secs / 86400)
    }
}

/// Format a Unix epoch timestamp (ms) as a local datetime string.
fn format_timestamp_ms(ms: i64) -> String {
    use chrono::{Local, TimeZone};
    match Local.timestamp_millis_opt(ms) {
        chrono::LocalResult::Single(dt) => dt.format("%Y-%m-%d %H:%M").to_string(),
        _ => "—".to_string(),
    }
}

/// `clawlite cron list [--all] [--session ID]`
async fn list_jobs(include_disabled: bool, session: Option<String>) -> Result<()> {
    let service = make_service();
    service.load().await.context("failed to load cron store")?;

    let jobs = service.list_jobs().await;
    let jobs: Vec<&CronJob> = jobs
        .iter()
        .filter(|j| include_disabled || j.enabled)
        .filter(|j| session.as_deref().is_none_or(|s| j.session_id == s))
        .collect();

    if jobs.is_empty() {
        println!(
            "  No scheduled jobs.{}",
            if !include_disabled { " Use --all to include disabled." } else { "" }
        );
        return Ok(());
    }

    println!();
    println!("{}", "  Scheduled Jobs".cyan().bold());
    println!();
    println!(
        "  {:<10} {:<20} {:<18} {:<10} {}",
        "ID".bold(),
        "Name".bold(),
        "Schedule".bold(),
        "Status".bold(),
        "Next Run".bold(),
    );
    println!("  {}", "─".repeat(76));

    for job in &jobs {
        let schedule = match job.schedule.kind {
            ScheduleKind::Every => {
                let ms = job.schedule.every_ms.unwrap_or(60_000);
                format!("every {}", format_duration_ms(ms))
            }
            ScheduleKind::Cron => job.schedule.expr.clone().unwrap_or_else(|| "—".to_string()),
            ScheduleKind::At => "one-time".to_string(),
        };

        let status = if job.enabled {
            "enabled".green().to_string()
        } else {
            "disabled".dimmed().to_string()
        };

        let next_run = match job.state.next_run_at_ms {
            Some(ms) => format_timestamp_ms(ms),
            None => "—".to_string(),
        };

        println!("  {:<10} {:<20} {:<18} {:<10} {}", job.id, job.name, schedule, status, next_run);
    }

    println!();
    Ok(())
}

/// `clawlite cron add`
async fn add_job(
    name: String,
    message: String,
    expression: String,
    session: String,
    deliver: bool,
) -> Result<()> {
    let schedule = parse_expression(&expression, None)
        .map_err(|e| anyhow::anyhow!("invalid schedule expression '{expression}': {e}"))?;

    let (channel, chat_id) = session.split_once(':').unwrap_or(("cli", session.as_str()));
    let payload = CronPayload {
        message,
        deliver,
        channel: Some(channel.to_string()),
        to: Some(chat_id.to_string()),
    };

    let job = CronJob::new(name, schedule, payload).with_session(session);

    let service = make_service();
    service.load().await.context("failed to load cron store")?;
    let id = service.add_job(job).await.context("failed to add job")?;

    println!(
        "  {} Added job {} ({})",
        "✓".green(),
        id.cyan(),
        service.get_job(&id).await.map(|j| j.name).unwrap_or_default()
    );

    Ok(())
}

/// `clawlite cron remove <ID>`
async fn remove_job(id: &str) -> Result<()> {
    let service = make_service();
    service.load().await.context("failed to load cron store")?;

    if service.remove_job(id).await? {
        println!("  {} Removed job {}", "✓".green(), id.cyan());
    } else {
        println!("  {} Job {} not found", "✗".red(), id);
    }

    Ok(())
}

/// `clawlite cron enable <ID> [--disable]`
async fn enable_job(id: &str, enabled: bool) -> Result<()> {
    let service = make_service();
    service.load().await.context("failed to load cron store")?;

    if service.set_enabled(id, enabled).await? {
        let label = if enabled { "Enabled" } else { "Disabled" };
        let job_name = service.get_job(id).await.map(|j| j.name).unwrap_or_default();
        println!("  {} {} job '{}' ({})", "✓".green(), label, job_name, id.cyan());
    } else {
        println!("  {} Job {} not found", "✗".red(), id);
    }

    Ok(())
}

/// `clawlite cron run <ID>` — fires the job's prompt through a fresh
/// agent loop scoped to the job's owning session, then updates run state.
async fn run_job(id: &str) -> Result<()> {
    let service = make_service();
    service.load().await.context("failed to load cron store")?;

    let job = match service.get_job(id).await {
        Some(job) => job,
        None => {
            println!("  {} Job {} not found", "✗".red(), id);
            return Ok(());
        }
    };

    println!("  {} Running job '{}' ({})...", "⠿".dimmed(), job.name, id.cyan());

    let config = clawlite_core::config::load_config(None);
    let agent_loop = crate::build_agent_loop(&config)?;

    let (channel, chat_id) = job.session_id.split_once(':').unwrap_or(("cli", job.id.as_str()));
    let inbound = InboundMessage::new(channel, chat_id, chat_id, &job.payload.message);
    let result = agent_loop
        .respond(&inbound)
        .await
        .context("agent processing failed")?;

    service.execute_job(id).await;

    crate::helpers::print_response(&result.text);

    Ok(())
}
