//! ClawLite CLI — entry point.
//!
//! # Commands
//!
//! - `clawlite agent -m MESSAGE [-s SESSION]` — single-shot chat turn
//! - `clawlite gateway` — run the full process: bus, channels, agent loop,
//!   cron + heartbeat, and the HTTP/WebSocket gateway, until Ctrl+C
//! - `clawlite status` — show configuration and provider status
//! - `clawlite cron ...` — manage scheduled jobs
//! - `clawlite channels ...` — show chat channel configuration status

mod channels_cmd;
mod cron_cmd;
mod gateway;
mod helpers;
mod status;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use clawlite_agent::AgentLoop;
use clawlite_core::bus::queue::MessageBus;
use clawlite_core::bus::types::InboundMessage;
use clawlite_core::config::{load_config, Config};

/// ClawLite — a long-running personal autonomous agent.
#[derive(Parser)]
#[command(name = "clawlite", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Send a single message to the agent and print the reply
    Agent {
        /// Message text
        #[arg(short, long)]
        message: String,

        /// Session identifier (format: "channel:chat_id")
        #[arg(short, long, default_value = "cli:default")]
        session: String,

        /// Enable debug logging
        #[arg(long, default_value_t = false)]
        logs: bool,
    },

    /// Show configuration and provider status
    Status,

    /// Run the gateway: channels, agent loop, cron, heartbeat, HTTP/WS API
    Gateway {
        /// Enable debug logging
        #[arg(long, default_value_t = false)]
        logs: bool,
    },

    /// Manage scheduled tasks
    Cron {
        #[command(subcommand)]
        action: cron_cmd::CronCommands,
    },

    /// Show chat channel configuration status
    Channels {
        #[command(subcommand)]
        action: channels_cmd::ChannelsCommands,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Agent { message, session, logs } => {
            init_logging(logs);
            run_agent(message, session).await
        }
        Commands::Status => status::run(),
        Commands::Gateway { logs } => {
            init_logging(logs);
            gateway::run().await
        }
        Commands::Cron { action } => {
            init_logging(false);
            cron_cmd::dispatch(action).await
        }
        Commands::Channels { action } => channels_cmd::dispatch(action),
    }
}

async fn run_agent(message: String, session_id: String) -> Result<()> {
    let config = load_config(None);
    let agent_loop = build_agent_loop(&config)?;

    let (channel, chat_id) = session_id
        .split_once(':')
        .unwrap_or(("cli", session_id.as_str()));

    info!(session = %session_id, "processing single message");
    let inbound = InboundMessage::new(channel, chat_id, chat_id, &message);
    let result = agent_loop
        .respond(&inbound)
        .await
        .context("agent processing failed")?;
    helpers::print_response(&result.text);

    Ok(())
}

/// Build a standalone `AgentLoop` with no cron scheduler wired in — used by
/// the one-shot `agent` command and by `cron run`.
pub fn build_agent_loop(config: &Config) -> Result<AgentLoop> {
    std::fs::create_dir_all(&config.workspace)
        .with_context(|| format!("failed to create workspace: {}", config.workspace))?;
    std::fs::create_dir_all(&config.state)
        .with_context(|| format!("failed to create state dir: {}", config.state))?;

    let bus = Arc::new(MessageBus::new(100, std::time::Duration::from_secs(300)));
    AgentLoop::new(bus, config, None, None).context("failed to build agent loop")
}

/// Initialize tracing/logging.
fn init_logging(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("clawlite=debug,info")
    } else {
        EnvFilter::new("warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}
