//! Gateway command — the long-running process: bus, agent loop, channels,
//! cron + heartbeat, and the HTTP/WebSocket surface, all wired together.
//!
//! Startup sequence:
//! 1. Load (and persist, if first run) config
//! 2. Create the message bus
//! 3. Create the cron service, wrap it as the agent's `CronScheduler`
//! 4. Create the agent loop (with tools, sessions, the cron tool)
//! 5. Wire the cron service's `on_job` callback to `agent_loop.respond`
//! 6. Create the heartbeat service, wire its decide/act callbacks
//! 7. Create the channel manager, register configured Telegram accounts
//! 8. Build the gateway `AppState` and run everything concurrently via
//!    `tokio::select!`, with Ctrl+C triggering graceful shutdown

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::info;

use clawlite_agent::AgentLoop;
use clawlite_channels::telegram::TelegramChannel;
use clawlite_channels::ChannelManager;
use clawlite_core::bus::queue::MessageBus;
use clawlite_core::bus::types::{InboundMessage, OutboundMessage};
use clawlite_core::config::load_or_init_config;
use clawlite_core::session::manager::SessionManager;
use clawlite_cron::heartbeat::HeartbeatService;
use clawlite_cron::CronService;
use clawlite_gateway::{AppState, CronServiceAdapter};

use crate::helpers;

/// Run the gateway until Ctrl+C.
pub async fn run() -> Result<()> {
    helpers::print_banner();

    // 1. Load config (persists a freshly generated bearer token on first run)
    let config = load_or_init_config(None);

    std::fs::create_dir_all(&config.workspace)
        .with_context(|| format!("failed to create workspace: {}", config.workspace))?;
    std::fs::create_dir_all(&config.state)
        .with_context(|| format!("failed to create state dir: {}", config.state))?;

    // 2. Message bus, shared by the agent loop, cron, and channels
    let bus = Arc::new(MessageBus::new(100, std::time::Duration::from_secs(300)));

    // 3. Cron service, wrapped as the agent's CronScheduler
    let cron_service = Arc::new(CronService::new(
        bus.clone(),
        Some(std::path::PathBuf::from(&config.state).join("cron.db")),
    ));
    let cron_scheduler = Arc::new(CronServiceAdapter::new(cron_service.clone()));

    // 4. Agent loop
    let agent_loop = Arc::new(
        AgentLoop::new(bus.clone(), &config, Some(cron_scheduler), None)
            .context("failed to build agent loop")?,
    );

    // 5. Deliver cron results back to the job's owning session/channel
    {
        let agent = agent_loop.clone();
        let bus = bus.clone();
        cron_service
            .set_on_job(Arc::new(move |job: clawlite_cron::CronJob| {
                let agent = agent.clone();
                let bus = bus.clone();
                Box::pin(async move {
                    let (channel, chat_id) = job
                        .session_id
                        .split_once(':')
                        .unwrap_or(("cron", job.id.as_str()));
                    let inbound =
                        InboundMessage::new(channel, chat_id, chat_id, &job.payload.message);
                    let response = agent
                        .respond(&inbound)
                        .await
                        .map(|r| r.text)
                        .unwrap_or_else(|e| format!("Error: {e}"));

                    if job.payload.deliver {
                        if let Some(ref chat_id) = job.payload.to {
                            let channel = job.payload.channel.as_deref().unwrap_or(channel);
                            let msg = OutboundMessage::new(channel, chat_id.as_str(), &response);
                            if let Err(e) = bus.publish_outbound(msg).await {
                                tracing::error!(error = %e, "failed to deliver cron result");
                            }
                        }
                    }

                    Ok(response)
                })
            }))
            .await;
    }

    if let Err(e) = cron_service.load().await {
        tracing::warn!(error = %e, "failed to pre-load cron store");
    }
    let cron_jobs = cron_service.list_jobs().await;

    // 6. Heartbeat — its own SessionManager instance over the same session
    //    directory as the agent loop's (heartbeat only reads session ids to
    //    find the most recently active one, never writes).
    let sessions = Arc::new(
        SessionManager::new(std::path::PathBuf::from(&config.state).join("sessions"))
            .context("failed to open session store for heartbeat")?,
    );
    let mut heartbeat = HeartbeatService::new(
        sessions,
        bus.clone(),
        Some(config.scheduler.heartbeat_interval_seconds),
        config.scheduler.heartbeat_interval_seconds > 0,
    );
    {
        let agent = agent_loop.clone();
        heartbeat.set_on_decide(Arc::new(move |session_id, prompt| {
            let agent = agent.clone();
            Box::pin(async move { run_session_prompt(&agent, &session_id, &prompt).await })
        }));
    }
    {
        let agent = agent_loop.clone();
        heartbeat.set_on_act(Arc::new(move |session_id, prompt| {
            let agent = agent.clone();
            Box::pin(async move { run_session_prompt(&agent, &session_id, &prompt).await })
        }));
    }
    let heartbeat = Arc::new(heartbeat);

    // 7. Channel manager — Telegram accounts from config
    let mut channel_manager = ChannelManager::new(bus.clone());
    for account in &config.channels.telegram.accounts {
        if account.token.is_empty() {
            continue;
        }
        let telegram = TelegramChannel::new(
            account.token.clone(),
            bus.clone(),
            account.allowed_users.clone(),
        );
        channel_manager.register_account(Arc::new(telegram), &account.name);
        info!(account = %account.name, "registered telegram account");
    }
    let channel_manager = Arc::new(channel_manager);

    info!(
        model = %agent_loop.model(),
        channels = ?channel_manager.channel_names(),
        "gateway starting"
    );

    println!("  Model:     {}", agent_loop.model());
    println!("  Workspace: {}", config.workspace);
    println!("  Channels:  {} registered", channel_manager.len());
    if !cron_jobs.is_empty() {
        let enabled = cron_jobs.iter().filter(|j| j.enabled).count();
        println!("  Cron:      {} jobs ({} enabled)", cron_jobs.len(), enabled);
    }
    println!(
        "  Gateway:   http://{}:{}",
        config.gateway.host, config.gateway.port
    );
    println!();

    if channel_manager.is_empty() {
        println!("  No channels registered. The agent loop and HTTP/WS gateway still run;");
        println!("  configure a Telegram account in the config file to add chat access.");
        println!();
    }

    println!("  Ctrl+C to stop");
    println!();

    // 8. Gateway HTTP/WS surface
    let app_state = Arc::new(AppState::new(
        config.gateway.bearer_token.clone(),
        agent_loop.clone(),
        cron_service.clone(),
        channel_manager.clone(),
    ));
    let shutdown = CancellationToken::new();

    tokio::select! {
        _ = agent_loop.clone().run() => {
            info!("agent loop exited");
        }
        result = channel_manager.start_all() => {
            if let Err(e) = result {
                tracing::error!(error = %e, "channel manager error");
            }
        }
        result = cron_service.clone().run() => {
            if let Err(e) = result {
                tracing::error!(error = %e, "cron service error");
            }
        }
        result = heartbeat.start() => {
            if let Err(e) = result {
                tracing::error!(error = %e, "heartbeat service error");
            }
        }
        result = clawlite_gateway::serve(app_state, &config.gateway.host, config.gateway.port, shutdown.clone()) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "gateway server error");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            println!();
            println!("  Shutting down...");
            info!("received Ctrl+C, shutting down");
            heartbeat.stop();
            cron_service.stop().await;
            channel_manager.stop_all().await;
            shutdown.cancel();
        }
    }

    println!("  Gateway stopped. Goodbye!");
    Ok(())
}

async fn run_session_prompt(agent: &AgentLoop, session_id: &str, prompt: &str) -> Result<String> {
    let (channel, chat_id) = session_id.split_once(':').unwrap_or(("system", session_id));
    let inbound = InboundMessage::new(channel, chat_id, chat_id, prompt);
    agent.respond(&inbound).await.map(|r| r.text)
}

#[cfg(test)]
mod tests {
    // Full gateway wiring needs a live runtime and real provider credentials
    // to exercise end to end; component-level coverage lives in
    // clawlite-agent, clawlite-cron, clawlite-channels, and clawlite-gateway.
    #[test]
    fn test_module_compiles() {}
}
