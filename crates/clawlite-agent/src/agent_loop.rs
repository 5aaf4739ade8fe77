//! Agent loop — the LLM ↔ tool-calling main loop.
//!
//! Receives inbound messages, builds context, drives the provider
//! fallback chain, dispatches tool calls, and publishes outbound
//! responses. Also owns the per-session `CancellationRegistry` backing
//! `/stop`.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use clawlite_core::bus::queue::MessageBus;
use clawlite_core::bus::types::{InboundMessage, OutboundMessage};
use clawlite_core::config::schema::Config;
use clawlite_core::error::ClawLiteError;
use clawlite_core::session::manager::SessionManager;
use clawlite_core::types::{Message, ProviderMode, SessionId, ToolCall, ToolDefinition, UsageInfo};
use clawlite_providers::fallback::{FallbackChain, FallbackOutcome};
use clawlite_providers::http_provider::create_provider;
use clawlite_providers::traits::{LlmProvider, LlmRequestConfig};

use crate::context::ContextBuilder;
use crate::skills::SkillsLoader;
use crate::subagent::SubagentManager;
use crate::tools::cron_tool::{CronScheduler, CronTool};
use crate::tools::filesystem::{EditFileTool, ListDirTool, ReadFileTool, WriteFileTool};
use crate::tools::mcp_tool::{McpCallTool, McpServer};
use crate::tools::message::MessageTool;
use crate::tools::registry::ToolRegistry;
use crate::tools::shell::ExecTool;
use crate::tools::skill_tool::SkillTool;
use crate::tools::spawn::SpawnTool;
use crate::tools::web::{WebFetchTool, WebSearchTool};

/// Bound on the tool-call loop when `Config` is not available (tests, direct construction).
const DEFAULT_MAX_ITERATIONS: usize = 8;

/// Configuration for the exec tool, already resolved from `Config` — a
/// plain value type separate from `clawlite_core::config::schema::ExecToolConfig`,
/// which is the serde-deserializable, defaultable form read from disk.
#[derive(Clone, Debug)]
pub struct ExecToolConfig {
    pub timeout: u64,
}

impl Default for ExecToolConfig {
    fn default() -> Self {
        Self { timeout: 60 }
    }
}

// ─────────────────────────────────────────────
// ChatDriver — decouples the agent loop from FallbackChain's concrete
// HTTP-backed construction, the same way CronScheduler decouples the
// cron tool from the concrete scheduler crate.
// ─────────────────────────────────────────────

/// Drives one chat completion attempt across whatever providers/models
/// the implementation chooses, returning which one actually answered.
#[async_trait]
pub trait ChatDriver: Send + Sync {
    async fn chat(
        &self,
        messages: &[Message],
        tools: Option<&[ToolDefinition]>,
        config: &LlmRequestConfig,
    ) -> Result<FallbackOutcome, ClawLiteError>;
}

#[async_trait]
impl ChatDriver for FallbackChain {
    async fn chat(
        &self,
        messages: &[Message],
        tools: Option<&[ToolDefinition]>,
        config: &LlmRequestConfig,
    ) -> Result<FallbackOutcome, ClawLiteError> {
        FallbackChain::chat(self, messages, tools, config).await
    }
}

// ─────────────────────────────────────────────
// AssistantResult
// ─────────────────────────────────────────────

/// Metadata describing how an assistant turn was produced.
#[derive(Clone, Debug)]
pub struct AssistantMeta {
    pub model: String,
    pub mode: ProviderMode,
    pub reason: String,
    pub tokens: Option<UsageInfo>,
    pub cost: Option<f64>,
    pub turns: usize,
}

/// The result of one assistant turn: final text plus provenance.
#[derive(Clone, Debug)]
pub struct AssistantResult {
    pub text: String,
    pub meta: AssistantMeta,
}

fn mode_str(mode: ProviderMode) -> &'static str {
    match mode {
        ProviderMode::Online => "online",
        ProviderMode::Fallback => "fallback",
        ProviderMode::Offline => "offline",
    }
}

// ─────────────────────────────────────────────
// CancellationRegistry
// ─────────────────────────────────────────────

/// One cancellation token per session, supporting `/stop`.
///
/// A new token is minted at the start of every turn; an out-of-band
/// `/stop` message cancels whatever token is currently on file for that
/// session, which the in-flight turn observes via `tokio::select!`.
struct CancellationRegistry {
    tokens: Mutex<HashMap<SessionId, CancellationToken>>,
}

impl CancellationRegistry {
    fn new() -> Self {
        Self {
            tokens: Mutex::new(HashMap::new()),
        }
    }

    fn new_token_for(&self, id: &SessionId) -> CancellationToken {
        let token = CancellationToken::new();
        let mut tokens = self.tokens.lock().unwrap();
        tokens.insert(id.clone(), token.clone());
        token
    }

    /// Cancel the current token for `id`. Returns whether one was found.
    fn cancel(&self, id: &SessionId) -> bool {
        let tokens = self.tokens.lock().unwrap();
        match tokens.get(id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }
}

// ─────────────────────────────────────────────
// AgentLoop
// ─────────────────────────────────────────────

/// Parameters resolved from `Config` (or assembled directly by tests)
/// before building an `AgentLoop`. Kept as a struct since the
/// constructor has too many independent knobs for a flat arg list.
struct BuildParams {
    bus: Arc<MessageBus>,
    chat_driver: Arc<dyn ChatDriver>,
    subagent_provider: Arc<dyn LlmProvider>,
    workspace: PathBuf,
    sessions_dir: PathBuf,
    model: String,
    max_iterations: usize,
    request_config: LlmRequestConfig,
    brave_api_key: Option<String>,
    exec_config: ExecToolConfig,
    restrict_to_workspace: bool,
    mcp_servers: Vec<McpServer>,
    cron_scheduler: Option<Arc<dyn CronScheduler>>,
    agent_name: String,
    memory_top_k: usize,
    history_window: usize,
    marketplace_path: Option<PathBuf>,
}

/// The main agent loop: polls the message bus, calls the LLM, dispatches tools.
pub struct AgentLoop {
    bus: Arc<MessageBus>,
    chat_driver: Arc<dyn ChatDriver>,
    #[allow(dead_code)]
    workspace: PathBuf,
    model: String,
    max_iterations: usize,
    request_config: LlmRequestConfig,
    tools: ToolRegistry,
    context: ContextBuilder,
    sessions: SessionManager,
    message_tool: Arc<MessageTool>,
    spawn_tool: Arc<SpawnTool>,
    subagent_manager: Arc<SubagentManager>,
    cancellations: CancellationRegistry,
}

impl AgentLoop {
    /// Build an agent loop from the resolved configuration.
    pub fn new(
        bus: Arc<MessageBus>,
        config: &Config,
        cron_scheduler: Option<Arc<dyn CronScheduler>>,
        agent_name: Option<String>,
    ) -> Result<Self> {
        let workspace = PathBuf::from(&config.workspace);
        let state = PathBuf::from(&config.state);
        let model = config.agents.defaults.model.clone();
        let providers = config.providers.to_map();

        let chain = FallbackChain::new(
            model.clone(),
            config.agents.defaults.fallback.clone(),
            config.agents.defaults.offline_model.clone(),
            providers.clone(),
        );

        let subagent_provider: Arc<dyn LlmProvider> =
            Arc::new(create_provider(&model, &providers)?);

        let brave_key = config.tools.web.search.api_key.clone();
        let brave_api_key = if brave_key.is_empty() { None } else { Some(brave_key) };

        let mcp_servers = config
            .tools
            .mcp
            .servers
            .iter()
            .map(|s| McpServer {
                name: s.name.clone(),
                url: s.url.clone(),
            })
            .collect();

        let marketplace_path = config.tools.skills.marketplace_path.clone().map(PathBuf::from);

        Self::assemble(BuildParams {
            bus,
            chat_driver: Arc::new(chain),
            subagent_provider,
            workspace,
            sessions_dir: state.join("sessions"),
            model,
            max_iterations: config.agents.defaults.max_turns as usize,
            request_config: LlmRequestConfig {
                max_tokens: config.agents.defaults.max_tokens,
                temperature: config.agents.defaults.temperature,
            },
            brave_api_key,
            exec_config: ExecToolConfig {
                timeout: config.tools.exec.timeout,
            },
            restrict_to_workspace: config.tools.restrict_to_workspace,
            mcp_servers,
            cron_scheduler,
            agent_name: agent_name.unwrap_or_else(|| "ClawLite".into()),
            memory_top_k: config.agents.defaults.memory_top_k as usize,
            history_window: config.agents.defaults.history_window as usize,
            marketplace_path,
        })
    }

    fn assemble(p: BuildParams) -> Result<Self> {
        let sessions = SessionManager::new(p.sessions_dir)?;

        let context = ContextBuilder::new(&p.workspace, &p.agent_name)
            .with_skill_roots(None, p.marketplace_path.clone())
            .with_memory_top_k(p.memory_top_k)
            .with_history_window(p.history_window);

        let mut tools = ToolRegistry::new();
        let allowed_dir = if p.restrict_to_workspace {
            Some(p.workspace.clone())
        } else {
            None
        };

        tools.register(Arc::new(ReadFileTool::new(allowed_dir.clone())));
        tools.register(Arc::new(WriteFileTool::new(allowed_dir.clone())));
        tools.register(Arc::new(EditFileTool::new(allowed_dir.clone())));
        tools.register(Arc::new(ListDirTool::new(allowed_dir)));
        tools.register(Arc::new(ExecTool::new(
            p.workspace.clone(),
            Some(p.exec_config.timeout),
            p.restrict_to_workspace,
        )));
        tools.register(Arc::new(WebSearchTool::new(p.brave_api_key.clone())));
        tools.register(Arc::new(WebFetchTool::new()));

        let message_tool = Arc::new(MessageTool::new(None));
        tools.register(message_tool.clone());

        let subagent_manager = Arc::new(SubagentManager::new(
            p.subagent_provider,
            p.workspace.clone(),
            p.bus.clone(),
            p.model.clone(),
            p.brave_api_key.clone(),
            p.exec_config.clone(),
            p.restrict_to_workspace,
            p.request_config.clone(),
        ));
        let spawn_tool = Arc::new(SpawnTool::new(subagent_manager.clone()));
        tools.register(spawn_tool.clone());

        let skills_loader = Arc::new(SkillsLoader::new(&p.workspace, None, p.marketplace_path));
        tools.register(Arc::new(SkillTool::new(skills_loader, None)));

        if !p.mcp_servers.is_empty() {
            tools.register(Arc::new(McpCallTool::new(p.mcp_servers)));
        }

        if let Some(scheduler) = p.cron_scheduler {
            tools.register(Arc::new(CronTool::new(scheduler)));
        }

        info!(
            model = %p.model,
            tools = tools.len(),
            max_iterations = p.max_iterations,
            "agent loop initialized"
        );

        Ok(Self {
            bus: p.bus,
            chat_driver: p.chat_driver,
            workspace: p.workspace,
            model: p.model,
            max_iterations: p.max_iterations,
            request_config: p.request_config,
            tools,
            context,
            sessions,
            message_tool,
            spawn_tool,
            subagent_manager,
            cancellations: CancellationRegistry::new(),
        })
    }

    /// Run the event loop: poll inbound messages and process them.
    ///
    /// Each message is dispatched on its own task so a `/stop` for a
    /// session can interrupt an in-flight turn for that same session
    /// rather than queuing behind it.
    pub async fn run(self: Arc<Self>) {
        info!("agent loop started, waiting for messages");
        loop {
            match self.bus.consume_inbound().await {
                Some(msg) => {
                    let this = Arc::clone(&self);
                    tokio::spawn(async move {
                        this.dispatch(msg).await;
                    });
                }
                None => {
                    info!("inbound channel closed, agent loop exiting");
                    break;
                }
            }
        }
    }

    /// Route one inbound message: `/stop` short-circuits, subagent
    /// results are summarized in the original session, everything else
    /// goes through the normal per-session dispatch gate.
    async fn dispatch(&self, msg: InboundMessage) {
        if msg.content.trim() == "/stop" && !Self::is_system_message(&msg) {
            self.handle_stop(&msg).await;
            return;
        }

        let session_id = msg.session_id();
        let _permit = self.bus.acquire_session_permit(&session_id).await;

        let result = if Self::is_system_message(&msg) {
            self.process_system_message(&msg).await
        } else {
            self.process_message(&msg).await
        };

        match result {
            Ok(response) => {
                if let Err(e) = self.bus.publish_outbound(response).await {
                    error!(error = %e, "failed to publish outbound message");
                }
            }
            Err(e) => {
                error!(error = %e, session_id = %session_id.as_str(), "message processing error");
                let err_msg = OutboundMessage::new(
                    &msg.channel,
                    &msg.chat_id,
                    &format!("I encountered an error: {e}"),
                );
                let _ = self.bus.publish_outbound(err_msg).await;
            }
        }
    }

    fn is_system_message(msg: &InboundMessage) -> bool {
        msg.channel == "system" && msg.sender_id == "subagent"
    }

    /// Cancel the in-flight turn (and any subagents) for the session a
    /// `/stop` message arrived on.
    async fn handle_stop(&self, msg: &InboundMessage) {
        let session_id = msg.session_id();
        let had_turn = self.cancellations.cancel(&session_id);
        let cancelled_subagents = self
            .subagent_manager
            .cancel_for_origin(&msg.channel, &msg.chat_id)
            .await;

        info!(
            session_id = %session_id.as_str(),
            had_turn,
            cancelled_subagents,
            "handled /stop"
        );

        let out = OutboundMessage::new(&msg.channel, &msg.chat_id, "Stopped.");
        let _ = self.bus.publish_outbound(out).await;
    }

    /// Process a single inbound message → outbound response.
    pub async fn process_message(&self, msg: &InboundMessage) -> Result<OutboundMessage> {
        let result = self.respond(msg).await?;
        Ok(self.to_outbound(&msg.channel, &msg.chat_id, result))
    }

    /// Build an `AssistantResult` for an inbound message, without
    /// wrapping it in an `OutboundMessage`.
    pub async fn respond(&self, msg: &InboundMessage) -> Result<AssistantResult> {
        let media: Vec<String> = msg.media.iter().map(|m| m.path.clone()).collect();
        self.respond_in_session(&msg.channel, &msg.chat_id, &msg.content, &media)
            .await
    }

    /// Process a system message (from a subagent), routing the result
    /// back to the session that originated the subagent spawn.
    async fn process_system_message(&self, msg: &InboundMessage) -> Result<OutboundMessage> {
        info!(
            sender = %msg.sender_id,
            chat_id = %msg.chat_id,
            "processing system message"
        );

        let (origin_channel, origin_chat_id) = match msg.chat_id.split_once(':') {
            Some((ch, cid)) => (ch.to_string(), cid.to_string()),
            None => {
                return Err(anyhow::anyhow!(
                    "Invalid system message chat_id format: {}",
                    msg.chat_id
                ));
            }
        };

        let result = self
            .respond_in_session(&origin_channel, &origin_chat_id, &msg.content, &[])
            .await?;

        Ok(self.to_outbound(&origin_channel, &origin_chat_id, result))
    }

    /// Shared turn logic: build context, run the LLM ↔ tool loop, persist
    /// the exchange to the session log.
    async fn respond_in_session(
        &self,
        channel: &str,
        chat_id: &str,
        content: &str,
        media: &[String],
    ) -> Result<AssistantResult> {
        let session_id = SessionId::new(channel, chat_id);

        self.message_tool.set_context(channel, chat_id).await;
        self.spawn_tool.set_context(channel, chat_id).await;

        let history = self.sessions.get_history(&session_id, 50);
        let tool_defs = self.tools.get_definitions();
        let mut messages = self
            .context
            .build_messages(&tool_defs, &history, content, media, channel, chat_id);

        let cancel_token = self.cancellations.new_token_for(&session_id);
        let result = self.run_turns(&mut messages, &tool_defs, cancel_token).await?;

        self.sessions.add_message(&session_id, Message::user(content));
        let tokens = result.meta.tokens.as_ref().map(|u| u.total_tokens);
        self.sessions.add_message(
            &session_id,
            Message::assistant(&result.text).with_usage(tokens, result.meta.cost),
        );

        Ok(result)
    }

    /// LLM ↔ tool loop for one turn, bounded by `max_iterations` and
    /// interruptible via `cancel_token`.
    async fn run_turns(
        &self,
        messages: &mut Vec<Message>,
        tool_defs: &[ToolDefinition],
        cancel_token: CancellationToken,
    ) -> Result<AssistantResult> {
        let mut model = self.model.clone();
        let mut mode = ProviderMode::Online;
        let mut tokens: Option<UsageInfo> = None;
        let mut turns = 0usize;

        for iteration in 0..self.max_iterations {
            turns = iteration + 1;

            if cancel_token.is_cancelled() {
                return Ok(Self::cancelled_result(model, mode, tokens, turns));
            }

            debug!(iteration = iteration, "LLM call");

            let outcome = tokio::select! {
                res = self.chat_driver.chat(messages, Some(tool_defs), &self.request_config) => res?,
                _ = cancel_token.cancelled() => {
                    return Ok(Self::cancelled_result(model, mode, tokens, turns));
                }
            };

            model = outcome.model;
            mode = outcome.mode;
            tokens = outcome.response.usage.clone();

            if outcome.response.has_tool_calls() {
                let tool_calls: Vec<ToolCall> = outcome.response.tool_calls.clone();
                ContextBuilder::add_assistant_message(
                    messages,
                    outcome.response.content.clone(),
                    tool_calls.clone(),
                );

                for tc in &tool_calls {
                    let params: HashMap<String, serde_json::Value> =
                        serde_json::from_str(&tc.function.arguments).unwrap_or_default();

                    info!(tool = %tc.function.name, iteration = iteration, "executing tool call");

                    let result = self.tools.execute(&tc.function.name, params).await;
                    ContextBuilder::add_tool_result(messages, &tc.id, &result);
                }
            } else {
                let text = outcome
                    .response
                    .content
                    .unwrap_or_else(|| "I've completed processing but have no response to give.".into());

                return Ok(AssistantResult {
                    text,
                    meta: AssistantMeta {
                        model,
                        mode,
                        reason: "stop".into(),
                        tokens,
                        cost: None,
                        turns,
                    },
                });
            }
        }

        Ok(AssistantResult {
            text: "I've completed processing but have no response to give.".into(),
            meta: AssistantMeta {
                model,
                mode,
                reason: "max_turns".into(),
                tokens,
                cost: None,
                turns,
            },
        })
    }

    fn cancelled_result(
        model: String,
        mode: ProviderMode,
        tokens: Option<UsageInfo>,
        turns: usize,
    ) -> AssistantResult {
        AssistantResult {
            text: "Stopped.".into(),
            meta: AssistantMeta {
                model,
                mode,
                reason: "cancelled".into(),
                tokens,
                cost: None,
                turns,
            },
        }
    }

    fn to_outbound(&self, channel: &str, chat_id: &str, result: AssistantResult) -> OutboundMessage {
        let mut out = OutboundMessage::new(channel, chat_id, &result.text);
        out.metadata.insert("model".into(), result.meta.model);
        out.metadata.insert("mode".into(), mode_str(result.meta.mode).into());
        out.metadata.insert("reason".into(), result.meta.reason);
        out.metadata.insert("turns".into(), result.meta.turns.to_string());
        out
    }

    /// Direct processing mode (CLI entry point).
    pub async fn process_direct(&self, text: &str) -> Result<String> {
        let result = self.respond_in_session("cli", "direct", text, &[]).await?;
        Ok(result.text)
    }

    /// Get a reference to the tool registry (for testing/extension).
    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Get the model name.
    pub fn model(&self) -> &str {
        &self.model
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
