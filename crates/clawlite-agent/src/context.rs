//! Context builder — constructs the system prompt and conversation messages.
//!
//! Assembles the system prompt from identity, persona, operator profile,
//! policy, a generated tool sheet, a skill sheet, and top-K memory
//! snippets, then appends the recent session history and the current
//! user message to build the full message list for an LLM call.

use std::path::PathBuf;

use chrono::Utc;
use clawlite_core::types::{ContentPart, ImageUrl, Message, ToolDefinition};
use tracing::debug;

use crate::memory::MemoryStore;
use crate::skills::SkillsLoader;

/// Default number of top-K memory snippets injected into the prompt.
pub const DEFAULT_MEMORY_TOP_K: usize = 5;

/// Default number of recent session messages kept in the prompt.
pub const DEFAULT_HISTORY_WINDOW: usize = 20;

// ─────────────────────────────────────────────
// Bootstrap / identity files
// ─────────────────────────────────────────────

/// Persona, operator profile, and policy files, in the order they're
/// assembled into the prompt. `IDENTITY.md` is handled separately since the
/// identity block is generated, not read verbatim — a workspace-level
/// `IDENTITY.md` is still honored as an optional prologue to that block.
const PERSONA_FILE: &str = "SOUL.md";
const USER_PROFILE_FILE: &str = "USER.md";
const POLICY_FILE: &str = "AGENTS.md";
const IDENTITY_FILE: &str = "IDENTITY.md";

// ─────────────────────────────────────────────
// Context builder
// ─────────────────────────────────────────────

/// Builds system prompts and conversation message lists for the agent loop.
pub struct ContextBuilder {
    /// Root workspace directory.
    workspace: PathBuf,
    /// Agent identity name (for the system prompt).
    agent_name: String,
    /// Memory store for long-term + daily notes.
    memory: MemoryStore,
    /// Skills loader for discovering and loading skill files.
    skills: SkillsLoader,
    /// Top-K memory snippets to inject per turn.
    memory_top_k: usize,
    /// Recent session messages to keep in the prompt.
    history_window: usize,
}

impl ContextBuilder {
    /// Create a new context builder with built-in/marketplace skill roots disabled.
    pub fn new(workspace: impl Into<PathBuf>, agent_name: impl Into<String>) -> Self {
        let workspace = workspace.into();
        let memory = MemoryStore::new_lazy(&workspace);
        let skills = SkillsLoader::new(&workspace, None, None);
        Self {
            workspace,
            agent_name: agent_name.into(),
            memory,
            skills,
            memory_top_k: DEFAULT_MEMORY_TOP_K,
            history_window: DEFAULT_HISTORY_WINDOW,
        }
    }

    /// Set the built-in and marketplace skill roots (builder pattern).
    pub fn with_skill_roots(mut self, builtin: Option<PathBuf>, marketplace: Option<PathBuf>) -> Self {
        self.skills = SkillsLoader::new(&self.workspace, builtin, marketplace);
        self
    }

    /// Override how many top-K memory snippets are injected per turn.
    pub fn with_memory_top_k(mut self, k: usize) -> Self {
        self.memory_top_k = k;
        self
    }

    /// Override how many recent session messages are kept in the prompt.
    pub fn with_history_window(mut self, window: usize) -> Self {
        self.history_window = window;
        self
    }

    /// Get a reference to the memory store.
    pub fn memory(&self) -> &MemoryStore {
        &self.memory
    }

    /// Get a reference to the skills loader.
    pub fn skills(&self) -> &SkillsLoader {
        &self.skills
    }

    // ────────────── System prompt ──────────────

    /// Build the full system prompt for a turn.
    ///
    /// Assembly order: identity, persona, operator profile, policy, tool
    /// sheet, skill sheet, top-K memory snippets relevant to `user_text`.
    pub fn build_system_prompt(&self, tool_defs: &[ToolDefinition], user_text: &str) -> String {
        let mut parts: Vec<String> = Vec::new();

        // 1) Identity
        parts.push(self.build_identity());

        // 2) Persona
        if let Some(content) = self.read_bootstrap_file(PERSONA_FILE) {
            parts.push(format!("## {PERSONA_FILE}\n\n{content}"));
        }

        // 3) Operator profile
        if let Some(content) = self.read_bootstrap_file(USER_PROFILE_FILE) {
            parts.push(format!("## {USER_PROFILE_FILE}\n\n{content}"));
        }

        // 4) Policy
        if let Some(content) = self.read_bootstrap_file(POLICY_FILE) {
            parts.push(format!("## {POLICY_FILE}\n\n{content}"));
        }

        // 5) Tool sheet — generated from the live registry, not a static file
        parts.push(self.build_tool_sheet(tool_defs));

        // 6) Skill sheet (always-on bodies + on-demand catalogue)
        let always_skills = self.skills.get_always_skills();
        if !always_skills.is_empty() {
            let always_content = self.skills.load_skills_for_context(&always_skills);
            if !always_content.is_empty() {
                parts.push(format!("# Active Skills\n\n{always_content}"));
            }
        }
        let skills_summary = self.skills.build_skills_summary();
        if !skills_summary.is_empty() {
            parts.push(format!(
                "# Skills\n\n\
                 The following skills extend your capabilities. \
                 Skills with `command`/`script` can be run directly via `run_skill`; \
                 others should be read with `read_file`.\n\
                 Skills with available=\"false\" need dependencies installed first.\n\n\
                 {skills_summary}"
            ));
        }

        // 7) Top-K memory snippets relevant to the current turn
        let index = self.memory.build_index(30);
        if let Some(block) = index.render_top_k(user_text, self.memory_top_k) {
            parts.push(block);
        }

        parts.join("\n\n---\n\n")
    }

    fn read_bootstrap_file(&self, filename: &str) -> Option<String> {
        let path = self.workspace.join(filename);
        if !path.is_file() {
            return None;
        }
        let content = std::fs::read_to_string(&path).ok()?;
        debug!(file = filename, "loaded bootstrap file");
        Some(content)
    }

    /// Core identity block. If a workspace `IDENTITY.md` is present, its
    /// content is appended as a prologue.
    fn build_identity(&self) -> String {
        let now = Utc::now().format("%Y-%m-%d %H:%M:%S UTC");
        let os = std::env::consts::OS;
        let arch = std::env::consts::ARCH;
        let workspace = self.workspace.display();
        let memory_file = self.memory.memory_file().display();
        let today = Utc::now().format("%Y-%m-%d");

        let mut identity = format!(
            "# Identity\n\n\
             You are **{name}**, an autonomous personal agent.\n\n\
             - **Date/time**: {now}\n\
             - **Runtime**: Rust on {os}/{arch}\n\
             - **Workspace**: `{workspace}`\n\n\
             You have access to tools. Use them when needed to answer questions, \
             read/write files, run commands, search the web, schedule follow-ups, and more.\n\
             Always prefer using tools over guessing. \
             Be concise and helpful.\n\n\
             ## Memory\n\n\
             When you learn something important about the user or the project, \
             persist it by writing to `{memory_file}` using the `write_file` or `edit_file` tool.\n\
             For daily notes, write to `{workspace}/memory/{today}.md`.",
            name = self.agent_name,
        );

        if let Some(prologue) = self.read_bootstrap_file(IDENTITY_FILE) {
            identity = format!("{prologue}\n\n{identity}");
        }

        identity
    }

    /// Render the tool sheet from live tool definitions — each tool's name,
    /// description, and JSON-schema parameters, verbatim.
    fn build_tool_sheet(&self, tool_defs: &[ToolDefinition]) -> String {
        if tool_defs.is_empty() {
            return "# Tools\n\nNo tools are currently available.".to_string();
        }

        let mut lines = vec!["# Tools\n".to_string()];
        for def in tool_defs {
            lines.push(format!("## {}\n\n{}\n", def.function.name, def.function.description));
            lines.push(format!(
                "Arguments schema:\n```json\n{}\n```\n",
                serde_json::to_string_pretty(&def.function.parameters).unwrap_or_default()
            ));
        }

        lines.join("\n")
    }

    // ────────────── Message building ──────────────

    /// Build the full message list for an LLM call.
    ///
    /// 1. System prompt (identity/persona/policy/tools/skills/memory)
    /// 2. Last `history_window` session messages
    /// 3. Current user message
    pub fn build_messages(
        &self,
        tool_defs: &[ToolDefinition],
        history: &[Message],
        user_text: &str,
        media: &[String],
        channel: &str,
        chat_id: &str,
    ) -> Vec<Message> {
        let mut messages = Vec::new();

        let mut system = self.build_system_prompt(tool_defs, user_text);
        system.push_str(&format!(
            "\n\n## Current Session\nChannel: {channel}\nChat ID: {chat_id}"
        ));
        messages.push(Message::system(system));

        let windowed = if history.len() > self.history_window {
            &history[history.len() - self.history_window..]
        } else {
            history
        };
        messages.extend_from_slice(windowed);

        if media.is_empty() {
            messages.push(Message::user(user_text));
        } else {
            messages.push(build_multimodal_user_message(user_text, media));
        }

        messages
    }

    /// Add a tool result to the message list (convenience wrapper).
    pub fn add_tool_result(messages: &mut Vec<Message>, tool_call_id: &str, result: &str) {
        messages.push(Message::tool_result(tool_call_id, result));
    }

    /// Add an assistant message (with optional tool calls) to the message list.
    pub fn add_assistant_message(
        messages: &mut Vec<Message>,
        content: Option<String>,
        tool_calls: Vec<clawlite_core::types::ToolCall>,
    ) {
        if tool_calls.is_empty() {
            if let Some(text) = content {
                messages.push(Message::assistant(text));
            }
        } else {
            messages.push(Message::assistant_tool_calls(tool_calls));
        }
    }
}

// ─────────────────────────────────────────────
// Multimodal helpers
// ─────────────────────────────────────────────

/// Build a user message with base64-encoded images.
///
/// Audio files are skipped — their transcription is already in the text content.
fn build_multimodal_user_message(text: &str, media_paths: &[String]) -> Message {
    let mut parts = Vec::new();

    for path in media_paths {
        if is_audio_extension(path) {
            continue;
        }
        if let Ok(data) = std::fs::read(path) {
            let mime = guess_mime(path);
            let b64 = base64::Engine::encode(&base64::engine::general_purpose::STANDARD, &data);
            parts.push(ContentPart::ImageUrl {
                image_url: ImageUrl {
                    url: format!("data:{mime};base64,{b64}"),
                    detail: None,
                },
            });
        }
    }

    parts.push(ContentPart::Text {
        text: text.to_string(),
    });

    Message::user_parts(parts)
}

/// Check if a file path has an audio extension.
fn is_audio_extension(path: &str) -> bool {
    let lower = path.to_lowercase();
    lower.ends_with(".ogg")
        || lower.ends_with(".oga")
        || lower.ends_with(".opus")
        || lower.ends_with(".mp3")
        || lower.ends_with(".m4a")
        || lower.ends_with(".wav")
        || lower.ends_with(".flac")
        || lower.ends_with(".aac")
        || lower.ends_with(".wma")
        || lower.ends_with(".webm")
}

/// Simple MIME guesser based on extension.
fn guess_mime(path: &str) -> &str {
    let lower = path.to_lowercase();
    if lower.ends_with(".png") {
        "image/png"
    } else if lower.ends_with(".gif") {
        "image/gif"
    } else if lower.ends_with(".webp") {
        "image/webp"
    } else if lower.ends_with(".svg") {
        "image/svg+xml"
    } else {
        "image/jpeg"
    }
}
