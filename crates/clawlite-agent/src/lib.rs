//! ClawLite Agent — core loop, tools, and context builder.
//!
//! This crate contains:
//! - **tools**: Tool trait, registry, and built-in tools (filesystem, shell, web, message, cron, skills)
//! - **context**: System prompt and message list construction
//! - **memory**: Identity/daily-notes store plus lexical top-K retrieval
//! - **skills**: Skill discovery across builtin/workspace/marketplace roots
//! - **skill_exec**: Runs a skill's `command`/`script` action
//! - **agent_loop**: The LLM ↔ tool-calling main loop

pub mod tools;
pub mod context;
pub mod memory;
pub mod skills;
pub mod skill_exec;
pub mod subagent;
pub mod agent_loop;

pub use agent_loop::{AgentLoop, AssistantMeta, AssistantResult, ChatDriver, ExecToolConfig};
pub use context::ContextBuilder;
pub use memory::MemoryStore;
pub use skill_exec::{run_skill, SkillExecError, SkillRunOutput};
pub use skills::SkillsLoader;
pub use subagent::SubagentManager;
pub use tools::{Tool, ToolRegistry};
