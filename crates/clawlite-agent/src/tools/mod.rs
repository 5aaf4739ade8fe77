//! Tool modules available to the agent loop and subagents.

pub mod base;
pub mod registry;
pub mod filesystem;
pub mod shell;
pub mod web;
pub mod message;
pub mod spawn;
pub mod cron_tool;
pub mod skill_tool;
pub mod mcp_tool;

pub use base::{Tool, optional_bool, optional_i64, optional_string, optional_string_vec, require_string};
pub use registry::ToolRegistry;
