//! Skill tool — lets the agent run a discovered skill's `command`/`script` action.
//!
//! Lookup and availability checks go through `SkillsLoader`; the actual
//! subprocess goes through `skill_exec::run_skill`. The LLM never sees a
//! shell command — it supplies named arguments that fill a skill's
//! placeholders or get forwarded as a JSON payload.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::base::{require_string, Tool};
use crate::skill_exec::{run_skill, SkillExecError, DEFAULT_SKILL_TIMEOUT_SECS};
use crate::skills::{check_requirements, SkillsLoader};

/// Runs a named skill's `command` or `script` action.
pub struct SkillTool {
    loader: Arc<SkillsLoader>,
    timeout: Duration,
}

impl SkillTool {
    pub fn new(loader: Arc<SkillsLoader>, timeout_seconds: Option<u64>) -> Self {
        Self {
            loader,
            timeout: Duration::from_secs(timeout_seconds.unwrap_or(DEFAULT_SKILL_TIMEOUT_SECS)),
        }
    }
}

#[async_trait]
impl Tool for SkillTool {
    fn name(&self) -> &str {
        "run_skill"
    }

    fn description(&self) -> &str {
        "Run a discovered skill's command or script action by name. Use `cron`/exec/file \
         tools directly for ad-hoc work; use this only for skills that declare a runnable \
         `command` or `script` in their SKILL.md. Arguments fill the skill's placeholders."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "name": {
                    "type": "string",
                    "description": "Name of the skill to run"
                },
                "args": {
                    "type": "object",
                    "description": "Named arguments for the skill's command placeholders or script stdin",
                    "additionalProperties": true
                }
            },
            "required": ["name"]
        })
    }

    async fn execute(&self, params: HashMap<String, Value>) -> anyhow::Result<String> {
        let name = require_string(&params, "name")?;

        let skill = match self.loader.get_skill(&name) {
            Some(s) => s,
            None => return Ok(format!("Error: skill '{name}' not found")),
        };

        if !skill.is_runnable() {
            return Ok(format!(
                "Error: skill '{name}' has no command or script — read its SKILL.md instead"
            ));
        }

        if !check_requirements(&skill.requires) {
            return Ok(format!(
                "Error: skill '{name}' is unavailable on this host (missing requirement)"
            ));
        }

        let args = match params.get("args") {
            Some(Value::Object(map)) => map.clone().into_iter().collect(),
            _ => HashMap::new(),
        };

        match run_skill(&skill, &args, self.timeout).await {
            Ok(output) => {
                let mut parts = vec![format!("Exit code: {}", output.exit_code)];
                if !output.stdout.is_empty() {
                    parts.push(output.stdout.clone());
                }
                if !output.stderr.is_empty() {
                    parts.push(format!("STDERR:\n{}", output.stderr));
                }
                if output.timed_out {
                    parts.push("Error: skill run timed out".to_string());
                }
                parts.push(format!("Duration: {}ms", output.duration_ms));
                Ok(parts.join("\n"))
            }
            Err(SkillExecError::MissingArgument(arg)) => {
                Ok(format!("Error: missing required argument '{arg}' for skill '{name}'"))
            }
            Err(e) => Ok(format!("Error running skill '{name}': {e}")),
        }
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
