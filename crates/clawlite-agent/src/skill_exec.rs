//! Skill execution — runs a skill's `command` or `script` action.
//!
//! Arguments are never concatenated into a shell string. A `command`
//! template's `{name}` tokens are substituted with whole argv entries; a
//! `script` receives its arguments as a single JSON object on stdin. Both
//! paths go straight to `tokio::process::Command`, the same way `exec.rs`
//! spawns commands, but without a shell in between.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use serde::Serialize;
use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, Command};
use tracing::{info, warn};

use crate::skills::SkillDescriptor;

/// Default timeout for a skill run when not overridden by configuration.
pub const DEFAULT_SKILL_TIMEOUT_SECS: u64 = 120;

#[derive(Debug, thiserror::Error)]
pub enum SkillExecError {
    #[error("skill '{0}' has no command or script to run")]
    NotRunnable(String),
    #[error("missing required argument '{0}' for command template")]
    MissingArgument(String),
    #[error("script not found: {0}")]
    ScriptNotFound(PathBuf),
    #[error("failed to spawn skill process: {0}")]
    Spawn(#[source] std::io::Error),
}

/// Captured result of running a skill's command or script.
#[derive(Debug, Clone, Serialize)]
pub struct SkillRunOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    pub duration_ms: u128,
    pub timed_out: bool,
}

/// Run a skill's `command` or `script` action.
///
/// `args` supplies values for `{name}` placeholders in a `command` template,
/// or is serialized to JSON and piped to a `script`'s stdin.
pub async fn run_skill(
    skill: &SkillDescriptor,
    args: &HashMap<String, Value>,
    timeout: Duration,
) -> Result<SkillRunOutput, SkillExecError> {
    if let Some(template) = &skill.command {
        run_command(template, args, timeout).await
    } else if let Some(script) = &skill.script {
        run_script(skill, script, args, timeout).await
    } else {
        Err(SkillExecError::NotRunnable(skill.name.clone()))
    }
}

/// Split a command template into argv tokens, respecting double-quoted spans.
fn tokenize(template: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for c in template.chars() {
        match c {
            '"' => in_quotes = !in_quotes,
            c if c.is_whitespace() && !in_quotes => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }

    tokens
}

fn value_to_arg(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

async fn run_command(
    template: &str,
    args: &HashMap<String, Value>,
    timeout: Duration,
) -> Result<SkillRunOutput, SkillExecError> {
    let tokens = tokenize(template);
    let mut argv = Vec::with_capacity(tokens.len());

    for token in &tokens {
        match token.strip_prefix('{').and_then(|t| t.strip_suffix('}')) {
            Some(name) => {
                let value = args
                    .get(name)
                    .ok_or_else(|| SkillExecError::MissingArgument(name.to_string()))?;
                argv.push(value_to_arg(value));
            }
            None => argv.push(token.clone()),
        }
    }

    let Some((program, rest)) = argv.split_first() else {
        return Err(SkillExecError::NotRunnable("(empty command template)".into()));
    };

    info!(program = %program, "running skill command");

    let child = Command::new(program)
        .args(rest)
        .stdout(std::process::Stdio::piped())
        .stderr(std::process::Stdio::piped())
        .spawn()
        .map_err(SkillExecError::Spawn)?;

    await_output(child, timeout).await
}

async fn run_script(
    skill: &SkillDescriptor,
    script: &str,
    args: &HashMap<String, Value>,
    timeout: Duration,
) -> Result<SkillRunOutput, SkillExecError> {
    let script_path = skill.dir().join(script);
    if !script_path.is_file() {
        return Err(SkillExecError::ScriptNotFound(script_path));
    }

    info!(script = %script_path.display(), "running skill script");

    let mut child = Command::new(&script_path)
        .stdin(std::process::Stdio::piped())
        .stdout(std::process::Stdio::piped())
        .stderr(std::process::Stdio::piped())
        .spawn()
        .map_err(SkillExecError::Spawn)?;

    let payload = serde_json::to_vec(args).unwrap_or_default();
    if let Some(mut stdin) = child.stdin.take() {
        let _ = stdin.write_all(&payload).await;
    }

    await_output(child, timeout).await
}

async fn await_output(child: Child, timeout: Duration) -> Result<SkillRunOutput, SkillExecError> {
    let started = Instant::now();

    match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(Ok(output)) => Ok(SkillRunOutput {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            exit_code: output.status.code().unwrap_or(-1),
            duration_ms: started.elapsed().as_millis(),
            timed_out: false,
        }),
        Ok(Err(e)) => Err(SkillExecError::Spawn(e)),
        Err(_) => {
            warn!(?timeout, "skill run timed out");
            Ok(SkillRunOutput {
                stdout: String::new(),
                stderr: "timed out".into(),
                exit_code: -1,
                duration_ms: started.elapsed().as_millis(),
                timed_out: true,
            })
        }
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::skills::{SkillRequires, SkillSource};
    use serde_json::json;
    use std::fs;

    fn make_skill(dir: &std::path::Path, command: Option<&str>, script: Option<&str>) -> SkillDescriptor {
        SkillDescriptor {
            name: "test-skill".into(),
            path: dir.join("SKILL.md"),
            source_root: dir.to_path_buf(),
            source: SkillSource::Workspace,
            body: String::new(),
            description: None,
            always: false,
            requires: SkillRequires::default(),
            command: command.map(String::from),
            script: script.map(String::from),
        }
    }

    #[test]
    fn tokenize_respects_quotes() {
        let tokens = tokenize(r#"echo "hello world" {name}"#);
        assert_eq!(tokens, vec!["echo", "hello world", "{name}"]);
    }

    #[tokio::test]
    async fn run_command_substitutes_placeholder() {
        let dir = tempfile::tempdir().unwrap();
        let skill = make_skill(dir.path(), Some("echo {text}"), None);
        let mut args = HashMap::new();
        args.insert("text".to_string(), json!("hi there"));

        let output = run_skill(&skill, &args, Duration::from_secs(5)).await.unwrap();
        assert_eq!(output.exit_code, 0);
        assert!(output.stdout.contains("hi there"));
        assert!(!output.timed_out);
    }

    #[tokio::test]
    async fn run_command_missing_argument_errors() {
        let dir = tempfile::tempdir().unwrap();
        let skill = make_skill(dir.path(), Some("echo {text}"), None);

        let result = run_skill(&skill, &HashMap::new(), Duration::from_secs(5)).await;
        assert!(matches!(result, Err(SkillExecError::MissingArgument(ref n)) if n == "text"));
    }

    #[tokio::test]
    async fn run_skill_not_runnable_without_command_or_script() {
        let dir = tempfile::tempdir().unwrap();
        let skill = make_skill(dir.path(), None, None);

        let result = run_skill(&skill, &HashMap::new(), Duration::from_secs(5)).await;
        assert!(matches!(result, Err(SkillExecError::NotRunnable(_))));
    }

    #[tokio::test]
    async fn run_script_missing_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        let skill = make_skill(dir.path(), None, Some("missing.sh"));

        let result = run_skill(&skill, &HashMap::new(), Duration::from_secs(5)).await;
        assert!(matches!(result, Err(SkillExecError::ScriptNotFound(_))));
    }

    #[tokio::test]
    #[cfg(unix)]
    async fn run_script_executes_and_receives_stdin() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let script_path = dir.path().join("run.sh");
        fs::write(&script_path, "#!/bin/sh\ncat\n").unwrap();
        fs::set_permissions(&script_path, fs::Permissions::from_mode(0o755)).unwrap();

        let skill = make_skill(dir.path(), None, Some("run.sh"));
        let mut args = HashMap::new();
        args.insert("key".to_string(), json!("value"));

        let output = run_skill(&skill, &args, Duration::from_secs(5)).await.unwrap();
        assert_eq!(output.exit_code, 0);
        assert!(output.stdout.contains("\"key\":\"value\""));
    }

    #[tokio::test]
    async fn run_command_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let skill = make_skill(dir.path(), Some("sleep 30"), None);

        let output = run_skill(&skill, &HashMap::new(), Duration::from_millis(50))
            .await
            .unwrap();
        assert!(output.timed_out);
    }
}
