//! Skill discovery — finds, parses, and filters skill files.
//!
//! # Architecture
//!
//! Skills are **Markdown files** (`SKILL.md`) that teach the agent how to
//! combine existing tools for specific domains (GitHub, weather, tmux, etc.),
//! or — via `command`/`script` — expose a runnable action through the
//! `run_skill` tool (see `skill_exec.rs`). A skill does not register a new
//! LLM-facing tool of its own; it is either prose injected into the prompt,
//! or a single argv-style action `run_skill` can invoke by name.
//!
//! ## Two-tier loading
//!
//! 1. **Always-on skills** (`always: true`) — full body injected into every
//!    system prompt.
//! 2. **On-demand skills** — only an XML summary (name, description,
//!    location, availability) is injected; the LLM reads the full body via
//!    `read_file`, or invokes it directly via `run_skill`.
//!
//! ## Discovery order
//!
//! Three roots are scanned, each recursively (a skill may live several
//! directories deep, not just immediately under the root):
//!
//! 1. Built-in skills bundled with the agent (lowest priority)
//! 2. `workspace/skills/` (user customizations)
//! 3. A configured marketplace directory (highest priority)
//!
//! A later root overrides an earlier one by skill name, so an operator can
//! shadow a built-in or marketplace skill with a workspace copy of the same
//! name without deleting anything.
//!
//! ## SKILL.md format
//!
//! Frontmatter is flat — no nested JSON blob:
//!
//! ```text
//! ---
//! name: github
//! description: "Interact with GitHub using the gh CLI"
//! always: false
//! requires.bins: ["gh"]
//! requires.env: []
//! requires.os: []
//! command: "gh {args}"
//! ---
//!
//! # GitHub Skill
//!
//! Use the `exec` tool to run `gh` commands ...
//! ```

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

// ─────────────────────────────────────────────
// Types
// ─────────────────────────────────────────────

/// Where a skill was discovered.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SkillSource {
    Builtin,
    Workspace,
    Marketplace,
}

/// Requirements that gate a skill's availability.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SkillRequires {
    /// CLI binaries that must resolve on `PATH`.
    pub bins: Vec<String>,
    /// Environment variables that must be set.
    pub env: Vec<String>,
    /// Operating systems the skill supports (`std::env::consts::OS` values).
    /// Empty means no OS restriction.
    pub os: Vec<String>,
}

/// A fully parsed skill: metadata plus its markdown body.
#[derive(Clone, Debug)]
pub struct SkillDescriptor {
    pub name: String,
    /// Path to the `SKILL.md` file.
    pub path: PathBuf,
    /// The discovery root this skill was found under — `script` paths
    /// resolve relative to the skill's own directory, not this root.
    pub source_root: PathBuf,
    pub source: SkillSource,
    /// Markdown body with frontmatter stripped.
    pub body: String,
    pub description: Option<String>,
    pub always: bool,
    pub requires: SkillRequires,
    /// Inline command template, e.g. `"gh {args}"` (argv tokens, no shell).
    pub command: Option<String>,
    /// Path to an executable script, relative to the skill's directory.
    pub script: Option<String>,
}

impl SkillDescriptor {
    /// Directory containing this skill's `SKILL.md`.
    pub fn dir(&self) -> PathBuf {
        self.path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Whether this skill exposes a runnable action via `run_skill`.
    pub fn is_runnable(&self) -> bool {
        self.command.is_some() || self.script.is_some()
    }
}

// ─────────────────────────────────────────────
// SkillsLoader
// ─────────────────────────────────────────────

/// Discovers and loads skills from the built-in, workspace, and marketplace roots.
pub struct SkillsLoader {
    builtin: Option<PathBuf>,
    workspace: PathBuf,
    marketplace: Option<PathBuf>,
}

impl SkillsLoader {
    /// - `workspace` — the agent workspace root (skills live under `skills/`)
    /// - `builtin` — optional path to built-in skills
    /// - `marketplace` — optional path to a shared/marketplace skill root
    pub fn new(workspace: &Path, builtin: Option<PathBuf>, marketplace: Option<PathBuf>) -> Self {
        Self {
            builtin,
            workspace: workspace.join("skills"),
            marketplace,
        }
    }

    /// All discovered skills, later roots overriding earlier ones by name.
    ///
    /// If `filter_unavailable` is true, skills whose requirements aren't met
    /// on this host are excluded.
    pub fn list_skills(&self, filter_unavailable: bool) -> Vec<SkillDescriptor> {
        let mut by_name: std::collections::HashMap<String, SkillDescriptor> =
            std::collections::HashMap::new();

        for (root, source) in [
            (self.builtin.as_deref(), SkillSource::Builtin),
            (Some(self.workspace.as_path()), SkillSource::Workspace),
            (self.marketplace.as_deref(), SkillSource::Marketplace),
        ] {
            let Some(root) = root else { continue };
            if !root.is_dir() {
                continue;
            }
            for path in find_skill_files(root) {
                match parse_skill_file(&path, root, source) {
                    Ok(descriptor) => {
                        debug!(name = %descriptor.name, source = ?source, "discovered skill");
                        by_name.insert(descriptor.name.clone(), descriptor);
                    }
                    Err(e) => warn!(path = %path.display(), error = %e, "failed to parse skill"),
                }
            }
        }

        let mut skills: Vec<SkillDescriptor> = by_name.into_values().collect();
        skills.sort_by(|a, b| a.name.cmp(&b.name));

        if filter_unavailable {
            skills.retain(|s| check_requirements(&s.requires));
        }

        skills
    }

    /// Look up a single skill by name.
    pub fn get_skill(&self, name: &str) -> Option<SkillDescriptor> {
        self.list_skills(false).into_iter().find(|s| s.name == name)
    }

    /// Full body of each named skill, concatenated for injection into the
    /// system prompt (always-on skills).
    pub fn load_skills_for_context(&self, names: &[String]) -> String {
        let all = self.list_skills(false);
        let parts: Vec<String> = names
            .iter()
            .filter_map(|name| {
                let skill = all.iter().find(|s| &s.name == name)?;
                if skill.body.is_empty() {
                    return None;
                }
                Some(format!("### Skill: {name}\n\n{}", skill.body))
            })
            .collect();

        parts.join("\n\n---\n\n")
    }

    /// XML summary of all skills for the system prompt; the LLM uses it to
    /// decide which skills to load on demand or invoke via `run_skill`.
    pub fn build_skills_summary(&self) -> String {
        let all = self.list_skills(false);
        if all.is_empty() {
            return String::new();
        }

        let mut lines = vec!["<skills>".to_string()];
        for skill in &all {
            let available = check_requirements(&skill.requires);
            let desc = skill.description.as_deref().unwrap_or(&skill.name);

            lines.push(format!(
                "  <skill available=\"{}\" runnable=\"{}\">",
                available,
                skill.is_runnable()
            ));
            lines.push(format!("    <name>{}</name>", escape_xml(&skill.name)));
            lines.push(format!("    <description>{}</description>", escape_xml(desc)));
            lines.push(format!("    <location>{}</location>", skill.path.display()));

            if !available {
                let missing = get_missing_requirements(&skill.requires);
                if !missing.is_empty() {
                    lines.push(format!("    <requires>{}</requires>", escape_xml(&missing)));
                }
            }

            lines.push("  </skill>".to_string());
        }
        lines.push("</skills>".to_string());
        lines.join("\n")
    }

    /// Names of skills whose full body should always be injected.
    pub fn get_always_skills(&self) -> Vec<String> {
        self.list_skills(true)
            .iter()
            .filter(|s| s.always)
            .map(|s| s.name.clone())
            .collect()
    }
}

// ─────────────────────────────────────────────
// Discovery helpers
// ─────────────────────────────────────────────

/// Recursively find every `SKILL.md` under `root`.
fn find_skill_files(root: &Path) -> Vec<PathBuf> {
    let pattern = format!("{}/**/SKILL.md", root.display());
    match glob::glob(&pattern) {
        Ok(paths) => paths.filter_map(Result::ok).collect(),
        Err(e) => {
            warn!(pattern = %pattern, error = %e, "invalid skill glob pattern");
            Vec::new()
        }
    }
}

/// Parse a `SKILL.md` file into a descriptor. The skill's name defaults to
/// its containing directory name if the frontmatter omits `name`.
fn parse_skill_file(
    path: &Path,
    root: &Path,
    source: SkillSource,
) -> anyhow::Result<SkillDescriptor> {
    let content = std::fs::read_to_string(path)?;
    let frontmatter = parse_frontmatter(&content).unwrap_or_default();
    let body = strip_frontmatter(&content).to_string();

    let get = |key: &str| -> Option<String> {
        frontmatter
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.trim_matches('"').trim_matches('\'').to_string())
    };

    let dir_name = path
        .parent()
        .and_then(|p| p.file_name())
        .and_then(|n| n.to_str())
        .unwrap_or("unknown")
        .to_string();

    let name = get("name").unwrap_or(dir_name);
    let description = get("description");
    let always = get("always").map(|v| v == "true").unwrap_or(false);
    let command = get("command");
    let script = get("script");

    let requires = SkillRequires {
        bins: get("requires.bins").map(|v| parse_json_strings(&v)).unwrap_or_default(),
        env: get("requires.env").map(|v| parse_json_strings(&v)).unwrap_or_default(),
        os: get("requires.os").map(|v| parse_json_strings(&v)).unwrap_or_default(),
    };

    Ok(SkillDescriptor {
        name,
        path: path.to_path_buf(),
        source_root: root.to_path_buf(),
        source,
        body,
        description,
        always,
        requires,
        command,
        script,
    })
}

/// Parse a JSON string array frontmatter value, e.g. `["gh", "git"]`.
fn parse_json_strings(raw: &str) -> Vec<String> {
    serde_json::from_str::<Vec<String>>(raw).unwrap_or_default()
}

/// Parse YAML-like frontmatter (between `---` delimiters) into flat key-value pairs.
fn parse_frontmatter(content: &str) -> Option<Vec<(String, String)>> {
    if !content.starts_with("---") {
        return None;
    }

    let after_first = &content[3..];
    let end = after_first.find("\n---")?;
    let block = &after_first[..end];

    let mut pairs = Vec::new();
    for line in block.lines() {
        let line = line.trim();
        if let Some(idx) = line.find(':') {
            let key = line[..idx].trim().to_string();
            let value = line[idx + 1..].trim().to_string();
            if !key.is_empty() {
                pairs.push((key, value));
            }
        }
    }

    Some(pairs)
}

/// Strip YAML frontmatter from markdown content.
fn strip_frontmatter(content: &str) -> &str {
    if !content.starts_with("---") {
        return content;
    }
    let after_first = &content[3..];
    match after_first.find("\n---") {
        Some(end) => after_first[end + 4..].trim_start_matches('\n'),
        None => content,
    }
}

/// Escape XML special characters.
fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Check if all requirements (bins, env, os) are met on this host.
pub fn check_requirements(requires: &SkillRequires) -> bool {
    if !requires.os.is_empty() && !requires.os.iter().any(|os| os == std::env::consts::OS) {
        return false;
    }
    for bin in &requires.bins {
        if !is_binary_available(bin) {
            return false;
        }
    }
    for env_var in &requires.env {
        if std::env::var(env_var).is_err() {
            return false;
        }
    }
    true
}

/// Human-readable list of unmet requirements.
fn get_missing_requirements(requires: &SkillRequires) -> String {
    let mut missing = Vec::new();

    if !requires.os.is_empty() && !requires.os.iter().any(|os| os == std::env::consts::OS) {
        missing.push(format!("OS: {} (have {})", requires.os.join("/"), std::env::consts::OS));
    }
    for bin in &requires.bins {
        if !is_binary_available(bin) {
            missing.push(format!("CLI: {bin}"));
        }
    }
    for env_var in &requires.env {
        if std::env::var(env_var).is_err() {
            missing.push(format!("ENV: {env_var}"));
        }
    }

    missing.join(", ")
}

/// Check if a binary resolves on `PATH`.
fn is_binary_available(name: &str) -> bool {
    which::which(name).is_ok()
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    /// Create a temp skill directory with a SKILL.md file, any depth under `base`.
    fn create_skill(base: &Path, rel: &str, content: &str) {
        let skill_dir = base.join(rel);
        fs::create_dir_all(&skill_dir).unwrap();
        fs::write(skill_dir.join("SKILL.md"), content).unwrap();
    }

    // ────────────── Frontmatter parsing ──────────────

    #[test]
    fn parse_frontmatter_valid() {
        let content = "---\nname: github\ndescription: \"GitHub CLI\"\n---\n\n# Body";
        let fm = parse_frontmatter(content).unwrap();
        assert_eq!(fm.len(), 2);
        assert_eq!(fm[0], ("name".into(), "github".into()));
        assert_eq!(fm[1], ("description".into(), "\"GitHub CLI\"".into()));
    }

    #[test]
    fn parse_frontmatter_none_when_no_delimiters() {
        assert!(parse_frontmatter("# Just markdown").is_none());
    }

    #[test]
    fn parse_frontmatter_flat_requires() {
        let content = "---\nname: test\nrequires.bins: [\"gh\",\"git\"]\nrequires.env: [\"GITHUB_TOKEN\"]\n---\n\nBody";
        let fm = parse_frontmatter(content).unwrap();
        let bins = fm.iter().find(|(k, _)| k == "requires.bins").unwrap();
        assert_eq!(bins.1, "[\"gh\",\"git\"]");
    }

    #[test]
    fn parse_json_strings_roundtrip() {
        assert_eq!(parse_json_strings("[\"a\", \"b\"]"), vec!["a", "b"]);
        assert!(parse_json_strings("not json").is_empty());
    }

    // ────────────── Strip frontmatter ──────────────

    #[test]
    fn strip_frontmatter_removes_header() {
        let content = "---\nname: test\n---\n\n# Body here";
        assert_eq!(strip_frontmatter(content), "# Body here");
    }

    #[test]
    fn strip_frontmatter_no_header() {
        let content = "# Just body";
        assert_eq!(strip_frontmatter(content), "# Just body");
    }

    // ────────────── XML escaping ──────────────

    #[test]
    fn escape_xml_special_chars() {
        assert_eq!(escape_xml("a<b>c&d\"e"), "a&lt;b&gt;c&amp;d&quot;e");
    }

    // ────────────── Requirements checking ──────────────

    #[test]
    fn check_requirements_empty() {
        assert!(check_requirements(&SkillRequires::default()));
    }

    #[test]
    fn check_requirements_missing_bin() {
        let req = SkillRequires { bins: vec!["__nonexistent_binary_xyz__".into()], ..Default::default() };
        assert!(!check_requirements(&req));
    }

    #[test]
    fn check_requirements_missing_env() {
        let req = SkillRequires { env: vec!["__NONEXISTENT_ENV_VAR_XYZ__".into()], ..Default::default() };
        assert!(!check_requirements(&req));
    }

    #[test]
    fn check_requirements_bin_available() {
        let req = SkillRequires { bins: vec!["ls".into()], ..Default::default() };
        assert!(check_requirements(&req));
    }

    #[test]
    fn check_requirements_wrong_os() {
        let other_os = if std::env::consts::OS == "linux" { "windows" } else { "linux" };
        let req = SkillRequires { os: vec![other_os.into()], ..Default::default() };
        assert!(!check_requirements(&req));
    }

    #[test]
    fn check_requirements_matching_os() {
        let req = SkillRequires { os: vec![std::env::consts::OS.into()], ..Default::default() };
        assert!(check_requirements(&req));
    }

    #[test]
    fn get_missing_requirements_report() {
        let req = SkillRequires {
            bins: vec!["__no_bin__".into()],
            env: vec!["__NO_ENV__".into()],
            os: vec![],
        };
        let report = get_missing_requirements(&req);
        assert!(report.contains("CLI: __no_bin__"));
        assert!(report.contains("ENV: __NO_ENV__"));
    }

    // ────────────── SkillsLoader ──────────────

    #[test]
    fn list_skills_empty_workspace() {
        let dir = tempfile::tempdir().unwrap();
        let loader = SkillsLoader::new(dir.path(), None, None);
        assert!(loader.list_skills(false).is_empty());
    }

    #[test]
    fn list_skills_finds_workspace_skills() {
        let dir = tempfile::tempdir().unwrap();
        let ws = dir.path();
        create_skill(&ws.join("skills"), "my-skill", "---\nname: my-skill\n---\n\n# Hello");

        let loader = SkillsLoader::new(ws, None, None);
        let skills = loader.list_skills(false);
        assert_eq!(skills.len(), 1);
        assert_eq!(skills[0].name, "my-skill");
        assert_eq!(skills[0].source, SkillSource::Workspace);
    }

    #[test]
    fn list_skills_recurse_into_nested_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let ws = dir.path();
        create_skill(&ws.join("skills"), "category/nested-skill", "---\nname: nested-skill\n---\n\n# Nested");

        let loader = SkillsLoader::new(ws, None, None);
        let skills = loader.list_skills(false);
        assert_eq!(skills.len(), 1);
        assert_eq!(skills[0].name, "nested-skill");
    }

    #[test]
    fn list_skills_finds_builtin_skills() {
        let dir = tempfile::tempdir().unwrap();
        let ws = dir.path().join("workspace");
        let builtin = dir.path().join("builtin");
        fs::create_dir_all(&ws).unwrap();
        create_skill(&builtin, "github", "---\nname: github\n---\n\n# GitHub");

        let loader = SkillsLoader::new(&ws, Some(builtin), None);
        let skills = loader.list_skills(false);
        assert_eq!(skills.len(), 1);
        assert_eq!(skills[0].name, "github");
        assert_eq!(skills[0].source, SkillSource::Builtin);
    }

    #[test]
    fn workspace_overrides_builtin() {
        let dir = tempfile::tempdir().unwrap();
        let ws = dir.path().join("workspace");
        let builtin = dir.path().join("builtin");

        create_skill(&ws.join("skills"), "github", "---\nname: github\n---\n\n# Custom");
        create_skill(&builtin, "github", "---\nname: github\n---\n\n# Builtin");

        let loader = SkillsLoader::new(&ws, Some(builtin), None);
        let skills = loader.list_skills(false);
        assert_eq!(skills.len(), 1);
        assert_eq!(skills[0].source, SkillSource::Workspace);
    }

    #[test]
    fn marketplace_overrides_workspace() {
        let dir = tempfile::tempdir().unwrap();
        let ws = dir.path().join("workspace");
        let marketplace = dir.path().join("marketplace");

        create_skill(&ws.join("skills"), "github", "---\nname: github\n---\n\n# Workspace");
        create_skill(&marketplace, "github", "---\nname: github\n---\n\n# Marketplace");

        let loader = SkillsLoader::new(&ws, None, Some(marketplace));
        let skills = loader.list_skills(false);
        assert_eq!(skills.len(), 1);
        assert_eq!(skills[0].source, SkillSource::Marketplace);
    }

    #[test]
    fn get_skill_returns_body() {
        let dir = tempfile::tempdir().unwrap();
        let ws = dir.path();
        create_skill(&ws.join("skills"), "test", "---\nname: test\n---\n\nBody line");

        let loader = SkillsLoader::new(ws, None, None);
        let skill = loader.get_skill("test").unwrap();
        assert!(skill.body.contains("Body line"));
    }

    #[test]
    fn get_skill_missing_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        let loader = SkillsLoader::new(dir.path(), None, None);
        assert!(loader.get_skill("nonexistent").is_none());
    }

    #[test]
    fn load_skills_for_context_strips_frontmatter() {
        let dir = tempfile::tempdir().unwrap();
        let ws = dir.path();
        create_skill(&ws.join("skills"), "alpha", "---\nname: alpha\n---\n\n# Alpha Body");

        let loader = SkillsLoader::new(ws, None, None);
        let ctx = loader.load_skills_for_context(&["alpha".into()]);
        assert!(ctx.contains("### Skill: alpha"));
        assert!(ctx.contains("# Alpha Body"));
        assert!(!ctx.contains("---"));
    }

    #[test]
    fn build_skills_summary_xml() {
        let dir = tempfile::tempdir().unwrap();
        let ws = dir.path();
        create_skill(
            &ws.join("skills"),
            "weather",
            "---\nname: weather\ndescription: \"Check the weather\"\n---\n\n# Weather",
        );

        let loader = SkillsLoader::new(ws, None, None);
        let summary = loader.build_skills_summary();
        assert!(summary.contains("<skills>"));
        assert!(summary.contains("<name>weather</name>"));
        assert!(summary.contains("<description>Check the weather</description>"));
        assert!(summary.contains("available=\"true\""));
        assert!(summary.contains("</skills>"));
    }

    #[test]
    fn build_skills_summary_unavailable_skill() {
        let dir = tempfile::tempdir().unwrap();
        let ws = dir.path();
        create_skill(
            &ws.join("skills"),
            "fancy",
            "---\nname: fancy\ndescription: needs binary\nrequires.bins: [\"__nonexistent__\"]\n---\n\n# Fancy",
        );

        let loader = SkillsLoader::new(ws, None, None);
        let summary = loader.build_skills_summary();
        assert!(summary.contains("available=\"false\""));
        assert!(summary.contains("<requires>"));
    }

    #[test]
    fn build_skills_summary_runnable_flag() {
        let dir = tempfile::tempdir().unwrap();
        let ws = dir.path();
        create_skill(
            &ws.join("skills"),
            "echo-skill",
            "---\nname: echo-skill\ncommand: \"echo {text}\"\n---\n\n# Echo",
        );

        let loader = SkillsLoader::new(ws, None, None);
        let summary = loader.build_skills_summary();
        assert!(summary.contains("runnable=\"true\""));
    }

    #[test]
    fn get_always_skills_returns_matching() {
        let dir = tempfile::tempdir().unwrap();
        let ws = dir.path();
        create_skill(&ws.join("skills"), "always-on", "---\nname: always-on\nalways: true\n---\n\n# Always");
        create_skill(&ws.join("skills"), "on-demand", "---\nname: on-demand\n---\n\n# On demand");

        let loader = SkillsLoader::new(ws, None, None);
        let always = loader.get_always_skills();
        assert_eq!(always, vec!["always-on"]);
    }

    #[test]
    fn get_skill_meta_full() {
        let dir = tempfile::tempdir().unwrap();
        let ws = dir.path();
        create_skill(
            &ws.join("skills"),
            "full",
            "---\nname: full\ndescription: \"Full skill\"\nalways: true\nrequires.bins: [\"curl\"]\nrequires.env: [\"API_KEY\"]\n---\n\n# Full",
        );

        let loader = SkillsLoader::new(ws, None, None);
        let skill = loader.get_skill("full").unwrap();
        assert!(skill.always);
        assert_eq!(skill.description.as_deref(), Some("Full skill"));
        assert_eq!(skill.requires.bins, vec!["curl"]);
        assert_eq!(skill.requires.env, vec!["API_KEY"]);
    }

    #[test]
    fn filter_unavailable_excludes_missing_bins() {
        let dir = tempfile::tempdir().unwrap();
        let ws = dir.path();
        create_skill(&ws.join("skills"), "available", "---\nname: available\n---\n\n# OK");
        create_skill(
            &ws.join("skills"),
            "unavailable",
            "---\nname: unavailable\nrequires.bins: [\"__nope__\"]\n---\n\n# Nope",
        );

        let loader = SkillsLoader::new(ws, None, None);
        let all = loader.list_skills(false);
        assert_eq!(all.len(), 2);

        let filtered = loader.list_skills(true);
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].name, "available");
    }

    #[test]
    fn skill_name_defaults_to_dir_when_absent() {
        let dir = tempfile::tempdir().unwrap();
        let ws = dir.path();
        create_skill(&ws.join("skills"), "inferred-name", "---\ndescription: \"no name field\"\n---\n\n# Body");

        let loader = SkillsLoader::new(ws, None, None);
        let skills = loader.list_skills(false);
        assert_eq!(skills[0].name, "inferred-name");
    }

    #[test]
    fn is_runnable_detects_command_or_script() {
        let dir = tempfile::tempdir().unwrap();
        let ws = dir.path();
        create_skill(&ws.join("skills"), "runnable", "---\nname: runnable\ncommand: \"ls {path}\"\n---\n\n# Runnable");
        create_skill(&ws.join("skills"), "prose-only", "---\nname: prose-only\n---\n\n# Prose");

        let loader = SkillsLoader::new(ws, None, None);
        assert!(loader.get_skill("runnable").unwrap().is_runnable());
        assert!(!loader.get_skill("prose-only").unwrap().is_runnable());
    }
}
