//! Memory system — long-term memory, daily notes, and lexical top-K retrieval.
//!
//! The agent's memory is file-based:
//! - **Long-term memory**: `workspace/memory/MEMORY.md` — persistent facts, prefs
//! - **Daily notes**: `workspace/memory/YYYY-MM-DD.md` — ephemeral daily context
//!
//! The context builder reads memory on every prompt build (passive read).
//! The agent writes memory via the filesystem tools (active write).
//!
//! On top of the raw files, `MemoryIndex` provides lexical top-K retrieval
//! over paragraph-sized snippets, used to inject the handful of memory
//! entries most relevant to the current turn instead of the entire history.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::debug;

// ─────────────────────────────────────────────
// MemoryStore
// ─────────────────────────────────────────────

/// File-based memory store for the agent.
///
/// Manages `memory/MEMORY.md` (long-term) and `memory/YYYY-MM-DD.md` (daily).
pub struct MemoryStore {
    /// The `memory/` directory inside the workspace.
    memory_dir: PathBuf,
    /// Path to the long-term memory file.
    memory_file: PathBuf,
}

impl MemoryStore {
    /// Create a new memory store, creating the `memory/` directory if needed.
    pub fn new(workspace: &Path) -> std::io::Result<Self> {
        let memory_dir = workspace.join("memory");
        if !memory_dir.exists() {
            std::fs::create_dir_all(&memory_dir)?;
            debug!(dir = %memory_dir.display(), "created memory directory");
        }
        let memory_file = memory_dir.join("MEMORY.md");
        Ok(Self {
            memory_dir,
            memory_file,
        })
    }

    /// Create a MemoryStore without creating the directory (for read-only checks).
    pub fn new_lazy(workspace: &Path) -> Self {
        let memory_dir = workspace.join("memory");
        let memory_file = memory_dir.join("MEMORY.md");
        Self {
            memory_dir,
            memory_file,
        }
    }

    // ────────────── Long-term memory ──────────────

    /// Read the long-term memory file. Returns empty string if absent.
    pub fn read_long_term(&self) -> String {
        std::fs::read_to_string(&self.memory_file).unwrap_or_default()
    }

    /// Overwrite the entire long-term memory file.
    pub fn write_long_term(&self, content: &str) -> std::io::Result<()> {
        self.ensure_dir()?;
        std::fs::write(&self.memory_file, content)
    }

    // ────────────── Daily notes ──────────────

    /// Path to today's daily notes file.
    pub fn today_file(&self) -> PathBuf {
        let today = Utc::now().format("%Y-%m-%d").to_string();
        self.memory_dir.join(format!("{today}.md"))
    }

    /// Read today's daily notes. Returns empty string if absent.
    pub fn read_today(&self) -> String {
        std::fs::read_to_string(self.today_file()).unwrap_or_default()
    }

    /// Append content to today's daily notes.
    ///
    /// If the file doesn't exist, creates it with a date header first.
    pub fn append_today(&self, content: &str) -> std::io::Result<()> {
        self.ensure_dir()?;
        let path = self.today_file();
        if path.exists() {
            let mut existing = std::fs::read_to_string(&path)?;
            existing.push('\n');
            existing.push_str(content);
            std::fs::write(&path, existing)
        } else {
            let today = Utc::now().format("%Y-%m-%d").to_string();
            let initial = format!("# {today}\n\n{content}");
            std::fs::write(&path, initial)
        }
    }

    // ────────────── Aggregation ──────────────

    /// List daily note files (`YYYY-MM-DD.md`), newest first.
    pub fn list_memory_files(&self) -> Vec<PathBuf> {
        let pattern = self.memory_dir.join("[0-9][0-9][0-9][0-9]-[0-9][0-9]-[0-9][0-9].md");
        let pattern_str = pattern.to_string_lossy().to_string();

        let mut files: Vec<PathBuf> = glob::glob(&pattern_str)
            .map(|paths| paths.filter_map(Result::ok).collect())
            .unwrap_or_default();
        files.sort();
        files.reverse(); // newest first
        files
    }

    /// Read the last N days of daily notes, joined by `---` separators.
    pub fn get_recent_memories(&self, days: usize) -> String {
        let files = self.list_memory_files();
        let parts: Vec<String> = files
            .into_iter()
            .take(days)
            .filter_map(|f| std::fs::read_to_string(&f).ok())
            .filter(|c| !c.trim().is_empty())
            .collect();
        parts.join("\n\n---\n\n")
    }

    /// Build the memory context string for the system prompt.
    ///
    /// Returns `None` if no memory exists.
    /// Format:
    /// ```text
    /// # Memory
    ///
    /// ## Long-term Memory
    /// <content of MEMORY.md>
    ///
    /// ## Today's Notes (YYYY-MM-DD)
    /// <content of today's daily file>
    /// ```
    pub fn get_memory_context(&self) -> Option<String> {
        let mut sections = Vec::new();

        let long_term = self.read_long_term();
        if !long_term.trim().is_empty() {
            sections.push(format!("## Long-term Memory\n\n{long_term}"));
        }

        let today_content = self.read_today();
        if !today_content.trim().is_empty() {
            let today = Utc::now().format("%Y-%m-%d").to_string();
            sections.push(format!("## Today's Notes ({today})\n\n{today_content}"));
        }

        if sections.is_empty() {
            None
        } else {
            Some(format!("# Memory\n\n{}", sections.join("\n\n")))
        }
    }

    /// Build a lexical index over long-term memory and the last `days_back`
    /// daily files, one entry per non-empty paragraph.
    pub fn build_index(&self, days_back: usize) -> MemoryIndex {
        let mut index = MemoryIndex::new();

        let long_term = self.read_long_term();
        for (i, para) in paragraphs(&long_term).enumerate() {
            index.add(format!("long_term:{i}"), para, "long_term", Utc::now());
        }

        for file in self.list_memory_files().into_iter().take(days_back) {
            let tag = file
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("daily")
                .to_string();
            let created_at = parse_date_tag(&tag).unwrap_or_else(Utc::now);
            if let Ok(content) = std::fs::read_to_string(&file) {
                for (i, para) in paragraphs(&content).enumerate() {
                    index.add(format!("{tag}:{i}"), para, tag.clone(), created_at);
                }
            }
        }

        index
    }

    /// Path to the memory directory.
    pub fn memory_dir(&self) -> &Path {
        &self.memory_dir
    }

    /// Path to the long-term memory file.
    pub fn memory_file(&self) -> &Path {
        &self.memory_file
    }

    /// Ensure the memory directory exists.
    fn ensure_dir(&self) -> std::io::Result<()> {
        if !self.memory_dir.exists() {
            std::fs::create_dir_all(&self.memory_dir)?;
        }
        Ok(())
    }
}

/// Split text into non-empty, non-heading paragraphs.
fn paragraphs(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split("\n\n")
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty() && !p.starts_with('#'))
}

/// Parse a `YYYY-MM-DD` file stem into a UTC midnight timestamp.
fn parse_date_tag(tag: &str) -> Option<DateTime<Utc>> {
    let naive = chrono::NaiveDate::parse_from_str(tag, "%Y-%m-%d").ok()?;
    naive.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc())
}

// ─────────────────────────────────────────────
// MemoryIndex — lexical top-K retrieval
// ─────────────────────────────────────────────

/// Words too common to carry retrieval signal.
const STOPWORDS: &[&str] = &[
    "a", "an", "the", "is", "are", "was", "were", "be", "been", "being", "to", "of", "in", "on",
    "at", "for", "with", "and", "or", "but", "it", "this", "that", "i", "you", "he", "she", "we",
    "they", "my", "your", "his", "her", "our", "their", "as", "by", "from", "do", "does", "did",
];

/// A single retrievable snippet.
#[derive(Clone, Debug)]
pub struct MemoryEntry {
    pub id: String,
    pub text: String,
    pub source_tag: String,
    pub created_at: DateTime<Utc>,
}

/// In-memory lexical index supporting top-K retrieval by token overlap.
#[derive(Default)]
pub struct MemoryIndex {
    entries: Vec<MemoryEntry>,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    pub fn add(
        &mut self,
        id: impl Into<String>,
        text: impl Into<String>,
        source_tag: impl Into<String>,
        created_at: DateTime<Utc>,
    ) {
        self.entries.push(MemoryEntry {
            id: id.into(),
            text: text.into(),
            source_tag: source_tag.into(),
            created_at,
        });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Top `k` entries ranked by token overlap with `query`, most recent
    /// first among ties. Entries with zero overlap are excluded.
    pub fn top_k(&self, query: &str, k: usize) -> Vec<&MemoryEntry> {
        let query_tokens = tokenize(query);
        if query_tokens.is_empty() {
            return Vec::new();
        }

        let mut scored: Vec<(usize, &MemoryEntry)> = self
            .entries
            .iter()
            .map(|e| {
                let entry_tokens = tokenize(&e.text);
                let overlap = query_tokens.intersection(&entry_tokens).count();
                (overlap, e)
            })
            .filter(|(score, _)| *score > 0)
            .collect();

        scored.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| b.1.created_at.cmp(&a.1.created_at)));
        scored.into_iter().take(k).map(|(_, e)| e).collect()
    }

    /// Render the top-K results as a prompt-ready block, or `None` if empty.
    pub fn render_top_k(&self, query: &str, k: usize) -> Option<String> {
        let hits = self.top_k(query, k);
        if hits.is_empty() {
            return None;
        }
        let lines: Vec<String> = hits
            .iter()
            .map(|e| format!("- [{}] {}", e.source_tag, e.text))
            .collect();
        Some(format!("## Relevant memories\n\n{}", lines.join("\n")))
    }
}

/// Lowercase, strip punctuation, drop stopwords and tokens shorter than 3 chars.
fn tokenize(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.len() >= 3 && !STOPWORDS.contains(w))
        .map(String::from)
        .collect()
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
