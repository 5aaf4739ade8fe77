//! Session persistence and caching.
//!
//! File format: JSONL in `<state>/sessions/{sanitized_session_id}.jsonl`
//! - Line 1: `{"_type":"metadata","created_at":"...","updated_at":"...","metadata":{}}`
//! - Line 2+: one JSON-encoded `Message` per line.
//!
//! Writes are append-only: each `add_message` call opens the file in
//! append mode, writes one line, and fsyncs. This avoids the
//! rewrite-the-whole-file-on-every-turn cost of a long-running session
//! and keeps a crash mid-write from corrupting prior history.

use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::types::{Message, Session, SessionId};
use crate::utils;

// ─────────────────────────────────────────────
// Session metadata (first line of JSONL)
// ─────────────────────────────────────────────

/// Metadata header written as the first line of each JSONL session file.
#[derive(Debug, Serialize, Deserialize)]
struct SessionMetadata {
    #[serde(rename = "_type")]
    record_type: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    #[serde(default)]
    metadata: HashMap<String, String>,
}

// ─────────────────────────────────────────────
// SessionManager
// ─────────────────────────────────────────────

/// Manages conversation sessions with in-memory caching and append-only
/// JSONL persistence.
///
/// Thread-safe via `RwLock` — multiple readers, exclusive writer.
pub struct SessionManager {
    /// Directory where `.jsonl` session files are stored.
    sessions_dir: PathBuf,
    /// In-memory cache of active sessions.
    cache: RwLock<HashMap<SessionId, Session>>,
}

impl SessionManager {
    /// Create a new session manager. The directory is created if it
    /// doesn't exist.
    pub fn new(sessions_dir: PathBuf) -> std::io::Result<Self> {
        std::fs::create_dir_all(&sessions_dir)?;

        Ok(SessionManager {
            sessions_dir,
            cache: RwLock::new(HashMap::new()),
        })
    }

    /// Get an existing session or create a new one.
    ///
    /// 1. Check in-memory cache
    /// 2. Try to load from disk
    /// 3. Create new empty session
    pub fn get_or_create(&self, id: &SessionId) -> Session {
        {
            let cache = self.cache.read().unwrap();
            if let Some(session) = cache.get(id) {
                return session.clone();
            }
        }

        if let Some(session) = self.load_from_disk(id) {
            let mut cache = self.cache.write().unwrap();
            cache.insert(id.clone(), session.clone());
            return session;
        }

        let session = Session::new(id.as_str());
        let path = self.session_path(id);
        if let Err(e) = self.write_metadata(&path, &session) {
            warn!("Failed to initialize session file for {}: {}", id, e);
        }

        let mut cache = self.cache.write().unwrap();
        cache.insert(id.clone(), session.clone());
        session
    }

    /// Add a message to a session: appends one line to the session's
    /// JSONL file and updates the in-memory cache.
    pub fn add_message(&self, id: &SessionId, message: Message) {
        // Ensure the session (and its metadata line) exists before appending.
        self.get_or_create(id);

        let now = Utc::now();
        {
            let mut cache = self.cache.write().unwrap();
            if let Some(session) = cache.get_mut(id) {
                session.messages.push(message.clone());
                session.updated_at = now;
            }
        }

        if let Err(e) = self.append_message(id, &message) {
            warn!("Failed to persist message for session {}: {}", id, e);
        }
    }

    /// Get the last `max_messages` from a session's history.
    pub fn get_history(&self, id: &SessionId, max_messages: usize) -> Vec<Message> {
        let session = self.get_or_create(id);
        let len = session.messages.len();
        if len <= max_messages {
            session.messages
        } else {
            session.messages[len - max_messages..].to_vec()
        }
    }

    /// Clear all messages in a session (reset conversation). Unlike
    /// `add_message`, this rewrites the file from scratch since the
    /// whole history is being discarded.
    pub fn clear(&self, id: &SessionId) {
        let mut session = self.get_or_create(id);
        session.messages.clear();
        session.updated_at = Utc::now();

        {
            let mut cache = self.cache.write().unwrap();
            cache.insert(id.clone(), session.clone());
        }

        let path = self.session_path(id);
        if let Err(e) = self.write_metadata(&path, &session) {
            warn!("Failed to persist cleared session {}: {}", id, e);
        }
    }

    /// Delete a session entirely (from cache and disk).
    ///
    /// Returns `true` if the session file existed on disk.
    pub fn delete(&self, id: &SessionId) -> bool {
        {
            let mut cache = self.cache.write().unwrap();
            cache.remove(id);
        }

        let path = self.session_path(id);
        if path.exists() {
            if let Err(e) = std::fs::remove_file(&path) {
                warn!("Failed to delete session file: {}", e);
                return false;
            }
            debug!("Deleted session file: {}", path.display());
            true
        } else {
            false
        }
    }

    /// List all sessions from disk, sorted by `updated_at` (newest first).
    pub fn list_sessions(&self) -> Vec<SessionSummary> {
        let mut summaries = Vec::new();

        let entries = match std::fs::read_dir(&self.sessions_dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Failed to read sessions directory: {}", e);
                return summaries;
            }
        };

        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().map_or(true, |ext| ext != "jsonl") {
                continue;
            }

            if let Ok(content) = std::fs::read_to_string(&path) {
                if let Some(first_line) = content.lines().next() {
                    if let Ok(meta) = serde_json::from_str::<SessionMetadata>(first_line) {
                        let key = path
                            .file_stem()
                            .and_then(|s| s.to_str())
                            .map(|s| s.replace('_', ":"))
                            .unwrap_or_default();

                        summaries.push(SessionSummary {
                            key,
                            created_at: meta.created_at,
                            updated_at: meta.updated_at,
                            path: path.clone(),
                        });
                    }
                }
            }
        }

        summaries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        summaries
    }

    fn session_path(&self, id: &SessionId) -> PathBuf {
        self.sessions_dir.join(format!("{}.jsonl", id.sanitized()))
    }

    fn load_from_disk(&self, id: &SessionId) -> Option<Session> {
        let path = self.session_path(id);
        if !path.exists() {
            return None;
        }

        let content = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) => {
                warn!("Failed to open session file {}: {}", path.display(), e);
                return None;
            }
        };

        let mut session = Session::new(id.as_str());
        let mut messages = Vec::new();

        for line in content.lines() {
            if line.trim().is_empty() {
                continue;
            }

            if let Ok(meta) = serde_json::from_str::<SessionMetadata>(line) {
                if meta.record_type == "metadata" {
                    session.created_at = meta.created_at;
                    session.updated_at = meta.updated_at;
                    session.metadata = meta.metadata;
                    continue;
                }
            }

            if let Ok(msg) = serde_json::from_str::<Message>(line) {
                messages.push(msg);
            }
        }

        session.messages = messages;
        debug!("Loaded session '{}' with {} messages from disk", id, session.messages.len());
        Some(session)
    }

    /// Write (or overwrite) just the metadata line — used on session
    /// creation and on `clear`, where the rest of the file is empty.
    fn write_metadata(&self, path: &PathBuf, session: &Session) -> std::io::Result<()> {
        let meta = SessionMetadata {
            record_type: "metadata".to_string(),
            created_at: session.created_at,
            updated_at: session.updated_at,
            metadata: session.metadata.clone(),
        };

        let mut file = std::fs::File::create(path)?;
        writeln!(file, "{}", serde_json::to_string(&meta)?)?;
        file.sync_data()?;
        Ok(())
    }

    /// Append a single message line and fsync. This is the steady-state
    /// write path — one syscall batch per turn, not per-session rewrite.
    fn append_message(&self, id: &SessionId, message: &Message) -> std::io::Result<()> {
        let path = self.session_path(id);
        let mut file = std::fs::OpenOptions::new().append(true).create(true).open(&path)?;
        writeln!(file, "{}", serde_json::to_string(message)?)?;
        file.sync_data()?;
        Ok(())
    }
}

/// Summary of a session for listing purposes.
#[derive(Clone, Debug)]
pub struct SessionSummary {
    /// Session id string (e.g. `"telegram:12345"`).
    pub key: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub path: PathBuf,
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
