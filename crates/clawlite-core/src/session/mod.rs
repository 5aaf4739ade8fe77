//! Session manager — in-memory cache + append-only JSONL persistence.
//!
//! # Disk format (JSONL)
//!
//! Each session is a `.jsonl` file under `<state>/sessions/`.
//! - Line 1: metadata `{"_type": "metadata", "created_at": "...", "updated_at": "...", "metadata": {}}`
//! - Lines 2+: one JSON-encoded `Message` per line, appended as the
//!   conversation grows.

pub mod manager;

pub use manager::SessionManager;
