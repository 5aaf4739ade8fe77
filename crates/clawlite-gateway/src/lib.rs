//! ClawLite Gateway — HTTP + WebSocket surface.
//!
//! The teacher ships no HTTP surface at all; this crate is grounded on
//! the axum + tower-http router/state idiom used by the pack's other
//! gateway crates. It exposes exactly the routes in `state.rs`'s
//! `AppState` doc comment: health, chat, cron CRUD, and a streaming
//! WebSocket, all behind a single process-wide bearer token.

pub mod auth;
pub mod cron_adapter;
pub mod error;
pub mod router;
pub mod routes;
pub mod serve;
pub mod state;
pub mod ws;

pub use cron_adapter::CronServiceAdapter;
pub use error::GatewayError;
pub use router::build_router;
pub use serve::serve;
pub use state::AppState;
