//! Shared types, configuration, message bus, session store, and error
//! taxonomy used by every other ClawLite crate.

pub mod bus;
pub mod config;
pub mod error;
pub mod session;
pub mod types;
pub mod utils;

pub use error::ClawLiteError;
