//! ClawLite Cron — persistent scheduled jobs and the heartbeat decide/act loop.
//!
//! - **types**: `CronSchedule`/`CronJob`/`CronStore` and the expression grammar
//! - **service**: `CronService` — tick loop, persistence, per-job overlap suppression
//! - **heartbeat**: periodic decide/act loop driving proactive messages

pub mod heartbeat;
pub mod service;
pub mod types;

pub use service::{CronService, OnJobFn};
pub use types::{CronJob, CronPayload, CronSchedule, CronStore, ExpressionParseError, ScheduleKind};
