//! Cron service — custom async scheduler with job persistence.
//!
//! Architecture:
//! - Jobs stored in `<state>/cron/jobs.json`
//! - Ticks once a second; each tick selects every enabled, due job
//! - A per-job `tokio::sync::Mutex` suppresses overlap: a tick that finds a
//!   job still running from a prior tick skips it and pushes `next_run_at_ms`
//!   forward rather than queuing a second concurrent firing
//! - Job execution invokes a callback (typically `agent.process_direct()`)
//! - Results optionally delivered to a channel via the message bus
//!
//! No APScheduler. Fully custom async timer using `tokio::time::interval`.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{Mutex, Notify};
use tracing::{debug, error, info, warn};

use clawlite_core::bus::queue::MessageBus;
use clawlite_core::bus::types::OutboundMessage;

use crate::types::{compute_next_run_from, CronJob, CronStore, JobStatus, ScheduleKind};

const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(1);

// ─────────────────────────────────────────────
// Job callback type
// ─────────────────────────────────────────────

/// Callback invoked when a job fires.
///
/// Receives the job reference and returns the agent's response text.
/// In the gateway, this typically wraps `agent.process_direct()`.
pub type OnJobFn =
    Arc<dyn Fn(CronJob) -> std::pin::Pin<Box<dyn std::future::Future<Output = anyhow::Result<String>> + Send>> + Send + Sync>;

// ─────────────────────────────────────────────
// CronService
// ─────────────────────────────────────────────

/// Cron scheduler — manages jobs, persistence, and timed execution.
pub struct CronService {
    /// Path to the jobs JSON file.
    store_path: PathBuf,
    /// In-memory job store (protected by mutex for async safety).
    store: Arc<Mutex<CronStore>>,
    /// Message bus for outbound delivery.
    bus: Arc<MessageBus>,
    /// Callback for job execution (agent.process_direct).
    on_job: Arc<Mutex<Option<OnJobFn>>>,
    /// Per-job overlap-suppression locks, keyed by job id.
    job_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    /// Shutdown signal.
    shutdown: Arc<Notify>,
    /// How often the scheduler checks for due jobs.
    tick_interval: Duration,
}

impl CronService {
    /// Create a new cron service.
    ///
    /// If `store_path` is `None`, defaults to `<state>/cron/jobs.json`.
    pub fn new(bus: Arc<MessageBus>, store_path: Option<PathBuf>) -> Self {
        let path = store_path.unwrap_or_else(|| {
            let state_dir = clawlite_core::utils::get_state_path();
            state_dir.join("cron").join("jobs.json")
        });

        Self {
            store_path: path,
            store: Arc::new(Mutex::new(CronStore::new())),
            bus,
            on_job: Arc::new(Mutex::new(None)),
            job_locks: Mutex::new(HashMap::new()),
            shutdown: Arc::new(Notify::new()),
            tick_interval: DEFAULT_TICK_INTERVAL,
        }
    }

    /// Override the tick interval (the default is 1 second).
    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }

    /// Set the on-job callback.
    pub async fn set_on_job(&self, callback: OnJobFn) {
        let mut on_job = self.on_job.lock().await;
        *on_job = Some(callback);
    }

    // ─────────────────────────────────────────
    // Persistence
    // ─────────────────────────────────────────

    /// Load the store from disk.
    pub async fn load(&self) -> anyhow::Result<()> {
        if !self.store_path.exists() {
            debug!(path = %self.store_path.display(), "no cron store file, starting empty");
            return Ok(());
        }

        let data = tokio::fs::read_to_string(&self.store_path).await?;
        let loaded: CronStore = serde_json::from_str(&data)
            .map_err(|e| anyhow::anyhow!("failed to parse cron store: {}", e))?;

        let mut store = self.store.lock().await;
        *store = loaded;
        info!(
            path = %self.store_path.display(),
            jobs = store.jobs.len(),
            "loaded cron store"
        );
        Ok(())
    }

    /// Save the store to disk.
    pub async fn save(&self) -> anyhow::Result<()> {
        if let Some(parent) = self.store_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let store = self.store.lock().await;
        let json = serde_json::to_string_pretty(&*store)?;
        tokio::fs::write(&self.store_path, json).await?;
        debug!(path = %self.store_path.display(), "saved cron store");
        Ok(())
    }

    // ─────────────────────────────────────────
    // Job management
    // ─────────────────────────────────────────

    /// Add a job. Computes next run time and saves.
    pub async fn add_job(&self, mut job: CronJob) -> anyhow::Result<String> {
        let now_ms = Utc::now().timestamp_millis();
        job.state.next_run_at_ms = compute_next_run_from(&job.schedule, now_ms);

        let id = job.id.clone();
        {
            let mut store = self.store.lock().await;
            store.add(job);
        }
        self.save().await?;
        info!(id = %id, "added cron job");
        Ok(id)
    }

    /// Remove a job by ID.
    pub async fn remove_job(&self, id: &str) -> anyhow::Result<bool> {
        let removed = {
            let mut store = self.store.lock().await;
            store.remove(id)
        };
        if removed {
            self.save().await?;
            self.job_locks.lock().await.remove(id);
            info!(id = %id, "removed cron job");
        }
        Ok(removed)
    }

    /// Enable or disable a job.
    pub async fn set_enabled(&self, id: &str, enabled: bool) -> anyhow::Result<bool> {
        let found = {
            let mut store = self.store.lock().await;
            if let Some(job) = store.find_mut(id) {
                job.enabled = enabled;
                job.updated_at_ms = Utc::now().timestamp_millis();
                if enabled {
                    let now = Utc::now().timestamp_millis();
                    job.state.next_run_at_ms = compute_next_run_from(&job.schedule, now);
                }
                true
            } else {
                false
            }
        };
        if found {
            self.save().await?;
        }
        Ok(found)
    }

    /// List all jobs (snapshot).
    pub async fn list_jobs(&self) -> Vec<CronJob> {
        let store = self.store.lock().await;
        store.jobs.clone()
    }

    /// Get a single job by ID.
    pub async fn get_job(&self, id: &str) -> Option<CronJob> {
        let store = self.store.lock().await;
        store.find(id).cloned()
    }

    // ─────────────────────────────────────────
    // Timer loop
    // ─────────────────────────────────────────

    /// Run the scheduler loop until `stop()` is called.
    ///
    /// Loads the store, then ticks once per `tick_interval`:
    /// 1. Select every enabled, due job.
    /// 2. For each, try to acquire its overlap-suppression lock; if it's
    ///    still held by a firing from a prior tick, skip and push
    ///    `next_run_at_ms` forward instead of queuing a second run.
    /// 3. Otherwise spawn the firing concurrently so a slow job never
    ///    blocks the timer or other due jobs.
    pub async fn run(self: Arc<Self>) -> anyhow::Result<()> {
        if let Err(e) = self.load().await {
            warn!(error = %e, "failed to load cron store, starting empty");
        }

        info!("cron service started");

        let mut ticker = tokio::time::interval(self.tick_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    Arc::clone(&self).fire_due_jobs().await;
                }
                _ = self.shutdown.notified() => {
                    info!("cron service shutting down");
                    return Ok(());
                }
            }
        }
    }

    /// Stop the scheduler.
    pub async fn stop(&self) {
        info!("stopping cron service");
        self.shutdown.notify_waiters();
    }

    /// Get or create the overlap-suppression lock for a job id.
    async fn job_lock(&self, id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.job_locks.lock().await;
        locks
            .entry(id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Select due jobs and fire each one concurrently, guarded by its lock.
    async fn fire_due_jobs(self: Arc<Self>) {
        let due_ids: Vec<String> = {
            let store = self.store.lock().await;
            store.due_jobs().iter().map(|j| j.id.clone()).collect()
        };

        if due_ids.is_empty() {
            return;
        }

        debug!(count = due_ids.len(), "cron tick: due jobs found");

        for id in due_ids {
            let lock = self.job_lock(&id).await;
            match lock.try_lock_owned() {
                Ok(guard) => {
                    let this = Arc::clone(&self);
                    tokio::spawn(async move {
                        let _guard = guard;
                        this.execute_job(&id).await;
                    });
                }
                Err(_) => {
                    debug!(id = %id, "cron.fire.skipped (overlap)");
                    self.push_next_run_forward(&id).await;
                }
            }
        }
    }

    /// Overlap suppression: re-compute `next_run_at_ms` without running the
    /// job, so a busy job doesn't get re-selected on every tick until it frees up.
    async fn push_next_run_forward(&self, id: &str) {
        let now_ms = Utc::now().timestamp_millis();
        let mut store = self.store.lock().await;
        if let Some(j) = store.find_mut(id) {
            j.state.next_run_at_ms = compute_next_run_from(&j.schedule, now_ms);
            j.updated_at_ms = now_ms;
        }
    }

    /// Execute a single job by ID.
    pub async fn execute_job(&self, id: &str) {
        let job = {
            let store = self.store.lock().await;
            store.find(id).cloned()
        };

        let job = match job {
            Some(j) => j,
            None => {
                warn!(id = %id, "cron job not found for execution");
                return;
            }
        };

        info!(id = %job.id, name = %job.name, "cron.fire.started");

        let result = {
            let on_job = self.on_job.lock().await;
            if let Some(ref callback) = *on_job {
                Some(callback(job.clone()).await)
            } else {
                warn!(id = %id, "no on_job callback set, skipping execution");
                None
            }
        };

        let now_ms = Utc::now().timestamp_millis();
        let mut should_delete = false;

        {
            let mut store = self.store.lock().await;
            if let Some(j) = store.find_mut(id) {
                j.state.last_run_at_ms = Some(now_ms);

                match &result {
                    Some(Ok(response)) => {
                        j.state.last_status = Some(JobStatus::Ok);
                        j.state.last_error = None;

                        if j.payload.deliver {
                            if let (Some(channel), Some(to)) =
                                (j.payload.channel.as_ref(), j.payload.to.as_ref())
                            {
                                let outbound = OutboundMessage::new(channel.clone(), to.clone(), response.clone());
                                if let Err(e) = self.bus.publish_outbound(outbound).await {
                                    error!(error = %e, "failed to deliver cron response");
                                }
                            }
                        }
                    }
                    Some(Err(e)) => {
                        j.state.last_status = Some(JobStatus::Error);
                        j.state.last_error = Some(e.to_string());
                        error!(id = %id, name = %j.name, error = %e, "cron.fire.failed");
                    }
                    None => {
                        j.state.last_status = Some(JobStatus::Skipped);
                    }
                }

                if j.schedule.kind == ScheduleKind::At && j.delete_after_run {
                    should_delete = true;
                } else if j.schedule.kind == ScheduleKind::At {
                    j.enabled = false;
                    j.state.next_run_at_ms = None;
                } else {
                    j.state.next_run_at_ms = compute_next_run_from(&j.schedule, now_ms);
                }

                j.updated_at_ms = now_ms;
            }

            if should_delete {
                store.remove(id);
            }
        }

        if should_delete {
            self.job_locks.lock().await.remove(id);
        }

        if let Err(e) = self.save().await {
            error!(error = %e, "failed to save cron store after job execution");
        }
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
