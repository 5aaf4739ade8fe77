//! Per-channel outbound circuit breaker and worker binding bookkeeping.
//!
//! One `WorkerBinding` exists per (channel, account): it tracks the
//! connection state and wraps a `CircuitBreaker` that the outbound
//! dispatcher consults before every send.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Consecutive-failure threshold before the circuit opens.
const OPEN_THRESHOLD: u32 = 5;
/// Cooldown before an open circuit allows a single probe send.
const COOLDOWN: Duration = Duration::from_secs(30);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum HealthLevel {
    Ok,
    Warning,
    Error,
}

impl HealthLevel {
    fn worst(self, other: HealthLevel) -> HealthLevel {
        self.max(other)
    }
}

/// Outcome of asking the breaker whether a send may proceed.
#[derive(Debug, PartialEq, Eq)]
pub enum SendPermit {
    /// Send normally.
    Allowed,
    /// This is the single half-open probe; a failure reopens the circuit.
    Probe,
    /// Rejected; the circuit is open and the cooldown hasn't elapsed.
    Blocked,
}

/// Tracks consecutive outbound failures for one channel account and
/// derives `closed`/`open`/`half-open` state plus the `outbound_health`
/// rollup from it.
pub struct CircuitBreaker {
    state: Mutex<CircuitState>,
    opened_at: Mutex<Option<Instant>>,
    consecutive_failures: AtomicU32,
    blocked_count: AtomicU32,
    last_attempt_latency_ms: AtomicU64,
    avg_attempt_latency_ms: AtomicU64,
    attempt_count: AtomicU64,
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new()
    }
}

impl CircuitBreaker {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(CircuitState::Closed),
            opened_at: Mutex::new(None),
            consecutive_failures: AtomicU32::new(0),
            blocked_count: AtomicU32::new(0),
            last_attempt_latency_ms: AtomicU64::new(0),
            avg_attempt_latency_ms: AtomicU64::new(0),
            attempt_count: AtomicU64::new(0),
        }
    }

    pub fn state(&self) -> CircuitState {
        *self.state.lock().unwrap()
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures.load(Ordering::Relaxed)
    }

    pub fn blocked_count(&self) -> u32 {
        self.blocked_count.load(Ordering::Relaxed)
    }

    /// Whether a send may proceed right now, transitioning `open` →
    /// `half-open` once the cooldown has elapsed.
    pub fn check_send(&self) -> SendPermit {
        let mut state = self.state.lock().unwrap();
        match *state {
            CircuitState::Closed => SendPermit::Allowed,
            CircuitState::HalfOpen => SendPermit::Probe,
            CircuitState::Open => {
                let opened_at = *self.opened_at.lock().unwrap();
                let cooldown_elapsed = opened_at.is_some_and(|t| t.elapsed() >= COOLDOWN);
                if cooldown_elapsed {
                    *state = CircuitState::HalfOpen;
                    SendPermit::Probe
                } else {
                    self.blocked_count.fetch_add(1, Ordering::Relaxed);
                    SendPermit::Blocked
                }
            }
        }
    }

    pub fn record_success(&self, latency: Duration) {
        self.record_latency(latency);
        self.consecutive_failures.store(0, Ordering::Relaxed);
        *self.state.lock().unwrap() = CircuitState::Closed;
        *self.opened_at.lock().unwrap() = None;
    }

    pub fn record_failure(&self, latency: Duration) {
        self.record_latency(latency);
        let failures = self.consecutive_failures.fetch_add(1, Ordering::Relaxed) + 1;
        if failures > OPEN_THRESHOLD {
            let mut state = self.state.lock().unwrap();
            if *state != CircuitState::Open {
                *state = CircuitState::Open;
                *self.opened_at.lock().unwrap() = Some(Instant::now());
            }
        }
    }

    fn record_latency(&self, latency: Duration) {
        let ms = latency.as_millis() as u64;
        self.last_attempt_latency_ms.store(ms, Ordering::Relaxed);
        let n = self.attempt_count.fetch_add(1, Ordering::Relaxed) + 1;
        let prev_avg = self.avg_attempt_latency_ms.load(Ordering::Relaxed);
        let new_avg = prev_avg + (ms.saturating_sub(prev_avg)) / n.min(1000);
        self.avg_attempt_latency_ms.store(new_avg, Ordering::Relaxed);
    }

    pub fn cooldown_remaining(&self) -> Option<Duration> {
        if self.state() != CircuitState::Open {
            return None;
        }
        let opened_at = (*self.opened_at.lock().unwrap())?;
        Some(COOLDOWN.saturating_sub(opened_at.elapsed()))
    }

    /// Worst-of latency / consecutive-failures / blocked-sends / cooldown
    /// checks, per the documented thresholds.
    pub fn health(&self) -> HealthLevel {
        let mut level = HealthLevel::Ok;

        let latency_ms = self
            .last_attempt_latency_ms
            .load(Ordering::Relaxed)
            .max(self.avg_attempt_latency_ms.load(Ordering::Relaxed));
        level = level.worst(if latency_ms > 15_000 {
            HealthLevel::Error
        } else if latency_ms > 5_000 {
            HealthLevel::Warning
        } else {
            HealthLevel::Ok
        });

        let failures = self.consecutive_failures();
        level = level.worst(if failures > 5 {
            HealthLevel::Error
        } else if failures > 3 {
            HealthLevel::Warning
        } else {
            HealthLevel::Ok
        });

        let blocked = self.blocked_count();
        level = level.worst(if blocked > 5 {
            HealthLevel::Error
        } else if blocked > 1 {
            HealthLevel::Warning
        } else {
            HealthLevel::Ok
        });

        if let Some(remaining) = self.cooldown_remaining() {
            let secs = remaining.as_secs_f64();
            level = level.worst(if secs > 15.0 {
                HealthLevel::Error
            } else if secs > 5.0 {
                HealthLevel::Warning
            } else {
                HealthLevel::Ok
            });
        }

        level
    }
}

/// One registered (channel, account) pair and its connection/circuit state.
pub struct WorkerBinding {
    pub channel: String,
    pub account: String,
    pub session_id: String,
    last_connected_at: Mutex<Option<Instant>>,
    pub breaker: CircuitBreaker,
}

impl WorkerBinding {
    pub fn new(channel: impl Into<String>, account: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            account: account.into(),
            session_id: session_id.into(),
            last_connected_at: Mutex::new(None),
            breaker: CircuitBreaker::new(),
        }
    }

    pub fn mark_connected(&self) {
        *self.last_connected_at.lock().unwrap() = Some(Instant::now());
    }

    pub fn last_connected_at(&self) -> Option<Instant> {
        *self.last_connected_at.lock().unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closed_allows_send() {
        let cb = CircuitBreaker::new();
        assert_eq!(cb.check_send(), SendPermit::Allowed);
    }

    #[test]
    fn test_opens_after_six_consecutive_failures() {
        let cb = CircuitBreaker::new();
        for _ in 0..6 {
            cb.record_failure(Duration::from_millis(10));
        }
        assert_eq!(cb.state(), CircuitState::Open);
    }

    #[test]
    fn test_stays_closed_at_five_failures() {
        let cb = CircuitBreaker::new();
        for _ in 0..5 {
            cb.record_failure(Duration::from_millis(10));
        }
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[test]
    fn test_open_blocks_and_increments_blocked_count() {
        let cb = CircuitBreaker::new();
        for _ in 0..6 {
            cb.record_failure(Duration::from_millis(10));
        }
        assert_eq!(cb.check_send(), SendPermit::Blocked);
        assert_eq!(cb.blocked_count(), 1);
        assert_eq!(cb.check_send(), SendPermit::Blocked);
        assert_eq!(cb.blocked_count(), 2);
    }

    #[test]
    fn test_success_resets_failures_and_closes() {
        let cb = CircuitBreaker::new();
        for _ in 0..6 {
            cb.record_failure(Duration::from_millis(10));
        }
        cb.record_success(Duration::from_millis(10));
        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(cb.consecutive_failures(), 0);
    }

    #[test]
    fn test_health_error_on_high_failures() {
        let cb = CircuitBreaker::new();
        for _ in 0..6 {
            cb.record_failure(Duration::from_millis(10));
        }
        assert_eq!(cb.health(), HealthLevel::Error);
    }

    #[test]
    fn test_health_warning_on_moderate_failures() {
        let cb = CircuitBreaker::new();
        for _ in 0..4 {
            cb.record_failure(Duration::from_millis(10));
        }
        assert_eq!(cb.health(), HealthLevel::Warning);
    }

    #[test]
    fn test_health_ok_when_fresh() {
        let cb = CircuitBreaker::new();
        assert_eq!(cb.health(), HealthLevel::Ok);
    }

    #[test]
    fn test_health_error_on_high_latency() {
        let cb = CircuitBreaker::new();
        cb.record_success(Duration::from_secs(16));
        assert_eq!(cb.health(), HealthLevel::Error);
    }

    #[test]
    fn test_worker_binding_tracks_connection() {
        let binding = WorkerBinding::new("telegram", "default", "telegram:default");
        assert!(binding.last_connected_at().is_none());
        binding.mark_connected();
        assert!(binding.last_connected_at().is_some());
    }

    #[test]
    fn test_health_level_ordering() {
        assert!(HealthLevel::Error > HealthLevel::Warning);
        assert!(HealthLevel::Warning > HealthLevel::Ok);
    }
}
