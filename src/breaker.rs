//! Circuit breaker (C8, spec §4.7): closed/open/half-open state machine guarding calls
//! to an external dependency (optimizer itself, Advisor, Store) behind a sliding
//! failure window.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::config::BreakerConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug)]
struct Inner {
    state: BreakerState,
    opened_at: Option<Instant>,
    half_open_successes: u32,
    consecutive_failures: u32,
    last_failure_at: Option<Instant>,
}

/// Thread-safe breaker: `closed` passes calls through, counting consecutive failures —
/// any success resets the count to zero (§4.8: "on failure failureCount++, on success
/// failureCount = 0"). A failure more than `monitoring_window_ms` after the previous one
/// also resets the count rather than extending a stale streak. `failure_threshold`
/// consecutive failures trips it to `open`, which rejects calls for `reset_timeout_ms`
/// before probing with `half_open`; `success_threshold` consecutive successes in
/// `half_open` closes it again, any failure reopens it.
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    config: BreakerConfig,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: BreakerConfig) -> Self {
        CircuitBreaker {
            name: name.into(),
            config,
            inner: Mutex::new(Inner {
                state: BreakerState::Closed,
                opened_at: None,
                half_open_successes: 0,
                consecutive_failures: 0,
                last_failure_at: None,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> BreakerState {
        self.inner.lock().unwrap().state
    }

    /// Whether a call should be allowed through right now. Transitions `open` ->
    /// `half_open` once the reset timeout has elapsed.
    pub fn is_healthy(&self) -> bool {
        let mut guard = self.inner.lock().unwrap();
        match guard.state {
            BreakerState::Closed | BreakerState::HalfOpen => true,
            BreakerState::Open => {
                let elapsed = guard.opened_at.map(|t| t.elapsed()).unwrap_or_default();
                if elapsed >= Duration::from_millis(self.config.reset_timeout_ms) {
                    guard.state = BreakerState::HalfOpen;
                    guard.half_open_successes = 0;
                    info!(breaker = %self.name, "transitioning open -> half_open");
                    true
                } else {
                    false
                }
            }
        }
    }

    pub fn record_success(&self) {
        let mut guard = self.inner.lock().unwrap();
        guard.consecutive_failures = 0;
        guard.last_failure_at = None;

        match guard.state {
            BreakerState::HalfOpen => {
                guard.half_open_successes += 1;
                if guard.half_open_successes >= self.config.success_threshold {
                    guard.state = BreakerState::Closed;
                    guard.opened_at = None;
                    info!(breaker = %self.name, "transitioning half_open -> closed");
                }
            }
            BreakerState::Closed => {}
            BreakerState::Open => {}
        }
    }

    pub fn record_failure(&self) {
        let mut guard = self.inner.lock().unwrap();

        match guard.state {
            BreakerState::HalfOpen => {
                warn!(breaker = %self.name, "half_open probe failed, reopening");
                guard.state = BreakerState::Open;
                guard.opened_at = Some(Instant::now());
                guard.half_open_successes = 0;
                guard.consecutive_failures = 0;
                guard.last_failure_at = None;
            }
            BreakerState::Closed => {
                let now = Instant::now();
                let window = Duration::from_millis(self.config.monitoring_window_ms);
                let stale = guard.last_failure_at.map(|t| now.duration_since(t) > window).unwrap_or(false);
                if stale {
                    guard.consecutive_failures = 0;
                }
                guard.consecutive_failures += 1;
                guard.last_failure_at = Some(now);

                if guard.consecutive_failures >= self.config.failure_threshold {
                    warn!(breaker = %self.name, failures = guard.consecutive_failures, "failure threshold exceeded, opening");
                    guard.state = BreakerState::Open;
                    guard.opened_at = Some(now);
                }
            }
            BreakerState::Open => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> BreakerConfig {
        BreakerConfig { failure_threshold: 3, success_threshold: 2, timeout_ms: 1000, reset_timeout_ms: 50, monitoring_window_ms: 60_000 }
    }

    #[test]
    fn opens_after_failure_threshold() {
        let b = CircuitBreaker::new("test", config());
        assert!(b.is_healthy());
        b.record_failure();
        b.record_failure();
        assert!(b.is_healthy());
        b.record_failure();
        assert_eq!(b.state(), BreakerState::Open);
        assert!(!b.is_healthy());
    }

    #[test]
    fn half_open_closes_after_success_threshold() {
        let b = CircuitBreaker::new("test", config());
        b.record_failure();
        b.record_failure();
        b.record_failure();
        assert_eq!(b.state(), BreakerState::Open);

        std::thread::sleep(Duration::from_millis(60));
        assert!(b.is_healthy());
        assert_eq!(b.state(), BreakerState::HalfOpen);

        b.record_success();
        assert_eq!(b.state(), BreakerState::HalfOpen);
        b.record_success();
        assert_eq!(b.state(), BreakerState::Closed);
    }

    #[test]
    fn interleaved_success_resets_consecutive_failures() {
        let b = CircuitBreaker::new("test", config());
        b.record_failure();
        b.record_failure();
        b.record_success();
        b.record_failure();
        b.record_failure();
        assert_eq!(b.state(), BreakerState::Closed);
        assert!(b.is_healthy());
    }

    #[test]
    fn half_open_failure_reopens() {
        let b = CircuitBreaker::new("test", config());
        b.record_failure();
        b.record_failure();
        b.record_failure();
        std::thread::sleep(Duration::from_millis(60));
        assert!(b.is_healthy());
        b.record_failure();
        assert_eq!(b.state(), BreakerState::Open);
    }
}
