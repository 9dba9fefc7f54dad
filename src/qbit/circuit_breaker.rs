//! Per-endpoint circuit breaker (spec §4.3, §7).
//!
//! Closed → Open after `failure_threshold` consecutive failures. Open →
//! HalfOpen after `reset_after` elapses. HalfOpen allows exactly one
//! probe; success closes the circuit, failure reopens it and restarts the
//! timer.

use std::sync::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Closed,
    Open,
    HalfOpen,
}

struct Inner {
    state: State,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
}

/// Thread-safe circuit breaker guarding a single logical endpoint.
pub struct CircuitBreaker {
    failure_threshold: u32,
    reset_after: Duration,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new(failure_threshold: u32, reset_after: Duration) -> Self {
        Self {
            failure_threshold,
            reset_after,
            inner: Mutex::new(Inner {
                state: State::Closed,
                consecutive_failures: 0,
                opened_at: None,
            }),
        }
    }

    /// Returns `Some(retry_after)` if the circuit is open and the call
    /// should fail fast instead of reaching the network.
    pub fn check(&self) -> Option<Duration> {
        let mut inner = self.inner.lock().unwrap();
        match inner.state {
            State::Closed => None,
            State::HalfOpen => None,
            State::Open => {
                let opened_at = inner.opened_at.expect("open state always has opened_at");
                let elapsed = opened_at.elapsed();
                if elapsed >= self.reset_after {
                    inner.state = State::HalfOpen;
                    None
                } else {
                    Some(self.reset_after - elapsed)
                }
            }
        }
    }

    pub fn record_success(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.state = State::Closed;
        inner.consecutive_failures = 0;
        inner.opened_at = None;
    }

    pub fn record_failure(&self) {
        let mut inner = self.inner.lock().unwrap();
        match inner.state {
            State::HalfOpen => {
                inner.state = State::Open;
                inner.opened_at = Some(Instant::now());
            }
            State::Closed => {
                inner.consecutive_failures += 1;
                if inner.consecutive_failures >= self.failure_threshold {
                    inner.state = State::Open;
                    inner.opened_at = Some(Instant::now());
                }
            }
            State::Open => {}
        }
    }

    #[cfg(test)]
    fn is_open(&self) -> bool {
        matches!(self.inner.lock().unwrap().state, State::Open)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opens_after_threshold_failures() {
        let cb = CircuitBreaker::new(3, Duration::from_secs(30));
        assert!(cb.check().is_none());
        cb.record_failure();
        cb.record_failure();
        assert!(!cb.is_open());
        cb.record_failure();
        assert!(cb.is_open());
        assert!(cb.check().is_some());
    }

    #[test]
    fn half_open_probe_recovers_on_success() {
        let cb = CircuitBreaker::new(1, Duration::from_millis(0));
        cb.record_failure();
        assert!(cb.is_open());
        assert!(cb.check().is_none());
        cb.record_success();
        assert!(!cb.is_open());
        assert!(cb.check().is_none());
    }

    #[test]
    fn half_open_probe_failure_reopens() {
        let cb = CircuitBreaker::new(1, Duration::from_millis(0));
        cb.record_failure();
        assert!(cb.check().is_none());
        cb.record_failure();
        assert!(cb.is_open());
    }
}
