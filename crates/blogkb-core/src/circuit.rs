//! Circuit breaker guarding the remote document fetch.
//!
//! ```text
//!            failures >= threshold
//!   Closed ─────────────────────────▶ Open
//!     ▲                                │ reset timeout elapsed,
//!     │ probe succeeds                 ▼ next call becomes the probe
//!     └────────────────────────────── HalfOpen ──probe fails──▶ Open
//! ```
//!
//! The breaker is plain data; the fetcher owns it behind a mutex and never holds that
//! mutex across network I/O.

use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;
use tracing::{error, info, warn};

use crate::FetchError;

/// Current position of the breaker state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Calls flow normally.
    Closed,
    /// Calls are rejected until the reset timeout elapses.
    Open,
    /// A single probe call is in flight.
    HalfOpen,
}

/// Serializable view of the breaker for health reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CircuitSnapshot {
    pub state: CircuitState,
    pub consecutive_failures: u32,
    pub failure_threshold: u32,
    /// Seconds until an open circuit admits a probe.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_secs: Option<u64>,
}

#[derive(Debug)]
pub struct CircuitBreaker {
    state: CircuitState,
    consecutive_failures: u32,
    failure_threshold: u32,
    reset_timeout: Duration,
    opened_at: Option<Instant>,
    last_attempt: Option<Instant>,
}

impl CircuitBreaker {
    /// A threshold of zero is treated as one.
    pub fn new(failure_threshold: u32, reset_timeout: Duration) -> Self {
        Self {
            state: CircuitState::Closed,
            consecutive_failures: 0,
            failure_threshold: failure_threshold.max(1),
            reset_timeout,
            opened_at: None,
            last_attempt: None,
        }
    }

    pub const fn state(&self) -> CircuitState {
        self.state
    }

    pub const fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Admit or reject a call at `now`.
    ///
    /// An open circuit whose reset timeout has elapsed moves to half-open and admits the
    /// caller as the probe. While the probe is outstanding every other caller is
    /// rejected; a probe that never reports back is replaced after another reset timeout.
    pub fn try_acquire(&mut self, now: Instant) -> Result<(), FetchError> {
        match self.state {
            CircuitState::Closed => {
                self.last_attempt = Some(now);
                Ok(())
            },
            CircuitState::Open => {
                let opened_at = self.opened_at.unwrap_or(now);
                let elapsed = now.saturating_duration_since(opened_at);
                if elapsed >= self.reset_timeout {
                    info!("Circuit half-open, allowing probe request");
                    self.state = CircuitState::HalfOpen;
                    self.last_attempt = Some(now);
                    Ok(())
                } else {
                    Err(FetchError::CircuitOpen {
                        retry_after: self.reset_timeout - elapsed,
                    })
                }
            },
            CircuitState::HalfOpen => {
                let probe_started = self.last_attempt.unwrap_or(now);
                if now.saturating_duration_since(probe_started) >= self.reset_timeout {
                    warn!("Previous probe never completed, admitting a new one");
                    self.last_attempt = Some(now);
                    Ok(())
                } else {
                    Err(FetchError::CircuitOpen {
                        retry_after: Duration::ZERO,
                    })
                }
            },
        }
    }

    pub fn record_success(&mut self) {
        if self.state != CircuitState::Closed {
            info!("Circuit closed after successful probe");
        }
        self.state = CircuitState::Closed;
        self.consecutive_failures = 0;
        self.opened_at = None;
    }

    pub fn record_failure(&mut self, now: Instant) {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.last_attempt = Some(now);

        match self.state {
            CircuitState::HalfOpen => {
                warn!("Probe failed, circuit re-opened");
                self.trip(now);
            },
            CircuitState::Closed if self.consecutive_failures >= self.failure_threshold => {
                error!(
                    "Circuit breaker opened after {} consecutive failures",
                    self.consecutive_failures
                );
                self.trip(now);
            },
            CircuitState::Closed | CircuitState::Open => {},
        }
    }

    fn trip(&mut self, now: Instant) {
        self.state = CircuitState::Open;
        self.opened_at = Some(now);
    }

    pub fn snapshot(&self, now: Instant) -> CircuitSnapshot {
        let retry_after_secs = match (self.state, self.opened_at) {
            (CircuitState::Open, Some(opened_at)) => Some(
                self.reset_timeout
                    .saturating_sub(now.saturating_duration_since(opened_at))
                    .as_secs(),
            ),
            _ => None,
        };
        CircuitSnapshot {
            state: self.state,
            consecutive_failures: self.consecutive_failures,
            failure_threshold: self.failure_threshold,
            retry_after_secs,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const RESET: Duration = Duration::from_secs(60);

    fn tripped(now: Instant) -> CircuitBreaker {
        let mut breaker = CircuitBreaker::new(2, RESET);
        breaker.record_failure(now);
        breaker.record_failure(now);
        breaker
    }

    #[test]
    fn test_starts_closed() {
        let mut breaker = CircuitBreaker::new(3, RESET);
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert!(breaker.try_acquire(Instant::now()).is_ok());
    }

    #[test]
    fn test_opens_at_threshold() {
        let now = Instant::now();
        let mut breaker = CircuitBreaker::new(2, RESET);

        breaker.record_failure(now);
        assert_eq!(breaker.state(), CircuitState::Closed);

        breaker.record_failure(now);
        assert_eq!(breaker.state(), CircuitState::Open);
        assert!(matches!(
            breaker.try_acquire(now),
            Err(FetchError::CircuitOpen { .. })
        ));
    }

    #[test]
    fn test_success_resets_failure_count() {
        let now = Instant::now();
        let mut breaker = CircuitBreaker::new(3, RESET);
        breaker.record_failure(now);
        breaker.record_failure(now);
        breaker.record_success();
        breaker.record_failure(now);

        assert_eq!(breaker.consecutive_failures(), 1);
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[test]
    fn test_retry_after_counts_down() {
        let now = Instant::now();
        let mut breaker = tripped(now);

        let err = breaker
            .try_acquire(now + Duration::from_secs(45))
            .unwrap_err();
        assert_eq!(
            err,
            FetchError::CircuitOpen {
                retry_after: Duration::from_secs(15)
            }
        );
        assert_eq!(
            breaker.snapshot(now + Duration::from_secs(45)).retry_after_secs,
            Some(15)
        );
    }

    #[test]
    fn test_single_probe_after_reset_timeout() {
        let now = Instant::now();
        let mut breaker = tripped(now);
        let later = now + RESET;

        assert!(breaker.try_acquire(later).is_ok());
        assert_eq!(breaker.state(), CircuitState::HalfOpen);

        // Second caller while the probe is outstanding is rejected.
        assert!(breaker.try_acquire(later).is_err());
    }

    #[test]
    fn test_probe_success_closes() {
        let now = Instant::now();
        let mut breaker = tripped(now);
        breaker.try_acquire(now + RESET).unwrap();
        breaker.record_success();

        assert_eq!(breaker.state(), CircuitState::Closed);
        assert_eq!(breaker.consecutive_failures(), 0);
        assert!(breaker.try_acquire(now + RESET).is_ok());
    }

    #[test]
    fn test_probe_failure_reopens_and_restarts_timeout() {
        let now = Instant::now();
        let mut breaker = tripped(now);
        let probe_time = now + RESET;
        breaker.try_acquire(probe_time).unwrap();
        breaker.record_failure(probe_time);

        assert_eq!(breaker.state(), CircuitState::Open);
        assert!(breaker.try_acquire(probe_time + RESET / 2).is_err());
        assert!(breaker.try_acquire(probe_time + RESET).is_ok());
    }

    #[test]
    fn test_abandoned_probe_is_replaced() {
        let now = Instant::now();
        let mut breaker = tripped(now);
        breaker.try_acquire(now + RESET).unwrap();

        assert!(breaker.try_acquire(now + RESET * 2).is_ok());
        assert_eq!(breaker.state(), CircuitState::HalfOpen);
    }

    #[test]
    fn test_zero_threshold_behaves_like_one() {
        let now = Instant::now();
        let mut breaker = CircuitBreaker::new(0, RESET);
        breaker.record_failure(now);
        assert_eq!(breaker.state(), CircuitState::Open);
    }
}
