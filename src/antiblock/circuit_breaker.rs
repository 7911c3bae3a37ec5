use crate::error::PipelineError;
use crate::models::Platform;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BreakerState {
    Closed,
    Open,
}

#[derive(Debug, Clone, Copy)]
struct PlatformBreaker {
    state: BreakerState,
    consecutive_failures: u32,
    tripped_at: Option<Instant>,
}

impl Default for PlatformBreaker {
    fn default() -> Self {
        Self {
            state: BreakerState::Closed,
            consecutive_failures: 0,
            tripped_at: None,
        }
    }
}

/// # NDOC
/// component: `antiblock::circuit_breaker`
/// purpose: Per-platform failure-isolation gate (§4.1). Closed by default; F consecutive
///   failures trip it Open; it self-heals after `reset_timeout` elapses.
/// invariants:
///   - Free mode: F=3, reset=300s. Paid-proxy mode: F=5, reset=120s.
///   - Any success while Closed resets the failure counter to zero.
///   - Half-Open is intentionally not modeled; the simplified two-state form is sufficient (§4.1).
pub struct CircuitBreaker {
    failure_threshold: u32,
    reset_timeout: Duration,
    breakers: Mutex<HashMap<Platform, PlatformBreaker>>,
}

impl CircuitBreaker {
    pub fn new(failure_threshold: u32, reset_timeout: Duration) -> Self {
        Self {
            failure_threshold,
            reset_timeout,
            breakers: Mutex::new(HashMap::new()),
        }
    }

    pub fn free_mode() -> Self {
        Self::new(3, Duration::from_secs(300))
    }

    pub fn paid_mode() -> Self {
        Self::new(5, Duration::from_secs(120))
    }

    /// Fails fast with `CircuitOpen` while the platform's breaker is tripped and the reset
    /// timeout hasn't elapsed yet; otherwise returns `Ok(())` and lets the caller proceed.
    pub fn acquire(&self, platform: Platform) -> Result<(), PipelineError> {
        self.acquire_at(platform, Instant::now())
    }

    fn acquire_at(&self, platform: Platform, now: Instant) -> Result<(), PipelineError> {
        let mut breakers = self.breakers.lock().expect("circuit breaker mutex poisoned");
        let entry = breakers.entry(platform).or_default();

        if entry.state == BreakerState::Open {
            let tripped_at = entry.tripped_at.expect("open breaker always records trip time");
            if now.saturating_duration_since(tripped_at) >= self.reset_timeout {
                entry.state = BreakerState::Closed;
                entry.consecutive_failures = 0;
                entry.tripped_at = None;
            } else {
                return Err(PipelineError::circuit_open(platform.as_str()));
            }
        }
        Ok(())
    }

    pub fn report_success(&self, platform: Platform) {
        let mut breakers = self.breakers.lock().expect("circuit breaker mutex poisoned");
        let entry = breakers.entry(platform).or_default();
        entry.consecutive_failures = 0;
        entry.state = BreakerState::Closed;
        entry.tripped_at = None;
    }

    pub fn report_failure(&self, platform: Platform) {
        self.report_failure_at(platform, Instant::now())
    }

    fn report_failure_at(&self, platform: Platform, now: Instant) {
        let mut breakers = self.breakers.lock().expect("circuit breaker mutex poisoned");
        let entry = breakers.entry(platform).or_default();
        if entry.state == BreakerState::Open {
            return;
        }
        entry.consecutive_failures += 1;
        if entry.consecutive_failures >= self.failure_threshold {
            entry.state = BreakerState::Open;
            entry.tripped_at = Some(now);
        }
    }
}
