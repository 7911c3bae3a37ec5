use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// # NDOC
/// component: `antiblock::rate_limiter`
/// purpose: Process-wide sliding-window rate limiter, "N requests per minute" granularity.
/// invariants:
///   - Free mode: N=5/min. Paid-proxy mode: N=30/min (§4.1).
///   - Guarded by a single mutex; no lock is held across an `.await` point (the caller awaits
///     the returned delay outside the critical section).
pub struct RateLimiter {
    requests_per_minute: u32,
    window: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    pub fn new(requests_per_minute: u32) -> Self {
        Self {
            requests_per_minute,
            window: Mutex::new(VecDeque::new()),
        }
    }

    pub fn free_mode() -> Self {
        Self::new(5)
    }

    pub fn paid_mode() -> Self {
        Self::new(30)
    }

    /// Records the current instant's slot request and returns how long the caller must sleep
    /// before issuing the fetch. Call sites `tokio::time::sleep` on the returned duration
    /// outside of any lock.
    pub fn acquire_delay(&self) -> Duration {
        self.acquire_delay_at(Instant::now())
    }

    fn acquire_delay_at(&self, now: Instant) -> Duration {
        let mut window = self.window.lock().expect("rate limiter mutex poisoned");
        let one_minute_ago = now.checked_sub(Duration::from_secs(60));
        if let Some(cutoff) = one_minute_ago {
            while matches!(window.front(), Some(t) if *t < cutoff) {
                window.pop_front();
            }
        }

        let delay = if window.len() as u32 >= self.requests_per_minute {
            let oldest = *window.front().expect("window is at capacity, front exists");
            let elapsed = now.saturating_duration_since(oldest);
            Duration::from_secs(60).saturating_sub(elapsed)
        } else {
            Duration::ZERO
        };

        window.push_back(now + delay);
        delay
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn free_mode_allows_five_immediate_requests() {
        let limiter = RateLimiter::free_mode();
        for _ in 0..5 {
            assert_eq!(limiter.acquire_delay_at(Instant::now()), Duration::ZERO);
        }
    }

    #[test]
    fn sixth_request_in_free_mode_is_delayed() {
        let limiter = RateLimiter::free_mode();
        let t0 = Instant::now();
        for i in 0..5 {
            limiter.acquire_delay_at(t0 + Duration::from_millis(i));
        }
        let delay = limiter.acquire_delay_at(t0 + Duration::from_millis(10));
        assert!(delay > Duration::ZERO);
    }

    #[test]
    fn paid_mode_allows_thirty_requests_per_window() {
        let limiter = RateLimiter::paid_mode();
        let t0 = Instant::now();
        for i in 0..30 {
            assert_eq!(
                limiter.acquire_delay_at(t0 + Duration::from_millis(i)),
                Duration::ZERO
            );
        }
        assert!(limiter.acquire_delay_at(t0 + Duration::from_millis(31)) > Duration::ZERO);
    }
}
