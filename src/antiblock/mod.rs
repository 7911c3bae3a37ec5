pub mod circuit_breaker;
pub mod fingerprint;
pub mod rate_limiter;
pub mod retry;

use crate::config::Config;
use crate::error::PipelineError;
use crate::models::Platform;
use circuit_breaker::CircuitBreaker;
use fingerprint::Fingerprint;
use rate_limiter::RateLimiter;

/// # NDOC
/// component: `antiblock`
/// purpose: The shared anti-blocking substrate every platform extractor fetches through:
///   fingerprint rotation + rate limiting + circuit breaking, composed behind one `acquire_fetch_slot`
///   call (§4.1). Constructed once at process start and passed down as an explicit dependency,
///   never reached through a global static (§9).
pub struct AntiBlockingSubstrate {
    rate_limiter: RateLimiter,
    circuit_breaker: CircuitBreaker,
}

/// A successful `acquire_fetch_slot` outcome: a caller renders through `fingerprint` and then
/// must call `report_outcome` to close the loop for breaker/rate-limiter accounting.
pub struct FetchTicket {
    pub platform: Platform,
    pub fingerprint: Fingerprint,
}

impl AntiBlockingSubstrate {
    pub fn new(config: &Config) -> Self {
        if config.paid_proxy_mode() {
            Self {
                rate_limiter: RateLimiter::paid_mode(),
                circuit_breaker: CircuitBreaker::paid_mode(),
            }
        } else {
            Self {
                rate_limiter: RateLimiter::free_mode(),
                circuit_breaker: CircuitBreaker::free_mode(),
            }
        }
    }

    /// Respects the rate limiter and circuit breaker; fails fast with `CircuitOpen` when the
    /// breaker for `platform` is tripped, otherwise waits out any rate-limit delay and returns
    /// a ticket carrying a freshly rolled fingerprint.
    pub async fn acquire_fetch_slot(&self, platform: Platform) -> Result<FetchTicket, PipelineError> {
        self.circuit_breaker.acquire(platform)?;

        let delay = self.rate_limiter.acquire_delay();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let mut rng = rand::thread_rng();
        Ok(FetchTicket {
            platform,
            fingerprint: Fingerprint::random(&mut rng),
        })
    }

    pub fn report_outcome(&self, platform: Platform, success: bool) {
        if success {
            self.circuit_breaker.report_success(platform);
        } else {
            self.circuit_breaker.report_failure(platform);
        }
    }
}
