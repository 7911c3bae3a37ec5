use rand::Rng;
use std::time::Duration;

/// # NDOC
/// component: `antiblock::retry`
/// purpose: Exponential backoff schedule for `fetch_with_retry` (§4.1): `2^attempt + jitter(0,1)`
///   seconds between attempts, up to R=3 attempts total.
pub const MAX_ATTEMPTS: u32 = 3;

/// Computes the backoff delay before retry attempt number `attempt` (1-indexed: the delay
/// before the *second* call is `backoff_delay(1)`).
pub fn backoff_delay(attempt: u32, rng: &mut impl Rng) -> Duration {
    let base = 2f64.powi(attempt as i32);
    let jitter: f64 = rng.gen_range(0.0..1.0);
    Duration::from_secs_f64(base + jitter)
}

/// Runs `render_once` up to `MAX_ATTEMPTS` times. Returns the first `Ok` result, or the last
/// error if every attempt fails. A `None`/empty extraction is the caller's responsibility to
/// fold into an `Err` before calling this, so it counts as a breaker failure.
pub async fn fetch_with_retry<F, Fut, T, E>(mut render_once: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
{
    let mut rng = rand::thread_rng();
    let mut last_err = None;

    for attempt in 0..MAX_ATTEMPTS {
        match render_once().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                last_err = Some(err);
                if attempt + 1 < MAX_ATTEMPTS {
                    let delay = backoff_delay(attempt + 1, &mut rng);
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    Err(last_err.expect("loop runs at least once so an error is always recorded on failure"))
}
