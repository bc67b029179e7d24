//! How long to wait before the next attempt.

use rand::Rng;
use reqwest::header::RETRY_AFTER;
use reqwest::Response;
use std::time::Duration;

/// Default lower bound of [`ExponentialBackoff`].
pub const DEFAULT_MIN_BACKOFF: Duration = Duration::from_secs(1);
/// Default upper bound of [`ExponentialBackoff`].
pub const DEFAULT_MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Computes the wait before the next attempt, once a retry has been decided.
///
/// `attempt` is the zero-based index of the attempt that just failed and
/// `response` the response it produced, if any. Implementations must not block.
///
/// Plain functions and closures with the matching signature are backoffs too:
///
/// ```
/// use reqwest::Response;
/// use reqwest_retry_transport::RetryTransport;
/// use std::time::Duration;
///
/// let transport = RetryTransport::builder()
///     .backoff(|attempt: u32, _: Option<&Response>| Duration::from_millis(100) * (attempt + 1))
///     .build();
/// ```
pub trait Backoff: Send + Sync + 'static {
    fn compute_wait(&self, attempt: u32, response: Option<&Response>) -> Duration;
}

impl<F> Backoff for F
where
    F: Fn(u32, Option<&Response>) -> Duration + Send + Sync + 'static,
{
    fn compute_wait(&self, attempt: u32, response: Option<&Response>) -> Duration {
        (self)(attempt, response)
    }
}

/// Capped exponential backoff with [full jitter].
///
/// The cap for attempt `n` is `min * 2^n`, clamped to `max`. The wait is then
/// drawn uniformly from `[0, cap)`. The last response is ignored.
///
/// `ExponentialBackoff::new(Duration::ZERO, Duration::ZERO)` never waits.
///
/// [full jitter]: https://aws.amazon.com/blogs/architecture/exponential-backoff-and-jitter/
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExponentialBackoff {
    min: Duration,
    max: Duration,
}

impl ExponentialBackoff {
    pub fn new(min: Duration, max: Duration) -> Self {
        Self { min, max }
    }

    pub fn min(&self) -> Duration {
        self.min
    }

    pub fn max(&self) -> Duration {
        self.max
    }

    /// The jitter-free upper bound for `attempt`.
    fn cap(&self, attempt: u32) -> Duration {
        2_u32
            .checked_pow(attempt)
            .and_then(|multiplier| self.min.checked_mul(multiplier))
            .filter(|wait| *wait >= self.min && *wait <= self.max)
            .unwrap_or(self.max)
    }
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_BACKOFF, DEFAULT_MAX_BACKOFF)
    }
}

impl Backoff for ExponentialBackoff {
    fn compute_wait(&self, attempt: u32, _response: Option<&Response>) -> Duration {
        let cap = self.cap(attempt);
        if cap.is_zero() {
            return cap;
        }
        rand::rng().random_range(Duration::ZERO..cap)
    }
}

/// Honours a `Retry-After` header given in seconds, falling back to `inner`.
///
/// The server-provided wait is capped at `max`. HTTP-date values are not
/// understood and fall back to `inner` as well.
#[derive(Debug, Clone)]
pub struct RetryAfterBackoff<B> {
    inner: B,
    max: Duration,
}

impl<B: Backoff> RetryAfterBackoff<B> {
    pub fn new(inner: B, max: Duration) -> Self {
        Self { inner, max }
    }
}

impl<B: Backoff> Backoff for RetryAfterBackoff<B> {
    fn compute_wait(&self, attempt: u32, response: Option<&Response>) -> Duration {
        match response.and_then(retry_after) {
            Some(wait) => wait.min(self.max),
            None => self.inner.compute_wait(attempt, response),
        }
    }
}

fn retry_after(response: &Response) -> Option<Duration> {
    let value = response.headers().get(RETRY_AFTER)?.to_str().ok()?;
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}
