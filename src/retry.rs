//! Retry with exponential backoff for page fetches.
//!
//! [`RetryFetch`] is a decorator: it wraps any [`PageFetcher`] and re-issues
//! the request when the failure is transient (see
//! [`FetchError::is_retryable`]). Permanent failures such as a 404 are
//! returned immediately.
//!
//! # Backoff Strategy
//!
//! ```text
//! delay = min(base_delay * 2^(attempt-1), max_delay) + random_jitter(0..=jitter)
//! ```

use crate::fetcher::{FetchError, PageFetcher};
use async_trait::async_trait;
use rand::{Rng, rng};
use std::fmt;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{error, instrument, warn};
use url::Url;

pub struct RetryFetch<T> {
    /// The underlying fetcher to wrap.
    inner: T,
    /// Total attempts, the first one included.
    max_attempts: usize,
    /// Initial delay between attempts (doubles with each attempt).
    base_delay: Duration,
    /// Maximum delay cap to prevent excessive waiting.
    max_delay: Duration,
    /// Upper bound of the random jitter added to every delay.
    jitter: Duration,
}

impl<T> RetryFetch<T>
where
    T: PageFetcher,
{
    /// Wrap `inner` with up to `max_attempts` tries.
    ///
    /// ```ignore
    /// let fetcher = RetryFetch::new(HttpFetcher::new(&settings)?, 3, Duration::from_secs(1));
    /// ```
    pub fn new(inner: T, max_attempts: usize, base_delay: Duration) -> Self {
        Self {
            inner,
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay: Duration::from_secs(30),
            jitter: Duration::from_millis(250),
        }
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    pub fn with_jitter(mut self, jitter: Duration) -> Self {
        self.jitter = jitter;
        self
    }

    fn backoff(&self, attempt: usize) -> Duration {
        let factor = 1u32 << (attempt - 1).min(16);
        let delay = self.base_delay.saturating_mul(factor).min(self.max_delay);
        let jitter_ms = self.jitter.as_millis() as u64;
        if jitter_ms == 0 {
            return delay;
        }
        delay + Duration::from_millis(rng().random_range(0..=jitter_ms))
    }
}

impl<T> fmt::Debug for RetryFetch<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryFetch")
            .field("max_attempts", &self.max_attempts)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .finish()
    }
}

#[async_trait]
impl<T> PageFetcher for RetryFetch<T>
where
    T: PageFetcher,
{
    #[instrument(level = "debug", skip_all, fields(%url))]
    async fn fetch(&self, url: &Url) -> Result<String, FetchError> {
        let total_t0 = Instant::now();
        let mut attempt = 0usize;

        loop {
            attempt += 1;
            let err = match self.inner.fetch(url).await {
                Ok(body) => return Ok(body),
                Err(e) => e,
            };

            if !err.is_retryable() {
                warn!(attempt, error = %err, "fetch failed permanently");
                return Err(err);
            }

            if attempt >= self.max_attempts {
                error!(
                    attempt,
                    max = self.max_attempts,
                    elapsed_ms_total = total_t0.elapsed().as_millis() as u64,
                    error = %err,
                    "fetch exhausted retries"
                );
                return Err(FetchError::RetriesExhausted {
                    attempts: attempt,
                    last: Box::new(err),
                });
            }

            let delay = self.backoff(attempt);
            warn!(
                attempt,
                max = self.max_attempts,
                elapsed_ms_total = total_t0.elapsed().as_millis() as u64,
                ?delay,
                error = %err,
                "fetch attempt failed; backing off"
            );
            sleep(delay).await;
        }
    }
}
