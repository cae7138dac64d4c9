//! Page retrieval with politeness pacing and exponential backoff retry.
//!
//! This module provides the single retryable-fetch utility used by both the
//! directory and the article paths. It includes automatic retry logic with
//! exponential backoff and jitter to ride out transient failures.
//!
//! # Architecture
//!
//! The module uses a trait-based design:
//! - [`FetchPage`]: Core trait, "give me the markup behind this URL"
//! - [`HttpFetcher`]: `reqwest` implementation that paces every outbound request
//! - [`RetryFetch`]: Decorator that adds retry logic to any `FetchPage` implementation
//!
//! # Retry Strategy
//!
//! Driven by [`RetryPolicy`]:
//! - `max_attempts` total attempts per URL (3 by default)
//! - Exponential backoff starting at `base_delay`, capped at `max_delay`
//! - Random jitter (0..=`max_jitter`) added to each delay
//! - Only errors accepted by the `retryable` predicate are retried; a 404 or
//!   a parse failure is final on the first attempt

use crate::config::CrawlerConfig;
use crate::error::FetchError;
use rand::{Rng, rng};
use std::fmt;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::{debug, error, instrument, warn};

/// Trait for retrieving the markup of a page.
///
/// Implementors return the decoded body on a 2xx response and a typed
/// [`FetchError`] otherwise.
pub trait FetchPage {
    async fn fetch(&self, url: &str) -> Result<String, FetchError>;
}

/// HTTP client that enforces a minimum delay between consecutive requests.
pub struct HttpFetcher {
    client: reqwest::Client,
    delay: Duration,
    last_request: Mutex<Option<Instant>>,
}

impl HttpFetcher {
    pub fn new(config: &CrawlerConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self {
            client,
            delay: Duration::from_millis(config.request_delay_ms),
            last_request: Mutex::new(None),
        })
    }

    /// Sleep until `delay` has passed since the previous request, then stamp.
    async fn pace(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.delay {
                let wait = self.delay - elapsed;
                debug!(?wait, "Pacing before next request");
                sleep(wait).await;
            }
        }
        *last = Some(Instant::now());
    }
}

impl fmt::Debug for HttpFetcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpFetcher")
            .field("delay", &self.delay)
            .finish()
    }
}

impl FetchPage for HttpFetcher {
    #[instrument(level = "debug", skip(self))]
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        self.pace().await;
        let t0 = Instant::now();

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::transport(url, e))?;

        let status = response.status();
        if !status.is_success() {
            debug!(status = status.as_u16(), "Non-success status");
            return Err(FetchError::from_status(url, status));
        }

        // The site serves UTF-8 but does not always say so.
        let bytes = response
            .bytes()
            .await
            .map_err(|e| FetchError::transport(url, e))?;
        let body = String::from_utf8_lossy(&bytes).into_owned();

        debug!(
            bytes = body.len(),
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "Fetched page"
        );
        Ok(body)
    }
}

/// Bounded retry parameters shared by every fetch path.
#[derive(Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts per URL, including the first. Values below 1 act as 1.
    pub max_attempts: usize,
    /// Delay before the second attempt; doubles on each further attempt.
    pub base_delay: Duration,
    /// Cap applied before jitter.
    pub max_delay: Duration,
    /// Upper bound of the random jitter added to each delay.
    pub max_jitter: Duration,
    /// Decides whether a failure is worth another attempt.
    pub retryable: fn(&FetchError) -> bool,
}

impl RetryPolicy {
    /// Backoff before attempt `attempt + 1`, without jitter.
    ///
    /// ```text
    /// delay = min(base_delay * 2^(attempt-1), max_delay)
    /// ```
    pub fn backoff(&self, attempt: usize) -> Duration {
        let shift = attempt.saturating_sub(1).min(16) as u32;
        let delay = self.base_delay.saturating_mul(1u32 << shift);
        delay.min(self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
            max_jitter: Duration::from_millis(250),
            retryable: FetchError::is_retryable,
        }
    }
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_attempts", &self.max_attempts)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .field("max_jitter", &self.max_jitter)
            .finish()
    }
}

/// Wrapper that adds exponential backoff retry logic to any [`FetchPage`] implementation.
pub struct RetryFetch<T> {
    inner: T,
    policy: RetryPolicy,
}

impl<T> RetryFetch<T>
where
    T: FetchPage,
{
    pub fn new(inner: T, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

impl<T> fmt::Debug for RetryFetch<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryFetch")
            .field("policy", &self.policy)
            .finish()
    }
}

impl<T> FetchPage for RetryFetch<T>
where
    T: FetchPage,
{
    #[instrument(level = "debug", skip(self))]
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let max_attempts = self.policy.max_attempts.max(1);
        let total_t0 = Instant::now();
        let mut attempt = 0usize;

        loop {
            attempt += 1;
            match self.inner.fetch(url).await {
                Ok(body) => return Ok(body),
                Err(e) => {
                    if !(self.policy.retryable)(&e) {
                        return Err(e);
                    }
                    if attempt >= max_attempts {
                        error!(
                            attempt,
                            max = max_attempts,
                            elapsed_ms_total = total_t0.elapsed().as_millis() as u64,
                            error = %e,
                            "fetch exhausted retries"
                        );
                        return Err(e);
                    }

                    let jitter_cap = self.policy.max_jitter.as_millis() as u64;
                    let jitter_ms: u64 = rng().random_range(0..=jitter_cap);
                    let delay = self.policy.backoff(attempt) + Duration::from_millis(jitter_ms);

                    warn!(
                        attempt,
                        max = max_attempts,
                        ?delay,
                        error = %e,
                        "fetch attempt failed; backing off"
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}
