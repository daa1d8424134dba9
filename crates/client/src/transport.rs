//! Idempotent HTTP execution with exponential backoff.
//!
//! A request is retried when the transport throws a network-shaped error or
//! the server answers with a retryable status. Anything else (including
//! 4xx) comes straight back to the caller.

use std::time::Duration;

use rand::Rng;
use thiserror::Error;
use tracing::{debug, warn};

/// Statuses worth retrying: timeouts, throttling, and transient 5xx.
pub const RETRYABLE_STATUSES: [u16; 6] = [408, 429, 500, 502, 503, 504];

/// Message fragments that identify a network failure when the error type
/// alone is inconclusive (proxies tend to stringify the original cause).
const NETWORK_ERROR_VOCABULARY: [&str; 7] = [
    "network",
    "failed to fetch",
    "load failed",
    "net::",
    "networkerror",
    "request failed",
    "connection",
];

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 4,
            initial_delay: Duration::from_millis(2_000),
            max_delay: Duration::from_millis(16_000),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Zero-delay policy for tests.
    pub fn immediate() -> Self {
        Self {
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            ..Self::default()
        }
    }

    /// Backoff before retry `attempt` (1-based), jittered ±15%.
    fn delay_for(&self, attempt: u32) -> Duration {
        let exp = self.backoff_multiplier.powi(attempt.saturating_sub(1) as i32);
        let base = self.initial_delay.as_millis() as f64 * exp;
        let capped = base.min(self.max_delay.as_millis() as f64);
        let jitter = rand::rng().random_range(0.85..1.15);
        Duration::from_millis((capped * jitter) as u64)
    }
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request failed after {attempts} attempts: {source}")]
    Exhausted {
        attempts: u32,
        source: reqwest::Error,
    },
    #[error("request failed: {0}")]
    Fatal(#[from] reqwest::Error),
}

/// reqwest wrapped with the retry policy.
#[derive(Debug, Clone)]
pub struct Transport {
    client: reqwest::Client,
    policy: RetryPolicy,
}

impl Transport {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            client: reqwest::Client::new(),
            policy,
        }
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    /// Execute `build()` until it succeeds, exhausts retries, or fails with
    /// a non-retryable error. A response with a retryable status is retried
    /// too; the final response is returned either way for the caller to
    /// interpret.
    pub async fn execute<F>(&self, build: F) -> Result<reqwest::Response, TransportError>
    where
        F: Fn(&reqwest::Client) -> reqwest::RequestBuilder,
    {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match build(&self.client).send().await {
                Ok(response) => {
                    let status = response.status().as_u16();
                    if RETRYABLE_STATUSES.contains(&status) && attempt <= self.policy.max_retries {
                        let delay = self.policy.delay_for(attempt);
                        debug!(status, attempt, ?delay, "retryable status, backing off");
                        tokio::time::sleep(delay).await;
                        continue;
                    }
                    return Ok(response);
                }
                Err(e) if is_network_error(&e) => {
                    if attempt > self.policy.max_retries {
                        warn!(attempts = attempt, error = %e, "retries exhausted");
                        return Err(TransportError::Exhausted {
                            attempts: attempt,
                            source: e,
                        });
                    }
                    let delay = self.policy.delay_for(attempt);
                    debug!(attempt, ?delay, error = %e, "network error, backing off");
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(TransportError::Fatal(e)),
            }
        }
    }
}

fn is_network_error(error: &reqwest::Error) -> bool {
    if error.is_connect() || error.is_timeout() {
        return true;
    }
    let message = format!("{error:?}").to_lowercase();
    NETWORK_ERROR_VOCABULARY
        .iter()
        .any(|needle| message.contains(needle))
}
