//! Retry and backoff utilities for generation service calls.
//!
//! This module provides functions for handling transient errors, rate limiting,
//! and exponential backoff with jitter, plus a [`RetryPolicy`] that drives an
//! async operation through them.

use std::future::Future;
use std::time::Duration;

use rand::Rng;

use crate::service::ServiceError;

/// Default number of retry attempts for rate-limited requests.
pub const DEFAULT_MAX_RETRIES: u32 = 5;

/// Default number of retry attempts for transient network errors.
pub const DEFAULT_NETWORK_RETRIES: u32 = 3;

/// Base delay for exponential backoff (1 second).
pub const DEFAULT_BACKOFF_BASE: Duration = Duration::from_secs(1);

/// Maximum delay cap for exponential backoff (60 seconds).
pub const DEFAULT_BACKOFF_MAX: Duration = Duration::from_secs(60);

/// Determine if a reqwest error is a transient network error that should be retried.
///
/// Returns true for connection errors, timeouts, and body transfer failures.
/// Gateway statuses never reach here; `check_response` turns them into
/// `ServiceError::ServerUnavailable`.
pub fn is_transient_network_error(error: &reqwest::Error) -> bool {
    error.is_connect() || error.is_timeout() || error.is_body()
}

/// Parse the Retry-After header value to get retry delay in seconds.
///
/// Only the integer seconds format is understood; HTTP-date values yield None.
pub fn parse_retry_after(response: &reqwest::Response) -> Option<u64> {
    response
        .headers()
        .get("retry-after")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<u64>().ok())
}

/// Calculate exponential backoff delay with jitter.
///
/// Uses the formula: min(base * 2^attempt + jitter, max_delay)
/// where jitter is random in [0, base / 2], capped at 500ms.
pub fn calculate_backoff(attempt: u32, base: Duration, max: Duration) -> Duration {
    let exponential = base.saturating_mul(2u32.saturating_pow(attempt));
    let jitter_max_ms = (base.as_millis() as u64).min(1000) / 2;
    let jitter = Duration::from_millis(rand::thread_rng().gen_range(0..=jitter_max_ms));
    exponential.saturating_add(jitter).min(max)
}

/// How many times, and how patiently, a service call is retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub network_retries: u32,
    pub rate_limit_retries: u32,
    pub backoff_base: Duration,
    pub backoff_max: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            network_retries: DEFAULT_NETWORK_RETRIES,
            rate_limit_retries: DEFAULT_MAX_RETRIES,
            backoff_base: DEFAULT_BACKOFF_BASE,
            backoff_max: DEFAULT_BACKOFF_MAX,
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries. Handy for tests and one-shot calls.
    pub fn none() -> Self {
        Self {
            network_retries: 0,
            rate_limit_retries: 0,
            ..Self::default()
        }
    }

    /// Run `op` until it succeeds, fails with a non-retryable error, or the
    /// retry budget for its error class is exhausted.
    ///
    /// Transient failures (connection errors, timeouts, 502/503/504) and rate
    /// limits have separate budgets. A
    /// `Retry-After` value from a rate limit response is honored up to
    /// `backoff_max`.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::NetworkError` once network retries run out,
    /// the last `ServiceError::RateLimit` once rate limit retries run out,
    /// or any other error from `op` unchanged.
    pub async fn run<T, F, Fut>(&self, label: &str, mut op: F) -> Result<T, ServiceError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ServiceError>>,
    {
        let mut network_attempt = 0u32;
        let mut rate_limit_attempt = 0u32;

        loop {
            match op().await {
                Ok(value) => return Ok(value),

                Err(err) if err.is_transient() => {
                    network_attempt += 1;

                    if network_attempt > self.network_retries {
                        log::error!(
                            "{}: network error after {} attempts. Giving up. Error: {}",
                            label,
                            network_attempt,
                            err
                        );
                        return Err(ServiceError::NetworkError {
                            message: err.to_string(),
                            attempts: network_attempt,
                        });
                    }

                    let delay =
                        calculate_backoff(network_attempt - 1, self.backoff_base, self.backoff_max);
                    log::warn!(
                        "{}: network error (attempt {}/{}): {}. Retrying in {:?}...",
                        label,
                        network_attempt,
                        self.network_retries + 1,
                        err,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }

                Err(ServiceError::RateLimit {
                    message,
                    retry_after_secs,
                }) => {
                    rate_limit_attempt += 1;

                    if rate_limit_attempt > self.rate_limit_retries {
                        log::error!(
                            "{}: rate limit exceeded after {} attempts. Giving up.",
                            label,
                            rate_limit_attempt
                        );
                        return Err(ServiceError::RateLimit {
                            message,
                            retry_after_secs,
                        });
                    }

                    let delay = match retry_after_secs {
                        Some(secs) => Duration::from_secs(secs).min(self.backoff_max),
                        None => calculate_backoff(
                            rate_limit_attempt - 1,
                            self.backoff_base,
                            self.backoff_max,
                        ),
                    };
                    log::info!(
                        "{}: rate limited (attempt {}/{}). Retrying in {:?}...",
                        label,
                        rate_limit_attempt,
                        self.rate_limit_retries + 1,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }

                Err(e) => return Err(e),
            }
        }
    }
}
