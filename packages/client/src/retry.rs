//! Bounded retry with exponential backoff and per-attempt timeouts.
//!
//! Idempotent reads go through [`send_with_retry`]; writes use
//! [`send_once`] so a create is never silently repeated by the
//! transport. Both treat any non-success status as an error via
//! [`ApiError::from_response`].
//!
//! Retries cover network errors, timeouts, HTTP 502/503/504 and HTTP
//! 429. Every other 4xx/5xx is returned immediately since retrying
//! cannot fix it.

use std::time::Duration;

use crate::ApiError;
use crate::transport::{ApiRequest, ApiResponse, HttpTransport};

/// How many times to retry and how long to wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry; doubled for each subsequent one.
    pub base_delay: Duration,
    /// Hard deadline for each individual attempt.
    pub attempt_timeout: Duration,
}

impl RetryPolicy {
    /// Returns the delay before retry number `retry_index` (zero-based).
    #[must_use]
    pub fn delay_for(&self, retry_index: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(retry_index))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_secs(1),
            attempt_timeout: Duration::from_secs(10),
        }
    }
}

/// Sends a request once, bounded by `timeout`.
///
/// # Errors
///
/// Returns [`ApiError::Timeout`] if the deadline elapses, the transport's
/// error if no response arrives, or the classified HTTP error for a
/// non-success status.
pub async fn send_once(
    transport: &dyn HttpTransport,
    request: &ApiRequest,
    timeout: Duration,
) -> Result<ApiResponse, ApiError> {
    let response = tokio::time::timeout(timeout, transport.send(request))
        .await
        .map_err(|_| ApiError::Timeout { after: timeout })??;

    match ApiError::from_response(&response) {
        Some(error) => Err(error),
        None => Ok(response),
    }
}

/// Sends a request, retrying transient failures according to `policy`.
///
/// # Errors
///
/// Returns the last error once retries are exhausted, or the first
/// non-retryable error.
pub async fn send_with_retry(
    transport: &dyn HttpTransport,
    request: &ApiRequest,
    policy: &RetryPolicy,
) -> Result<ApiResponse, ApiError> {
    let mut retries = 0u32;

    loop {
        match send_once(transport, request, policy.attempt_timeout).await {
            Ok(response) => return Ok(response),
            Err(error) if error.is_retryable() && retries < policy.max_retries => {
                let delay = policy.delay_for(retries);
                retries += 1;
                log::warn!(
                    "  {} {}: {error}; retry {retries}/{} in {delay:?}...",
                    request.method,
                    request.path,
                    policy.max_retries,
                );
                tokio::time::sleep(delay).await;
            }
            Err(error) => {
                if retries > 0 {
                    log::warn!(
                        "  {} {}: giving up after {retries} retries: {error}",
                        request.method,
                        request.path,
                    );
                }
                return Err(error);
            }
        }
    }
}
