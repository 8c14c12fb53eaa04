//! Retry-with-exponential-backoff wrapper around a single HTTP call.

use crate::config::RetryConfig;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Statuses that are retried when returned by the server: any 5xx, plus
/// 408 (Request Timeout) and 429 (Too Many Requests).
#[must_use]
pub fn is_retryable_status(status: reqwest::StatusCode) -> bool {
    status.is_server_error() || status.as_u16() == 408 || status.as_u16() == 429
}

/// Compute the backoff delay for a zero-indexed attempt, capped at
/// `config.max_backoff`.
#[must_use]
pub fn compute_delay(config: &RetryConfig, attempt: u32) -> Duration {
    let exp = 2u64.saturating_pow(attempt);
    let millis = (config.initial_backoff.as_millis() as u64).saturating_mul(exp);
    Duration::from_millis(millis.min(config.max_backoff.as_millis() as u64))
}

/// Run `op` up to `config.max_attempts` times. Retries when `op` returns
/// `Ok(response)` with a retryable status (per [`is_retryable_status`]) or
/// `Err` (any transport-level failure); stops and returns immediately on a
/// non-retryable status or once attempts are exhausted.
///
/// `op` is re-invoked from scratch on each attempt — callers are
/// responsible for producing a fresh [`reqwest::RequestBuilder`] clone per
/// call, since a request body can only be consumed once.
pub async fn execute_with_retry<F, Fut>(
    config: &RetryConfig,
    mut op: F,
) -> reqwest::Result<reqwest::Response>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = reqwest::Result<reqwest::Response>>,
{
    let max_attempts = config.max_attempts.max(1);
    let mut last_err: Option<reqwest::Error> = None;

    for attempt in 0..max_attempts {
        match op().await {
            Ok(resp) => {
                let status = resp.status();
                let is_last = attempt + 1 >= max_attempts;
                if !is_retryable_status(status) || is_last {
                    return Ok(resp);
                }
                let delay = compute_delay(config, attempt);
                warn!(
                    target: "httpmig.http.retry",
                    attempt,
                    status = status.as_u16(),
                    delay_ms = delay.as_millis() as u64,
                    "retryable status, backing off"
                );
                tokio::time::sleep(delay).await;
            }
            Err(err) => {
                let is_last = attempt + 1 >= max_attempts;
                if is_last {
                    return Err(err);
                }
                let delay = compute_delay(config, attempt);
                warn!(
                    target: "httpmig.http.retry",
                    attempt,
                    error = %err,
                    delay_ms = delay.as_millis() as u64,
                    "transport error, backing off"
                );
                last_err = Some(err);
                tokio::time::sleep(delay).await;
            }
        }
    }

    debug!(target: "httpmig.http.retry", "exhausted retries");
    Err(last_err.expect("loop always executes at least once"))
}
