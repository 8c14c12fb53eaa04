//! Retry-with-exponential-backoff wrapper around a single catalog call,
//! for the subset of driver failures classified [`StoreError::Transient`].

use crate::store_trait::StoreError;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Substrings (checked case-insensitively) that mark a driver error as
/// transient — expected to clear if the same operation is retried.
/// Anything else (constraint violations, malformed SQL, schema mismatches)
/// is fatal and must not be retried.
const RETRYABLE_SUBSTRINGS: &[&str] = &[
    "connection refused",
    "timeout",
    "deadlock",
    "database is locked",
    "broken pipe",
];

/// `true` if a raw driver error message names one of the recognized
/// transient conditions.
#[must_use]
pub fn is_retryable_message(msg: &str) -> bool {
    let lower = msg.to_lowercase();
    RETRYABLE_SUBSTRINGS.iter().any(|needle| lower.contains(needle))
}

/// Retry policy for catalog operations.
#[derive(Debug, Clone, Copy)]
pub struct CatalogRetryConfig {
    /// Maximum number of attempts, including the first. Defaults to 4 (the
    /// initial attempt plus up to 3 retries).
    pub max_attempts: u32,
    /// Initial backoff delay.
    pub initial_backoff: Duration,
    /// Maximum backoff delay cap.
    pub max_backoff: Duration,
}

impl Default for CatalogRetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(5),
        }
    }
}

/// Compute the backoff delay for a zero-indexed attempt, capped at
/// `config.max_backoff`.
#[must_use]
pub fn compute_delay(config: &CatalogRetryConfig, attempt: u32) -> Duration {
    let exp = 2u64.saturating_pow(attempt);
    let millis = (config.initial_backoff.as_millis() as u64).saturating_mul(exp);
    Duration::from_millis(millis.min(config.max_backoff.as_millis() as u64))
}

/// Run `op` up to `config.max_attempts` times, retrying only on
/// [`StoreError::Transient`]. A [`StoreError::Fatal`] or
/// [`StoreError::CapExceeded`] result is returned immediately, matching
/// the never-retry-cancellation rule — this trait has no separate
/// cancellation variant, so any non-transient error is treated the same
/// way a cancellation would be.
pub async fn retry_store<F, Fut, T>(config: &CatalogRetryConfig, mut op: F) -> Result<T, StoreError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, StoreError>>,
{
    let max_attempts = config.max_attempts.max(1);

    for attempt in 0..max_attempts {
        match op().await {
            Ok(v) => return Ok(v),
            Err(err) if err.is_transient() => {
                let is_last = attempt + 1 >= max_attempts;
                if is_last {
                    return Err(err);
                }
                let delay = compute_delay(config, attempt);
                warn!(
                    target: "httpmig.catalog.retry",
                    attempt,
                    error = %err,
                    delay_ms = delay.as_millis() as u64,
                    "transient catalog failure, backing off"
                );
                tokio::time::sleep(delay).await;
            }
            Err(err) => return Err(err),
        }
    }

    unreachable!("loop always returns on its last iteration")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn retryable_message_classification() {
        assert!(is_retryable_message("Connection refused"));
        assert!(is_retryable_message("operation TIMEOUT after 5s"));
        assert!(is_retryable_message("deadlock detected"));
        assert!(is_retryable_message("database is locked"));
        assert!(is_retryable_message("write: broken pipe"));
        assert!(!is_retryable_message("UNIQUE constraint failed: t.version"));
        assert!(!is_retryable_message("syntax error near SELECT"));
    }

    #[test]
    fn delay_is_capped() {
        let cfg = CatalogRetryConfig {
            max_attempts: 10,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(5),
        };
        assert_eq!(compute_delay(&cfg, 0), Duration::from_millis(100));
        assert_eq!(compute_delay(&cfg, 1), Duration::from_millis(200));
        assert_eq!(compute_delay(&cfg, 10), Duration::from_secs(5));
    }

    #[tokio::test]
    async fn retries_transient_then_succeeds() {
        let calls = AtomicU32::new(0);
        let cfg = CatalogRetryConfig {
            max_attempts: 4,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(5),
        };
        let result = retry_store(&cfg, || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(StoreError::Transient("connection refused".to_string()))
                } else {
                    Ok(42)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn stops_immediately_on_fatal() {
        let calls = AtomicU32::new(0);
        let cfg = CatalogRetryConfig::default();
        let result: Result<(), StoreError> = retry_store(&cfg, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(StoreError::Fatal("constraint violation".to_string())) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exhausts_attempts_and_returns_last_error() {
        let calls = AtomicU32::new(0);
        let cfg = CatalogRetryConfig {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(2),
        };
        let result: Result<(), StoreError> = retry_store(&cfg, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(StoreError::Transient("timeout".to_string())) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
