//! Bounded retry with exponential backoff

use std::future::Future;
use std::time::Duration;
use tracing::warn;

use crate::BackendResult;

/// Configuration for exponential backoff retry logic
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Maximum number of retry attempts
    pub max_retries: u32,
    /// Initial delay before first retry
    pub initial_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
    /// Multiplier for exponential backoff
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
            multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Default backoff with a custom retry count
    pub fn with_max_retries(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Self::default()
        }
    }

    /// Single attempt, no retries
    pub fn none() -> Self {
        Self::with_max_retries(0)
    }

    fn next_delay(&self, delay: Duration) -> Duration {
        std::cmp::min(
            Duration::from_millis((delay.as_millis() as f64 * self.multiplier) as u64),
            self.max_delay,
        )
    }
}

/// Execute an operation, retrying transient failures.
///
/// Only errors whose `is_transient()` is true are retried; `NotFound` and
/// other permanent failures are returned immediately.
pub async fn with_retry<F, Fut, T>(config: &RetryConfig, mut operation: F) -> BackendResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = BackendResult<T>>,
{
    let mut delay = config.initial_delay;
    let mut attempt = 0;

    loop {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(error) => {
                if attempt >= config.max_retries || !error.is_transient() {
                    return Err(error);
                }

                attempt += 1;
                warn!(
                    attempt,
                    max_retries = config.max_retries,
                    delay_ms = delay.as_millis() as u64,
                    "transient fetch failure, retrying: {}",
                    error
                );

                tokio::time::sleep(delay).await;
                delay = config.next_delay(delay);
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rimport_core::ImportError;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast(max_retries: u32) -> RetryConfig {
        RetryConfig {
            max_retries,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            multiplier: 2.0,
        }
    }

    #[test]
    fn test_retry_config_default() {
        let config = RetryConfig::default();
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.initial_delay, Duration::from_millis(100));
        assert_eq!(config.max_delay, Duration::from_secs(10));
        assert_eq!(config.multiplier, 2.0);
        assert_eq!(RetryConfig::none().max_retries, 0);
    }

    #[test]
    fn test_backoff_is_capped() {
        let config = RetryConfig::default();
        assert_eq!(config.next_delay(Duration::from_millis(100)), Duration::from_millis(200));
        assert_eq!(config.next_delay(Duration::from_secs(8)), Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_transient_failures_then_success() {
        let attempts = AtomicU32::new(0);
        let result = with_retry(&fast(3), || {
            let n = attempts.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(ImportError::transport("http", "loc", "connection reset"))
                } else {
                    Ok(n)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retries_are_bounded() {
        let attempts = AtomicU32::new(0);
        let result: BackendResult<()> = with_retry(&fast(2), || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err(ImportError::transport("http", "loc", "timeout")) }
        })
        .await;

        assert!(matches!(result, Err(ImportError::Transport { .. })));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_not_found_is_never_retried() {
        let attempts = AtomicU32::new(0);
        let result: BackendResult<()> = with_retry(&fast(3), || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err(ImportError::not_found("http://host/missing.py")) }
        })
        .await;

        assert!(result.unwrap_err().is_not_found());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}
