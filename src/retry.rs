use crate::cancel::sleep_with_cancel;
use crate::{ChartmetricError, Result};
use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;

/// Configuration for retry behavior on HTTP 429
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts after the first request
    pub max_retries: u32,
    /// Base delay, doubled on every attempt
    pub base_delay: Duration,
    /// Maximum delay cap
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(60),
        }
    }
}

impl RetryConfig {
    /// Delay before retry number `retry` (0-based).
    ///
    /// The larger of the server's `retry_after` and the exponential backoff,
    /// capped at `max_delay`.
    pub fn delay_for(&self, retry: u32, retry_after: Duration) -> Duration {
        let backoff = self
            .base_delay
            .saturating_mul(2_u32.saturating_pow(retry.min(16)));
        std::cmp::min(std::cmp::max(retry_after, backoff), self.max_delay)
    }
}

/// Result of a retry operation with context
#[derive(Debug)]
pub struct RetryResult<T> {
    /// The successful result
    pub result: T,
    /// Number of retry attempts made
    pub attempts_made: u32,
    /// Total time spent waiting between attempts
    pub total_retry_time: Duration,
}

/// Execute an async operation, retrying it while it fails with
/// [`ChartmetricError::RateLimit`].
///
/// Any other error is returned immediately. Once `max_retries` is spent the
/// last rate limit error is returned. If `cancel` fires while waiting for a
/// retry, [`ChartmetricError::Cancelled`] is returned without retrying.
///
/// # Arguments
/// * `config` - Retry configuration
/// * `operation_name` - Name of the operation for logging
/// * `cancel` - Optional cancellation signal observed during backoff sleeps
/// * `operation` - Async function that returns a Result
/// * `on_rate_limit` - Callback invoked before each wait with the delay and
///   1-based attempt number
pub async fn retry_with_backoff<T, F, Fut, OnRateLimit>(
    config: &RetryConfig,
    operation_name: &str,
    cancel: Option<&watch::Receiver<bool>>,
    mut operation: F,
    mut on_rate_limit: OnRateLimit,
) -> Result<RetryResult<T>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
    OnRateLimit: FnMut(Duration, u32),
{
    let mut retries = 0;
    let mut total_retry_time = Duration::ZERO;

    loop {
        match operation().await {
            Ok(result) => {
                return Ok(RetryResult {
                    result,
                    attempts_made: retries,
                    total_retry_time,
                });
            }
            Err(ChartmetricError::RateLimit { retry_after }) => {
                if retries >= config.max_retries {
                    log::warn!(
                        "Max retries ({}) exceeded for {}",
                        config.max_retries,
                        operation_name
                    );
                    return Err(ChartmetricError::RateLimit { retry_after });
                }

                let delay = config.delay_for(retries, retry_after);
                log::info!(
                    "{} rate limited. Waiting {:?} before retry {} of {}",
                    operation_name,
                    delay,
                    retries + 1,
                    config.max_retries
                );

                on_rate_limit(delay, retries + 1);

                match cancel {
                    Some(rx) => sleep_with_cancel(rx.clone(), delay).await?,
                    None => tokio::time::sleep(delay).await,
                }
                retries += 1;
                total_retry_time += delay;
            }
            Err(other_error) => return Err(other_error),
        }
    }
}

/// Simplified retry function for operations that don't need custom rate limit handling
pub async fn retry_operation<T, F, Fut>(
    config: &RetryConfig,
    operation_name: &str,
    cancel: Option<&watch::Receiver<bool>>,
    operation: F,
) -> Result<RetryResult<T>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    retry_with_backoff(config, operation_name, cancel, operation, |delay, attempt| {
        log::debug!("Rate limited during {operation_name}: attempt {attempt}, waiting {delay:?}");
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn fast_config(max_retries: u32) -> RetryConfig {
        RetryConfig {
            max_retries,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(20),
        }
    }

    #[tokio::test]
    async fn test_successful_operation() {
        let result = retry_operation(&fast_config(3), "test", None, || async {
            Ok::<i32, ChartmetricError>(42)
        })
        .await;

        let retry_result = result.unwrap();
        assert_eq!(retry_result.result, 42);
        assert_eq!(retry_result.attempts_made, 0);
        assert_eq!(retry_result.total_retry_time, Duration::ZERO);
    }

    #[tokio::test]
    async fn test_retry_on_rate_limit() {
        let call_count = Arc::new(AtomicU32::new(0));
        let call_count_clone = call_count.clone();

        let result = retry_operation(&fast_config(2), "test", None, move || {
            let count = call_count_clone.fetch_add(1, Ordering::SeqCst);
            async move {
                if count < 2 {
                    Err(ChartmetricError::RateLimit {
                        retry_after: Duration::from_millis(1),
                    })
                } else {
                    Ok::<i32, ChartmetricError>(42)
                }
            }
        })
        .await;

        let retry_result = result.unwrap();
        assert_eq!(retry_result.result, 42);
        assert_eq!(retry_result.attempts_made, 2);
        assert_eq!(call_count.load(Ordering::SeqCst), 3);
        assert!(retry_result.total_retry_time >= Duration::from_millis(2));
    }

    #[tokio::test]
    async fn test_max_retries_exceeded() {
        let call_count = Arc::new(AtomicU32::new(0));
        let call_count_clone = call_count.clone();

        let result = retry_operation(&fast_config(1), "test", None, move || {
            call_count_clone.fetch_add(1, Ordering::SeqCst);
            async {
                Err::<i32, ChartmetricError>(ChartmetricError::RateLimit {
                    retry_after: Duration::from_millis(1),
                })
            }
        })
        .await;

        match result.unwrap_err() {
            ChartmetricError::RateLimit { .. } => {}
            other => panic!("Expected rate limit error, got: {other:?}"),
        }
        assert_eq!(call_count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_other_errors_not_retried() {
        let call_count = Arc::new(AtomicU32::new(0));
        let call_count_clone = call_count.clone();

        let result = retry_operation(&fast_config(3), "test", None, move || {
            call_count_clone.fetch_add(1, Ordering::SeqCst);
            async {
                Err::<i32, ChartmetricError>(ChartmetricError::Remote {
                    status: 500,
                    message: "boom".to_string(),
                })
            }
        })
        .await;

        assert!(matches!(result, Err(ChartmetricError::Remote { status: 500, .. })));
        assert_eq!(call_count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_delay_is_bounded() {
        let config = RetryConfig {
            max_retries: 10,
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(60),
        };
        assert_eq!(config.delay_for(0, Duration::ZERO), Duration::from_secs(2));
        assert_eq!(config.delay_for(2, Duration::ZERO), Duration::from_secs(8));
        assert_eq!(config.delay_for(0, Duration::from_secs(30)), Duration::from_secs(30));
        assert_eq!(config.delay_for(9, Duration::ZERO), Duration::from_secs(60));
        assert_eq!(config.delay_for(40, Duration::from_secs(600)), Duration::from_secs(60));
    }

    #[tokio::test]
    async fn test_cancel_interrupts_backoff() {
        let config = RetryConfig {
            max_retries: 5,
            base_delay: Duration::from_secs(30),
            max_delay: Duration::from_secs(60),
        };
        let cancel = crate::CancellationState::new();
        let rx = cancel.subscribe();
        let call_count = Arc::new(AtomicU32::new(0));
        let call_count_clone = call_count.clone();

        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            canceller.cancel();
        });

        let started = std::time::Instant::now();
        let result = retry_operation(&config, "test", Some(&rx), move || {
            call_count_clone.fetch_add(1, Ordering::SeqCst);
            async {
                Err::<i32, ChartmetricError>(ChartmetricError::RateLimit {
                    retry_after: Duration::from_secs(30),
                })
            }
        })
        .await;

        assert!(matches!(result, Err(ChartmetricError::Cancelled)));
        assert_eq!(call_count.load(Ordering::SeqCst), 1);
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
