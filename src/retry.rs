//! Connect retries for realm servers that are briefly unreachable.
//!
//! Only the connect step is retried, and only for errors where
//! [`PublishError::is_retryable`](crate::PublishError::is_retryable) holds.
//! Refused credentials and malformed endpoints fail on the first attempt.

use std::collections::hash_map::RandomState;
use std::future::Future;
use std::hash::BuildHasher;
use std::time::Duration;
use tokio::time::sleep;

/// Backoff settings for connect retries, set through
/// [`PublishConfig::with_retry`](crate::PublishConfig::with_retry).
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Retries after the first attempt; 0 disables retrying.
    pub max_attempts: u32,

    /// Growth factor for the delay between retries.
    pub multiplier: f32,

    pub initial_delay: Duration,

    /// Upper bound on any single delay, before jitter.
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    /// Three retries, starting at 100 ms and doubling up to 5 s.
    fn default() -> Self {
        // ---
        Self {
            max_attempts: 3,
            multiplier: 2.0,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(5),
        }
    }
}

/// Run `operation`, retrying transient failures as `retry_config` allows.
///
/// With no config, or `max_attempts` of 0, the operation runs once. Otherwise the wait before retry
/// `n` is `initial_delay * multiplier^(n-1)`, capped at `max_delay` and then
/// jittered. The error from the final attempt is returned unchanged.
pub(crate) async fn retry_with_backoff<F, Fut, T>(
    retry_config: Option<&RetryConfig>,
    mut operation: F,
) -> crate::Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = crate::Result<T>>,
{
    let Some(retry_config) = retry_config else {
        return operation().await;
    };

    let mut attempt = 0;
    let mut current_delay = retry_config.initial_delay;

    loop {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(err) if err.is_retryable() => {
                attempt += 1;
                if attempt > retry_config.max_attempts {
                    crate::log_debug!(
                        "connect retry exhausted after {} attempts, last error: {}",
                        retry_config.max_attempts,
                        err
                    );
                    return Err(err);
                }

                let jittered_delay = apply_jitter(current_delay);

                crate::log_debug!(
                    "connect retry {}/{}, waiting {:?} (error: {})",
                    attempt,
                    retry_config.max_attempts,
                    jittered_delay,
                    err
                );

                sleep(jittered_delay).await;

                let next_delay = Duration::from_secs_f64(
                    current_delay.as_secs_f64() * retry_config.multiplier as f64,
                );
                current_delay = next_delay.min(retry_config.max_delay);
            }
            Err(err) => return Err(err),
        }
    }
}

/// Scale `delay` by a factor in `0.75..1.25` so clients restarted together
/// spread their reconnects.
fn apply_jitter(delay: Duration) -> Duration {
    // ---
    let hash = RandomState::new().hash_one(std::time::SystemTime::now());
    let unit = (hash % 1000) as f64 / 1000.0;

    delay.mul_f64(0.75 + unit * 0.5)
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::{ErrorCode, PublishError, Step};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::Instant;

    fn unreachable_realm() -> PublishError {
        PublishError::bus(Step::Connect, ErrorCode::ResourceUnavailable, "connection refused")
    }

    fn fast_retry(max_attempts: u32) -> RetryConfig {
        // ---
        RetryConfig {
            max_attempts,
            multiplier: 2.0,
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(100),
        }
    }

    #[tokio::test]
    async fn test_none_config_executes_once() {
        // ---
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result = retry_with_backoff(None, || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err::<i32, _>(unreachable_realm())
            }
        })
        .await;

        assert!(result.unwrap_err().is_retryable());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_zero_attempts_executes_once() {
        // ---
        let config = fast_retry(0);
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result = retry_with_backoff(Some(&config), || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err::<i32, _>(unreachable_realm())
            }
        })
        .await;

        assert!(result.unwrap_err().is_retryable());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_connect_succeeds_after_transient_failures() {
        // ---
        let config = fast_retry(3);
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result = retry_with_backoff(Some(&config), || {
            let counter = counter.clone();
            async move {
                let attempt = counter.fetch_add(1, Ordering::SeqCst) + 1;
                if attempt < 3 {
                    Err(unreachable_realm())
                } else {
                    Ok(attempt)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhaustion_returns_last_error() {
        // ---
        let config = fast_retry(2);
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result = retry_with_backoff(Some(&config), || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err::<i32, _>(unreachable_realm())
            }
        })
        .await;

        assert!(matches!(
            result,
            Err(PublishError::Bus {
                step: Step::Connect,
                code: ErrorCode::ResourceUnavailable,
                ..
            })
        ));
        // Initial attempt + 2 retries
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_refused_credentials_are_not_retried() {
        // ---
        let config = RetryConfig::default();
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result = retry_with_backoff(Some(&config), || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err::<i32, _>(PublishError::bus(
                    Step::Connect,
                    ErrorCode::NotPermitted,
                    "bad password",
                ))
            }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_max_delay_cap() {
        // ---
        let config = RetryConfig {
            max_attempts: 5,
            multiplier: 10.0,
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(50),
        };
        let start = Instant::now();

        let _ = retry_with_backoff(Some(&config), || async {
            Err::<i32, _>(unreachable_realm())
        })
        .await;

        // 5 retries of at most ~62ms each once jitter is applied
        let elapsed = start.elapsed();
        assert!(
            elapsed < Duration::from_millis(400),
            "max_delay cap not working: {elapsed:?}",
        );
    }

    #[test]
    fn test_jitter_range() {
        // ---
        let delay = Duration::from_millis(100);

        for _ in 0..100 {
            let jittered = apply_jitter(delay);
            assert!(jittered >= Duration::from_millis(75), "too low: {jittered:?}");
            assert!(jittered <= Duration::from_millis(125), "too high: {jittered:?}");
        }
    }
}
