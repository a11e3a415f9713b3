//! Bounded exponential backoff that defers to provider `Retry-After` hints.

use crate::error::ProviderError;
use backoff::{backoff::Backoff, ExponentialBackoff, ExponentialBackoffBuilder};
use chrono::{DateTime, Utc};
use std::future::Future;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// First computed delay; doubles on every retry.
    pub base_delay: Duration,
    /// Longest delay slept in-process. Anything longer is returned to the caller.
    pub max_wait: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            max_wait: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoffBuilder::default()
            .with_initial_interval(self.base_delay)
            .with_randomization_factor(0.0)
            .with_multiplier(2.0)
            .with_max_interval(Duration::from_secs(u32::MAX as u64))
            .with_max_elapsed_time(None)
            .build()
    }
}

/// Runs `call` until it succeeds, fails permanently, or the retry budget is spent.
///
/// Transient failures wait `Retry-After` when the provider sent one, otherwise the
/// next exponential step.
pub async fn execute_with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    operation: &str,
    mut call: F,
) -> Result<T, ProviderError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ProviderError>>,
{
    let mut backoff = policy.backoff();
    let mut retries_left = policy.max_retries;

    loop {
        let err = match call().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        if !err.is_transient() || retries_left == 0 {
            return Err(err);
        }

        let computed = backoff.next_backoff().unwrap_or(policy.max_wait);
        let delay = err
            .retry_after()
            .map(Duration::from_secs)
            .unwrap_or(computed);

        if delay > policy.max_wait {
            tracing::warn!(
                operation,
                delay_secs = delay.as_secs(),
                "Retry delay exceeds in-process limit, giving up: {}",
                err
            );
            return Err(err);
        }

        retries_left -= 1;
        tracing::warn!(
            operation,
            delay_ms = delay.as_millis() as u64,
            retries_left,
            "Retrying after transient provider failure: {}",
            err
        );
        tokio::time::sleep(delay).await;
    }
}

/// Parses a `Retry-After` header: delta seconds or an HTTP date.
///
/// Dates in the past yield 0.
pub fn parse_retry_after(value: &str, now: DateTime<Utc>) -> Option<u64> {
    let value = value.trim();
    if let Ok(seconds) = value.parse::<u64>() {
        return Some(seconds);
    }
    let date = DateTime::parse_from_rfc2822(value).ok()?;
    let millis = date.with_timezone(&Utc).signed_duration_since(now).num_milliseconds();
    if millis <= 0 {
        return Some(0);
    }
    Some((millis as u64).div_ceil(1000))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    fn policy() -> RetryPolicy {
        RetryPolicy::default()
    }

    #[test]
    fn parses_delta_seconds() {
        assert_eq!(parse_retry_after("30", Utc::now()), Some(30));
        assert_eq!(parse_retry_after(" 0 ", Utc::now()), Some(0));
    }

    #[test]
    fn parses_http_dates_relative_to_now() {
        let now = Utc.with_ymd_and_hms(2015, 10, 21, 7, 27, 30).unwrap();
        assert_eq!(
            parse_retry_after("Wed, 21 Oct 2015 07:28:00 GMT", now),
            Some(30)
        );
        let later = Utc.with_ymd_and_hms(2015, 10, 21, 8, 0, 0).unwrap();
        assert_eq!(
            parse_retry_after("Wed, 21 Oct 2015 07:28:00 GMT", later),
            Some(0)
        );
    }

    #[test]
    fn ignores_garbage() {
        assert_eq!(parse_retry_after("soon", Utc::now()), None);
        assert_eq!(parse_retry_after("-5", Utc::now()), None);
    }

    #[tokio::test(start_paused = true)]
    async fn backs_off_exponentially_from_one_second() {
        let calls = AtomicU32::new(0);
        let start = Instant::now();

        let result = execute_with_retry(&policy(), "test", || async {
            if calls.fetch_add(1, Ordering::SeqCst) < 3 {
                Err(ProviderError::Service { status: 503 })
            } else {
                Ok(7)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        // 1s + 2s + 4s
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(7), "{elapsed:?}");
        assert!(elapsed < Duration::from_millis(7_100), "{elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn retry_after_overrides_backoff() {
        let calls = AtomicU32::new(0);
        let start = Instant::now();

        let result = execute_with_retry(&policy(), "test", || async {
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(ProviderError::RateLimited {
                    retry_after: Some(12),
                })
            } else {
                Ok(())
            }
        })
        .await;

        assert!(result.is_ok());
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(12), "{elapsed:?}");
        assert!(elapsed < Duration::from_millis(12_100), "{elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_retry_budget() {
        let calls = AtomicU32::new(0);

        let result: Result<(), _> = execute_with_retry(&policy(), "test", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(ProviderError::RateLimited { retry_after: None })
        })
        .await;

        assert!(matches!(result, Err(ProviderError::RateLimited { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn permanent_errors_are_not_retried() {
        let calls = AtomicU32::new(0);

        let result: Result<(), _> = execute_with_retry(&policy(), "test", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(ProviderError::Request {
                status: Some(404),
                message: "not found".into(),
            })
        })
        .await;

        assert!(matches!(result, Err(ProviderError::Request { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn long_retry_after_is_handed_back_immediately() {
        let calls = AtomicU32::new(0);
        let start = Instant::now();

        let result: Result<(), _> = execute_with_retry(&policy(), "test", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(ProviderError::RateLimited {
                retry_after: Some(120),
            })
        })
        .await;

        assert_eq!(result.unwrap_err().retry_after(), Some(120));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }
}
