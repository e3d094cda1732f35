use std::future::Future;
use std::time::Duration;

use rand::Rng;

use crate::error::DataError;

/// Exponential backoff for transient backend failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_retries: u32,
    base_delay_ms: u64,
    max_delay_ms: u64,
    jitter: bool,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay_ms: u64, max_delay_ms: u64) -> Self {
        Self {
            max_retries,
            base_delay_ms,
            max_delay_ms,
            jitter: false,
        }
    }

    /// Add up to a quarter of each delay at random. Delays stay strictly
    /// increasing until they reach the cap.
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Retries allowed after the first invocation.
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn base_delay_ms(&self) -> u64 {
        self.base_delay_ms
    }

    pub fn max_delay_ms(&self) -> u64 {
        self.max_delay_ms
    }

    pub fn jitter(&self) -> bool {
        self.jitter
    }

    /// Delay before retry number `attempt` (0-based): `base * 2^attempt`, capped.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let shift = attempt.min(20);
        let multiplier = 1_u64 << shift;
        let calculated = self
            .base_delay_ms
            .saturating_mul(multiplier)
            .min(self.max_delay_ms);
        let bounded = if self.jitter && calculated >= 4 {
            let extra = rand::thread_rng().gen_range(0..=calculated / 4);
            calculated.saturating_add(extra).min(self.max_delay_ms)
        } else {
            calculated
        };
        Duration::from_millis(bounded)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, 500, 8_000).with_jitter(true)
    }
}

/// Run `operation`, retrying transient failures according to `policy`.
///
/// Only idempotent operations belong here. Non-transient failures return
/// after the first invocation; exhausted retries return the last failure
/// wrapped in [`DataError::RetriesExhausted`].
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, operation: F) -> Result<T, DataError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, DataError>>,
{
    with_retry_notify(policy, operation, |_, _| {}).await
}

/// [`with_retry`] that reports `(retry_number, delay)` before each backoff sleep.
pub async fn with_retry_notify<T, F, Fut, N>(
    policy: &RetryPolicy,
    mut operation: F,
    mut notify: N,
) -> Result<T, DataError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, DataError>>,
    N: FnMut(u32, Duration),
{
    let mut attempt: u32 = 0;
    loop {
        match operation().await {
            Ok(value) => {
                if attempt > 0 {
                    tracing::debug!(retries = attempt, "operation recovered after retry");
                }
                return Ok(value);
            }
            Err(err) if err.is_retryable() && attempt < policy.max_retries => {
                let delay = policy.delay_for_attempt(attempt);
                attempt += 1;
                tracing::warn!(
                    attempt,
                    max_retries = policy.max_retries,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "transient failure; retrying"
                );
                notify(attempt, delay);
                tokio::time::sleep(delay).await;
            }
            Err(err) if err.is_retryable() => {
                tracing::error!(attempts = attempt + 1, error = %err, "retries exhausted");
                return Err(DataError::RetriesExhausted {
                    attempts: attempt + 1,
                    last: Box::new(err),
                });
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn starts_with_base_delay() {
        let policy = RetryPolicy::new(3, 250, 8_000);
        assert_eq!(policy.delay_for_attempt(0), Duration::from_millis(250));
    }

    #[test]
    fn scales_exponentially_for_attempts() {
        let policy = RetryPolicy::new(5, 100, 10_000);
        assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(800));
    }

    #[test]
    fn caps_delay_at_max() {
        let policy = RetryPolicy::new(8, 1_000, 4_000);
        assert_eq!(policy.delay_for_attempt(5), Duration::from_millis(4_000));
    }

    #[test]
    fn jitter_never_reaches_next_step() {
        let policy = RetryPolicy::new(3, 400, 60_000).with_jitter(true);
        for _ in 0..100 {
            let first = policy.delay_for_attempt(0);
            let second = policy.delay_for_attempt(1);
            assert!(first >= Duration::from_millis(400));
            assert!(first <= Duration::from_millis(500));
            assert!(second > first);
        }
    }

    #[tokio::test]
    async fn recovers_after_two_transient_failures() {
        let policy = RetryPolicy::new(3, 1, 1_000);
        let mut calls = 0;
        let mut delays = Vec::new();

        let result = with_retry_notify(
            &policy,
            || {
                calls += 1;
                let call = calls;
                async move {
                    if call <= 2 {
                        Err(DataError::transient("timeout"))
                    } else {
                        Ok("services")
                    }
                }
            },
            |_, delay| delays.push(delay),
        )
        .await;

        assert_eq!(result, Ok("services"));
        assert_eq!(calls, 3);
        assert_eq!(delays.len(), 2);
        assert!(delays[1] > delays[0]);
    }

    #[tokio::test]
    async fn never_retries_non_transient_failures() {
        let policy = RetryPolicy::new(3, 1, 1_000);
        let mut calls = 0;

        let result: Result<(), _> = with_retry(&policy, || {
            calls += 1;
            async { Err(DataError::constraint("23505", "duplicate key")) }
        })
        .await;

        assert_eq!(calls, 1);
        assert_eq!(result.unwrap_err().kind(), ErrorKind::Constraint);
    }

    #[tokio::test]
    async fn tags_last_failure_when_retries_run_out() {
        let policy = RetryPolicy::new(3, 1, 1_000);
        let mut calls = 0;

        let result: Result<(), _> = with_retry(&policy, || {
            calls += 1;
            async { Err(DataError::transient("connection reset")) }
        })
        .await;

        let err = result.unwrap_err();
        assert_eq!(calls, 4);
        assert_eq!(err.kind(), ErrorKind::Transient);
        assert_eq!(
            err,
            DataError::RetriesExhausted {
                attempts: 4,
                last: Box::new(DataError::transient("connection reset")),
            }
        );
    }

    #[tokio::test]
    async fn zero_retries_means_single_attempt() {
        let policy = RetryPolicy::new(0, 1, 1_000);
        let mut calls = 0;

        let result: Result<(), _> = with_retry(&policy, || {
            calls += 1;
            async { Err(DataError::transient("timeout")) }
        })
        .await;

        assert_eq!(calls, 1);
        assert!(result.unwrap_err().is_exhausted());
    }
}
