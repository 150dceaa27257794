//! Exponential backoff for transient failures

use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Backoff schedule: `base_delay * multiplier^(n-1)` before attempt `n + 1`
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub multiplier: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            multiplier: 2,
        }
    }
}

impl RetryPolicy {
    /// Policy that never retries
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Delay to wait after the `failed_attempts`-th failure
    pub fn delay_after(&self, failed_attempts: u32) -> Duration {
        let exponent = failed_attempts.saturating_sub(1);
        self.base_delay
            .saturating_mul(self.multiplier.saturating_pow(exponent))
    }
}

/// Result of a retried operation plus how many times it was attempted
#[derive(Debug)]
pub struct Attempted<T, E> {
    pub result: Result<T, E>,
    pub attempts: u32,
}

/// Run `op` until it succeeds, fails with a non-retryable error, or the
/// policy's attempts are used up
///
/// # Arguments
/// * `policy` - backoff schedule and attempt limit
/// * `label` - name used in log lines
/// * `is_retryable` - classifies an error as transient
/// * `op` - produces a fresh future per attempt
pub async fn retry_with_backoff<T, E, F, Fut, R>(
    policy: &RetryPolicy,
    label: &str,
    is_retryable: R,
    mut op: F,
) -> Attempted<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    R: Fn(&E) -> bool,
    E: std::fmt::Display,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempts = 0;

    loop {
        attempts += 1;
        match op().await {
            Ok(value) => {
                return Attempted {
                    result: Ok(value),
                    attempts,
                }
            }
            Err(e) => {
                if !is_retryable(&e) || attempts >= max_attempts {
                    return Attempted {
                        result: Err(e),
                        attempts,
                    };
                }

                let delay = policy.delay_after(attempts);
                warn!(
                    tool = %label,
                    attempt = attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Retryable failure, backing off"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    #[test]
    fn test_default_schedule() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_after(1), Duration::from_secs(1));
        assert_eq!(policy.delay_after(2), Duration::from_secs(2));
        assert_eq!(policy.delay_after(3), Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_on_third_attempt_after_backoff() {
        let calls = AtomicU32::new(0);
        let start = Instant::now();

        let outcome = retry_with_backoff(&RetryPolicy::default(), "flaky", |_: &String| true, || {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if n < 3 {
                    Err(format!("timeout #{}", n))
                } else {
                    Ok(n)
                }
            }
        })
        .await;

        assert_eq!(outcome.result.unwrap(), 3);
        assert_eq!(outcome.attempts, 3);
        // 1s + 2s of virtual time
        let waited = start.elapsed();
        assert!(waited >= Duration::from_secs(3) && waited < Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_retryable_fails_immediately() {
        let start = Instant::now();
        let outcome: Attempted<(), String> =
            retry_with_backoff(&RetryPolicy::default(), "strict", |_| false, || async {
                Err("access denied".to_string())
            })
            .await;

        assert_eq!(outcome.attempts, 1);
        assert!(outcome.result.is_err());
        assert!(start.elapsed() < Duration::from_millis(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_max_attempts() {
        let outcome: Attempted<(), String> =
            retry_with_backoff(&RetryPolicy::default(), "down", |_| true, || async {
                Err("connection refused".to_string())
            })
            .await;

        assert_eq!(outcome.attempts, 3);
        assert_eq!(outcome.result.unwrap_err(), "connection refused");
    }
}
