//! Retry with exponential backoff and per-call timeouts for service calls.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{RagError, Result};

/// How often and how patiently transient service failures are retried.
///
/// `max_attempts` counts the first call, so `1` disables retries. Attempt `n`
/// (zero based) that fails transiently waits `base_delay_ms * 2^n`, capped at
/// `max_delay_ms`, before the next attempt.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first.
    pub max_attempts: u32,
    /// Delay after the first failed attempt, in milliseconds.
    pub base_delay_ms: u64,
    /// Upper bound for any single delay, in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 3, base_delay_ms: 500, max_delay_ms: 10_000 }
    }
}

impl RetryPolicy {
    /// A policy that makes exactly one attempt.
    pub fn none() -> Self {
        Self { max_attempts: 1, ..Self::default() }
    }

    /// Backoff before the attempt following the failed attempt `attempt`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
        let delay = self.base_delay_ms.saturating_mul(factor).min(self.max_delay_ms);
        Duration::from_millis(delay)
    }
}

/// The external service a call goes to. Decides which error a timeout becomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Service {
    Embedding,
    Completion,
}

impl Service {
    fn timeout_error(self, provider: &str, timeout: Duration) -> RagError {
        let message = format!("request timed out after {}ms", timeout.as_millis());
        match self {
            Service::Embedding => RagError::embedding(provider, message, true),
            Service::Completion => RagError::completion(provider, message, true),
        }
    }
}

/// Run `call` under `timeout`, retrying retryable failures per `policy`.
///
/// Non-retryable errors are returned immediately. When every attempt fails
/// the last error is returned.
pub(crate) async fn call_with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    timeout: Duration,
    service: Service,
    provider: &str,
    operation: &str,
    mut call: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        let outcome = match tokio::time::timeout(timeout, call()).await {
            Ok(result) => result,
            Err(_) => Err(service.timeout_error(provider, timeout)),
        };

        let err = match outcome {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        if !err.is_retryable() || attempt + 1 >= max_attempts {
            return Err(err);
        }

        let wait = policy.delay_for(attempt);
        warn!(
            provider,
            operation,
            attempt = attempt + 1,
            max_attempts,
            wait_ms = wait.as_millis() as u64,
            error = %err,
            "retryable service error, backing off"
        );
        tokio::time::sleep(wait).await;
        attempt += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_doubles_and_caps() {
        let policy = RetryPolicy { max_attempts: 5, base_delay_ms: 500, max_delay_ms: 1_500 };
        assert_eq!(policy.delay_for(0), Duration::from_millis(500));
        assert_eq!(policy.delay_for(1), Duration::from_millis(1_000));
        assert_eq!(policy.delay_for(2), Duration::from_millis(1_500));
        assert_eq!(policy.delay_for(80), Duration::from_millis(1_500));
    }

    #[test]
    fn none_makes_a_single_attempt() {
        assert_eq!(RetryPolicy::none().max_attempts, 1);
    }
}
