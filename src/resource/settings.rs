//! Execution settings for a resource manager
//!
//! Timeouts, bounded retry, worker-pool size and the lookup failure policy.

use crate::error::AdapterError;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;

/// Default cap on concurrent per-record calls
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Default timeout applied to every adapter call
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);

/// What `get_by_ids` does when one id does not resolve
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LookupFailurePolicy {
    /// Stop the batch and return the not-found error
    #[default]
    Abort,
    /// Record the missing id and continue with the rest
    Skip,
}

/// Exponential backoff for retryable calls
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 200,
            max_delay_ms: 5_000,
        }
    }
}

impl RetryPolicy {
    /// A policy that makes exactly one attempt
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Delay before retry number `attempt` (0-based), doubling each time
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 2u64.saturating_pow(attempt);
        Duration::from_millis(self.base_delay_ms.saturating_mul(factor).min(self.max_delay_ms))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ManagerSettings {
    pub concurrency: usize,
    pub call_timeout: Duration,
    pub retry: RetryPolicy,
    pub lookup_failure: LookupFailurePolicy,
    /// Allow retrying destructive calls (off unless explicitly enabled)
    pub retry_destructive: bool,
}

impl Default for ManagerSettings {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            call_timeout: DEFAULT_CALL_TIMEOUT,
            retry: RetryPolicy::default(),
            lookup_failure: LookupFailurePolicy::default(),
            retry_destructive: false,
        }
    }
}

impl ManagerSettings {
    /// Worker-pool size, never zero
    pub fn pool_size(&self) -> usize {
        self.concurrency.max(1)
    }

    /// Run a call under the per-call timeout, retrying transient failures
    pub async fn call_with_retry<T, F, Fut>(
        &self,
        operation: &str,
        retry: RetryPolicy,
        mut call: F,
    ) -> Result<T, AdapterError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, AdapterError>>,
    {
        let max_attempts = retry.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            let result = match tokio::time::timeout(self.call_timeout, call()).await {
                Ok(result) => result,
                Err(_) => Err(AdapterError::Timeout(format!(
                    "{} exceeded {:?}",
                    operation, self.call_timeout
                ))),
            };

            match result {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt + 1 < max_attempts => {
                    let delay = retry.delay(attempt);
                    tracing::warn!(
                        operation = %operation,
                        attempt = attempt + 1,
                        max_attempts = max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Retryable error, backing off"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    tracing::debug!(operation = %operation, error = %e, "Call failed");
                    return Err(e);
                }
            }
        }
    }

    /// Read-only calls always get the bounded retry policy
    pub async fn read<T, F, Fut>(&self, operation: &str, call: F) -> Result<T, AdapterError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, AdapterError>>,
    {
        self.call_with_retry(operation, self.retry, call).await
    }

    /// Destructive calls are attempted once unless `retry_destructive` is set
    pub async fn mutate<T, F, Fut>(&self, operation: &str, call: F) -> Result<T, AdapterError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, AdapterError>>,
    {
        let retry = if self.retry_destructive {
            self.retry
        } else {
            RetryPolicy::none()
        };
        self.call_with_retry(operation, retry, call).await
    }
}
