//! # Retry Policy
//!
//! Bounded exponential backoff around remote store calls. Every attempt runs
//! under a per-call timeout; only retryable [`StoreError`]s are retried.
//!
//! An optional deadline (used by the shutdown flush) stops new attempts and
//! shortens backoff, but never shortens an attempt already in flight: a call
//! that has started runs until it returns or hits its own per-call timeout.

use crate::config::{ProviderConfig, PublisherConfig};
use crate::error::{StoreError, StoreResult};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts allowed (never less than one)
    pub max_attempts: u32,
    pub base_backoff: Duration,
    pub max_backoff: Duration,
}

/// Result of a retried call plus how many attempts it took
#[derive(Debug)]
pub struct RetryOutcome<T> {
    pub result: StoreResult<T>,
    pub attempts: u32,
    /// The deadline cut the sequence short
    pub deadline_exceeded: bool,
}

impl<T> RetryOutcome<T> {
    pub fn failed_attempts(&self) -> u32 {
        if self.result.is_ok() {
            self.attempts.saturating_sub(1)
        } else {
            self.attempts
        }
    }
}

impl RetryPolicy {
    /// A batch is abandoned after `max_retries` consecutive failures
    pub fn new(max_retries: u32, base_backoff: Duration, max_backoff: Duration) -> Self {
        Self {
            max_attempts: max_retries.max(1),
            base_backoff,
            max_backoff: max_backoff.max(base_backoff),
        }
    }

    pub fn for_publisher(config: &PublisherConfig) -> Self {
        Self::new(
            config.max_retries,
            Duration::from_millis(config.retry_backoff_ms),
            Duration::from_millis(config.max_retry_backoff_ms),
        )
    }

    pub fn for_provider(config: &ProviderConfig) -> Self {
        let base = Duration::from_millis(config.retry_backoff_ms);
        Self::new(config.max_retries, base, base.saturating_mul(32))
    }

    /// Delay before the next attempt, after `failed_attempts` failures
    pub fn backoff_for(&self, failed_attempts: u32) -> Duration {
        let exponent = failed_attempts.saturating_sub(1).min(20);
        self.base_backoff
            .saturating_mul(1u32 << exponent)
            .min(self.max_backoff)
    }

    /// Run `call` until it succeeds, fails permanently, or attempts run out
    pub async fn execute<T, F, Fut>(
        &self,
        operation: &str,
        call_timeout: Duration,
        deadline: Option<Instant>,
        mut call: F,
    ) -> RetryOutcome<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = StoreResult<T>>,
    {
        let mut attempts = 0;
        loop {
            if let Some(deadline) = deadline {
                if attempts > 0 && Instant::now() >= deadline {
                    return RetryOutcome {
                        result: Err(StoreError::Timeout {
                            operation: operation.to_string(),
                            timeout_ms: 0,
                        }),
                        attempts,
                        deadline_exceeded: true,
                    };
                }
            }

            attempts += 1;
            let result = match tokio::time::timeout(call_timeout, call()).await {
                Ok(result) => result,
                Err(_) => Err(StoreError::Timeout {
                    operation: operation.to_string(),
                    timeout_ms: call_timeout.as_millis() as u64,
                }),
            };

            let error = match result {
                Ok(value) => {
                    if attempts > 1 {
                        debug!(operation, attempts, "store call succeeded after retry");
                    }
                    return RetryOutcome {
                        result: Ok(value),
                        attempts,
                        deadline_exceeded: false,
                    };
                }
                Err(error) => error,
            };

            if !error.is_retryable() || attempts >= self.max_attempts {
                return RetryOutcome {
                    result: Err(error),
                    attempts,
                    deadline_exceeded: false,
                };
            }

            let mut delay = self.backoff_for(attempts);
            if let Some(deadline) = deadline {
                let remaining = deadline.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    return RetryOutcome {
                        result: Err(error),
                        attempts,
                        deadline_exceeded: true,
                    };
                }
                delay = delay.min(remaining);
            }

            warn!(
                operation,
                attempt = attempts,
                max_attempts = self.max_attempts,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "⏳ RETRY: store call failed, backing off"
            );
            tokio::time::sleep(delay).await;
        }
    }
}
