//! Resilient Caller - bounded retry around flaky external calls
//!
//! Exponential backoff with jitter, a total time budget, and a cancellation
//! token that aborts the whole retry sequence (not just the current attempt).
//! Only `DomainError::Transient` failures are retried.

use std::future::Future;
use std::time::{Duration, Instant};

use rand::Rng;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use crate::domain::DomainError;

/// Retry budget for one class of calls
#[derive(Debug, Clone, Deserialize)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    /// Wall-clock cap across all attempts and backoff sleeps
    pub total_budget_ms: u64,
}

impl RetryPolicy {
    /// Store reads and writes
    pub fn storage() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 200,
            max_delay_ms: 2_000,
            total_budget_ms: 7_000,
        }
    }

    /// Embedding and reasoning calls
    pub fn inference() -> Self {
        Self {
            max_attempts: 5,
            base_delay_ms: 1_000,
            max_delay_ms: 16_000,
            total_budget_ms: 60_000,
        }
    }

    pub fn total_budget(&self) -> Duration {
        Duration::from_millis(self.total_budget_ms)
    }

    /// Backoff before attempt `attempt + 1`, given a jitter sample in [0, 1).
    ///
    /// Equal jitter: half the exponential delay is fixed, half is random.
    pub fn backoff(&self, attempt: u32, jitter: f64) -> Duration {
        let exp = self
            .base_delay_ms
            .saturating_mul(1u64 << attempt.saturating_sub(1).min(20));
        let capped = exp.min(self.max_delay_ms);
        let half = capped / 2;
        let jittered = half + (half as f64 * jitter.clamp(0.0, 1.0)) as u64;
        Duration::from_millis(jittered)
    }
}

/// Resilient caller bound to one retry policy
#[derive(Debug, Clone)]
pub struct ResilientCaller {
    policy: RetryPolicy,
}

impl ResilientCaller {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    pub fn storage() -> Self {
        Self::new(RetryPolicy::storage())
    }

    pub fn inference() -> Self {
        Self::new(RetryPolicy::inference())
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Run `op` until it succeeds, fails permanently, exhausts the budget,
    /// or `cancel` fires.
    pub async fn call<T, F, Fut>(
        &self,
        operation: &str,
        cancel: &CancellationToken,
        mut op: F,
    ) -> Result<T, DomainError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, DomainError>>,
    {
        let started = Instant::now();
        let budget = self.policy.total_budget();
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 0u32;

        loop {
            if cancel.is_cancelled() {
                return Err(DomainError::Cancelled);
            }

            attempt += 1;
            let remaining = budget.saturating_sub(started.elapsed());
            if remaining.is_zero() {
                return Err(exhausted(operation, attempt - 1, "time budget spent"));
            }

            let outcome = tokio::select! {
                _ = cancel.cancelled() => return Err(DomainError::Cancelled),
                res = tokio::time::timeout(remaining, op()) => res,
            };

            let error = match outcome {
                Ok(Ok(value)) => {
                    if attempt > 1 {
                        tracing::debug!("🔁 {} succeeded on attempt {}", operation, attempt);
                    }
                    return Ok(value);
                }
                Ok(Err(e)) if !e.is_retryable() => {
                    tracing::warn!("⚠️  {} failed permanently: {}", operation, e);
                    return Err(e);
                }
                Ok(Err(e)) => e,
                Err(_) => DomainError::Transient(format!("{} timed out", operation)),
            };

            if attempt >= max_attempts {
                tracing::warn!(
                    "⚠️  {} gave up after {} attempts: {}",
                    operation,
                    attempt,
                    error
                );
                return Err(exhausted(operation, attempt, &error.to_string()));
            }

            let jitter = rand::thread_rng().gen_range(0.0..1.0);
            let delay = self.policy.backoff(attempt, jitter);
            let remaining = budget.saturating_sub(started.elapsed());
            if delay >= remaining {
                tracing::warn!(
                    "⚠️  {} out of time budget after {} attempts: {}",
                    operation,
                    attempt,
                    error
                );
                return Err(exhausted(operation, attempt, &error.to_string()));
            }

            tracing::debug!(
                "🔁 {} attempt {} failed ({}), retrying in {:?}",
                operation,
                attempt,
                error,
                delay
            );

            tokio::select! {
                _ = cancel.cancelled() => return Err(DomainError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
}

fn exhausted(operation: &str, attempts: u32, last_error: &str) -> DomainError {
    DomainError::RetryExhausted {
        operation: operation.to_string(),
        attempts,
        last_error: last_error.to_string(),
    }
}
