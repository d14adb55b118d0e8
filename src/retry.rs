//! Retry Strategy
//!
//! Runs an async operation under a retry policy: bounded attempts, exponential
//! backoff with a cap, and a caller-supplied predicate deciding which failures
//! deserve another attempt. Attempts are strictly sequential.

use crate::error::RetryPolicyError;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error};

/// Immutable retry parameters.
///
/// The delay after failed attempt `i` (0-indexed) is
/// `min(backoff_seconds * backoff_multiplier^i, max_backoff_seconds)`,
/// or a constant `backoff_seconds` when the multiplier is zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff_seconds: f64,
    backoff_multiplier: f64,
    max_backoff_seconds: f64,
}

impl RetryPolicy {
    pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
    pub const DEFAULT_BACKOFF_SECONDS: f64 = 1.5;
    pub const DEFAULT_BACKOFF_MULTIPLIER: f64 = 1.0;
    pub const DEFAULT_MAX_BACKOFF_SECONDS: f64 = 60.0;

    pub fn new(
        max_attempts: u32,
        backoff_seconds: f64,
        backoff_multiplier: f64,
        max_backoff_seconds: f64,
    ) -> Result<Self, RetryPolicyError> {
        if max_attempts < 1 {
            return Err(RetryPolicyError::ZeroAttempts);
        }
        // Negated comparisons also reject NaN.
        if !(backoff_seconds >= 0.0) {
            return Err(RetryPolicyError::NegativeBackoff(backoff_seconds));
        }
        if !(backoff_multiplier >= 0.0) {
            return Err(RetryPolicyError::NegativeMultiplier(backoff_multiplier));
        }
        if !(max_backoff_seconds >= 0.0) {
            return Err(RetryPolicyError::NegativeMaxBackoff(max_backoff_seconds));
        }
        Ok(Self {
            max_attempts,
            backoff_seconds,
            backoff_multiplier,
            max_backoff_seconds,
        })
    }

    /// A policy that performs exactly one attempt.
    pub fn single_attempt() -> Self {
        Self {
            max_attempts: 1,
            backoff_seconds: 0.0,
            backoff_multiplier: 0.0,
            max_backoff_seconds: 0.0,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn backoff_seconds(&self) -> f64 {
        self.backoff_seconds
    }

    pub fn backoff_multiplier(&self) -> f64 {
        self.backoff_multiplier
    }

    pub fn max_backoff_seconds(&self) -> f64 {
        self.max_backoff_seconds
    }

    /// Delay to wait after failed attempt `attempt` (0-indexed).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        if self.backoff_seconds == 0.0 {
            return Duration::ZERO;
        }
        if self.backoff_multiplier == 0.0 {
            return seconds(self.backoff_seconds);
        }
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let raw = self.backoff_seconds * self.backoff_multiplier.powi(exponent);
        seconds(raw.min(self.max_backoff_seconds))
    }
}

fn seconds(value: f64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or(Duration::MAX)
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: Self::DEFAULT_MAX_ATTEMPTS,
            backoff_seconds: Self::DEFAULT_BACKOFF_SECONDS,
            backoff_multiplier: Self::DEFAULT_BACKOFF_MULTIPLIER,
            max_backoff_seconds: Self::DEFAULT_MAX_BACKOFF_SECONDS,
        }
    }
}

/// How an operation is retried.
#[derive(Debug, Clone, PartialEq)]
pub enum RetryStrategy {
    /// Retry per policy, sleeping between attempts.
    ExponentialBackoff(RetryPolicy),
    /// Exactly one attempt, no delay.
    NoRetry,
}

impl RetryStrategy {
    pub fn max_attempts(&self) -> u32 {
        match self {
            RetryStrategy::ExponentialBackoff(policy) => policy.max_attempts(),
            RetryStrategy::NoRetry => 1,
        }
    }

    /// Execute `operation`, retrying every failure.
    pub async fn execute<T, E, F, Fut>(&self, operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        self.execute_with(operation, |_| true).await
    }

    /// Execute `operation`, retrying only failures accepted by `should_retry`.
    ///
    /// A rejected failure is returned immediately; otherwise the last failure
    /// is returned once the attempt budget is spent.
    pub async fn execute_with<T, E, F, Fut, P>(
        &self,
        mut operation: F,
        should_retry: P,
    ) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        P: Fn(&E) -> bool,
        E: Display,
    {
        let policy = match self {
            RetryStrategy::NoRetry => return operation().await,
            RetryStrategy::ExponentialBackoff(policy) => policy,
        };

        let max_attempts = policy.max_attempts();
        let mut attempt: u32 = 0;
        loop {
            let err = match operation().await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };
            attempt += 1;

            if !should_retry(&err) {
                debug!(attempt, error = %err, "Failure is not retryable");
                return Err(err);
            }

            if attempt >= max_attempts {
                error!(max_attempts, error = %err, "All attempts failed");
                return Err(err);
            }

            let delay = policy.delay_for(attempt - 1);
            debug!(
                attempt,
                max_attempts,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "Attempt failed, retrying"
            );
            sleep(delay).await;
        }
    }
}
