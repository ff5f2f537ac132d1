//! # Retry Policy
//!
//! Exponential backoff with optional jitter. Only failures classified as
//! [`FailureClass::Transient`] are retried; everything else is returned to
//! the caller after the first attempt.

use crate::resilience::classification::{Classify, FailureClass};
use crate::resilience::config::{seconds_to_duration, RetryConfig};
use std::fmt::Display;
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Retry executor built from a [`RetryConfig`]
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Deterministic part of the delay after failed attempt `attempt` (1-based)
    pub fn base_delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.max(1).saturating_sub(1).min(31) as i32;
        let raw = self.config.exponential_multiplier * 2f64.powi(exponent);

        let seconds = raw
            .max(self.config.exponential_min)
            .min(self.config.exponential_max)
            .min(self.config.max_delay_seconds)
            .max(0.0);

        seconds_to_duration(seconds)
    }

    /// Delay to wait after failed attempt `attempt`, jitter included
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base = self.base_delay_for_attempt(attempt);
        if self.config.jitter && self.config.jitter_max > 0.0 {
            base.saturating_add(seconds_to_duration(fastrand::f64() * self.config.jitter_max))
        } else {
            base
        }
    }

    /// Run `operation` until it succeeds, fails permanently or the budget is spent.
    ///
    /// `on_retry(attempt, error, delay)` runs once for every retry that is
    /// actually performed, before the backoff sleep. The last error is
    /// returned unchanged.
    pub async fn execute<F, Fut, T, E, R>(
        &self,
        operation_name: &str,
        mut operation: F,
        mut on_retry: R,
    ) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Classify + Display,
        R: FnMut(u32, &E, Duration),
    {
        let started = Instant::now();
        let budget = self.config.max_delay();
        let mut attempt: u32 = 1;

        loop {
            let error = match operation().await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(
                            operation = %operation_name,
                            attempt = attempt,
                            "Operation succeeded after retry"
                        );
                    }
                    return Ok(value);
                }
                Err(error) => error,
            };

            if error.failure_class() == FailureClass::Permanent {
                debug!(
                    operation = %operation_name,
                    attempt = attempt,
                    error = %error,
                    "Permanent failure, not retrying"
                );
                return Err(error);
            }

            if attempt >= self.config.max_attempts {
                warn!(
                    operation = %operation_name,
                    attempts = attempt,
                    error = %error,
                    "Retry attempts exhausted"
                );
                return Err(error);
            }

            let elapsed = started.elapsed();
            if elapsed > budget {
                warn!(
                    operation = %operation_name,
                    attempts = attempt,
                    elapsed_ms = elapsed.as_millis() as u64,
                    error = %error,
                    "Retry time budget exhausted"
                );
                return Err(error);
            }

            let delay = self.delay_for_attempt(attempt);
            warn!(
                operation = %operation_name,
                attempt = attempt,
                max_attempts = self.config.max_attempts,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "Transient failure, retrying"
            );
            on_retry(attempt, &error, delay);

            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}
