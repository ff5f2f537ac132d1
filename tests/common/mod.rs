//! Shared helpers for integration tests

#![allow(dead_code)]

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use textproc_core::resilience::{
    CircuitBreakerConfig, ResilienceStrategy, RetryConfig, StrategyConfig,
};

/// Strategy with near-zero backoff so retry tests run quickly
pub fn fast_strategy(max_attempts: u32, failure_threshold: u32) -> StrategyConfig {
    StrategyConfig {
        strategy: ResilienceStrategy::Balanced,
        retry: RetryConfig {
            max_attempts,
            max_delay_seconds: 5.0,
            exponential_multiplier: 0.001,
            exponential_min: 0.0,
            exponential_max: 0.01,
            jitter: false,
            jitter_max: 0.0,
        },
        circuit_breaker: CircuitBreakerConfig {
            failure_threshold,
            recovery_timeout_seconds: 0.1,
            half_open_max_calls: 1,
        },
    }
}

/// Counts invocations of a test operation
#[derive(Debug, Clone, Default)]
pub struct CallCounter(Arc<AtomicU32>);

impl CallCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hit(&self) -> u32 {
        self.0.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn count(&self) -> u32 {
        self.0.load(Ordering::SeqCst)
    }
}

pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("textproc_core=debug")
        .with_test_writer()
        .try_init();
}
