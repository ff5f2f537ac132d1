//! # Resilience Metrics
//!
//! Per-operation counters maintained by the orchestrator. Counters only grow
//! until [`ResilienceMetrics::reset`] is called.

use crate::resilience::circuit_breaker::{CircuitState, TransitionObserver};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Call and transition counters for a single operation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResilienceMetrics {
    /// Calls that entered the pipeline, including circuit-open rejections
    pub total_calls: u64,

    pub successful_calls: u64,

    pub failed_calls: u64,

    /// Retries performed (first attempts are not counted)
    pub retry_attempts: u64,

    pub circuit_breaker_opens: u64,

    pub circuit_breaker_half_opens: u64,

    pub circuit_breaker_closes: u64,

    pub last_failure: Option<DateTime<Utc>>,

    pub last_success: Option<DateTime<Utc>>,
}

impl ResilienceMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fraction of calls that succeeded (0.0 to 1.0, 0.0 when idle)
    pub fn success_rate(&self) -> f64 {
        if self.total_calls == 0 {
            return 0.0;
        }
        self.successful_calls as f64 / self.total_calls as f64
    }

    /// Fraction of calls that failed (0.0 to 1.0, 0.0 when idle)
    pub fn failure_rate(&self) -> f64 {
        if self.total_calls == 0 {
            return 0.0;
        }
        self.failed_calls as f64 / self.total_calls as f64
    }

    pub fn record_success(&mut self) {
        self.total_calls += 1;
        self.successful_calls += 1;
        self.last_success = Some(Utc::now());
    }

    pub fn record_failure(&mut self) {
        self.total_calls += 1;
        self.failed_calls += 1;
        self.last_failure = Some(Utc::now());
    }

    pub fn record_retry(&mut self) {
        self.retry_attempts += 1;
    }

    pub fn record_transition(&mut self, to: CircuitState) {
        match to {
            CircuitState::Open => self.circuit_breaker_opens += 1,
            CircuitState::HalfOpen => self.circuit_breaker_half_opens += 1,
            CircuitState::Closed => self.circuit_breaker_closes += 1,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// One-line summary for logs
    pub fn format_summary(&self) -> String {
        format!(
            "Calls: {} | Success: {:.1}% | Failures: {} | Retries: {} | Opens: {}",
            self.total_calls,
            self.success_rate() * 100.0,
            self.failed_calls,
            self.retry_attempts,
            self.circuit_breaker_opens
        )
    }
}

/// Shared, lock-guarded metrics handle for one operation
pub type SharedMetrics = Arc<Mutex<ResilienceMetrics>>;

/// Feeds breaker transitions into an operation's metrics
#[derive(Debug, Clone)]
pub struct MetricsTransitionObserver {
    metrics: SharedMetrics,
}

impl MetricsTransitionObserver {
    pub fn new(metrics: SharedMetrics) -> Self {
        Self { metrics }
    }
}

impl TransitionObserver for MetricsTransitionObserver {
    fn on_transition(&self, _breaker: &str, _from: CircuitState, to: CircuitState) {
        self.metrics.lock().record_transition(to);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rates_on_idle_metrics() {
        let metrics = ResilienceMetrics::new();
        assert_eq!(metrics.success_rate(), 0.0);
        assert_eq!(metrics.failure_rate(), 0.0);
    }

    #[test]
    fn test_rates_follow_counts() {
        let mut metrics = ResilienceMetrics::new();
        metrics.record_success();
        metrics.record_success();
        metrics.record_success();
        metrics.record_failure();

        assert_eq!(metrics.total_calls, 4);
        assert!((metrics.success_rate() - 0.75).abs() < f64::EPSILON);
        assert!((metrics.failure_rate() - 0.25).abs() < f64::EPSILON);
        assert!(metrics.last_success.is_some());
        assert!(metrics.last_failure.is_some());
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut metrics = ResilienceMetrics::new();
        metrics.record_failure();
        metrics.record_retry();
        metrics.record_transition(CircuitState::Open);

        metrics.reset();
        assert_eq!(metrics, ResilienceMetrics::default());
    }

    #[test]
    fn test_observer_counts_transitions() {
        let metrics: SharedMetrics = Arc::new(Mutex::new(ResilienceMetrics::new()));
        let observer = MetricsTransitionObserver::new(Arc::clone(&metrics));

        observer.on_transition("op", CircuitState::Closed, CircuitState::Open);
        observer.on_transition("op", CircuitState::Open, CircuitState::HalfOpen);
        observer.on_transition("op", CircuitState::HalfOpen, CircuitState::Closed);

        let snapshot = metrics.lock().clone();
        assert_eq!(snapshot.circuit_breaker_opens, 1);
        assert_eq!(snapshot.circuit_breaker_half_opens, 1);
        assert_eq!(snapshot.circuit_breaker_closes, 1);
        assert!(snapshot.format_summary().contains("Opens: 1"));
    }
}
