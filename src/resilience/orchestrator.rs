//! # Resilience Orchestrator
//!
//! Binds operation names to a circuit breaker, a retry policy and a metrics
//! record, then runs calls through that pipeline:
//!
//! ```text
//! resolve strategy -> breaker gate -> retry loop -> classification -> metrics
//! ```
//!
//! Per-operation state is built lazily on first use and kept for the
//! lifetime of the orchestrator. The orchestrator is cheap to clone; clones
//! share all state, so one instance can be handed to every request handler.

use crate::config::{ConfigResult, ConfigurationError, ResilienceConfig};
use crate::resilience::circuit_breaker::{CircuitBreaker, CircuitBreakerSnapshot, CircuitState};
use crate::resilience::classification::Classify;
use crate::resilience::config::{ResilienceStrategy, StrategyConfig};
use crate::resilience::metrics::{MetricsTransitionObserver, ResilienceMetrics, SharedMetrics};
use crate::resilience::retry::RetryPolicy;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{self, Display};
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Error returned by every orchestrated call
#[derive(Debug, thiserror::Error)]
pub enum ResilienceError<E> {
    /// The operation's circuit is open; the operation was not invoked
    #[error("Circuit breaker is open for operation '{operation}'")]
    CircuitOpen { operation: String },

    /// The operation failed; the original error is carried unchanged
    #[error("{0}")]
    Operation(E),
}

impl<E> ResilienceError<E> {
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, ResilienceError::CircuitOpen { .. })
    }

    /// The wrapped operation error, if the operation actually ran
    pub fn into_operation_error(self) -> Option<E> {
        match self {
            ResilienceError::Operation(error) => Some(error),
            ResilienceError::CircuitOpen { .. } => None,
        }
    }
}

/// Metrics and breaker summary for one operation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationMetricsReport {
    pub strategy: ResilienceStrategy,
    pub metrics: ResilienceMetrics,
    pub success_rate: f64,
    pub failure_rate: f64,
    pub circuit_breaker: CircuitBreakerSnapshot,
}

/// Totals across every known operation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetricsSummary {
    pub total_operations: usize,
    pub total_calls: u64,
    pub successful_calls: u64,
    pub failed_calls: u64,
    pub retry_attempts: u64,
    pub overall_success_rate: f64,
    pub healthy_circuit_breakers: usize,
    pub unhealthy_circuit_breakers: usize,
}

/// Result of [`ResilienceOrchestrator::get_all_metrics`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllMetrics {
    pub operations: BTreeMap<String, OperationMetricsReport>,
    pub summary: MetricsSummary,
    pub timestamp: DateTime<Utc>,
}

/// Result of [`ResilienceOrchestrator::get_health_status`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    /// True iff no circuit breaker is open
    pub healthy: bool,
    pub open_circuit_breakers: Vec<String>,
    pub half_open_circuit_breakers: Vec<String>,
    pub total_circuit_breakers: usize,
    pub timestamp: DateTime<Utc>,
}

struct OperationState {
    config: StrategyConfig,
    breaker: Arc<CircuitBreaker>,
    retry: RetryPolicy,
    metrics: SharedMetrics,
}

impl OperationState {
    fn new(operation_name: &str, config: StrategyConfig) -> Self {
        let metrics: SharedMetrics = Arc::new(Mutex::new(ResilienceMetrics::new()));
        let breaker = Arc::new(CircuitBreaker::new(
            operation_name,
            config.circuit_breaker.clone(),
        ));
        breaker.add_observer(Arc::new(MetricsTransitionObserver::new(Arc::clone(
            &metrics,
        ))));

        Self {
            retry: RetryPolicy::new(config.retry.clone()),
            config,
            breaker,
            metrics,
        }
    }
}

/// Releases a breaker admission when the call future is dropped mid-flight
struct CallPermit<'a> {
    breaker: &'a CircuitBreaker,
    settled: bool,
}

impl Drop for CallPermit<'_> {
    fn drop(&mut self) {
        if !self.settled {
            debug!(operation = %self.breaker.name(), "Call abandoned before completion");
            self.breaker.release();
        }
    }
}

struct OrchestratorInner {
    config: ResilienceConfig,
    operations: DashMap<String, Arc<OperationState>>,
}

/// Strategy-driven retry + circuit breaker wrapper for named operations
#[derive(Clone)]
pub struct ResilienceOrchestrator {
    inner: Arc<OrchestratorInner>,
}

impl fmt::Debug for ResilienceOrchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResilienceOrchestrator")
            .field("default_strategy", &self.inner.config.default_strategy)
            .field("operations", &self.operation_names())
            .finish()
    }
}

impl Default for ResilienceOrchestrator {
    fn default() -> Self {
        Self::new(ResilienceConfig::default())
    }
}

impl ResilienceOrchestrator {
    /// Build from a configuration that has already been validated, such as
    /// one returned by [`crate::config::Settings::resolve_resilience_config`]
    pub fn new(config: ResilienceConfig) -> Self {
        info!(
            default_strategy = %config.default_strategy,
            configured_operations = config.operation_strategies.len(),
            "Resilience orchestrator initialized"
        );

        Self {
            inner: Arc::new(OrchestratorInner {
                config,
                operations: DashMap::new(),
            }),
        }
    }

    /// Validate `config` and build the orchestrator
    pub fn try_new(config: ResilienceConfig) -> ConfigResult<Self> {
        config.ensure_valid()?;
        Ok(Self::new(config))
    }

    pub fn config(&self) -> &ResilienceConfig {
        &self.inner.config
    }

    /// Associate `operation_name` with one of the configured strategy bundles
    ///
    /// The first registration of an operation wins; see
    /// [`register_operation_config`](Self::register_operation_config).
    pub fn register_operation(&self, operation_name: &str, strategy: ResilienceStrategy) {
        let config = self.inner.config.strategy_config(strategy);
        self.install(operation_name, config);
    }

    /// Associate `operation_name` with explicit retry and breaker parameters
    ///
    /// Invalid parameters are rejected with every violated rule listed.
    /// Once an operation has state (from an earlier registration or call),
    /// a conflicting registration is logged and ignored so its breaker and
    /// metrics survive.
    pub fn register_operation_config(
        &self,
        operation_name: &str,
        config: StrategyConfig,
    ) -> ConfigResult<()> {
        let validation = config.validate();
        if !validation.is_valid {
            warn!(
                operation = %operation_name,
                errors = ?validation.errors,
                "Rejected invalid operation configuration"
            );
            return Err(ConfigurationError::Invalid {
                errors: validation.errors,
            });
        }

        self.install(operation_name, config);
        Ok(())
    }

    fn install(&self, operation_name: &str, config: StrategyConfig) {
        match self.inner.operations.entry(operation_name.to_string()) {
            Entry::Occupied(existing) => {
                let current = &existing.get().config;
                if *current != config {
                    warn!(
                        operation = %operation_name,
                        current_strategy = %current.strategy,
                        requested_strategy = %config.strategy,
                        "Operation already configured, keeping existing resilience state"
                    );
                }
            }
            Entry::Vacant(slot) => {
                info!(
                    operation = %operation_name,
                    strategy = %config.strategy,
                    max_attempts = config.retry.max_attempts,
                    failure_threshold = config.circuit_breaker.failure_threshold,
                    "Registered operation"
                );
                slot.insert(Arc::new(OperationState::new(operation_name, config)));
            }
        }
    }

    /// Strategy a call to `operation_name` would use right now
    pub fn operation_strategy(&self, operation_name: &str) -> ResilienceStrategy {
        self.resolve_config(operation_name).strategy
    }

    /// Names of operations that have been registered or called, sorted
    pub fn operation_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .inner
            .operations
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        names.sort();
        names
    }

    /// Circuit breaker of an operation, creating the operation state if needed
    pub fn circuit_breaker(&self, operation_name: &str) -> Arc<CircuitBreaker> {
        Arc::clone(&self.operation_state(operation_name).breaker)
    }

    /// Run `operation` through the breaker and retry pipeline of `operation_name`
    ///
    /// `operation` is invoked once per attempt. Circuit-open rejections are
    /// counted as failed calls but never invoke the operation.
    pub async fn execute<F, Fut, T, E>(
        &self,
        operation_name: &str,
        operation: F,
    ) -> Result<T, ResilienceError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Classify + Display,
    {
        let state = self.operation_state(operation_name);

        if !state.breaker.try_acquire() {
            state.metrics.lock().record_failure();
            warn!(operation = %operation_name, "Call rejected, circuit breaker open");
            return Err(ResilienceError::CircuitOpen {
                operation: operation_name.to_string(),
            });
        }

        let mut permit = CallPermit {
            breaker: &state.breaker,
            settled: false,
        };
        let started = Instant::now();
        let metrics = Arc::clone(&state.metrics);

        let result = state
            .retry
            .execute(operation_name, operation, |_, _, _| {
                metrics.lock().record_retry();
            })
            .await;

        permit.settled = true;
        let elapsed = started.elapsed();

        match result {
            Ok(value) => {
                state.breaker.record_success(elapsed);
                state.metrics.lock().record_success();
                Ok(value)
            }
            Err(error) => {
                state.breaker.record_failure(elapsed);
                state.metrics.lock().record_failure();
                warn!(
                    operation = %operation_name,
                    failure_class = %error.failure_class(),
                    error = %error,
                    "Operation failed"
                );
                Err(ResilienceError::Operation(error))
            }
        }
    }

    /// Like [`execute`](Self::execute), but any failure is handed to `fallback`
    ///
    /// The fallback also runs when the circuit is open. Its own error is
    /// returned as [`ResilienceError::Operation`].
    pub async fn execute_with_fallback<F, Fut, T, E, G, GFut>(
        &self,
        operation_name: &str,
        operation: F,
        fallback: G,
    ) -> Result<T, ResilienceError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Classify + Display,
        G: FnOnce(ResilienceError<E>) -> GFut,
        GFut: Future<Output = Result<T, E>>,
    {
        match self.execute(operation_name, operation).await {
            Ok(value) => Ok(value),
            Err(error) => {
                info!(operation = %operation_name, error = %error, "Using fallback");
                fallback(error).await.map_err(ResilienceError::Operation)
            }
        }
    }

    /// Wrap `function` so every call goes through the pipeline of `operation_name`
    pub fn with_operation_resilience<F>(
        &self,
        operation_name: impl Into<String>,
        function: F,
    ) -> ResilientOperation<F> {
        ResilientOperation {
            orchestrator: self.clone(),
            operation_name: operation_name.into(),
            function,
        }
    }

    /// Register `operation_name` with `strategy` and wrap `function`
    pub fn with_strategy_resilience<F>(
        &self,
        operation_name: impl Into<String>,
        strategy: ResilienceStrategy,
        function: F,
    ) -> ResilientOperation<F> {
        let operation_name = operation_name.into();
        self.register_operation(&operation_name, strategy);
        self.with_operation_resilience(operation_name, function)
    }

    pub fn with_aggressive_resilience<F>(
        &self,
        operation_name: impl Into<String>,
        function: F,
    ) -> ResilientOperation<F> {
        self.with_strategy_resilience(operation_name, ResilienceStrategy::Aggressive, function)
    }

    pub fn with_balanced_resilience<F>(
        &self,
        operation_name: impl Into<String>,
        function: F,
    ) -> ResilientOperation<F> {
        self.with_strategy_resilience(operation_name, ResilienceStrategy::Balanced, function)
    }

    pub fn with_conservative_resilience<F>(
        &self,
        operation_name: impl Into<String>,
        function: F,
    ) -> ResilientOperation<F> {
        self.with_strategy_resilience(operation_name, ResilienceStrategy::Conservative, function)
    }

    pub fn with_critical_resilience<F>(
        &self,
        operation_name: impl Into<String>,
        function: F,
    ) -> ResilientOperation<F> {
        self.with_strategy_resilience(operation_name, ResilienceStrategy::Critical, function)
    }

    pub fn get_all_metrics(&self) -> AllMetrics {
        let mut operations = BTreeMap::new();
        let mut summary = MetricsSummary::default();

        for entry in self.inner.operations.iter() {
            let state = entry.value();
            let metrics = state.metrics.lock().clone();
            let circuit_breaker = state.breaker.snapshot();

            summary.total_calls += metrics.total_calls;
            summary.successful_calls += metrics.successful_calls;
            summary.failed_calls += metrics.failed_calls;
            summary.retry_attempts += metrics.retry_attempts;
            if circuit_breaker.is_healthy() {
                summary.healthy_circuit_breakers += 1;
            } else {
                summary.unhealthy_circuit_breakers += 1;
            }

            operations.insert(
                entry.key().clone(),
                OperationMetricsReport {
                    strategy: state.config.strategy,
                    success_rate: metrics.success_rate(),
                    failure_rate: metrics.failure_rate(),
                    metrics,
                    circuit_breaker,
                },
            );
        }

        summary.total_operations = operations.len();
        if summary.total_calls > 0 {
            summary.overall_success_rate =
                summary.successful_calls as f64 / summary.total_calls as f64;
        }

        AllMetrics {
            operations,
            summary,
            timestamp: Utc::now(),
        }
    }

    pub fn get_health_status(&self) -> HealthStatus {
        let mut open_circuit_breakers = Vec::new();
        let mut half_open_circuit_breakers = Vec::new();
        let mut total_circuit_breakers = 0;

        for entry in self.inner.operations.iter() {
            total_circuit_breakers += 1;
            match entry.value().breaker.state() {
                CircuitState::Open => open_circuit_breakers.push(entry.key().clone()),
                CircuitState::HalfOpen => half_open_circuit_breakers.push(entry.key().clone()),
                CircuitState::Closed => {}
            }
        }

        open_circuit_breakers.sort();
        half_open_circuit_breakers.sort();

        HealthStatus {
            healthy: open_circuit_breakers.is_empty(),
            open_circuit_breakers,
            half_open_circuit_breakers,
            total_circuit_breakers,
            timestamp: Utc::now(),
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.inner
            .operations
            .iter()
            .all(|entry| entry.value().breaker.state() != CircuitState::Open)
    }

    /// Reset counters for one operation, or all when `None`. Breaker state is untouched.
    pub fn reset_metrics(&self, operation_name: Option<&str>) {
        match operation_name {
            Some(name) => match self.inner.operations.get(name) {
                Some(state) => {
                    state.metrics.lock().reset();
                    info!(operation = %name, "Reset resilience metrics");
                }
                None => debug!(operation = %name, "No metrics to reset for unknown operation"),
            },
            None => {
                for entry in self.inner.operations.iter() {
                    entry.value().metrics.lock().reset();
                }
                info!("Reset resilience metrics for all operations");
            }
        }
    }

    /// Force one breaker, or all when `None`, back to closed
    pub fn reset_circuit_breaker(&self, operation_name: Option<&str>) {
        match operation_name {
            Some(name) => {
                if let Some(state) = self.inner.operations.get(name) {
                    state.breaker.force_closed();
                }
            }
            None => {
                for entry in self.inner.operations.iter() {
                    entry.value().breaker.force_closed();
                }
            }
        }
    }

    fn resolve_config(&self, operation_name: &str) -> StrategyConfig {
        if let Some(state) = self.inner.operations.get(operation_name) {
            return state.config.clone();
        }

        let strategy = self
            .inner
            .config
            .operation_strategies
            .get(operation_name)
            .copied()
            .unwrap_or(self.inner.config.default_strategy);
        self.inner.config.strategy_config(strategy)
    }

    fn operation_state(&self, operation_name: &str) -> Arc<OperationState> {
        if let Some(state) = self.inner.operations.get(operation_name) {
            return Arc::clone(state.value());
        }

        let config = self.resolve_config(operation_name);
        let state = self
            .inner
            .operations
            .entry(operation_name.to_string())
            .or_insert_with(|| {
                debug!(
                    operation = %operation_name,
                    strategy = %config.strategy,
                    "Creating resilience state for operation"
                );
                Arc::new(OperationState::new(operation_name, config))
            });
        Arc::clone(state.value())
    }
}

/// Async function bound to an operation name
///
/// Created by [`ResilienceOrchestrator::with_operation_resilience`]. Each
/// [`call`](Self::call) clones `args` once per attempt.
pub struct ResilientOperation<F> {
    orchestrator: ResilienceOrchestrator,
    operation_name: String,
    function: F,
}

impl<F> ResilientOperation<F> {
    pub fn operation_name(&self) -> &str {
        &self.operation_name
    }

    pub async fn call<A, Fut, T, E>(&self, args: A) -> Result<T, ResilienceError<E>>
    where
        F: Fn(A) -> Fut,
        A: Clone,
        Fut: Future<Output = Result<T, E>>,
        E: Classify + Display,
    {
        self.orchestrator
            .execute(&self.operation_name, || (self.function)(args.clone()))
            .await
    }
}
