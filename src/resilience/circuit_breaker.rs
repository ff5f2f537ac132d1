//! # Circuit Breaker Implementation
//!
//! Provides fault isolation for a single named operation. The breaker follows
//! the classic three-state pattern: Closed (normal operation), Open (failing
//! fast) and Half-Open (probing recovery).
//!
//! State transitions happen under a per-breaker mutex so concurrent callers
//! of the same operation can never lose a failure count or double-count a
//! transition. Call counters are lock-free atomics.

use crate::resilience::config::CircuitBreakerConfig;
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Circuit breaker states representing the current operational mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Normal operation - all calls are allowed through
    Closed,
    /// Failure mode - all calls fail fast without executing
    Open,
    /// Testing recovery - limited calls allowed to test system health
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "closed"),
            CircuitState::Open => write!(f, "open"),
            CircuitState::HalfOpen => write!(f, "half_open"),
        }
    }
}

/// Errors returned by [`CircuitBreaker::call`]
#[derive(Debug, thiserror::Error)]
pub enum CircuitBreakerError<E> {
    /// Circuit is open, the operation was not invoked
    #[error("Circuit breaker is open for {component}")]
    CircuitOpen { component: String },

    /// Operation ran and failed; the failure was recorded
    #[error("Operation failed: {0}")]
    OperationFailed(E),
}

/// Receives every state transition of the breakers it is attached to
pub trait TransitionObserver: Send + Sync {
    fn on_transition(&self, breaker: &str, from: CircuitState, to: CircuitState);
}

/// Point-in-time view of a breaker for metrics and health endpoints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CircuitBreakerSnapshot {
    pub name: String,
    pub state: CircuitState,
    pub failure_count: u32,
    pub failure_threshold: u32,
    pub recovery_timeout_seconds: f64,
    pub half_open_max_calls: u32,
    pub last_failure_time: Option<DateTime<Utc>>,
    pub total_calls: u64,
    pub rejected_calls: u64,
    pub opens: u64,
    pub half_opens: u64,
    pub closes: u64,
}

impl CircuitBreakerSnapshot {
    pub fn is_healthy(&self) -> bool {
        self.state != CircuitState::Open
    }
}

#[derive(Debug)]
struct BreakerCore {
    state: CircuitState,
    failure_count: u32,
    opened_at: Option<Instant>,
    last_failure_time: Option<DateTime<Utc>>,
    half_open_admitted: u32,
    half_open_successes: u32,
}

impl BreakerCore {
    fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            failure_count: 0,
            opened_at: None,
            last_failure_time: None,
            half_open_admitted: 0,
            half_open_successes: 0,
        }
    }
}

#[derive(Debug, Default)]
struct BreakerCounters {
    total_calls: AtomicU64,
    rejected_calls: AtomicU64,
    opens: AtomicU64,
    half_opens: AtomicU64,
    closes: AtomicU64,
}

type Transition = (CircuitState, CircuitState);

/// Core circuit breaker implementation
pub struct CircuitBreaker {
    /// Operation name for logging and metrics
    name: String,

    config: CircuitBreakerConfig,

    core: Mutex<BreakerCore>,

    counters: BreakerCounters,

    observers: RwLock<Vec<Arc<dyn TransitionObserver>>>,
}

impl fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.name)
            .field("config", &self.config)
            .field("state", &self.state())
            .finish()
    }
}

impl CircuitBreaker {
    /// Create a new circuit breaker with the given name and configuration
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        let name = name.into();
        info!(
            operation = %name,
            failure_threshold = config.failure_threshold,
            recovery_timeout_seconds = config.recovery_timeout_seconds,
            half_open_max_calls = config.half_open_max_calls,
            "Circuit breaker initialized"
        );

        Self {
            name,
            config,
            core: Mutex::new(BreakerCore::new()),
            counters: BreakerCounters::default(),
            observers: RwLock::new(Vec::new()),
        }
    }

    /// Attach an observer notified after each state transition
    pub fn add_observer(&self, observer: Arc<dyn TransitionObserver>) {
        self.observers.write().push(observer);
    }

    /// Get current circuit state
    pub fn state(&self) -> CircuitState {
        self.core.lock().state
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    pub fn failure_count(&self) -> u32 {
        self.core.lock().failure_count
    }

    /// Execute an operation with circuit breaker protection
    pub async fn call<F, T, E, Fut>(&self, operation: F) -> Result<T, CircuitBreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if !self.try_acquire() {
            return Err(CircuitBreakerError::CircuitOpen {
                component: self.name.clone(),
            });
        }

        let start_time = Instant::now();
        let result = operation().await;
        let duration = start_time.elapsed();

        match &result {
            Ok(_) => self.record_success(duration),
            Err(_) => self.record_failure(duration),
        }

        result.map_err(CircuitBreakerError::OperationFailed)
    }

    /// Gate check before running an operation.
    ///
    /// Returns `false` when the call must be rejected. An admitted call must
    /// be followed by exactly one `record_success` or `record_failure`.
    pub fn try_acquire(&self) -> bool {
        let (allowed, transition) = {
            let mut core = self.core.lock();
            match core.state {
                CircuitState::Closed => (true, None),
                CircuitState::Open => {
                    let elapsed = core
                        .opened_at
                        .map(|opened| opened.elapsed())
                        .unwrap_or(Duration::MAX);

                    if elapsed >= self.config.recovery_timeout() {
                        let transition = self.enter_half_open(&mut core);
                        core.half_open_admitted += 1;
                        (true, Some(transition))
                    } else {
                        (false, None)
                    }
                }
                CircuitState::HalfOpen => {
                    if core.half_open_admitted < self.config.half_open_max_calls {
                        core.half_open_admitted += 1;
                        (true, None)
                    } else {
                        (false, None)
                    }
                }
            }
        };

        if allowed {
            self.counters.total_calls.fetch_add(1, Ordering::Relaxed);
        } else {
            self.counters.rejected_calls.fetch_add(1, Ordering::Relaxed);
            debug!(operation = %self.name, "Circuit open, rejecting call");
        }

        if let Some(transition) = transition {
            self.notify(transition);
        }

        allowed
    }

    /// Record a successful operation
    pub fn record_success(&self, duration: Duration) {
        debug!(
            operation = %self.name,
            duration_ms = duration.as_millis() as u64,
            "Operation succeeded"
        );

        let transition = {
            let mut core = self.core.lock();
            match core.state {
                CircuitState::Closed => {
                    core.failure_count = 0;
                    None
                }
                CircuitState::HalfOpen => {
                    core.half_open_successes += 1;
                    if core.half_open_successes >= self.config.half_open_max_calls {
                        Some(self.enter_closed(&mut core))
                    } else {
                        None
                    }
                }
                CircuitState::Open => {
                    // Admitted before another caller opened the circuit
                    warn!(operation = %self.name, "Success recorded while circuit is open");
                    None
                }
            }
        };

        if let Some(transition) = transition {
            self.notify(transition);
        }
    }

    /// Record a failed operation
    pub fn record_failure(&self, duration: Duration) {
        let transition = {
            let mut core = self.core.lock();
            core.last_failure_time = Some(Utc::now());

            match core.state {
                CircuitState::Closed => {
                    core.failure_count += 1;
                    debug!(
                        operation = %self.name,
                        duration_ms = duration.as_millis() as u64,
                        failure_count = core.failure_count,
                        failure_threshold = self.config.failure_threshold,
                        "Operation failed"
                    );
                    if core.failure_count >= self.config.failure_threshold {
                        Some(self.enter_open(&mut core))
                    } else {
                        None
                    }
                }
                // Any failure while probing reopens the circuit
                CircuitState::HalfOpen => Some(self.enter_open(&mut core)),
                CircuitState::Open => None,
            }
        };

        if let Some(transition) = transition {
            self.notify(transition);
        }
    }

    /// Give back an admission whose call was abandoned before it finished
    pub fn release(&self) {
        let mut core = self.core.lock();
        if core.state == CircuitState::HalfOpen {
            core.half_open_admitted = core.half_open_admitted.saturating_sub(1);
        }
    }

    /// Force circuit to open state (for emergency situations)
    pub fn force_open(&self) {
        warn!(operation = %self.name, "Circuit breaker forced open");
        let transition = {
            let mut core = self.core.lock();
            if core.state == CircuitState::Open {
                None
            } else {
                Some(self.enter_open(&mut core))
            }
        };
        if let Some(transition) = transition {
            self.notify(transition);
        }
    }

    /// Force circuit to closed state, clearing the failure count
    pub fn force_closed(&self) {
        warn!(operation = %self.name, "Circuit breaker forced closed");
        let transition = {
            let mut core = self.core.lock();
            if core.state == CircuitState::Closed {
                core.failure_count = 0;
                None
            } else {
                Some(self.enter_closed(&mut core))
            }
        };
        if let Some(transition) = transition {
            self.notify(transition);
        }
    }

    /// Anything but open counts as healthy
    pub fn is_healthy(&self) -> bool {
        self.state() != CircuitState::Open
    }

    pub fn snapshot(&self) -> CircuitBreakerSnapshot {
        let core = self.core.lock();
        CircuitBreakerSnapshot {
            name: self.name.clone(),
            state: core.state,
            failure_count: core.failure_count,
            failure_threshold: self.config.failure_threshold,
            recovery_timeout_seconds: self.config.recovery_timeout_seconds,
            half_open_max_calls: self.config.half_open_max_calls,
            last_failure_time: core.last_failure_time,
            total_calls: self.counters.total_calls.load(Ordering::Relaxed),
            rejected_calls: self.counters.rejected_calls.load(Ordering::Relaxed),
            opens: self.counters.opens.load(Ordering::Relaxed),
            half_opens: self.counters.half_opens.load(Ordering::Relaxed),
            closes: self.counters.closes.load(Ordering::Relaxed),
        }
    }

    fn enter_closed(&self, core: &mut BreakerCore) -> Transition {
        let from = core.state;
        core.state = CircuitState::Closed;
        core.failure_count = 0;
        core.opened_at = None;
        core.half_open_admitted = 0;
        core.half_open_successes = 0;
        self.counters.closes.fetch_add(1, Ordering::Relaxed);

        info!(operation = %self.name, from = %from, "Circuit breaker closed (recovered)");
        (from, CircuitState::Closed)
    }

    fn enter_open(&self, core: &mut BreakerCore) -> Transition {
        let from = core.state;
        core.state = CircuitState::Open;
        core.opened_at = Some(Instant::now());
        core.half_open_admitted = 0;
        core.half_open_successes = 0;
        self.counters.opens.fetch_add(1, Ordering::Relaxed);

        error!(
            operation = %self.name,
            from = %from,
            failure_count = core.failure_count,
            failure_threshold = self.config.failure_threshold,
            recovery_timeout_seconds = self.config.recovery_timeout_seconds,
            "Circuit breaker opened (failing fast)"
        );
        (from, CircuitState::Open)
    }

    fn enter_half_open(&self, core: &mut BreakerCore) -> Transition {
        let from = core.state;
        core.state = CircuitState::HalfOpen;
        core.half_open_admitted = 0;
        core.half_open_successes = 0;
        self.counters.half_opens.fetch_add(1, Ordering::Relaxed);

        info!(
            operation = %self.name,
            half_open_max_calls = self.config.half_open_max_calls,
            "Circuit breaker half-open (testing recovery)"
        );
        (from, CircuitState::HalfOpen)
    }

    fn notify(&self, (from, to): Transition) {
        for observer in self.observers.read().iter() {
            observer.on_transition(&self.name, from, to);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;
    use tokio::time::sleep;

    fn test_config(failure_threshold: u32, recovery_ms: u64, probes: u32) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold,
            recovery_timeout_seconds: recovery_ms as f64 / 1000.0,
            half_open_max_calls: probes,
        }
    }

    #[derive(Default)]
    struct RecordingObserver {
        transitions: Mutex<Vec<(CircuitState, CircuitState)>>,
    }

    impl TransitionObserver for RecordingObserver {
        fn on_transition(&self, _breaker: &str, from: CircuitState, to: CircuitState) {
            self.transitions.lock().push((from, to));
        }
    }

    #[tokio::test]
    async fn test_circuit_breaker_normal_operation() {
        let circuit = CircuitBreaker::new("test", test_config(3, 100, 1));

        assert_eq!(circuit.state(), CircuitState::Closed);

        let result = circuit.call(|| async { Ok::<_, String>("success") }).await;
        assert!(result.is_ok());

        let snapshot = circuit.snapshot();
        assert_eq!(snapshot.total_calls, 1);
        assert_eq!(snapshot.failure_count, 0);
        assert_eq!(snapshot.opens, 0);
    }

    #[tokio::test]
    async fn test_circuit_breaker_opens_on_failures() {
        let circuit = CircuitBreaker::new("test", test_config(2, 100, 1));

        let _ = circuit.call(|| async { Err::<String, _>("error") }).await;
        assert_eq!(circuit.state(), CircuitState::Closed);

        let _ = circuit.call(|| async { Err::<String, _>("error") }).await;
        assert_eq!(circuit.state(), CircuitState::Open);

        let invoked = AtomicU32::new(0);
        let result = circuit
            .call(|| async {
                invoked.fetch_add(1, Ordering::SeqCst);
                Ok::<_, String>("should not execute")
            })
            .await;
        assert!(matches!(
            result,
            Err(CircuitBreakerError::CircuitOpen { .. })
        ));
        assert_eq!(invoked.load(Ordering::SeqCst), 0);
        assert_eq!(circuit.snapshot().rejected_calls, 1);
    }

    #[tokio::test]
    async fn test_operation_error_is_passed_through() {
        let circuit = CircuitBreaker::new("test", test_config(5, 100, 1));
        let result = circuit.call(|| async { Err::<(), _>("boom") }).await;
        match result {
            Err(CircuitBreakerError::OperationFailed(e)) => assert_eq!(e, "boom"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_success_resets_consecutive_failures() {
        let circuit = CircuitBreaker::new("test", test_config(3, 100, 1));

        let _ = circuit.call(|| async { Err::<(), _>("error") }).await;
        let _ = circuit.call(|| async { Err::<(), _>("error") }).await;
        assert_eq!(circuit.failure_count(), 2);

        let _ = circuit.call(|| async { Ok::<_, &str>(()) }).await;
        assert_eq!(circuit.failure_count(), 0);

        let _ = circuit.call(|| async { Err::<(), _>("error") }).await;
        assert_eq!(circuit.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_circuit_breaker_recovery() {
        let circuit = CircuitBreaker::new("test", test_config(1, 50, 1));

        let _ = circuit.call(|| async { Err::<String, _>("error") }).await;
        assert_eq!(circuit.state(), CircuitState::Open);

        sleep(Duration::from_millis(60)).await;

        let result = circuit.call(|| async { Ok::<_, String>("success") }).await;
        assert!(result.is_ok());
        assert_eq!(circuit.state(), CircuitState::Closed);

        let snapshot = circuit.snapshot();
        assert_eq!(snapshot.opens, 1);
        assert_eq!(snapshot.half_opens, 1);
        assert_eq!(snapshot.closes, 1);
        assert_eq!(snapshot.failure_count, 0);
    }

    #[tokio::test]
    async fn test_stays_open_until_recovery_timeout() {
        let circuit = CircuitBreaker::new("test", test_config(1, 200, 1));

        let _ = circuit.call(|| async { Err::<(), _>("error") }).await;
        sleep(Duration::from_millis(20)).await;

        assert!(!circuit.try_acquire());
        assert_eq!(circuit.state(), CircuitState::Open);
    }

    #[tokio::test]
    async fn test_half_open_failure_reopens_after_successes() {
        let circuit = CircuitBreaker::new("test", test_config(1, 30, 3));

        let _ = circuit.call(|| async { Err::<(), _>("error") }).await;
        sleep(Duration::from_millis(40)).await;

        // Two probes succeed, third fails
        let _ = circuit.call(|| async { Ok::<_, &str>(()) }).await;
        let _ = circuit.call(|| async { Ok::<_, &str>(()) }).await;
        assert_eq!(circuit.state(), CircuitState::HalfOpen);

        let _ = circuit.call(|| async { Err::<(), _>("error") }).await;
        assert_eq!(circuit.state(), CircuitState::Open);

        let snapshot = circuit.snapshot();
        assert_eq!(snapshot.opens, 2);
        assert_eq!(snapshot.half_opens, 1);
        assert_eq!(snapshot.closes, 0);
    }

    #[tokio::test]
    async fn test_half_open_limits_probe_calls() {
        let circuit = CircuitBreaker::new("test", test_config(1, 20, 2));

        let _ = circuit.call(|| async { Err::<(), _>("error") }).await;
        sleep(Duration::from_millis(30)).await;

        assert!(circuit.try_acquire());
        assert!(circuit.try_acquire());
        // Both probes still in flight; a third caller is rejected
        assert!(!circuit.try_acquire());

        circuit.record_success(Duration::ZERO);
        assert_eq!(circuit.state(), CircuitState::HalfOpen);
        circuit.record_success(Duration::ZERO);
        assert_eq!(circuit.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_observers_see_each_transition_once() {
        let circuit = CircuitBreaker::new("test", test_config(2, 80, 1));
        let observer = Arc::new(RecordingObserver::default());
        circuit.add_observer(observer.clone());

        for _ in 0..5 {
            let _ = circuit.call(|| async { Err::<(), _>("error") }).await;
        }
        sleep(Duration::from_millis(100)).await;
        let _ = circuit.call(|| async { Ok::<_, &str>(()) }).await;

        let transitions = observer.transitions.lock().clone();
        assert_eq!(
            transitions,
            vec![
                (CircuitState::Closed, CircuitState::Open),
                (CircuitState::Open, CircuitState::HalfOpen),
                (CircuitState::HalfOpen, CircuitState::Closed),
            ]
        );
    }

    #[tokio::test]
    async fn test_concurrent_failures_open_exactly_once() {
        let circuit = Arc::new(CircuitBreaker::new("test", test_config(5, 10_000, 1)));

        let mut handles = Vec::new();
        for _ in 0..20 {
            let circuit = Arc::clone(&circuit);
            handles.push(tokio::spawn(async move {
                let _ = circuit.call(|| async { Err::<(), _>("error") }).await;
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let snapshot = circuit.snapshot();
        assert_eq!(snapshot.state, CircuitState::Open);
        assert_eq!(snapshot.opens, 1);
        assert_eq!(snapshot.total_calls + snapshot.rejected_calls, 20);
    }

    #[test]
    fn test_force_operations() {
        let circuit = CircuitBreaker::new("test", test_config(1, 1000, 1));

        circuit.force_open();
        assert_eq!(circuit.state(), CircuitState::Open);

        circuit.force_closed();
        assert_eq!(circuit.state(), CircuitState::Closed);

        let snapshot = circuit.snapshot();
        assert_eq!(snapshot.opens, 1);
        assert_eq!(snapshot.closes, 1);
    }
}
