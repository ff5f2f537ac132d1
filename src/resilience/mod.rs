//! # Resilience Module
//!
//! Fault tolerance for calls to flaky upstreams (LLM providers, downstream
//! HTTP services). Each named operation gets its own circuit breaker, retry
//! policy and metrics, selected through a [`ResilienceStrategy`].
//!
//! ## Architecture
//!
//! - **Circuit Breakers**: Stop calling an upstream that keeps failing
//! - **Retry Policy**: Exponential backoff with jitter for transient failures
//! - **Classification**: Decide which failures are worth retrying
//! - **Orchestrator**: Compose the above per operation and aggregate health
//!
//! ## Usage
//!
//! ```rust,no_run
//! use textproc_core::config::ResilienceConfig;
//! use textproc_core::errors::ServiceError;
//! use textproc_core::resilience::{ResilienceOrchestrator, ResilienceStrategy};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let orchestrator = ResilienceOrchestrator::new(ResilienceConfig::default());
//! orchestrator.register_operation("summarize", ResilienceStrategy::Conservative);
//!
//! let summary = orchestrator
//!     .execute("summarize", || async {
//!         Ok::<_, ServiceError>("a short summary".to_string())
//!     })
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod circuit_breaker;
pub mod classification;
pub mod config;
pub mod metrics;
pub mod orchestrator;
pub mod retry;

pub use circuit_breaker::{
    CircuitBreaker, CircuitBreakerError, CircuitBreakerSnapshot, CircuitState, TransitionObserver,
};
pub use classification::{classify_message, Classify, FailureClass};
pub use config::{CircuitBreakerConfig, ResilienceStrategy, RetryConfig, StrategyConfig};
pub use metrics::{MetricsTransitionObserver, ResilienceMetrics};
pub use orchestrator::{
    AllMetrics, HealthStatus, MetricsSummary, OperationMetricsReport, ResilienceError,
    ResilienceOrchestrator, ResilientOperation,
};
pub use retry::RetryPolicy;
