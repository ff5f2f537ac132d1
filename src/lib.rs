#![allow(clippy::doc_markdown)] // Allow technical terms like Redis, zlib in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Text Processing Core
//!
//! Resilience and caching infrastructure for a backend that calls LLM
//! providers to process text.
//!
//! ## Overview
//!
//! Upstream model calls are slow, expensive and occasionally unavailable.
//! This crate wraps them in two layers:
//!
//! - **Resilience**: per-operation circuit breakers, retry with exponential
//!   backoff and jitter, named strategies, metrics and health reporting.
//! - **Caching**: an in-process L1 in front of Redis, with compression of
//!   large payloads and hit/miss callbacks. Cache failures degrade to misses
//!   and never reach the caller.
//!
//! ## Module Organization
//!
//! - [`resilience`] - Circuit breakers, retry, strategies and the orchestrator
//! - [`cache`] - Tiered cache, compression codec and L2 providers
//! - [`config`] - Presets, validation and layered settings loading
//! - [`errors`] - Application and service error types
//! - [`validation`] - Validation result accumulation
//! - [`logging`] - Structured logging setup
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use textproc_core::cache::TieredCache;
//! use textproc_core::config::Settings;
//! use textproc_core::errors::ServiceError;
//! use textproc_core::resilience::ResilienceOrchestrator;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! textproc_core::logging::init_structured_logging();
//!
//! let settings = Settings::load()?;
//! let cache = TieredCache::new(settings.resolve_cache_config()?);
//! let orchestrator = ResilienceOrchestrator::try_new(settings.resolve_resilience_config()?)?;
//!
//! let key = "summarize:doc-42";
//! let summary = match cache.get::<String>(key).await {
//!     Some(hit) => hit,
//!     None => {
//!         let fresh = orchestrator
//!             .execute("summarize", || async {
//!                 Ok::<_, ServiceError>("a short summary".to_string())
//!             })
//!             .await?;
//!         cache.set(key, &fresh, None).await;
//!         fresh
//!     }
//! };
//! # let _ = summary;
//! # Ok(())
//! # }
//! ```
//!
//! ## Testing
//!
//! ```bash
//! cargo test                           # Unit and integration tests
//! cargo test --features test-services  # Also run against Redis at REDIS_URL
//! ```

pub mod cache;
pub mod config;
pub mod errors;
pub mod logging;
pub mod resilience;
pub mod validation;

pub use cache::{CacheError, CacheEvent, CacheStats, TieredCache};
pub use config::{CacheConfig, ConfigurationError, ResilienceConfig, Settings};
pub use errors::{AppError, AppResult, ServiceError};
pub use resilience::{
    CircuitBreaker, CircuitState, ResilienceError, ResilienceOrchestrator, ResilienceStrategy,
};
pub use validation::ValidationResult;
