//! Error types for the text-processing core.
//!
//! [`ServiceError`] is what wrapped upstream calls fail with; its variant
//! decides whether the resilience layer retries. [`AppError`] lets
//! application code propagate configuration, cache and orchestrated call
//! failures through one `?`-friendly type.

use crate::cache::CacheError;
use crate::config::ConfigurationError;
use crate::resilience::ResilienceError;
use std::time::Duration;
use thiserror::Error;

/// Top-level error for callers that combine configuration, cache and
/// service failures behind a single type.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),
    #[error("Service error: {0}")]
    Service(#[from] ServiceError),
    /// An orchestrated call was short-circuited without running
    #[error("Circuit breaker is open for operation '{operation}'")]
    CircuitOpen { operation: String },
}

impl From<ResilienceError<ServiceError>> for AppError {
    fn from(error: ResilienceError<ServiceError>) -> Self {
        match error {
            ResilienceError::CircuitOpen { operation } => AppError::CircuitOpen { operation },
            ResilienceError::Operation(error) => AppError::Service(error),
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;

/// Failures raised by operations wrapped with resilience (LLM calls,
/// downstream HTTP services, ...).
///
/// The variant decides how the failure is classified; see
/// [`crate::resilience::Classify`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ServiceError {
    /// Upstream did not answer in time
    #[error("Operation '{operation}' timed out after {timeout:?}")]
    Timeout { operation: String, timeout: Duration },

    /// Upstream asked us to slow down
    #[error("Rate limited: {message}")]
    RateLimited {
        message: String,
        retry_after: Option<Duration>,
    },

    /// Upstream is temporarily unavailable (5xx, overloaded, ...)
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Connection-level failure
    #[error("Network error: {0}")]
    Network(String),

    /// Input rejected by validation
    #[error("Validation error: {0}")]
    Validation(String),

    /// Credentials missing or rejected
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Misconfiguration detected at call time
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Upstream answered with something we could not use
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Explicit business-logic rejection, never retried
    #[error("Permanent failure: {0}")]
    Permanent(String),

    /// Explicitly marked as retryable by the caller
    #[error("Transient failure: {0}")]
    Transient(String),
}

impl ServiceError {
    pub fn timeout(operation: impl Into<String>, timeout: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            timeout,
        }
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::RateLimited {
            message: message.into(),
            retry_after: None,
        }
    }
}

impl From<serde_json::Error> for ServiceError {
    fn from(error: serde_json::Error) -> Self {
        ServiceError::InvalidResponse(format!("JSON serialization error: {error}"))
    }
}
