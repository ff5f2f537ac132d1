//! # Failure Classification
//!
//! Decides whether a failed operation is worth retrying. Errors are
//! transient when the same call may succeed later (timeouts, rate limits,
//! unavailable upstreams, dropped connections) and permanent otherwise.
//! Anything the classifier does not recognise is treated as permanent so
//! that unknown failures never trigger retry storms.

use crate::cache::CacheError;
use crate::errors::ServiceError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;

/// Retry eligibility of a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureClass {
    /// May succeed if retried
    Transient,
    /// Will fail again; never retried
    Permanent,
}

impl FailureClass {
    pub fn is_transient(self) -> bool {
        self == FailureClass::Transient
    }
}

impl fmt::Display for FailureClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureClass::Transient => write!(f, "transient"),
            FailureClass::Permanent => write!(f, "permanent"),
        }
    }
}

/// Errors that know their own [`FailureClass`]
///
/// Implement this for any error type passed through the resilience
/// orchestrator. The default implementation classifies every failure as
/// permanent.
pub trait Classify {
    fn failure_class(&self) -> FailureClass {
        FailureClass::Permanent
    }
}

impl Classify for ServiceError {
    fn failure_class(&self) -> FailureClass {
        match self {
            ServiceError::Timeout { .. }
            | ServiceError::RateLimited { .. }
            | ServiceError::ServiceUnavailable(_)
            | ServiceError::Network(_)
            | ServiceError::Transient(_) => FailureClass::Transient,
            ServiceError::Validation(_)
            | ServiceError::Authentication(_)
            | ServiceError::Configuration(_)
            | ServiceError::InvalidResponse(_)
            | ServiceError::Permanent(_) => FailureClass::Permanent,
        }
    }
}

impl Classify for io::Error {
    fn failure_class(&self) -> FailureClass {
        match self.kind() {
            io::ErrorKind::TimedOut
            | io::ErrorKind::Interrupted
            | io::ErrorKind::WouldBlock
            | io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::NotConnected
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::UnexpectedEof => FailureClass::Transient,
            _ => FailureClass::Permanent,
        }
    }
}

impl Classify for CacheError {
    fn failure_class(&self) -> FailureClass {
        match self {
            CacheError::Connection(_) | CacheError::Timeout(_) => FailureClass::Transient,
            CacheError::Backend(message) => classify_message(message),
            CacheError::Serialization(_) | CacheError::Compression(_) => FailureClass::Permanent,
        }
    }
}

impl Classify for anyhow::Error {
    fn failure_class(&self) -> FailureClass {
        for cause in self.chain() {
            if let Some(error) = cause.downcast_ref::<ServiceError>() {
                return error.failure_class();
            }
            if let Some(error) = cause.downcast_ref::<io::Error>() {
                return error.failure_class();
            }
            if let Some(error) = cause.downcast_ref::<CacheError>() {
                return error.failure_class();
            }
        }
        FailureClass::Permanent
    }
}

impl Classify for String {
    fn failure_class(&self) -> FailureClass {
        classify_message(self)
    }
}

impl Classify for &str {
    fn failure_class(&self) -> FailureClass {
        classify_message(self)
    }
}

impl Classify for tokio::time::error::Elapsed {
    fn failure_class(&self) -> FailureClass {
        FailureClass::Transient
    }
}

/// Keyword heuristic for errors that only carry a message
///
/// Used for string-typed errors from third-party clients. Permission and
/// validation wording wins over transport wording.
pub fn classify_message(message: &str) -> FailureClass {
    let reason = message.to_ascii_lowercase();

    let permanent = ["permission", "unauthorized", "forbidden", "auth", "invalid", "validation"];
    if permanent.iter().any(|keyword| reason.contains(keyword)) {
        return FailureClass::Permanent;
    }

    let transient = [
        "timeout",
        "timed out",
        "rate limit",
        "too many requests",
        "429",
        "503",
        "unavailable",
        "overloaded",
        "connection",
        "network",
        "temporarily",
    ];
    if transient.iter().any(|keyword| reason.contains(keyword)) {
        FailureClass::Transient
    } else {
        FailureClass::Permanent
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[derive(Debug)]
    struct Opaque;

    impl Classify for Opaque {}

    #[test]
    fn test_service_error_classification() {
        assert_eq!(
            ServiceError::timeout("llm", Duration::from_secs(5)).failure_class(),
            FailureClass::Transient
        );
        assert_eq!(
            ServiceError::rate_limited("slow down").failure_class(),
            FailureClass::Transient
        );
        assert_eq!(
            ServiceError::Network("reset".into()).failure_class(),
            FailureClass::Transient
        );
        assert_eq!(
            ServiceError::Validation("empty text".into()).failure_class(),
            FailureClass::Permanent
        );
        assert_eq!(
            ServiceError::Authentication("bad key".into()).failure_class(),
            FailureClass::Permanent
        );
    }

    #[test]
    fn test_unrecognised_errors_are_permanent() {
        assert_eq!(Opaque.failure_class(), FailureClass::Permanent);

        let error = anyhow::anyhow!("something odd happened");
        assert_eq!(error.failure_class(), FailureClass::Permanent);
    }

    #[test]
    fn test_io_error_classification() {
        let refused = io::Error::new(io::ErrorKind::ConnectionRefused, "refused");
        assert_eq!(refused.failure_class(), FailureClass::Transient);

        let missing = io::Error::new(io::ErrorKind::NotFound, "missing");
        assert_eq!(missing.failure_class(), FailureClass::Permanent);
    }

    #[test]
    fn test_anyhow_downcasts_through_context() {
        let error = anyhow::Error::new(ServiceError::ServiceUnavailable("503".into()))
            .context("calling summarizer");
        assert_eq!(error.failure_class(), FailureClass::Transient);

        let io_error = anyhow::Error::new(io::Error::new(io::ErrorKind::TimedOut, "slow"));
        assert_eq!(io_error.failure_class(), FailureClass::Transient);
    }

    #[test]
    fn test_cache_error_classification() {
        assert!(CacheError::Connection("refused".into()).failure_class().is_transient());
        assert!(!CacheError::Serialization("bad prefix".into()).failure_class().is_transient());
    }

    #[test]
    fn test_classify_message_keywords() {
        assert_eq!(classify_message("Request timed out"), FailureClass::Transient);
        assert_eq!(classify_message("HTTP 429 Too Many Requests"), FailureClass::Transient);
        assert_eq!(classify_message("Connection refused"), FailureClass::Transient);
        assert_eq!(classify_message("Invalid API key"), FailureClass::Permanent);
        assert_eq!(classify_message("unexpected token"), FailureClass::Permanent);
    }
}
