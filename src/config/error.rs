//! Configuration Error Types
//!
//! Error handling for configuration loading, preset lookup and validation.
//! Messages name the offending field or preset so they can be shown to an
//! operator as-is.

use std::path::PathBuf;
use thiserror::Error;

/// Configuration-related errors with detailed context
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigurationError {
    /// Preset name not present in the preset table
    #[error("Unknown preset '{name}'. Available presets: {}", available.join(", "))]
    UnknownPreset {
        name: String,
        available: Vec<String>,
    },

    /// Invalid configuration value
    #[error("Invalid value '{value}' for field '{field}': {context}")]
    InvalidValue {
        field: String,
        value: String,
        context: String,
    },

    /// One or more validation rules failed
    #[error("Configuration validation failed: {}", errors.join("; "))]
    Invalid { errors: Vec<String> },

    /// Custom JSON override could not be parsed or applied
    #[error("Invalid custom configuration in {variable}: {error}")]
    InvalidOverride { variable: String, error: String },

    /// Configuration file missing at an explicitly requested path
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: PathBuf },

    /// Layered loading failed (parse error, type mismatch, ...)
    #[error("Failed to load configuration: {error}")]
    LoadError { error: String },
}

impl ConfigurationError {
    /// Create an unknown preset error listing the valid alternatives
    pub fn unknown_preset<N: Into<String>>(name: N, available: &[&str]) -> Self {
        Self::UnknownPreset {
            name: name.into(),
            available: available.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Create an invalid value error
    pub fn invalid_value<F: Into<String>, V: Into<String>, C: Into<String>>(
        field: F,
        value: V,
        context: C,
    ) -> Self {
        Self::InvalidValue {
            field: field.into(),
            value: value.into(),
            context: context.into(),
        }
    }

    /// Create an override error
    pub fn invalid_override<V: Into<String>, E: std::fmt::Display>(variable: V, error: E) -> Self {
        Self::InvalidOverride {
            variable: variable.into(),
            error: error.to_string(),
        }
    }
}

impl From<config::ConfigError> for ConfigurationError {
    fn from(error: config::ConfigError) -> Self {
        Self::LoadError {
            error: error.to_string(),
        }
    }
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigurationError>;
