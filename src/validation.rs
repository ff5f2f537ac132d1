//! Configuration validation results
//!
//! Every `validate()` in this crate reports problems through a
//! [`ValidationResult`] instead of returning early, so a caller can show the
//! full list of violated constraints at once. Declarative range rules come
//! from the `validator` derive and are folded in with
//! [`ValidationResult::merge_validator_errors`].

use serde::{Deserialize, Serialize};
use validator::{ValidationErrors, ValidationErrorsKind};

/// Outcome of a configuration self-check
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    /// False when at least one error was recorded
    pub is_valid: bool,

    /// Violated constraints; any entry makes the configuration unusable
    pub errors: Vec<String>,

    /// Questionable but usable settings
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self {
            is_valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn add_error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
        self.is_valid = false;
    }

    pub fn add_warning(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    /// Fold another result into this one, prefixing its messages
    pub fn merge(&mut self, prefix: &str, other: ValidationResult) {
        for error in other.errors {
            self.add_error(format!("{prefix}.{error}"));
        }
        for warning in other.warnings {
            self.add_warning(format!("{prefix}.{warning}"));
        }
    }

    /// Record every failure reported by a `validator` derive
    pub fn merge_validator_errors(&mut self, errors: &ValidationErrors) {
        let mut messages = Vec::new();
        flatten_validation_errors(errors, "", &mut messages);
        messages.sort();
        for message in messages {
            self.add_error(message);
        }
    }

    /// Run the derived rules of `value` and return them as a result
    pub fn from_validator<T: validator::Validate>(value: &T) -> Self {
        let mut result = Self::new();
        if let Err(errors) = value.validate() {
            result.merge_validator_errors(&errors);
        }
        result
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

fn flatten_validation_errors(errors: &ValidationErrors, path: &str, out: &mut Vec<String>) {
    for (field, kind) in errors.errors() {
        let field_path = if path.is_empty() {
            field.to_string()
        } else {
            format!("{path}.{field}")
        };

        match kind {
            ValidationErrorsKind::Field(field_errors) => {
                for error in field_errors {
                    let message = match &error.message {
                        Some(message) => format!("{field_path}: {message}"),
                        None => describe_field_error(&field_path, error),
                    };
                    out.push(message);
                }
            }
            ValidationErrorsKind::Struct(nested) => {
                flatten_validation_errors(nested, &field_path, out);
            }
            ValidationErrorsKind::List(items) => {
                for (index, nested) in items {
                    flatten_validation_errors(nested, &format!("{field_path}[{index}]"), out);
                }
            }
        }
    }
}

fn describe_field_error(field_path: &str, error: &validator::ValidationError) -> String {
    let value = error
        .params
        .get("value")
        .map(|v| v.to_string())
        .unwrap_or_else(|| "?".to_string());

    match error.code.as_ref() {
        "range" => {
            let min = error.params.get("min").map(|v| v.to_string());
            let max = error.params.get("max").map(|v| v.to_string());
            match (min, max) {
                (Some(min), Some(max)) => {
                    format!("{field_path} must be between {min} and {max} (got {value})")
                }
                (Some(min), None) => format!("{field_path} must be at least {min} (got {value})"),
                (None, Some(max)) => format!("{field_path} must be at most {max} (got {value})"),
                (None, None) => format!("{field_path} is out of range (got {value})"),
            }
        }
        "length" => format!("{field_path} has an invalid length"),
        code => format!("{field_path} failed '{code}' validation (got {value})"),
    }
}
