//! # Resilience Policy Configuration
//!
//! Strategy presets and the retry / circuit breaker parameters they expand
//! to. A [`ResilienceStrategy`] is only a name; [`StrategyConfig::for_strategy`]
//! turns it into concrete numbers.

use crate::config::ConfigurationError;
use crate::validation::ValidationResult;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use validator::Validate;

/// Named bundle of retry and circuit breaker behaviour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResilienceStrategy {
    /// Few retries, fails fast. For user-facing latency-sensitive calls.
    Aggressive,
    /// Default trade-off between latency and success rate
    Balanced,
    /// More retries, slower to give up
    Conservative,
    /// Maximum retries and the most tolerant circuit breaker
    Critical,
}

impl ResilienceStrategy {
    pub const ALL: [ResilienceStrategy; 4] = [
        ResilienceStrategy::Aggressive,
        ResilienceStrategy::Balanced,
        ResilienceStrategy::Conservative,
        ResilienceStrategy::Critical,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResilienceStrategy::Aggressive => "aggressive",
            ResilienceStrategy::Balanced => "balanced",
            ResilienceStrategy::Conservative => "conservative",
            ResilienceStrategy::Critical => "critical",
        }
    }
}

impl fmt::Display for ResilienceStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResilienceStrategy {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "aggressive" => Ok(ResilienceStrategy::Aggressive),
            "balanced" => Ok(ResilienceStrategy::Balanced),
            "conservative" => Ok(ResilienceStrategy::Conservative),
            "critical" => Ok(ResilienceStrategy::Critical),
            other => Err(ConfigurationError::invalid_value(
                "strategy",
                other,
                "expected one of: aggressive, balanced, conservative, critical",
            )),
        }
    }
}

/// Negative and NaN become zero, values past `Duration::MAX` saturate
pub(crate) fn seconds_to_duration(seconds: f64) -> Duration {
    Duration::try_from_secs_f64(seconds.max(0.0)).unwrap_or(Duration::MAX)
}

/// Exponential backoff parameters for a single operation
///
/// All durations are expressed in seconds so the struct maps one-to-one onto
/// TOML / JSON configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts, including the first one
    #[validate(range(min = 1, max = 10))]
    pub max_attempts: u32,

    /// Upper bound for a single delay and for the total time spent retrying
    #[validate(range(min = 0.0, max = 600.0))]
    pub max_delay_seconds: f64,

    /// Scale applied to `2^(attempt - 1)`
    #[validate(range(min = 0.0, max = 10.0))]
    pub exponential_multiplier: f64,

    /// Lower clamp for the exponential term
    #[validate(range(min = 0.0, max = 60.0))]
    pub exponential_min: f64,

    /// Upper clamp for the exponential term
    #[validate(range(min = 0.0, max = 300.0))]
    pub exponential_max: f64,

    /// Add uniform random jitter to every delay
    pub jitter: bool,

    /// Upper bound of the jitter added to a delay
    #[validate(range(min = 0.0, max = 30.0))]
    pub jitter_max: f64,
}

impl RetryConfig {
    pub fn validate_config(&self) -> ValidationResult {
        let mut result = ValidationResult::from_validator(self);

        if self.exponential_min > self.exponential_max {
            result.add_error(format!(
                "exponential_min ({}) must not exceed exponential_max ({})",
                self.exponential_min, self.exponential_max
            ));
        }

        if self.exponential_min > self.max_delay_seconds && self.max_attempts > 1 {
            result.add_warning(format!(
                "exponential_min ({}) exceeds max_delay_seconds ({}); every delay is capped",
                self.exponential_min, self.max_delay_seconds
            ));
        }

        if self.jitter && self.jitter_max == 0.0 {
            result.add_warning("jitter is enabled but jitter_max is 0");
        }

        result
    }

    pub fn max_delay(&self) -> Duration {
        seconds_to_duration(self.max_delay_seconds)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            max_delay_seconds: 60.0,
            exponential_multiplier: 1.0,
            exponential_min: 2.0,
            exponential_max: 10.0,
            jitter: true,
            jitter_max: 2.0,
        }
    }
}

/// Configuration for a single circuit breaker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before the circuit opens
    #[validate(range(min = 1, max = 100))]
    pub failure_threshold: u32,

    /// Time spent open before a probe is allowed
    #[validate(range(min = 0.001, max = 3600.0))]
    pub recovery_timeout_seconds: f64,

    /// Probe calls admitted while half-open; all must succeed to close
    #[validate(range(min = 1, max = 50))]
    pub half_open_max_calls: u32,
}

impl CircuitBreakerConfig {
    pub fn recovery_timeout(&self) -> Duration {
        seconds_to_duration(self.recovery_timeout_seconds)
    }

    pub fn validate_config(&self) -> ValidationResult {
        ValidationResult::from_validator(self)
    }
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout_seconds: 60.0,
            half_open_max_calls: 1,
        }
    }
}

/// Retry and circuit breaker settings resolved for one strategy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyConfig {
    pub strategy: ResilienceStrategy,
    pub retry: RetryConfig,
    pub circuit_breaker: CircuitBreakerConfig,
}

impl StrategyConfig {
    /// Built-in parameters for each strategy
    pub fn for_strategy(strategy: ResilienceStrategy) -> Self {
        let (retry, circuit_breaker) = match strategy {
            ResilienceStrategy::Aggressive => (
                RetryConfig {
                    max_attempts: 2,
                    max_delay_seconds: 10.0,
                    exponential_multiplier: 0.5,
                    exponential_min: 1.0,
                    exponential_max: 5.0,
                    ..RetryConfig::default()
                },
                CircuitBreakerConfig {
                    failure_threshold: 3,
                    recovery_timeout_seconds: 30.0,
                    half_open_max_calls: 1,
                },
            ),
            ResilienceStrategy::Balanced => (
                RetryConfig {
                    max_attempts: 3,
                    max_delay_seconds: 30.0,
                    exponential_multiplier: 1.0,
                    exponential_min: 2.0,
                    exponential_max: 10.0,
                    ..RetryConfig::default()
                },
                CircuitBreakerConfig {
                    failure_threshold: 5,
                    recovery_timeout_seconds: 60.0,
                    half_open_max_calls: 1,
                },
            ),
            ResilienceStrategy::Conservative => (
                RetryConfig {
                    max_attempts: 5,
                    max_delay_seconds: 60.0,
                    exponential_multiplier: 1.5,
                    exponential_min: 2.0,
                    exponential_max: 20.0,
                    ..RetryConfig::default()
                },
                CircuitBreakerConfig {
                    failure_threshold: 8,
                    recovery_timeout_seconds: 120.0,
                    half_open_max_calls: 2,
                },
            ),
            ResilienceStrategy::Critical => (
                RetryConfig {
                    max_attempts: 7,
                    max_delay_seconds: 120.0,
                    exponential_multiplier: 2.0,
                    exponential_min: 3.0,
                    exponential_max: 30.0,
                    ..RetryConfig::default()
                },
                CircuitBreakerConfig {
                    failure_threshold: 10,
                    recovery_timeout_seconds: 300.0,
                    half_open_max_calls: 3,
                },
            ),
        };

        Self {
            strategy,
            retry,
            circuit_breaker,
        }
    }

    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::new();
        result.merge("retry", self.retry.validate_config());
        result.merge("circuit_breaker", self.circuit_breaker.validate_config());
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_out_of_range_seconds_do_not_panic() {
        assert_eq!(seconds_to_duration(-1.0), Duration::ZERO);
        assert_eq!(seconds_to_duration(f64::NAN), Duration::ZERO);
        assert_eq!(seconds_to_duration(1e20), Duration::MAX);
        assert_eq!(seconds_to_duration(1.5), Duration::from_millis(1500));

        let breaker = CircuitBreakerConfig {
            recovery_timeout_seconds: 1e20,
            ..CircuitBreakerConfig::default()
        };
        assert_eq!(breaker.recovery_timeout(), Duration::MAX);
        assert!(!breaker.validate_config().is_valid);
    }

    #[test]
    fn test_strategy_round_trips_through_str() {
        for strategy in ResilienceStrategy::ALL {
            let parsed: ResilienceStrategy = strategy.to_string().parse().unwrap();
            assert_eq!(parsed, strategy);
        }
        assert_eq!(
            " Critical ".parse::<ResilienceStrategy>().unwrap(),
            ResilienceStrategy::Critical
        );
        assert!("reckless".parse::<ResilienceStrategy>().is_err());
    }

    #[test]
    fn test_strategy_serde_lowercase() {
        let json = serde_json::to_string(&ResilienceStrategy::Conservative).unwrap();
        assert_eq!(json, "\"conservative\"");
    }

    #[test]
    fn test_preset_configurations_are_valid() {
        for strategy in ResilienceStrategy::ALL {
            let config = StrategyConfig::for_strategy(strategy);
            let result = config.validate();
            assert!(result.is_valid, "{strategy}: {:?}", result.errors);
        }
    }

    #[test]
    fn test_presets_scale_with_strategy() {
        let aggressive = StrategyConfig::for_strategy(ResilienceStrategy::Aggressive);
        let critical = StrategyConfig::for_strategy(ResilienceStrategy::Critical);

        assert!(aggressive.retry.max_attempts < critical.retry.max_attempts);
        assert!(
            aggressive.circuit_breaker.failure_threshold
                < critical.circuit_breaker.failure_threshold
        );
        assert!(
            aggressive.circuit_breaker.recovery_timeout()
                < critical.circuit_breaker.recovery_timeout()
        );
    }

    #[test]
    fn test_retry_bounds_must_be_ordered() {
        let config = RetryConfig {
            exponential_min: 20.0,
            exponential_max: 5.0,
            ..RetryConfig::default()
        };
        let result = config.validate_config();
        assert!(!result.is_valid);
        assert!(result.errors.iter().any(|e| e.contains("exponential_min")));
    }

    #[test]
    fn test_circuit_breaker_config_validation() {
        assert!(CircuitBreakerConfig::default().validate_config().is_valid);

        let invalid = CircuitBreakerConfig {
            failure_threshold: 0,
            half_open_max_calls: 0,
            ..Default::default()
        };
        let result = invalid.validate_config();
        assert!(!result.is_valid);
        assert_eq!(result.errors.len(), 2);
    }
}
