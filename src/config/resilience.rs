//! Resilience configuration and presets
//!
//! A [`ResilienceConfig`] holds the parameters of every strategy plus the
//! operation-to-strategy overrides. Presets (`simple`, `development`,
//! `production`) are the supported way to build one; a JSON blob can then
//! tune individual values.

use crate::config::error::{ConfigResult, ConfigurationError};
use crate::resilience::config::{ResilienceStrategy, StrategyConfig};
use crate::validation::ValidationResult;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info};

/// Resolved resilience settings consumed by the orchestrator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResilienceConfig {
    /// Strategy for operations without an explicit mapping
    pub default_strategy: ResilienceStrategy,

    /// Parameters per strategy; missing entries fall back to the built-in table
    pub strategies: HashMap<ResilienceStrategy, StrategyConfig>,

    /// Operation name to strategy
    pub operation_strategies: HashMap<String, ResilienceStrategy>,
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        Self {
            default_strategy: ResilienceStrategy::Balanced,
            strategies: ResilienceStrategy::ALL
                .iter()
                .map(|strategy| (*strategy, StrategyConfig::for_strategy(*strategy)))
                .collect(),
            operation_strategies: HashMap::new(),
        }
    }
}

impl ResilienceConfig {
    /// Parameters for `strategy`
    pub fn strategy_config(&self, strategy: ResilienceStrategy) -> StrategyConfig {
        self.strategies
            .get(&strategy)
            .cloned()
            .map(|mut config| {
                config.strategy = strategy;
                config
            })
            .unwrap_or_else(|| StrategyConfig::for_strategy(strategy))
    }

    pub fn strategy_for_operation(&self, operation_name: &str) -> ResilienceStrategy {
        self.operation_strategies
            .get(operation_name)
            .copied()
            .unwrap_or(self.default_strategy)
    }

    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::new();

        let mut strategies: Vec<_> = self.strategies.iter().collect();
        strategies.sort_by_key(|(strategy, _)| strategy.as_str());
        for (strategy, config) in strategies {
            result.merge(&format!("strategies.{strategy}"), config.validate());
        }

        for (operation, strategy) in &self.operation_strategies {
            if operation.trim().is_empty() {
                result.add_error(format!(
                    "operation_strategies contains an empty operation name (strategy {strategy})"
                ));
            }
        }

        result
    }

    /// Fail with every violated constraint when the configuration is invalid
    pub fn ensure_valid(&self) -> ConfigResult<()> {
        let result = self.validate();
        if result.is_valid {
            Ok(())
        } else {
            Err(ConfigurationError::Invalid {
                errors: result.errors,
            })
        }
    }

    /// Apply a JSON object of overrides (the `RESILIENCE_CUSTOM_CONFIG` format)
    ///
    /// Numeric retry and breaker keys adjust the default strategy's
    /// parameters. The result is validated before it is returned.
    pub fn apply_custom_config(&self, json: &str) -> ConfigResult<ResilienceConfig> {
        let overrides: ResilienceOverrides = serde_json::from_str(json)
            .map_err(|e| ConfigurationError::invalid_override("RESILIENCE_CUSTOM_CONFIG", e))?;

        let mut config = self.clone();
        if let Some(strategy) = overrides.default_strategy {
            config.default_strategy = strategy;
        }
        if let Some(operation_overrides) = overrides.operation_overrides {
            config.operation_strategies.extend(operation_overrides);
        }

        let mut target = config.strategy_config(config.default_strategy);
        let retry = &mut target.retry;
        let breaker = &mut target.circuit_breaker;
        if let Some(value) = overrides.retry_attempts {
            retry.max_attempts = value;
        }
        if let Some(value) = overrides.max_delay_seconds {
            retry.max_delay_seconds = value;
        }
        if let Some(value) = overrides.exponential_multiplier {
            retry.exponential_multiplier = value;
        }
        if let Some(value) = overrides.exponential_min {
            retry.exponential_min = value;
        }
        if let Some(value) = overrides.exponential_max {
            retry.exponential_max = value;
        }
        if let Some(value) = overrides.jitter_enabled {
            retry.jitter = value;
        }
        if let Some(value) = overrides.jitter_max {
            retry.jitter_max = value;
        }
        if let Some(value) = overrides.circuit_breaker_threshold {
            breaker.failure_threshold = value;
        }
        if let Some(value) = overrides.recovery_timeout {
            breaker.recovery_timeout_seconds = value;
        }
        if let Some(value) = overrides.half_open_max_calls {
            breaker.half_open_max_calls = value;
        }
        config.strategies.insert(config.default_strategy, target);

        config.ensure_valid()?;
        debug!(default_strategy = %config.default_strategy, "Applied custom resilience configuration");
        Ok(config)
    }
}

/// Keys accepted in a custom resilience JSON blob
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ResilienceOverrides {
    retry_attempts: Option<u32>,
    circuit_breaker_threshold: Option<u32>,
    recovery_timeout: Option<f64>,
    half_open_max_calls: Option<u32>,
    default_strategy: Option<ResilienceStrategy>,
    operation_overrides: Option<HashMap<String, ResilienceStrategy>>,
    exponential_multiplier: Option<f64>,
    exponential_min: Option<f64>,
    exponential_max: Option<f64>,
    jitter_enabled: Option<bool>,
    jitter_max: Option<f64>,
    max_delay_seconds: Option<f64>,
}

/// Named starting point for a [`ResilienceConfig`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResiliencePreset {
    pub name: String,
    pub description: String,
    pub retry_attempts: u32,
    pub circuit_breaker_threshold: u32,
    /// Seconds spent open before probing
    pub recovery_timeout: f64,
    pub default_strategy: ResilienceStrategy,
    pub operation_overrides: BTreeMap<String, ResilienceStrategy>,
    pub environment_contexts: Vec<String>,
}

impl ResiliencePreset {
    pub fn simple() -> Self {
        Self {
            name: "simple".to_string(),
            description: "General-purpose defaults for most deployments".to_string(),
            retry_attempts: 3,
            circuit_breaker_threshold: 5,
            recovery_timeout: 60.0,
            default_strategy: ResilienceStrategy::Balanced,
            operation_overrides: BTreeMap::new(),
            environment_contexts: vec![
                "development".to_string(),
                "testing".to_string(),
                "staging".to_string(),
                "production".to_string(),
            ],
        }
    }

    pub fn development() -> Self {
        Self {
            name: "development".to_string(),
            description: "Fast failure for local development and tests".to_string(),
            retry_attempts: 2,
            circuit_breaker_threshold: 3,
            recovery_timeout: 30.0,
            default_strategy: ResilienceStrategy::Aggressive,
            operation_overrides: BTreeMap::from([
                ("sentiment".to_string(), ResilienceStrategy::Aggressive),
                ("qa".to_string(), ResilienceStrategy::Balanced),
            ]),
            environment_contexts: vec!["development".to_string(), "testing".to_string()],
        }
    }

    pub fn production() -> Self {
        Self {
            name: "production".to_string(),
            description: "High reliability for production workloads".to_string(),
            retry_attempts: 5,
            circuit_breaker_threshold: 10,
            recovery_timeout: 120.0,
            default_strategy: ResilienceStrategy::Conservative,
            operation_overrides: BTreeMap::from([
                ("qa".to_string(), ResilienceStrategy::Critical),
                ("sentiment".to_string(), ResilienceStrategy::Aggressive),
                ("summarize".to_string(), ResilienceStrategy::Conservative),
                ("key_points".to_string(), ResilienceStrategy::Balanced),
                ("questions".to_string(), ResilienceStrategy::Balanced),
            ]),
            environment_contexts: vec!["production".to_string(), "staging".to_string()],
        }
    }

    /// Expand into a full configuration
    ///
    /// The preset's retry and breaker numbers replace those of its default
    /// strategy; the other strategies keep their built-in parameters.
    pub fn to_resilience_config(&self) -> ResilienceConfig {
        let mut config = ResilienceConfig {
            default_strategy: self.default_strategy,
            operation_strategies: self
                .operation_overrides
                .iter()
                .map(|(name, strategy)| (name.clone(), *strategy))
                .collect(),
            ..ResilienceConfig::default()
        };

        let mut base = StrategyConfig::for_strategy(self.default_strategy);
        base.retry.max_attempts = self.retry_attempts;
        base.circuit_breaker.failure_threshold = self.circuit_breaker_threshold;
        base.circuit_breaker.recovery_timeout_seconds = self.recovery_timeout;
        config.strategies.insert(self.default_strategy, base);

        config
    }
}

/// Lookup table for the built-in resilience presets
#[derive(Debug, Clone)]
pub struct ResiliencePresetManager {
    presets: BTreeMap<String, ResiliencePreset>,
}

impl Default for ResiliencePresetManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ResiliencePresetManager {
    pub const PRESET_NAMES: [&'static str; 3] = ["simple", "development", "production"];

    pub fn new() -> Self {
        let presets = [
            ResiliencePreset::simple(),
            ResiliencePreset::development(),
            ResiliencePreset::production(),
        ]
        .into_iter()
        .map(|preset| (preset.name.clone(), preset))
        .collect();
        Self { presets }
    }

    pub fn get_preset(&self, name: &str) -> ConfigResult<ResiliencePreset> {
        self.presets
            .get(name.trim())
            .cloned()
            .ok_or_else(|| ConfigurationError::unknown_preset(name, &Self::PRESET_NAMES))
    }

    pub fn list_presets(&self) -> Vec<String> {
        self.presets.keys().cloned().collect()
    }

    /// Preset name suited to a deployment environment
    pub fn recommend_preset(&self, environment: &str) -> &'static str {
        let preset = match environment.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" | "local" | "test" | "testing" => "development",
            "production" | "prod" | "staging" | "stage" => "production",
            _ => "simple",
        };
        info!(environment = %environment, preset = preset, "Recommended resilience preset");
        preset
    }
}
