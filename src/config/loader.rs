//! Configuration Loader
//!
//! Environment-aware loading of cache and resilience settings. Sources are
//! layered with the `config` crate: an optional TOML file first, then the
//! recognised environment variables on top. Presets are expanded and
//! validated when a config is resolved, not when settings are loaded.

use super::cache::{redact_url, AiCacheConfig, CacheConfig, CachePresetManager};
use super::error::{ConfigResult, ConfigurationError};
use super::resilience::{ResilienceConfig, ResiliencePresetManager};
use crate::resilience::config::ResilienceStrategy;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::env;
use std::path::PathBuf;
use tracing::{debug, info, warn};

const OPERATION_STRATEGY_SUFFIX: &str = "_RESILIENCE_STRATEGY";

/// Cache section of [`Settings`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Preset name; recommended from the environment when unset
    pub preset: Option<String>,
    pub redis_url: Option<String>,
    /// Force AI settings on or off regardless of the preset
    pub enable_ai_cache: Option<bool>,
    /// JSON object merged over the preset
    pub custom_config: Option<String>,
}

/// Resilience section of [`Settings`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResilienceSettings {
    pub preset: Option<String>,
    pub default_strategy: Option<String>,
    pub operation_strategies: BTreeMap<String, String>,
    /// JSON object applied after the preset
    pub custom_config: Option<String>,
}

/// Raw, unresolved settings from file and environment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub environment: String,
    pub cache: CacheSettings,
    pub resilience: ResilienceSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            cache: CacheSettings::default(),
            resilience: ResilienceSettings::default(),
        }
    }
}

impl Settings {
    /// Load from `config/{environment}.toml` (if present) and the process environment
    pub fn load() -> ConfigResult<Self> {
        SettingsLoader::from_process_env().load()
    }

    /// Load from an explicit TOML file and the process environment
    pub fn load_from_file(path: impl Into<PathBuf>) -> ConfigResult<Self> {
        SettingsLoader::from_process_env().with_file(path).load()
    }

    /// Expand the cache preset and apply overrides
    ///
    /// Order: preset, `redis_url` and AI switch, custom JSON, validation.
    pub fn resolve_cache_config(&self) -> ConfigResult<CacheConfig> {
        let manager = CachePresetManager::new();
        let ai_requested = self.cache.enable_ai_cache.unwrap_or(false);
        let preset_name = match &self.cache.preset {
            Some(name) => name.clone(),
            None => manager
                .recommend_preset(&self.environment, ai_requested)
                .to_string(),
        };
        let mut config = manager.get_preset(&preset_name)?.to_cache_config();

        if let Some(url) = &self.cache.redis_url {
            config.redis_url = Some(url.clone());
        }

        match self.cache.enable_ai_cache {
            Some(true) if config.ai.is_none() => config.ai = Some(AiCacheConfig::default()),
            Some(false) => config.ai = None,
            _ => {}
        }

        if let Some(json) = &self.cache.custom_config {
            config = config.apply_overrides(json)?;
        }

        let result = config.validate();
        for warning in &result.warnings {
            warn!(preset = %preset_name, warning = %warning, "Cache configuration warning");
        }
        config.ensure_valid()?;

        info!(
            preset = %preset_name,
            redis_url = %config.redis_url.as_deref().map(redact_url).unwrap_or_else(|| "none".to_string()),
            l1_enabled = config.enable_l1_cache,
            ai_enabled = config.ai.is_some(),
            "Resolved cache configuration"
        );
        Ok(config)
    }

    /// Expand the resilience preset and apply overrides
    ///
    /// Order: preset, strategy variables, custom JSON, validation.
    pub fn resolve_resilience_config(&self) -> ConfigResult<ResilienceConfig> {
        let manager = ResiliencePresetManager::new();
        let preset_name = match &self.resilience.preset {
            Some(name) => name.clone(),
            None => manager.recommend_preset(&self.environment).to_string(),
        };
        let mut config = manager.get_preset(&preset_name)?.to_resilience_config();

        if let Some(strategy) = &self.resilience.default_strategy {
            config.default_strategy = strategy.parse()?;
        }

        for (operation, strategy) in &self.resilience.operation_strategies {
            let strategy: ResilienceStrategy = strategy.parse()?;
            config
                .operation_strategies
                .insert(operation.clone(), strategy);
        }

        if let Some(json) = &self.resilience.custom_config {
            config = config.apply_custom_config(json)?;
        }

        config.ensure_valid()?;

        info!(
            preset = %preset_name,
            default_strategy = %config.default_strategy,
            operation_overrides = config.operation_strategies.len(),
            "Resolved resilience configuration"
        );
        Ok(config)
    }
}

/// Builder for [`Settings`] with an injectable environment
#[derive(Debug, Clone)]
pub struct SettingsLoader {
    vars: HashMap<String, String>,
    file: Option<PathBuf>,
    config_directory: PathBuf,
}

impl SettingsLoader {
    pub fn from_process_env() -> Self {
        Self::from_vars(env::vars())
    }

    pub fn from_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: vars
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            file: None,
            config_directory: PathBuf::from("config"),
        }
    }

    /// Read this file instead of `config/{environment}.toml`; it must exist
    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.file = Some(path.into());
        self
    }

    pub fn with_config_directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.config_directory = directory.into();
        self
    }

    /// `APP_ENV`, then `ENVIRONMENT`, then `development`
    pub fn detect_environment(&self) -> String {
        self.var("APP_ENV")
            .or_else(|| self.var("ENVIRONMENT"))
            .map(|value| value.trim().to_ascii_lowercase())
            .unwrap_or_else(|| "development".to_string())
    }

    pub fn load(&self) -> ConfigResult<Settings> {
        let environment = self.detect_environment();
        let mut builder = config::Config::builder().set_default("environment", environment.clone())?;

        match &self.file {
            Some(path) => {
                if !path.exists() {
                    return Err(ConfigurationError::FileNotFound { path: path.clone() });
                }
                debug!(path = %path.display(), "Loading configuration file");
                builder = builder.add_source(config::File::from(path.as_path()).required(true));
            }
            None => {
                let path = self.config_directory.join(format!("{environment}.toml"));
                debug!(path = %path.display(), "Looking for optional configuration file");
                builder = builder.add_source(config::File::from(path.as_path()).required(false));
            }
        }

        builder = builder
            .set_override_option("cache.preset", self.var("CACHE_PRESET"))?
            .set_override_option("cache.redis_url", self.var("CACHE_REDIS_URL"))?
            .set_override_option("cache.enable_ai_cache", self.bool_var("ENABLE_AI_CACHE")?)?
            .set_override_option("cache.custom_config", self.var("CACHE_CUSTOM_CONFIG"))?
            .set_override_option("resilience.preset", self.var("RESILIENCE_PRESET"))?
            .set_override_option(
                "resilience.default_strategy",
                self.var("DEFAULT_RESILIENCE_STRATEGY"),
            )?
            .set_override_option(
                "resilience.custom_config",
                self.var("RESILIENCE_CUSTOM_CONFIG"),
            )?;

        for (operation, strategy) in self.operation_strategy_vars() {
            builder = builder.set_override(
                format!("resilience.operation_strategies.{operation}"),
                strategy,
            )?;
        }

        let settings: Settings = builder.build()?.try_deserialize()?;
        debug!(
            environment = %settings.environment,
            cache_preset = ?settings.cache.preset,
            resilience_preset = ?settings.resilience.preset,
            "Settings loaded"
        );
        Ok(settings)
    }

    fn var(&self, name: &str) -> Option<String> {
        self.vars
            .get(name)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }

    fn bool_var(&self, name: &str) -> ConfigResult<Option<bool>> {
        match self.var(name) {
            None => Ok(None),
            Some(value) => match value.to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => Ok(Some(true)),
                "0" | "false" | "no" | "off" => Ok(Some(false)),
                _ => Err(ConfigurationError::invalid_value(
                    name,
                    value,
                    "expected a boolean (true/false)",
                )),
            },
        }
    }

    /// `<OPERATION>_RESILIENCE_STRATEGY` variables as (operation, strategy)
    fn operation_strategy_vars(&self) -> Vec<(String, String)> {
        let mut pairs: Vec<(String, String)> = self
            .vars
            .iter()
            .filter_map(|(name, value)| {
                let operation = name.strip_suffix(OPERATION_STRATEGY_SUFFIX)?;
                if operation.is_empty() || operation == "DEFAULT" || value.trim().is_empty() {
                    return None;
                }
                Some((operation.to_ascii_lowercase(), value.trim().to_string()))
            })
            .collect();
        pairs.sort();
        pairs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_environment_detection() {
        let loader = SettingsLoader::from_vars([("APP_ENV", "Production")]);
        assert_eq!(loader.detect_environment(), "production");

        let loader = SettingsLoader::from_vars([("ENVIRONMENT", "staging")]);
        assert_eq!(loader.detect_environment(), "staging");

        let loader = SettingsLoader::from_vars(Vec::<(String, String)>::new());
        assert_eq!(loader.detect_environment(), "development");
    }

    #[test]
    fn test_env_vars_populate_settings() {
        let dir = tempfile::tempdir().unwrap();
        let settings = SettingsLoader::from_vars([
            ("APP_ENV", "production"),
            ("CACHE_PRESET", "ai-production"),
            ("CACHE_REDIS_URL", "redis://cache:6379"),
            ("ENABLE_AI_CACHE", "false"),
            ("RESILIENCE_PRESET", "production"),
            ("DEFAULT_RESILIENCE_STRATEGY", "critical"),
            ("SUMMARIZE_RESILIENCE_STRATEGY", "aggressive"),
        ])
        .with_config_directory(dir.path())
        .load()
        .unwrap();

        assert_eq!(settings.environment, "production");
        assert_eq!(settings.cache.preset.as_deref(), Some("ai-production"));
        assert_eq!(settings.cache.enable_ai_cache, Some(false));
        assert_eq!(
            settings.resilience.operation_strategies.get("summarize"),
            Some(&"aggressive".to_string())
        );

        let cache = settings.resolve_cache_config().unwrap();
        assert_eq!(cache.redis_url.as_deref(), Some("redis://cache:6379"));
        assert!(cache.ai.is_none());

        let resilience = settings.resolve_resilience_config().unwrap();
        assert_eq!(resilience.default_strategy, ResilienceStrategy::Critical);
        assert_eq!(
            resilience.strategy_for_operation("summarize"),
            ResilienceStrategy::Aggressive
        );
        // Preset overrides survive
        assert_eq!(
            resilience.strategy_for_operation("qa"),
            ResilienceStrategy::Critical
        );
    }

    #[test]
    fn test_toml_file_is_layered_under_env() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[cache]
preset = "minimal"
redis_url = "redis://from-file:6379"

[resilience]
preset = "development"

[resilience.operation_strategies]
sentiment = "conservative"
"#
        )
        .unwrap();

        let settings = SettingsLoader::from_vars([("CACHE_PRESET", "production")])
            .with_file(file.path())
            .load()
            .unwrap();

        assert_eq!(settings.cache.preset.as_deref(), Some("production"));
        assert_eq!(
            settings.cache.redis_url.as_deref(),
            Some("redis://from-file:6379")
        );

        let resilience = settings.resolve_resilience_config().unwrap();
        assert_eq!(resilience.default_strategy, ResilienceStrategy::Aggressive);
        assert_eq!(
            resilience.strategy_for_operation("sentiment"),
            ResilienceStrategy::Conservative
        );
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let error = SettingsLoader::from_vars(Vec::<(String, String)>::new())
            .with_file("/definitely/not/here.toml")
            .load()
            .unwrap_err();
        assert!(matches!(error, ConfigurationError::FileNotFound { .. }));
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let dir = tempfile::tempdir().unwrap();

        let error = SettingsLoader::from_vars([("ENABLE_AI_CACHE", "maybe")])
            .with_config_directory(dir.path())
            .load()
            .unwrap_err();
        assert!(matches!(error, ConfigurationError::InvalidValue { .. }));

        let settings = SettingsLoader::from_vars([("DEFAULT_RESILIENCE_STRATEGY", "reckless")])
            .with_config_directory(dir.path())
            .load()
            .unwrap();
        assert!(settings.resolve_resilience_config().is_err());

        let settings = SettingsLoader::from_vars([("CACHE_CUSTOM_CONFIG", r#"{"compression_level": 42}"#)])
            .with_config_directory(dir.path())
            .load()
            .unwrap();
        match settings.resolve_cache_config() {
            Err(ConfigurationError::Invalid { errors }) => {
                assert!(errors[0].contains("compression_level"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_recommended_presets_when_unset() {
        let settings = Settings {
            environment: "testing".to_string(),
            ..Settings::default()
        };
        let cache = settings.resolve_cache_config().unwrap();
        assert_eq!(cache.memory_cache_size, 25);

        let resilience = settings.resolve_resilience_config().unwrap();
        assert_eq!(resilience.default_strategy, ResilienceStrategy::Aggressive);
    }
}
