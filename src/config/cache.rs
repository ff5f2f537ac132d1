//! Cache configuration and presets
//!
//! [`CacheConfig`] is what the tiered cache consumes. It is normally built
//! from one of the named presets in [`CachePresetManager`] and then adjusted
//! through environment variables or a JSON override blob.

use crate::config::error::{ConfigResult, ConfigurationError};
use crate::validation::ValidationResult;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;
use tracing::{debug, info};
use validator::Validate;

const ONE_WEEK_SECONDS: u64 = 604_800;
const SUPPORTED_HASH_ALGORITHMS: [&str; 4] = ["sha256", "sha1", "md5", "blake2b"];

/// Settings for the tiered cache
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default, deny_unknown_fields)]
pub struct CacheConfig {
    /// L2 connection URL; `None` disables L2
    pub redis_url: Option<String>,

    /// TTL in seconds used when a write does not specify one
    #[validate(range(min = 1, max = 604800))]
    pub default_ttl: u64,

    /// Upper bound for L2 connections
    #[validate(range(min = 1, max = 100))]
    pub max_connections: u32,

    /// Seconds allowed for connecting to and talking with L2
    #[validate(range(min = 1, max = 60))]
    pub connection_timeout: u64,

    /// Maximum number of L1 entries
    #[validate(range(min = 1, max = 10000))]
    pub memory_cache_size: u64,

    /// Serialized payloads longer than this many bytes are compressed in L2
    pub compression_threshold: usize,

    /// zlib level
    #[validate(range(min = 1, max = 9))]
    pub compression_level: u32,

    pub enable_l1_cache: bool,

    /// AI-specific settings, present only for AI presets
    pub ai: Option<AiCacheConfig>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            redis_url: None,
            default_ttl: 3600,
            max_connections: 10,
            connection_timeout: 5,
            memory_cache_size: 100,
            compression_threshold: 1000,
            compression_level: 6,
            enable_l1_cache: true,
            ai: None,
        }
    }
}

impl CacheConfig {
    pub fn default_ttl_duration(&self) -> Duration {
        Duration::from_secs(self.default_ttl)
    }

    pub fn connection_timeout_duration(&self) -> Duration {
        Duration::from_secs(self.connection_timeout)
    }

    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::from_validator(self);

        if let Some(url) = &self.redis_url {
            let scheme_ok = ["redis://", "rediss://", "unix://"]
                .iter()
                .any(|scheme| url.starts_with(scheme));
            if !scheme_ok {
                result.add_error(format!(
                    "redis_url must start with redis://, rediss:// or unix:// (got {})",
                    redact_url(url)
                ));
            }
        }

        if self.enable_l1_cache && self.memory_cache_size > 1000 && self.default_ttl < 300 {
            result.add_warning(format!(
                "large memory_cache_size ({}) with a short default_ttl ({}s) churns L1",
                self.memory_cache_size, self.default_ttl
            ));
        }

        if self.compression_threshold < 100 {
            result.add_warning(format!(
                "compression_threshold ({}) is very small; tiny payloads grow when compressed",
                self.compression_threshold
            ));
        }

        if !self.enable_l1_cache && self.redis_url.is_none() {
            result.add_warning("both L1 and L2 are disabled; every lookup is a miss");
        }

        if let Some(ai) = &self.ai {
            result.merge("ai", ai.validate());
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

    /// Merge a JSON object (the `CACHE_CUSTOM_CONFIG` format) over this config
    ///
    /// Nested objects such as `ai` are merged key by key. Unknown keys are
    /// rejected. The result is validated before it is returned.
    pub fn apply_overrides(&self, json: &str) -> ConfigResult<CacheConfig> {
        let overrides: serde_json::Value = serde_json::from_str(json)
            .map_err(|e| ConfigurationError::invalid_override("CACHE_CUSTOM_CONFIG", e))?;
        if !overrides.is_object() {
            return Err(ConfigurationError::invalid_override(
                "CACHE_CUSTOM_CONFIG",
                "expected a JSON object",
            ));
        }

        let mut merged = serde_json::to_value(self)
            .map_err(|e| ConfigurationError::invalid_override("CACHE_CUSTOM_CONFIG", e))?;
        merge_json(&mut merged, overrides);

        let config: CacheConfig = serde_json::from_value(merged)
            .map_err(|e| ConfigurationError::invalid_override("CACHE_CUSTOM_CONFIG", e))?;
        config.ensure_valid()?;

        debug!("Applied custom cache configuration");
        Ok(config)
    }
}

fn merge_json(base: &mut serde_json::Value, overrides: serde_json::Value) {
    match (base, overrides) {
        (serde_json::Value::Object(base), serde_json::Value::Object(overrides)) => {
            for (key, value) in overrides {
                match base.get_mut(&key) {
                    Some(existing) if existing.is_object() && value.is_object() => {
                        merge_json(existing, value)
                    }
                    _ => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, overrides) => *base = overrides,
    }
}

/// Strip the password from a connection URL before it is logged
pub fn redact_url(url: &str) -> String {
    match (url.find("://"), url.rfind('@')) {
        (Some(scheme_end), Some(at)) if at > scheme_end => {
            format!("{}://***{}", &url[..scheme_end], &url[at..])
        }
        _ => url.to_string(),
    }
}

/// Byte boundaries used to bucket input text by size
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TextSizeTiers {
    pub small: usize,
    pub medium: usize,
    pub large: usize,
}

impl Default for TextSizeTiers {
    fn default() -> Self {
        Self {
            small: 500,
            medium: 5000,
            large: 50000,
        }
    }
}

/// Settings used when caching AI operation results
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default, deny_unknown_fields)]
pub struct AiCacheConfig {
    /// Texts longer than this are hashed before being used in a key
    #[validate(range(min = 1, max = 100000))]
    pub text_hash_threshold: usize,

    pub hash_algorithm: String,

    pub text_size_tiers: TextSizeTiers,

    /// TTL in seconds per operation name
    pub operation_ttls: HashMap<String, u64>,

    pub enable_smart_promotion: bool,

    #[validate(range(min = 1000, max = 10000000))]
    pub max_text_length: usize,
}

impl Default for AiCacheConfig {
    fn default() -> Self {
        Self {
            text_hash_threshold: 1000,
            hash_algorithm: "sha256".to_string(),
            text_size_tiers: TextSizeTiers::default(),
            operation_ttls: HashMap::from([
                ("summarize".to_string(), 7200),
                ("sentiment".to_string(), 86400),
                ("key_points".to_string(), 7200),
                ("questions".to_string(), 3600),
                ("qa".to_string(), 1800),
            ]),
            enable_smart_promotion: true,
            max_text_length: 100_000,
        }
    }
}

impl AiCacheConfig {
    /// TTL for an operation, if one is configured
    pub fn ttl_for_operation(&self, operation: &str) -> Option<Duration> {
        self.operation_ttls
            .get(operation)
            .map(|seconds| Duration::from_secs(*seconds))
    }

    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::from_validator(self);

        if !SUPPORTED_HASH_ALGORITHMS.contains(&self.hash_algorithm.as_str()) {
            result.add_error(format!(
                "hash_algorithm must be one of {} (got {})",
                SUPPORTED_HASH_ALGORITHMS.join(", "),
                self.hash_algorithm
            ));
        }

        let tiers = &self.text_size_tiers;
        if !(tiers.small < tiers.medium && tiers.medium < tiers.large) {
            result.add_error(format!(
                "text_size_tiers must be ordered small < medium < large (got {}, {}, {})",
                tiers.small, tiers.medium, tiers.large
            ));
        }

        let mut ttls: Vec<_> = self.operation_ttls.iter().collect();
        ttls.sort();
        for (operation, ttl) in ttls {
            if *ttl == 0 || *ttl > ONE_WEEK_SECONDS {
                result.add_error(format!(
                    "operation_ttls.{operation} must be between 1 and {ONE_WEEK_SECONDS} (got {ttl})"
                ));
            }
        }

        if self.operation_ttls.is_empty() {
            result.add_warning("AI cache enabled without any operation_ttls");
        }

        if self.text_hash_threshold > self.max_text_length {
            result.add_warning(format!(
                "text_hash_threshold ({}) exceeds max_text_length ({}); texts are never hashed",
                self.text_hash_threshold, self.max_text_length
            ));
        }

        result
    }
}

/// Named cache configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachePreset {
    pub name: String,
    pub description: String,
    pub config: CacheConfig,
    pub environment_contexts: Vec<String>,
}

impl CachePreset {
    pub fn to_cache_config(&self) -> CacheConfig {
        self.config.clone()
    }

    fn new(name: &str, description: &str, contexts: &[&str], config: CacheConfig) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            config,
            environment_contexts: contexts.iter().map(|c| c.to_string()).collect(),
        }
    }
}

fn ai_development_config() -> AiCacheConfig {
    AiCacheConfig {
        text_hash_threshold: 500,
        operation_ttls: HashMap::from([
            ("summarize".to_string(), 1800),
            ("sentiment".to_string(), 3600),
            ("key_points".to_string(), 1800),
            ("questions".to_string(), 1800),
            ("qa".to_string(), 900),
        ]),
        max_text_length: 50_000,
        ..AiCacheConfig::default()
    }
}

fn ai_production_config() -> AiCacheConfig {
    AiCacheConfig {
        text_hash_threshold: 1000,
        text_size_tiers: TextSizeTiers {
            small: 1000,
            medium: 10_000,
            large: 100_000,
        },
        operation_ttls: HashMap::from([
            ("summarize".to_string(), 14_400),
            ("sentiment".to_string(), 86_400),
            ("key_points".to_string(), 14_400),
            ("questions".to_string(), 7200),
            ("qa".to_string(), 3600),
        ]),
        max_text_length: 200_000,
        ..AiCacheConfig::default()
    }
}

/// Lookup table for the built-in cache presets
#[derive(Debug, Clone)]
pub struct CachePresetManager {
    presets: BTreeMap<String, CachePreset>,
}

impl Default for CachePresetManager {
    fn default() -> Self {
        Self::new()
    }
}

impl CachePresetManager {
    pub const PRESET_NAMES: [&'static str; 7] = [
        "disabled",
        "minimal",
        "simple",
        "development",
        "production",
        "ai-development",
        "ai-production",
    ];

    pub fn new() -> Self {
        let presets = [
            CachePreset::new(
                "disabled",
                "No caching; every lookup misses",
                &["testing"],
                CacheConfig {
                    default_ttl: 300,
                    max_connections: 1,
                    connection_timeout: 1,
                    memory_cache_size: 1,
                    compression_threshold: 10_000,
                    compression_level: 1,
                    enable_l1_cache: false,
                    ..CacheConfig::default()
                },
            ),
            CachePreset::new(
                "minimal",
                "Small L1 with light compression for constrained hosts",
                &["testing", "development"],
                CacheConfig {
                    default_ttl: 900,
                    max_connections: 2,
                    connection_timeout: 3,
                    memory_cache_size: 25,
                    compression_threshold: 5000,
                    compression_level: 3,
                    ..CacheConfig::default()
                },
            ),
            CachePreset::new(
                "simple",
                "Balanced defaults for most deployments",
                &["development", "staging", "production"],
                CacheConfig::default(),
            ),
            CachePreset::new(
                "development",
                "Short TTLs for fast iteration",
                &["development", "testing"],
                CacheConfig {
                    default_ttl: 600,
                    max_connections: 5,
                    connection_timeout: 2,
                    memory_cache_size: 50,
                    compression_threshold: 2000,
                    compression_level: 3,
                    ..CacheConfig::default()
                },
            ),
            CachePreset::new(
                "production",
                "Larger L1 and longer TTLs for production traffic",
                &["production", "staging"],
                CacheConfig {
                    default_ttl: 7200,
                    max_connections: 20,
                    connection_timeout: 5,
                    memory_cache_size: 500,
                    compression_threshold: 1000,
                    compression_level: 6,
                    ..CacheConfig::default()
                },
            ),
            CachePreset::new(
                "ai-development",
                "AI result caching tuned for development",
                &["development"],
                CacheConfig {
                    default_ttl: 1800,
                    max_connections: 5,
                    connection_timeout: 3,
                    memory_cache_size: 100,
                    compression_threshold: 1000,
                    compression_level: 6,
                    ai: Some(ai_development_config()),
                    ..CacheConfig::default()
                },
            ),
            CachePreset::new(
                "ai-production",
                "AI result caching tuned for production",
                &["production"],
                CacheConfig {
                    default_ttl: 14_400,
                    max_connections: 25,
                    connection_timeout: 5,
                    memory_cache_size: 1000,
                    compression_threshold: 500,
                    compression_level: 9,
                    ai: Some(ai_production_config()),
                    ..CacheConfig::default()
                },
            ),
        ]
        .into_iter()
        .map(|preset| (preset.name.clone(), preset))
        .collect();

        Self { presets }
    }

    pub fn get_preset(&self, name: &str) -> ConfigResult<CachePreset> {
        self.presets
            .get(name.trim())
            .cloned()
            .ok_or_else(|| ConfigurationError::unknown_preset(name, &Self::PRESET_NAMES))
    }

    pub fn list_presets(&self) -> Vec<String> {
        Self::PRESET_NAMES.iter().map(|s| s.to_string()).collect()
    }

    pub fn preset_details(&self) -> Vec<&CachePreset> {
        Self::PRESET_NAMES
            .iter()
            .filter_map(|name| self.presets.get(*name))
            .collect()
    }

    /// Preset name suited to a deployment environment
    pub fn recommend_preset(&self, environment: &str, ai_enabled: bool) -> &'static str {
        let environment = environment.trim().to_ascii_lowercase();
        let preset = match (environment.as_str(), ai_enabled) {
            ("development" | "dev" | "local", false) => "development",
            ("development" | "dev" | "local", true) => "ai-development",
            ("test" | "testing", _) => "minimal",
            ("production" | "prod" | "staging" | "stage", false) => "production",
            ("production" | "prod" | "staging" | "stage", true) => "ai-production",
            (_, true) => "ai-development",
            (_, false) => "simple",
        };
        info!(
            environment = %environment,
            ai_enabled = ai_enabled,
            preset = preset,
            "Recommended cache preset"
        );
        preset
    }
}
