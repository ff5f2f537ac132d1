//! # Configuration System
//!
//! Cache and resilience settings are built from named presets, adjusted by
//! environment variables and optional JSON override blobs, then validated.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use textproc_core::config::Settings;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let settings = Settings::load()?;
//! let cache_config = settings.resolve_cache_config()?;
//! let resilience_config = settings.resolve_resilience_config()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Environment variables
//!
//! | Variable | Effect |
//! |----------|--------|
//! | `CACHE_PRESET` | cache preset name |
//! | `CACHE_REDIS_URL` | L2 connection URL |
//! | `ENABLE_AI_CACHE` | force AI cache settings on or off |
//! | `CACHE_CUSTOM_CONFIG` | JSON merged over the cache preset |
//! | `RESILIENCE_PRESET` | resilience preset name |
//! | `DEFAULT_RESILIENCE_STRATEGY` | strategy for unmapped operations |
//! | `<OPERATION>_RESILIENCE_STRATEGY` | strategy for one operation |
//! | `RESILIENCE_CUSTOM_CONFIG` | JSON applied over the resilience preset |

pub mod cache;
pub mod error;
pub mod loader;
pub mod resilience;

pub use cache::{AiCacheConfig, CacheConfig, CachePreset, CachePresetManager, TextSizeTiers};
pub use error::{ConfigResult, ConfigurationError};
pub use loader::{CacheSettings, ResilienceSettings, Settings, SettingsLoader};
pub use resilience::{ResilienceConfig, ResiliencePreset, ResiliencePresetManager};
