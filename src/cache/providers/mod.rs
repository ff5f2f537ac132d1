//! L2 cache provider implementations
//!
//! [`L2Backend`] uses enum dispatch over the concrete providers so the
//! tiered cache holds a single concrete type.

pub mod in_memory;
pub mod noop;

#[cfg(feature = "cache-redis")]
pub mod redis;

pub use in_memory::InMemoryCacheService;
pub use noop::NoOpCacheService;

#[cfg(feature = "cache-redis")]
pub use self::redis::RedisCacheService;

use super::errors::CacheResult;
use super::traits::CacheService;
use crate::config::CacheConfig;
use std::time::Duration;
use tracing::{info, warn};

/// Second-tier storage used by the tiered cache
#[derive(Debug)]
pub enum L2Backend {
    /// Redis provider (boxed to reduce enum size)
    #[cfg(feature = "cache-redis")]
    Redis(Box<RedisCacheService>),

    /// Process-local stand-in
    InMemory(InMemoryCacheService),

    /// L2 disabled
    NoOp(NoOpCacheService),
}

impl L2Backend {
    /// Redis when `redis_url` is set, otherwise disabled
    ///
    /// Never connects; an unusable URL degrades to [`L2Backend::NoOp`].
    pub fn from_config(config: &CacheConfig) -> Self {
        let Some(url) = config.redis_url.as_deref() else {
            info!("No redis_url configured, L2 cache disabled");
            return Self::NoOp(NoOpCacheService::new());
        };
        Self::redis(url, config.connection_timeout_duration())
    }

    #[cfg(feature = "cache-redis")]
    fn redis(url: &str, timeout: Duration) -> Self {
        match RedisCacheService::new(url, timeout) {
            Ok(service) => Self::Redis(Box::new(service)),
            Err(e) => {
                warn!(error = %e, "Invalid Redis configuration, L2 cache disabled");
                Self::NoOp(NoOpCacheService::new())
            }
        }
    }

    #[cfg(not(feature = "cache-redis"))]
    fn redis(_url: &str, _timeout: Duration) -> Self {
        warn!("redis_url configured but the cache-redis feature is disabled, L2 cache disabled");
        Self::NoOp(NoOpCacheService::new())
    }

    pub fn is_enabled(&self) -> bool {
        !matches!(self, Self::NoOp(_))
    }

    /// Whether the backend is currently reachable
    pub fn is_connected(&self) -> bool {
        match self {
            #[cfg(feature = "cache-redis")]
            Self::Redis(s) => s.is_connected(),
            Self::InMemory(s) => !s.is_offline(),
            Self::NoOp(_) => false,
        }
    }

    pub fn provider_name(&self) -> &'static str {
        match self {
            #[cfg(feature = "cache-redis")]
            Self::Redis(s) => s.provider_name(),
            Self::InMemory(s) => s.provider_name(),
            Self::NoOp(s) => s.provider_name(),
        }
    }

    pub async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        match self {
            #[cfg(feature = "cache-redis")]
            Self::Redis(s) => s.get(key).await,
            Self::InMemory(s) => s.get(key).await,
            Self::NoOp(s) => s.get(key).await,
        }
    }

    pub async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> CacheResult<()> {
        match self {
            #[cfg(feature = "cache-redis")]
            Self::Redis(s) => s.set(key, value, ttl).await,
            Self::InMemory(s) => s.set(key, value, ttl).await,
            Self::NoOp(s) => s.set(key, value, ttl).await,
        }
    }

    pub async fn delete(&self, key: &str) -> CacheResult<bool> {
        match self {
            #[cfg(feature = "cache-redis")]
            Self::Redis(s) => s.delete(key).await,
            Self::InMemory(s) => s.delete(key).await,
            Self::NoOp(s) => s.delete(key).await,
        }
    }

    pub async fn exists(&self, key: &str) -> CacheResult<bool> {
        match self {
            #[cfg(feature = "cache-redis")]
            Self::Redis(s) => s.exists(key).await,
            Self::InMemory(s) => s.exists(key).await,
            Self::NoOp(s) => s.exists(key).await,
        }
    }

    pub async fn health_check(&self) -> CacheResult<bool> {
        match self {
            #[cfg(feature = "cache-redis")]
            Self::Redis(s) => s.health_check().await,
            Self::InMemory(s) => s.health_check().await,
            Self::NoOp(s) => s.health_check().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_url_disables_l2() {
        let backend = L2Backend::from_config(&CacheConfig::default());
        assert!(!backend.is_enabled());
        assert_eq!(backend.provider_name(), "noop");
    }

    #[cfg(feature = "cache-redis")]
    #[test]
    fn test_redis_url_selects_redis_without_connecting() {
        let config = CacheConfig {
            redis_url: Some("redis://127.0.0.1:1".to_string()),
            ..CacheConfig::default()
        };
        let backend = L2Backend::from_config(&config);
        assert!(backend.is_enabled());
        assert_eq!(backend.provider_name(), "redis");
        assert!(!backend.is_connected());
    }
}
