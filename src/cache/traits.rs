//! Cache service trait definition

use super::errors::CacheResult;
use std::future::Future;
use std::time::Duration;

/// Trait defining L2 cache operations
///
/// Implemented by concrete cache providers (Redis, in-memory, NoOp).
/// Values are opaque byte payloads; encoding and compression happen in the
/// tiered cache before a value reaches a provider.
pub trait CacheService: Send + Sync {
    /// Get a value from the cache by key
    ///
    /// Returns `Ok(Some(value))` on cache hit, `Ok(None)` on cache miss.
    fn get(&self, key: &str) -> impl Future<Output = CacheResult<Option<Vec<u8>>>> + Send;

    /// Set a value in the cache with a TTL
    fn set(
        &self,
        key: &str,
        value: &[u8],
        ttl: Duration,
    ) -> impl Future<Output = CacheResult<()>> + Send;

    /// Delete a key, returning whether it was present
    fn delete(&self, key: &str) -> impl Future<Output = CacheResult<bool>> + Send;

    fn exists(&self, key: &str) -> impl Future<Output = CacheResult<bool>> + Send;

    /// Check if the cache backend is healthy
    fn health_check(&self) -> impl Future<Output = CacheResult<bool>> + Send;

    /// Get the name of the cache provider
    fn provider_name(&self) -> &'static str;
}
