//! No-op cache provider
//!
//! Always returns None/success. Used when L2 is disabled or its backend
//! could not be created.

use crate::cache::errors::CacheResult;
use crate::cache::traits::CacheService;
use std::time::Duration;

/// No-op cache service that never caches anything
///
/// All reads return None, all writes succeed silently.
#[derive(Debug, Clone, Default)]
pub struct NoOpCacheService;

impl NoOpCacheService {
    /// Create a new no-op cache service
    pub fn new() -> Self {
        Self
    }
}

impl CacheService for NoOpCacheService {
    async fn get(&self, _key: &str) -> CacheResult<Option<Vec<u8>>> {
        Ok(None)
    }

    async fn set(&self, _key: &str, _value: &[u8], _ttl: Duration) -> CacheResult<()> {
        Ok(())
    }

    async fn delete(&self, _key: &str) -> CacheResult<bool> {
        Ok(false)
    }

    async fn exists(&self, _key: &str) -> CacheResult<bool> {
        Ok(false)
    }

    async fn health_check(&self) -> CacheResult<bool> {
        Ok(true)
    }

    fn provider_name(&self) -> &'static str {
        "noop"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_noop_never_stores() {
        let svc = NoOpCacheService::new();
        svc.set("key", b"value", Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(svc.get("key").await.unwrap(), None);
        assert!(!svc.exists("key").await.unwrap());
        assert!(!svc.delete("key").await.unwrap());
    }

    #[tokio::test]
    async fn test_noop_is_healthy() {
        let svc = NoOpCacheService::new();
        assert!(svc.health_check().await.unwrap());
        assert_eq!(svc.provider_name(), "noop");
    }
}
