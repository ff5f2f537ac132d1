//! In-memory L2 provider
//!
//! Stands in for Redis in single-instance deployments and tests. Payloads
//! are stored exactly as they would be in Redis (prefixed, possibly
//! compressed). This cache is NOT shared between processes.

use crate::cache::errors::{CacheError, CacheResult};
use crate::cache::memory::MemoryCache;
use crate::cache::traits::CacheService;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Process-local L2 backed by [`MemoryCache`]
///
/// Clones share storage and the availability switch.
#[derive(Debug, Clone)]
pub struct InMemoryCacheService {
    cache: MemoryCache,
    offline: Arc<AtomicBool>,
}

impl Default for InMemoryCacheService {
    fn default() -> Self {
        Self::new(10_000)
    }
}

impl InMemoryCacheService {
    pub fn new(max_entries: u64) -> Self {
        Self {
            cache: MemoryCache::new(max_entries),
            offline: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Make every operation fail with a connection error until switched back
    pub fn set_offline(&self, offline: bool) {
        if offline {
            warn!("In-memory L2 switched offline");
        }
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn is_offline(&self) -> bool {
        self.offline.load(Ordering::SeqCst)
    }

    fn ensure_online(&self) -> CacheResult<()> {
        if self.is_offline() {
            Err(CacheError::Connection(
                "in-memory backend is offline".to_string(),
            ))
        } else {
            Ok(())
        }
    }
}

impl CacheService for InMemoryCacheService {
    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        self.ensure_online()?;
        let result = self.cache.get(key).await;

        if result.is_some() {
            debug!(key = key, "Cache HIT (in-memory L2)");
        } else {
            debug!(key = key, "Cache MISS (in-memory L2)");
        }

        Ok(result)
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> CacheResult<()> {
        self.ensure_online()?;
        self.cache.insert(key, value.to_vec(), ttl).await;
        debug!(key = key, ttl_seconds = ttl.as_secs(), "Cache SET (in-memory L2)");
        Ok(())
    }

    async fn delete(&self, key: &str) -> CacheResult<bool> {
        self.ensure_online()?;
        Ok(self.cache.remove(key).await)
    }

    async fn exists(&self, key: &str) -> CacheResult<bool> {
        self.ensure_online()?;
        Ok(self.cache.contains(key))
    }

    async fn health_check(&self) -> CacheResult<bool> {
        Ok(!self.is_offline())
    }

    fn provider_name(&self) -> &'static str {
        "in-memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_crud_operations() {
        let svc = InMemoryCacheService::new(100);
        svc.set("key", b"raw:value", Duration::from_secs(60))
            .await
            .unwrap();

        assert_eq!(svc.get("key").await.unwrap(), Some(b"raw:value".to_vec()));
        assert!(svc.exists("key").await.unwrap());
        assert!(svc.delete("key").await.unwrap());
        assert!(!svc.exists("key").await.unwrap());
    }

    #[tokio::test]
    async fn test_offline_switch_is_shared_by_clones() {
        let svc = InMemoryCacheService::new(100);
        let handle = svc.clone();

        handle.set_offline(true);
        assert!(matches!(
            svc.get("key").await,
            Err(CacheError::Connection(_))
        ));
        assert!(!svc.health_check().await.unwrap());

        handle.set_offline(false);
        assert_eq!(svc.get("key").await.unwrap(), None);
    }
}
