//! L1 in-process cache
//!
//! Bounded by entry count with per-entry TTL. Eviction and expiry are
//! handled by moka; expired entries are never returned, though they may be
//! counted by [`MemoryCache::entry_count`] until the next maintenance pass.

use moka::future::Cache;
use moka::Expiry;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

#[derive(Debug, Clone)]
struct MemoryEntry {
    value: Arc<Vec<u8>>,
    ttl: Duration,
}

struct PerEntryExpiry;

impl Expiry<String, MemoryEntry> for PerEntryExpiry {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &MemoryEntry,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &MemoryEntry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// Size-bounded byte cache with per-entry expiry
#[derive(Clone)]
pub struct MemoryCache {
    cache: Cache<String, MemoryEntry>,
}

impl std::fmt::Debug for MemoryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryCache")
            .field("max_capacity", &self.cache.policy().max_capacity())
            .field("entry_count", &self.cache.entry_count())
            .finish()
    }
}

impl MemoryCache {
    pub fn new(max_entries: u64) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_entries.max(1))
            .expire_after(PerEntryExpiry)
            .build();

        debug!(max_entries = max_entries, "Memory cache created");
        Self { cache }
    }

    pub async fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.cache
            .get(key)
            .await
            .map(|entry| entry.value.as_ref().clone())
    }

    pub async fn insert(&self, key: &str, value: Vec<u8>, ttl: Duration) {
        let entry = MemoryEntry {
            value: Arc::new(value),
            ttl,
        };
        self.cache.insert(key.to_string(), entry).await;
    }

    /// Remove `key`, returning whether it was present
    pub async fn remove(&self, key: &str) -> bool {
        self.cache.remove(key).await.is_some()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.cache.contains_key(key)
    }

    pub fn clear(&self) {
        self.cache.invalidate_all();
    }

    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }

    pub fn max_capacity(&self) -> Option<u64> {
        self.cache.policy().max_capacity()
    }

    /// Apply pending evictions so counts are exact
    pub async fn run_pending_tasks(&self) {
        self.cache.run_pending_tasks().await;
    }
}
