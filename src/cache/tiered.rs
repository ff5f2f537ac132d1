//! # Tiered Cache
//!
//! Two-level cache: a bounded in-process L1 in front of a shared L2
//! (normally Redis).
//!
//! - Reads check L1, then L2; an L2 hit is written back into L1.
//! - Writes go to L1, then L2. L2 payloads are compressed above a size
//!   threshold (see [`CompressionCodec`]).
//! - Every tier failure degrades to a miss or a no-op and is logged. Cache
//!   operations never return errors to the caller.
//! - Lifecycle callbacks observe hits, misses, writes and deletes. A failing
//!   or panicking callback is logged and skipped.

use super::compression::CompressionCodec;
use super::memory::MemoryCache;
use super::providers::L2Backend;
use crate::config::CacheConfig;
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Lifecycle events observable through [`TieredCache::register_callback`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheEvent {
    GetSuccess,
    GetMiss,
    SetSuccess,
    DeleteSuccess,
}

impl fmt::Display for CacheEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheEvent::GetSuccess => write!(f, "get_success"),
            CacheEvent::GetMiss => write!(f, "get_miss"),
            CacheEvent::SetSuccess => write!(f, "set_success"),
            CacheEvent::DeleteSuccess => write!(f, "delete_success"),
        }
    }
}

/// Tier that served or stored a value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheTier {
    L1,
    L2,
}

/// Payload handed to callbacks
#[derive(Debug, Clone, Copy)]
pub struct CacheEventData<'a> {
    pub event: CacheEvent,
    pub key: &'a str,
    /// Serving tier for `GetSuccess`
    pub tier: Option<CacheTier>,
    /// Serialized size for `GetSuccess` and `SetSuccess`
    pub size_bytes: Option<usize>,
}

type CacheCallback = dyn Fn(&CacheEventData<'_>) -> anyhow::Result<()> + Send + Sync;

/// Counters since construction
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    pub l1_hits: u64,
    pub l2_hits: u64,
    pub misses: u64,
    pub sets: u64,
    pub deletes: u64,
    pub l2_errors: u64,
    pub callback_errors: u64,
    pub l1_entries: u64,
}

impl CacheStats {
    pub fn hits(&self) -> u64 {
        self.l1_hits + self.l2_hits
    }

    /// Fraction of lookups served from either tier (0.0 when idle)
    pub fn hit_rate(&self) -> f64 {
        let lookups = self.hits() + self.misses;
        if lookups == 0 {
            return 0.0;
        }
        self.hits() as f64 / lookups as f64
    }
}

#[derive(Debug, Default)]
struct StatsCounters {
    l1_hits: AtomicU64,
    l2_hits: AtomicU64,
    misses: AtomicU64,
    sets: AtomicU64,
    deletes: AtomicU64,
    l2_errors: AtomicU64,
    callback_errors: AtomicU64,
}

/// Health summary of both tiers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheHealth {
    pub l1_enabled: bool,
    pub l1_entries: u64,
    pub l2_enabled: bool,
    pub l2_provider: String,
    pub l2_healthy: bool,
    pub l2_error: Option<String>,
}

/// L1 + L2 cache with compression and lifecycle callbacks
pub struct TieredCache {
    config: CacheConfig,
    l1: Option<MemoryCache>,
    l2: L2Backend,
    codec: CompressionCodec,
    callbacks: RwLock<HashMap<CacheEvent, Vec<Arc<CacheCallback>>>>,
    stats: StatsCounters,
}

impl fmt::Debug for TieredCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TieredCache")
            .field("l1", &self.l1)
            .field("l2", &self.l2.provider_name())
            .field("codec", &self.codec)
            .finish()
    }
}

impl TieredCache {
    /// L2 is Redis when `redis_url` is set, otherwise disabled
    pub fn new(config: CacheConfig) -> Self {
        let l2 = L2Backend::from_config(&config);
        Self::with_backend(config, l2)
    }

    pub fn with_backend(config: CacheConfig, l2: L2Backend) -> Self {
        let l1 = config
            .enable_l1_cache
            .then(|| MemoryCache::new(config.memory_cache_size));
        let codec = CompressionCodec::new(config.compression_threshold, config.compression_level);

        info!(
            l1_enabled = l1.is_some(),
            l1_max_entries = config.memory_cache_size,
            l2_provider = l2.provider_name(),
            compression_threshold = config.compression_threshold,
            compression_level = codec.level(),
            default_ttl_seconds = config.default_ttl,
            "Tiered cache initialized"
        );

        Self {
            config,
            l1,
            l2,
            codec,
            callbacks: RwLock::new(HashMap::new()),
            stats: StatsCounters::default(),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn l2_backend(&self) -> &L2Backend {
        &self.l2
    }

    /// Observe `event`. Several callbacks may be registered per event.
    pub fn register_callback<F>(&self, event: CacheEvent, callback: F)
    where
        F: Fn(&CacheEventData<'_>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.callbacks
            .write()
            .entry(event)
            .or_default()
            .push(Arc::new(callback));
        debug!(event = %event, "Registered cache callback");
    }

    /// Deserialize the cached value for `key`
    ///
    /// A value that no longer deserializes into `T` is treated as a miss.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let bytes = self.get_bytes(key).await?;
        match serde_json::from_slice(&bytes) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key = %key, error = %e, "Cached value could not be deserialized");
                None
            }
        }
    }

    /// Serialize and store `value`; `ttl` defaults to the configured TTL
    pub async fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T, ttl: Option<Duration>) {
        match serde_json::to_vec(value) {
            Ok(bytes) => self.set_bytes(key, bytes, ttl).await,
            Err(e) => warn!(key = %key, error = %e, "Value could not be serialized, not cached"),
        }
    }

    pub async fn get_bytes(&self, key: &str) -> Option<Vec<u8>> {
        if let Some(l1) = &self.l1 {
            if let Some(value) = l1.get(key).await {
                self.stats.l1_hits.fetch_add(1, Ordering::Relaxed);
                debug!(key = %key, tier = "l1", "Cache hit");
                self.fire(CacheEvent::GetSuccess, key, Some(CacheTier::L1), Some(value.len()));
                return Some(value);
            }
        }

        if let Some(value) = self.get_from_l2(key).await {
            self.stats.l2_hits.fetch_add(1, Ordering::Relaxed);
            debug!(key = %key, tier = "l2", "Cache hit");

            if let Some(l1) = &self.l1 {
                l1.insert(key, value.clone(), self.config.default_ttl_duration())
                    .await;
            }

            self.fire(CacheEvent::GetSuccess, key, Some(CacheTier::L2), Some(value.len()));
            return Some(value);
        }

        self.stats.misses.fetch_add(1, Ordering::Relaxed);
        debug!(key = %key, "Cache miss");
        self.fire(CacheEvent::GetMiss, key, None, None);
        None
    }

    /// Store already-serialized bytes
    ///
    /// Waits for the L2 write so a following read from another process sees
    /// the value; an L2 failure is logged and the L1 copy is kept.
    pub async fn set_bytes(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) {
        let ttl = ttl.unwrap_or_else(|| self.config.default_ttl_duration());
        let size = value.len();
        let mut stored = false;

        if self.l2.is_enabled() {
            match self.codec.encode(&value) {
                Ok(payload) => match self.l2.set(key, &payload, ttl).await {
                    Ok(()) => {
                        stored = true;
                        debug!(
                            key = %key,
                            size_bytes = size,
                            stored_bytes = payload.len(),
                            compressed = CompressionCodec::is_compressed(&payload),
                            "Stored in L2"
                        );
                    }
                    Err(e) => {
                        self.stats.l2_errors.fetch_add(1, Ordering::Relaxed);
                        warn!(key = %key, error = %e, "L2 write failed, continuing with L1 only");
                    }
                },
                Err(e) => {
                    warn!(key = %key, error = %e, "Could not encode value for L2");
                }
            }
        }

        if let Some(l1) = &self.l1 {
            l1.insert(key, value, ttl).await;
            stored = true;
        }

        if stored {
            self.stats.sets.fetch_add(1, Ordering::Relaxed);
            self.fire(CacheEvent::SetSuccess, key, None, Some(size));
        } else {
            debug!(key = %key, "No cache tier accepted the value");
        }
    }

    /// Remove `key` from both tiers; true if either tier held it
    pub async fn delete(&self, key: &str) -> bool {
        let in_l1 = match &self.l1 {
            Some(l1) => l1.remove(key).await,
            None => false,
        };

        let in_l2 = if self.l2.is_enabled() {
            match self.l2.delete(key).await {
                Ok(removed) => removed,
                Err(e) => {
                    self.stats.l2_errors.fetch_add(1, Ordering::Relaxed);
                    warn!(key = %key, error = %e, "L2 delete failed");
                    false
                }
            }
        } else {
            false
        };

        let existed = in_l1 || in_l2;
        if existed {
            self.stats.deletes.fetch_add(1, Ordering::Relaxed);
            debug!(key = %key, in_l1 = in_l1, in_l2 = in_l2, "Cache delete");
            self.fire(CacheEvent::DeleteSuccess, key, None, None);
        }
        existed
    }

    /// Whether either tier currently holds `key`
    pub async fn exists(&self, key: &str) -> bool {
        if self.l1.as_ref().is_some_and(|l1| l1.contains(key)) {
            return true;
        }

        if !self.l2.is_enabled() {
            return false;
        }

        match self.l2.exists(key).await {
            Ok(found) => found,
            Err(e) => {
                self.stats.l2_errors.fetch_add(1, Ordering::Relaxed);
                warn!(key = %key, error = %e, "L2 exists check failed");
                false
            }
        }
    }

    /// Drop every L1 entry; L2 is untouched
    pub fn clear_l1(&self) {
        if let Some(l1) = &self.l1 {
            l1.clear();
            info!("L1 cache cleared");
        }
    }

    pub fn l2_connected(&self) -> bool {
        self.l2.is_connected()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            l1_hits: self.stats.l1_hits.load(Ordering::Relaxed),
            l2_hits: self.stats.l2_hits.load(Ordering::Relaxed),
            misses: self.stats.misses.load(Ordering::Relaxed),
            sets: self.stats.sets.load(Ordering::Relaxed),
            deletes: self.stats.deletes.load(Ordering::Relaxed),
            l2_errors: self.stats.l2_errors.load(Ordering::Relaxed),
            callback_errors: self.stats.callback_errors.load(Ordering::Relaxed),
            l1_entries: self.l1.as_ref().map(|l1| l1.entry_count()).unwrap_or(0),
        }
    }

    pub async fn health_check(&self) -> CacheHealth {
        let (l2_healthy, l2_error) = if self.l2.is_enabled() {
            match self.l2.health_check().await {
                Ok(healthy) => (healthy, None),
                Err(e) => (false, Some(e.to_string())),
            }
        } else {
            (false, None)
        };

        CacheHealth {
            l1_enabled: self.l1.is_some(),
            l1_entries: self.l1.as_ref().map(|l1| l1.entry_count()).unwrap_or(0),
            l2_enabled: self.l2.is_enabled(),
            l2_provider: self.l2.provider_name().to_string(),
            l2_healthy,
            l2_error,
        }
    }

    async fn get_from_l2(&self, key: &str) -> Option<Vec<u8>> {
        if !self.l2.is_enabled() {
            return None;
        }

        let payload = match self.l2.get(key).await {
            Ok(Some(payload)) => payload,
            Ok(None) => return None,
            Err(e) => {
                self.stats.l2_errors.fetch_add(1, Ordering::Relaxed);
                warn!(key = %key, error = %e, "L2 read failed, treating as miss");
                return None;
            }
        };

        match self.codec.decode(&payload) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key = %key, error = %e, "L2 payload could not be decoded, treating as miss");
                None
            }
        }
    }

    fn fire(
        &self,
        event: CacheEvent,
        key: &str,
        tier: Option<CacheTier>,
        size_bytes: Option<usize>,
    ) {
        let callbacks = match self.callbacks.read().get(&event) {
            Some(callbacks) => callbacks.clone(),
            None => return,
        };

        let data = CacheEventData {
            event,
            key,
            tier,
            size_bytes,
        };

        for (index, callback) in callbacks.iter().enumerate() {
            match catch_unwind(AssertUnwindSafe(|| callback(&data))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    self.stats.callback_errors.fetch_add(1, Ordering::Relaxed);
                    warn!(event = %event, key = %key, callback = index, error = %e, "Cache callback failed");
                }
                Err(_) => {
                    self.stats.callback_errors.fetch_add(1, Ordering::Relaxed);
                    error!(event = %event, key = %key, callback = index, "Cache callback panicked");
                }
            }
        }
    }
}
