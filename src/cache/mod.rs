//! # Tiered Cache
//!
//! In-process L1 ([`MemoryCache`]) in front of a pluggable L2
//! ([`L2Backend`], Redis in production), with threshold compression of L2
//! payloads and lifecycle callbacks. See [`TieredCache`] for the read and
//! write paths.

pub mod compression;
pub mod errors;
pub mod memory;
pub mod providers;
pub mod tiered;
pub mod traits;

pub use compression::{CompressionCodec, COMPRESSED_PREFIX, RAW_PREFIX};
pub use errors::{CacheError, CacheResult};
pub use memory::MemoryCache;
pub use providers::{InMemoryCacheService, L2Backend, NoOpCacheService};
pub use tiered::{CacheEvent, CacheEventData, CacheHealth, CacheStats, CacheTier, TieredCache};
pub use traits::CacheService;

#[cfg(feature = "cache-redis")]
pub use providers::RedisCacheService;
