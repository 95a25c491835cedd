//! Wallet read-through cache backends
//!
//! The cache is always optional. Callers treat every error as a miss, and
//! [`crate::adapters::CacheAdapter`] decides when to stop using it altogether.

mod hybrid;
mod local;
mod null;
#[cfg(feature = "redis-cache")]
mod redis;

pub use hybrid::HybridCache;
pub use local::LocalCache;
pub use null::NullCache;
#[cfg(feature = "redis-cache")]
pub use redis::RedisCache;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::time::Duration;

use crate::config::{CacheBackend, CacheConfig};

/// Generic cache trait for storing and retrieving data
#[async_trait]
pub trait Cache: Send + Sync + Debug {
    /// Get a value from the cache
    ///
    /// Returns None if the key doesn't exist or has expired. `V: Serialize` lets
    /// layered caches backfill the faster tier.
    async fn get<V>(&self, key: &str) -> Result<Option<V>>
    where
        V: for<'de> Deserialize<'de> + Serialize + Send + Sync;

    /// Set a value in the cache with a TTL (time-to-live)
    async fn set<V>(&self, key: &str, value: &V, ttl: Duration) -> Result<()>
    where
        V: Serialize + Send + Sync;

    /// Delete a key from the cache
    async fn delete(&self, key: &str) -> Result<()>;

    /// Check if a key exists in the cache
    async fn exists(&self, key: &str) -> Result<bool>;

    /// Clear all keys from the cache
    async fn clear(&self) -> Result<()>;

    /// Get cache statistics
    async fn stats(&self) -> Result<CacheStats>;

    /// Round-trip to the backend; `Ok` means it is serving requests
    async fn ping(&self) -> Result<()>;
}

/// Statistics about cache performance
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub size: usize,
    /// Hit rate as a fraction (0.0 to 1.0)
    pub hit_rate: f64,
}

impl CacheStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Calculate hit rate from hits and misses
    pub fn calculate_hit_rate(&mut self) {
        let total = self.hits + self.misses;
        self.hit_rate = if total > 0 {
            self.hits as f64 / total as f64
        } else {
            0.0
        };
    }
}

/// Builder for consistent cache key naming
pub struct CacheKey;

impl CacheKey {
    /// Build a wallet cache key
    pub fn wallet(id: impl std::fmt::Display) -> String {
        format!("wallet:{}", id)
    }

    /// Build a custom cache key with a prefix
    pub fn custom(prefix: &str, key: impl std::fmt::Display) -> String {
        format!("{}:{}", prefix, key)
    }
}

/// The backend selected by configuration
#[derive(Debug)]
pub enum AnyCache {
    Local(LocalCache),
    Null(NullCache),
    #[cfg(feature = "redis-cache")]
    Redis(RedisCache),
    #[cfg(feature = "redis-cache")]
    Hybrid(HybridCache<RedisCache>),
}

impl AnyCache {
    /// Build the configured backend
    ///
    /// Without the `redis-cache` feature, `redis` and `hybrid` fall back to a local cache.
    pub async fn from_config(config: &CacheConfig) -> Result<Self> {
        let local = || {
            if config.local_shards > 0 {
                LocalCache::with_shard_count(config.local_shards)
            } else {
                LocalCache::new()
            }
        };

        let cache = match config.backend {
            CacheBackend::None => AnyCache::Null(NullCache::new()),
            CacheBackend::Local => AnyCache::Local(local()),
            #[cfg(feature = "redis-cache")]
            CacheBackend::Redis => AnyCache::Redis(RedisCache::new(&config.redis_url, &config.prefix).await?),
            #[cfg(feature = "redis-cache")]
            CacheBackend::Hybrid => {
                let l2 = match RedisCache::new(&config.redis_url, &config.prefix).await {
                    Ok(redis) => Some(redis),
                    Err(e) => {
                        ::tracing::warn!(error = %e, "Redis unavailable, hybrid cache starts with L1 only");
                        None
                    }
                };
                AnyCache::Hybrid(
                    HybridCache::new(local(), l2).with_backfill_ttl(Duration::from_secs(config.wallet_ttl)),
                )
            }
            #[cfg(not(feature = "redis-cache"))]
            CacheBackend::Redis | CacheBackend::Hybrid => {
                ::tracing::warn!(
                    backend = ?config.backend,
                    "Built without the redis-cache feature, using the local cache"
                );
                AnyCache::Local(local())
            }
        };

        ::tracing::info!(backend = ?config.backend, "Cache initialized");
        Ok(cache)
    }
}

macro_rules! dispatch {
    ($self:ident, $cache:ident => $call:expr) => {
        match $self {
            AnyCache::Local($cache) => $call,
            AnyCache::Null($cache) => $call,
            #[cfg(feature = "redis-cache")]
            AnyCache::Redis($cache) => $call,
            #[cfg(feature = "redis-cache")]
            AnyCache::Hybrid($cache) => $call,
        }
    };
}

#[async_trait]
impl Cache for AnyCache {
    async fn get<V>(&self, key: &str) -> Result<Option<V>>
    where
        V: for<'de> Deserialize<'de> + Serialize + Send + Sync,
    {
        dispatch!(self, cache => cache.get(key).await)
    }

    async fn set<V>(&self, key: &str, value: &V, ttl: Duration) -> Result<()>
    where
        V: Serialize + Send + Sync,
    {
        dispatch!(self, cache => cache.set(key, value, ttl).await)
    }

    async fn delete(&self, key: &str) -> Result<()> {
        dispatch!(self, cache => cache.delete(key).await)
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        dispatch!(self, cache => cache.exists(key).await)
    }

    async fn clear(&self) -> Result<()> {
        dispatch!(self, cache => cache.clear().await)
    }

    async fn stats(&self) -> Result<CacheStats> {
        dispatch!(self, cache => cache.stats().await)
    }

    async fn ping(&self) -> Result<()> {
        dispatch!(self, cache => cache.ping().await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_key_wallet() {
        let key = CacheKey::wallet("123e4567-e89b-12d3-a456-426614174000");
        assert_eq!(key, "wallet:123e4567-e89b-12d3-a456-426614174000");
    }

    #[test]
    fn test_cache_key_custom() {
        let key = CacheKey::custom("balance", "abc");
        assert_eq!(key, "balance:abc");
    }

    #[test]
    fn test_cache_stats_calculate_hit_rate() {
        let mut stats = CacheStats {
            hits: 80,
            misses: 20,
            ..CacheStats::default()
        };

        stats.calculate_hit_rate();
        assert_eq!(stats.hit_rate, 0.8);
    }

    #[test]
    fn test_cache_stats_calculate_hit_rate_zero_total() {
        let mut stats = CacheStats::new();
        stats.calculate_hit_rate();
        assert_eq!(stats.hit_rate, 0.0);
    }

    #[tokio::test]
    async fn test_from_config_none_backend() {
        let config = CacheConfig {
            backend: CacheBackend::None,
            ..CacheConfig::default()
        };

        let cache = AnyCache::from_config(&config).await.unwrap();
        assert!(matches!(cache, AnyCache::Null(_)));
        assert!(cache.ping().await.is_ok());
    }

    #[tokio::test]
    async fn test_from_config_local_backend_round_trip() {
        let cache = AnyCache::from_config(&CacheConfig::default()).await.unwrap();

        cache.set("k", &"v".to_string(), Duration::from_secs(60)).await.unwrap();
        let value: Option<String> = cache.get("k").await.unwrap();
        assert_eq!(value.as_deref(), Some("v"));
    }
}
