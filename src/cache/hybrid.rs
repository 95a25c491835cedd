use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{Cache, CacheStats, LocalCache, NullCache};

const DEFAULT_BACKFILL_TTL: Duration = Duration::from_secs(60);

/// Two-tier cache: a process-local L1 in front of an optional shared L2
///
/// Reads check L1, then L2, backfilling L1 on an L2 hit. Writes and deletes go
/// to both tiers. Unlike a plain best-effort layer, L2 errors are returned to
/// the caller: [`crate::adapters::CacheAdapter`] counts them against the cache
/// breaker and decides when to bypass the cache entirely.
pub struct HybridCache<R: Cache = NullCache> {
    l1: LocalCache,
    l2: Option<R>,
    backfill_ttl: Duration,
}

impl<R: Cache> HybridCache<R> {
    pub fn new(l1: LocalCache, l2: Option<R>) -> Self {
        Self {
            l1,
            l2,
            backfill_ttl: DEFAULT_BACKFILL_TTL,
        }
    }

    /// TTL for values copied from L2 into L1
    pub fn with_backfill_ttl(mut self, ttl: Duration) -> Self {
        self.backfill_ttl = ttl;
        self
    }

    pub fn has_l2(&self) -> bool {
        self.l2.is_some()
    }
}

impl HybridCache<NullCache> {
    pub fn local_only() -> Self {
        Self::new(LocalCache::new(), None)
    }
}

impl<R: Cache> std::fmt::Debug for HybridCache<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HybridCache")
            .field("l1", &self.l1)
            .field("l2_enabled", &self.has_l2())
            .finish()
    }
}

#[async_trait]
impl<R: Cache> Cache for HybridCache<R> {
    #[tracing::instrument(skip(self), fields(cache_key = %key))]
    async fn get<V>(&self, key: &str) -> Result<Option<V>>
    where
        V: for<'de> Deserialize<'de> + Serialize + Send + Sync,
    {
        match self.l1.get::<V>(key).await {
            Ok(Some(value)) => return Ok(Some(value)),
            Ok(None) => {}
            Err(e) => ::tracing::warn!(error = %e, "L1 cache error, trying L2"),
        }

        let Some(l2) = &self.l2 else {
            return Ok(None);
        };

        let value = l2.get::<V>(key).await.context("L2 cache read failed")?;
        if let Some(value) = &value {
            if let Err(e) = self.l1.set(key, value, self.backfill_ttl).await {
                ::tracing::warn!(error = %e, "Failed to backfill L1 cache");
            }
        }
        Ok(value)
    }

    async fn set<V>(&self, key: &str, value: &V, ttl: Duration) -> Result<()>
    where
        V: Serialize + Send + Sync,
    {
        self.l1.set(key, value, ttl).await.context("Failed to write to L1 cache")?;
        if let Some(l2) = &self.l2 {
            l2.set(key, value, ttl).await.context("Failed to write to L2 cache")?;
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.l1.delete(key).await?;
        if let Some(l2) = &self.l2 {
            l2.delete(key).await.context("Failed to delete from L2 cache")?;
        }
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        if self.l1.exists(key).await? {
            return Ok(true);
        }
        match &self.l2 {
            Some(l2) => l2.exists(key).await,
            None => Ok(false),
        }
    }

    #[tracing::instrument(skip(self))]
    async fn clear(&self) -> Result<()> {
        self.l1.clear().await?;
        if let Some(l2) = &self.l2 {
            l2.clear().await.context("Failed to clear L2 cache")?;
        }
        Ok(())
    }

    async fn stats(&self) -> Result<CacheStats> {
        let l1_stats = self.l1.stats().await?;
        let Some(l2) = &self.l2 else {
            return Ok(l1_stats);
        };

        match l2.stats().await {
            Ok(l2_stats) => {
                let mut combined = CacheStats {
                    hits: l1_stats.hits + l2_stats.hits,
                    misses: l1_stats.misses + l2_stats.misses,
                    evictions: l1_stats.evictions + l2_stats.evictions,
                    size: l1_stats.size + l2_stats.size,
                    hit_rate: 0.0,
                };
                combined.calculate_hit_rate();
                Ok(combined)
            }
            Err(e) => {
                ::tracing::warn!(error = %e, "L2 stats unavailable, reporting L1 only");
                Ok(l1_stats)
            }
        }
    }

    async fn ping(&self) -> Result<()> {
        match &self.l2 {
            Some(l2) => l2.ping().await,
            None => self.l1.ping().await,
        }
    }
}
