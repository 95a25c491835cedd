use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::timeout;

use super::{Cache, CacheStats};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(3);
const SCAN_BATCH: usize = 500;

/// Shared wallet cache in Redis
///
/// Values are bincode-encoded under `<prefix>:<key>` and written with `SET EX`.
#[derive(Clone)]
pub struct RedisCache {
    connection: ConnectionManager,
    prefix: String,
    hits: Arc<AtomicU64>,
    misses: Arc<AtomicU64>,
    evictions: Arc<AtomicU64>,
}

impl RedisCache {
    pub async fn new(url: &str, prefix: &str) -> Result<Self> {
        Self::with_timeout(url, prefix, CONNECT_TIMEOUT).await
    }

    pub async fn with_timeout(url: &str, prefix: &str, connect_timeout: Duration) -> Result<Self> {
        if url.trim().is_empty() {
            bail!("cache.redis_url is required for the redis backend");
        }

        let client = Client::open(url).context("Failed to create Redis client")?;
        let connection = timeout(connect_timeout, ConnectionManager::new(client))
            .await
            .with_context(|| format!("Redis connection timeout after {:?} at {}", connect_timeout, url))?
            .context("Failed to create Redis connection manager")?;

        Ok(Self {
            connection,
            prefix: format!("{}:", prefix),
            hits: Arc::new(AtomicU64::new(0)),
            misses: Arc::new(AtomicU64::new(0)),
            evictions: Arc::new(AtomicU64::new(0)),
        })
    }

    fn build_key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    /// Every key under our prefix, via incremental `SCAN`
    async fn prefixed_keys(&self) -> Result<Vec<String>> {
        let mut conn = self.connection.clone();
        let pattern = format!("{}*", self.prefix);
        let mut cursor: u64 = 0;
        let mut keys = Vec::new();

        loop {
            let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut conn)
                .await
                .context("Failed to scan keys in Redis")?;
            keys.extend(batch);
            if next == 0 {
                return Ok(keys);
            }
            cursor = next;
        }
    }
}

impl std::fmt::Debug for RedisCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisCache")
            .field("prefix", &self.prefix)
            .field("hits", &self.hits)
            .field("misses", &self.misses)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Cache for RedisCache {
    #[tracing::instrument(skip(self), fields(cache_key = %key))]
    async fn get<V>(&self, key: &str) -> Result<Option<V>>
    where
        V: for<'de> Deserialize<'de> + Serialize + Send + Sync,
    {
        let mut conn = self.connection.clone();
        let bytes: Option<Vec<u8>> = conn
            .get(self.build_key(key))
            .await
            .context("Failed to get value from Redis")?;

        match bytes {
            Some(bytes) => {
                let value = bincode::deserialize(&bytes).context("Failed to decode cached value")?;
                self.hits.fetch_add(1, Ordering::Relaxed);
                Ok(Some(value))
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                Ok(None)
            }
        }
    }

    #[tracing::instrument(skip(self, value), fields(cache_key = %key, ttl_secs = ttl.as_secs()))]
    async fn set<V>(&self, key: &str, value: &V, ttl: Duration) -> Result<()>
    where
        V: Serialize + Send + Sync,
    {
        let bytes = bincode::serialize(value).context("Failed to encode value for cache")?;
        let mut conn = self.connection.clone();
        // Redis rejects EX 0
        let ttl_secs = ttl.as_secs().max(1);
        let _: () = conn
            .set_ex(self.build_key(key), bytes, ttl_secs)
            .await
            .context("Failed to set value in Redis")?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut conn = self.connection.clone();
        let deleted: u64 = conn
            .del(self.build_key(key))
            .await
            .context("Failed to delete value from Redis")?;
        self.evictions.fetch_add(deleted, Ordering::Relaxed);
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let mut conn = self.connection.clone();
        conn.exists(self.build_key(key))
            .await
            .context("Failed to check key in Redis")
    }

    #[tracing::instrument(skip(self))]
    async fn clear(&self) -> Result<()> {
        let keys = self.prefixed_keys().await?;
        if keys.is_empty() {
            return Ok(());
        }

        let mut conn = self.connection.clone();
        let deleted: u64 = conn.del(&keys).await.context("Failed to clear keys from Redis")?;
        self.evictions.fetch_add(deleted, Ordering::Relaxed);
        ::tracing::info!(cleared_entries = deleted, "Redis cache cleared");
        Ok(())
    }

    async fn stats(&self) -> Result<CacheStats> {
        let mut stats = CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            size: self.prefixed_keys().await?.len(),
            hit_rate: 0.0,
        };
        stats.calculate_hit_rate();
        Ok(stats)
    }

    async fn ping(&self) -> Result<()> {
        let mut conn = self.connection.clone();
        let reply: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .context("Redis PING failed")?;
        if reply != "PONG" {
            bail!("Unexpected PING reply from Redis: {}", reply);
        }
        Ok(())
    }
}
