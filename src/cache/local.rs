use anyhow::{Context, Result};
use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

use super::{Cache, CacheStats};

const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
struct Slot {
    /// bincode-encoded value
    bytes: Vec<u8>,
    expires_at: Instant,
}

impl Slot {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

/// Process-local wallet cache on a sharded `DashMap`
#[derive(Debug)]
pub struct LocalCache {
    slots: Arc<DashMap<String, Slot>>,
    counters: Arc<Counters>,
    sweeper: Option<JoinHandle<()>>,
}

impl LocalCache {
    /// Shard count defaults to four per CPU
    pub fn new() -> Self {
        Self::with_shard_count(num_cpus::get() * 4)
    }

    /// `shard_count` is rounded up to a power of two, as `DashMap` requires
    pub fn with_shard_count(shard_count: usize) -> Self {
        let shard_count = shard_count.max(2).next_power_of_two();
        let slots = Arc::new(DashMap::with_shard_amount(shard_count));
        let counters = Arc::new(Counters::default());

        // Built outside a runtime (config tests, sync setup) the sweep is skipped
        // and expired slots are dropped lazily on access.
        let sweeper = tokio::runtime::Handle::try_current()
            .ok()
            .map(|handle| handle.spawn(Self::sweep(Arc::clone(&slots), Arc::clone(&counters))));

        Self {
            slots,
            counters,
            sweeper,
        }
    }

    async fn sweep(slots: Arc<DashMap<String, Slot>>, counters: Arc<Counters>) {
        let mut interval = tokio::time::interval(SWEEP_INTERVAL);
        loop {
            interval.tick().await;
            let now = Instant::now();
            let before = slots.len();
            slots.retain(|_, slot| !slot.is_expired(now));
            let removed = before.saturating_sub(slots.len()) as u64;
            if removed > 0 {
                counters.evictions.fetch_add(removed, Ordering::Relaxed);
                tracing::trace!(removed, "Swept expired cache slots");
            }
        }
    }

    /// Present and unexpired; an expired slot is evicted on the way
    fn live_slot(&self, key: &str) -> Option<Vec<u8>> {
        let now = Instant::now();
        let slot = self.slots.get(key)?;
        if slot.is_expired(now) {
            drop(slot);
            if self.slots.remove(key).is_some() {
                self.counters.evictions.fetch_add(1, Ordering::Relaxed);
            }
            return None;
        }
        Some(slot.bytes.clone())
    }
}

impl Default for LocalCache {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for LocalCache {
    fn drop(&mut self) {
        if let Some(handle) = self.sweeper.take() {
            handle.abort();
        }
    }
}

#[async_trait]
impl Cache for LocalCache {
    async fn get<V>(&self, key: &str) -> Result<Option<V>>
    where
        V: for<'de> Deserialize<'de> + Serialize + Send + Sync,
    {
        match self.live_slot(key) {
            Some(bytes) => {
                let value = bincode::deserialize(&bytes).context("Failed to decode cached value")?;
                self.counters.hits.fetch_add(1, Ordering::Relaxed);
                Ok(Some(value))
            }
            None => {
                self.counters.misses.fetch_add(1, Ordering::Relaxed);
                Ok(None)
            }
        }
    }

    async fn set<V>(&self, key: &str, value: &V, ttl: Duration) -> Result<()>
    where
        V: Serialize + Send + Sync,
    {
        let bytes = bincode::serialize(value).context("Failed to encode value for cache")?;
        self.slots.insert(
            key.to_string(),
            Slot {
                bytes,
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.slots.remove(key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.live_slot(key).is_some())
    }

    async fn clear(&self) -> Result<()> {
        self.slots.clear();
        Ok(())
    }

    async fn stats(&self) -> Result<CacheStats> {
        let mut stats = CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            evictions: self.counters.evictions.load(Ordering::Relaxed),
            size: self.slots.len(),
            hit_rate: 0.0,
        };
        stats.calculate_hit_rate();
        Ok(stats)
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Currency, Wallet};
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn wallet() -> Wallet {
        let currency: Currency = "USD".parse().unwrap();
        Wallet::open("user-1".to_string(), currency, Utc::now())
    }

    #[tokio::test]
    async fn test_wallet_round_trip_keeps_balance_precision() {
        let cache = LocalCache::new();
        let wallet = wallet().credited(dec!(10.0005), Utc::now()).unwrap();

        cache.set("wallet:a", &wallet, Duration::from_secs(60)).await.unwrap();
        let cached: Option<Wallet> = cache.get("wallet:a").await.unwrap();

        let cached = cached.unwrap();
        assert_eq!(cached.balance, dec!(10.0005));
        assert_eq!(cached.version, wallet.version);
    }

    #[tokio::test]
    async fn test_miss_and_hit_are_counted() {
        let cache = LocalCache::new();

        let missing: Option<Wallet> = cache.get("wallet:none").await.unwrap();
        assert!(missing.is_none());

        cache.set("wallet:b", &wallet(), Duration::from_secs(60)).await.unwrap();
        let _: Option<Wallet> = cache.get("wallet:b").await.unwrap();

        let stats = cache.stats().await.unwrap();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.size, 1);
        assert_eq!(stats.hit_rate, 0.5);
    }

    #[tokio::test]
    async fn test_expired_slot_is_evicted_on_read() {
        let cache = LocalCache::new();
        cache.set("wallet:c", &wallet(), Duration::from_millis(20)).await.unwrap();
        assert!(cache.exists("wallet:c").await.unwrap());

        tokio::time::sleep(Duration::from_millis(40)).await;

        let value: Option<Wallet> = cache.get("wallet:c").await.unwrap();
        assert!(value.is_none());
        assert_eq!(cache.stats().await.unwrap().evictions, 1);
    }

    #[tokio::test]
    async fn test_delete_and_clear() {
        let cache = LocalCache::with_shard_count(8);
        cache.set("a", &1u32, Duration::from_secs(60)).await.unwrap();
        cache.set("b", &2u32, Duration::from_secs(60)).await.unwrap();

        cache.delete("a").await.unwrap();
        assert!(!cache.exists("a").await.unwrap());

        cache.clear().await.unwrap();
        assert_eq!(cache.stats().await.unwrap().size, 0);
    }

    #[test]
    fn test_builds_without_runtime() {
        let cache = LocalCache::with_shard_count(3);
        assert!(cache.sweeper.is_none());
    }

    #[tokio::test]
    async fn test_ping_is_always_ok() {
        assert!(LocalCache::new().ping().await.is_ok());
    }
}
