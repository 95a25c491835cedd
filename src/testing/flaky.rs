use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use anyhow::{Result, bail};
use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::cache::{Cache, CacheStats};

/// Cache that can be switched off to simulate an unreachable backend
///
/// Entries never expire. Every call, successful or not, is counted.
#[derive(Debug)]
pub struct FlakyCache {
    entries: DashMap<String, Vec<u8>>,
    available: AtomicBool,
    calls: AtomicU64,
}

impl Default for FlakyCache {
    fn default() -> Self {
        Self {
            entries: DashMap::new(),
            available: AtomicBool::new(true),
            calls: AtomicU64::new(0),
        }
    }
}

impl FlakyCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn check(&self) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.available.load(Ordering::SeqCst) {
            bail!("cache backend unreachable");
        }
        Ok(())
    }
}

#[async_trait]
impl Cache for FlakyCache {
    async fn get<V>(&self, key: &str) -> Result<Option<V>>
    where
        V: for<'de> Deserialize<'de> + Serialize + Send + Sync,
    {
        self.check()?;
        match self.entries.get(key) {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn set<V>(&self, key: &str, value: &V, _ttl: Duration) -> Result<()>
    where
        V: Serialize + Send + Sync,
    {
        self.check()?;
        self.entries.insert(key.to_string(), bincode::serialize(value)?);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.check()?;
        self.entries.remove(key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        self.check()?;
        Ok(self.entries.contains_key(key))
    }

    async fn clear(&self) -> Result<()> {
        self.check()?;
        self.entries.clear();
        Ok(())
    }

    async fn stats(&self) -> Result<CacheStats> {
        self.check()?;
        Ok(CacheStats {
            size: self.entries.len(),
            ..CacheStats::default()
        })
    }

    async fn ping(&self) -> Result<()> {
        self.check()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unavailable_cache_fails_every_call() {
        let cache = FlakyCache::new();
        cache.set("k", &1u32, Duration::from_secs(1)).await.unwrap();

        cache.set_available(false);
        assert!(cache.get::<u32>("k").await.is_err());
        assert!(cache.ping().await.is_err());

        cache.set_available(true);
        assert_eq!(cache.get::<u32>("k").await.unwrap(), Some(1));
        assert_eq!(cache.calls(), 4);
    }
}
