use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{Cache, CacheStats};

/// Cache that stores nothing
///
/// Selected by `cache.backend = "none"`. Every read misses, so balance reads
/// always go to the store.
#[derive(Debug, Clone, Default)]
pub struct NullCache;

impl NullCache {
    pub fn new() -> Self {
        NullCache
    }
}

#[async_trait]
impl Cache for NullCache {
    async fn get<V>(&self, _key: &str) -> Result<Option<V>>
    where
        V: for<'de> Deserialize<'de> + Serialize + Send + Sync,
    {
        Ok(None)
    }

    async fn set<V>(&self, _key: &str, _value: &V, _ttl: Duration) -> Result<()>
    where
        V: Serialize + Send + Sync,
    {
        Ok(())
    }

    async fn delete(&self, _key: &str) -> Result<()> {
        Ok(())
    }

    async fn exists(&self, _key: &str) -> Result<bool> {
        Ok(false)
    }

    async fn clear(&self) -> Result<()> {
        Ok(())
    }

    async fn stats(&self) -> Result<CacheStats> {
        Ok(CacheStats::new())
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}
