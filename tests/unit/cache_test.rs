// Unit tests for cache backends
// Tests LocalCache, HybridCache, NullCache and backend selection

use std::time::Duration;
use wallet_ledger::cache::{AnyCache, Cache, CacheKey, HybridCache, LocalCache, NullCache};
use wallet_ledger::config::{CacheBackend, CacheConfig};
use wallet_ledger::models::Wallet;
use wallet_ledger::testing::FlakyCache;

fn wallet() -> Wallet {
    Wallet::open("alice", "USD".parse().unwrap(), chrono::Utc::now())
}

// ============================================================================
// Backend selection
// ============================================================================

#[tokio::test]
async fn test_from_config_local() {
    let config = CacheConfig::default();
    let cache = AnyCache::from_config(&config).await.unwrap();
    assert!(matches!(cache, AnyCache::Local(_)));

    let wallet = wallet();
    let key = CacheKey::wallet(wallet.id);
    cache.set(&key, &wallet, Duration::from_secs(60)).await.unwrap();
    let cached: Option<Wallet> = cache.get(&key).await.unwrap();
    assert_eq!(cached.map(|w| w.id), Some(wallet.id));
}

#[tokio::test]
async fn test_from_config_none_never_stores() {
    let config = CacheConfig {
        backend: CacheBackend::None,
        ..CacheConfig::default()
    };
    let cache = AnyCache::from_config(&config).await.unwrap();
    assert!(matches!(cache, AnyCache::Null(_)));

    cache.set("wallet:1", &wallet(), Duration::from_secs(60)).await.unwrap();
    let cached: Option<Wallet> = cache.get("wallet:1").await.unwrap();
    assert!(cached.is_none());
    assert!(cache.ping().await.is_ok());
}

// ============================================================================
// LocalCache
// ============================================================================

#[tokio::test]
async fn test_local_cache_expiry() {
    let cache = LocalCache::new();
    cache.set("short", &"value", Duration::from_millis(20)).await.unwrap();
    assert!(cache.exists("short").await.unwrap());

    tokio::time::sleep(Duration::from_millis(40)).await;
    let value: Option<String> = cache.get("short").await.unwrap();
    assert!(value.is_none());
}

#[tokio::test]
async fn test_local_cache_delete_and_clear() {
    let cache = LocalCache::new();
    for n in 0..3 {
        cache.set(&format!("key{n}"), &n, Duration::from_secs(60)).await.unwrap();
    }

    cache.delete("key0").await.unwrap();
    assert!(!cache.exists("key0").await.unwrap());
    assert!(cache.exists("key1").await.unwrap());

    cache.clear().await.unwrap();
    assert_eq!(cache.stats().await.unwrap().size, 0);
}

#[tokio::test]
async fn test_local_cache_stats_track_hits() {
    let cache = LocalCache::new();
    cache.set("key", &1u32, Duration::from_secs(60)).await.unwrap();

    let _: Option<u32> = cache.get("key").await.unwrap();
    let _: Option<u32> = cache.get("missing").await.unwrap();

    let stats = cache.stats().await.unwrap();
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.hit_rate, 0.5);
}

// ============================================================================
// HybridCache
// ============================================================================

#[tokio::test]
async fn test_hybrid_local_only() {
    let cache = HybridCache::local_only();
    assert!(!cache.has_l2());

    cache.set("key", &"value", Duration::from_secs(60)).await.unwrap();
    let value: Option<String> = cache.get("key").await.unwrap();
    assert_eq!(value.as_deref(), Some("value"));
    assert!(cache.ping().await.is_ok());
}

#[tokio::test]
async fn test_hybrid_backfills_l1_from_l2() {
    let l2 = FlakyCache::new();
    l2.set("key", &7u64, Duration::from_secs(60)).await.unwrap();
    let cache = HybridCache::new(LocalCache::new(), Some(l2));

    let first: Option<u64> = cache.get("key").await.unwrap();
    assert_eq!(first, Some(7));
    assert_eq!(cache.stats().await.unwrap().size, 2);
}

#[tokio::test]
async fn test_hybrid_propagates_l2_errors() {
    let l2 = FlakyCache::new();
    l2.set_available(false);
    let cache = HybridCache::new(LocalCache::new(), Some(l2));

    assert!(cache.set("key", &1u32, Duration::from_secs(60)).await.is_err());
    let miss: anyhow::Result<Option<u32>> = cache.get("other").await;
    assert!(miss.is_err());
    assert!(cache.ping().await.is_err());
}

#[tokio::test]
async fn test_null_cache_is_always_empty() {
    let cache = NullCache::new();
    cache.set("key", &1u32, Duration::from_secs(60)).await.unwrap();
    assert!(!cache.exists("key").await.unwrap());
}
