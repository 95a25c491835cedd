use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use uuid::Uuid;

use super::{LedgerStoreAdapter, ReadSource};
use crate::cache::{Cache, CacheKey};
use crate::config::CircuitBreakerSettings;
use crate::error::LedgerError;
use crate::models::Wallet;
use crate::resilience::{CircuitBreaker, CircuitBreakerError, CircuitState, DegradationCoordinator, DegradedMode};

/// Breaker-protected wallet cache
///
/// The cache is optional: a failed `get` is served by the store, and failed
/// `put`/`invalidate` calls are logged and dropped. Any failure enters cache
/// bypass mode, in which reads skip the cache until recovery.
pub struct CacheAdapter<C: Cache> {
    cache: Arc<C>,
    breaker: CircuitBreaker,
    coordinator: Arc<DegradationCoordinator>,
    store: Arc<LedgerStoreAdapter>,
    ttl: Duration,
}

impl<C: Cache> CacheAdapter<C> {
    pub fn new(
        cache: Arc<C>,
        settings: &CircuitBreakerSettings,
        coordinator: Arc<DegradationCoordinator>,
        store: Arc<LedgerStoreAdapter>,
        ttl: Duration,
    ) -> Self {
        Self {
            cache,
            breaker: CircuitBreaker::with_config("cache", settings.to_breaker_config())
                .with_observer(coordinator.clone()),
            coordinator,
            store,
            ttl,
        }
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    pub fn is_bypassed(&self) -> bool {
        self.coordinator.is_active(DegradedMode::CacheBypass)
    }

    /// Cached wallet, or the store's copy on a miss, failure or bypass
    pub async fn get_wallet(&self, id: Uuid) -> Result<(Option<Wallet>, ReadSource), LedgerError> {
        if self.is_bypassed() {
            return self.store.read_wallet(id).await;
        }

        let key = CacheKey::wallet(id);
        match self.breaker.call(self.cache.get::<Wallet>(&key)).await {
            Ok(Some(wallet)) => {
                counter!("cache_hits_total").increment(1);
                return Ok((Some(wallet), ReadSource::Cache));
            }
            Ok(None) => {
                counter!("cache_misses_total").increment(1);
            }
            Err(err) => {
                self.on_failure("get", &err);
                return self.store.read_wallet(id).await;
            }
        }

        let (wallet, source) = self.store.read_wallet(id).await?;
        if let Some(wallet) = &wallet {
            self.put_wallet(wallet).await;
        }
        Ok((wallet, source))
    }

    /// Best-effort write-through
    pub async fn put_wallet(&self, wallet: &Wallet) {
        if self.is_bypassed() {
            return;
        }
        let key = CacheKey::wallet(wallet.id);
        if let Err(err) = self.breaker.call(self.cache.set(&key, wallet, self.ttl)).await {
            self.on_failure("put", &err);
        }
    }

    /// Best-effort removal
    pub async fn invalidate(&self, id: Uuid) {
        let key = CacheKey::wallet(id);
        if let Err(err) = self.breaker.call(self.cache.delete(&key)).await {
            self.on_failure("invalidate", &err);
        }
    }

    /// Ping the cache directly; on success leave bypass mode with an empty cache
    ///
    /// Entries written before the outage may be stale, so they are dropped.
    /// Returns whether the cache answered.
    pub async fn recover(&self) -> bool {
        let timeout = self.breaker.config().call_timeout.unwrap_or(Duration::from_secs(1));
        match tokio::time::timeout(timeout, self.cache.ping()).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                tracing::debug!(error = %err, "Cache ping failed");
                return false;
            }
            Err(_) => {
                tracing::debug!("Cache ping timed out");
                return false;
            }
        }

        if self.breaker.state() == CircuitState::Open {
            self.breaker.allow_trial();
        }
        if let Err(err) = self.cache.clear().await {
            tracing::warn!(error = %err, "Cache answered the ping but could not be cleared");
            return false;
        }
        if let Some(duration) = self.coordinator.exit_cache_bypass_mode() {
            tracing::info!(duration_ms = duration.as_millis() as u64, "Cache back in use");
        }
        true
    }

    fn on_failure(&self, operation: &'static str, err: &CircuitBreakerError<anyhow::Error>) {
        counter!("cache_failures_total", "operation" => operation).increment(1);
        // An open breaker only rejected the call; bypass follows real failures
        if let CircuitBreakerError::Open { .. } = err {
            tracing::debug!(operation, error = %err, "Cache call rejected");
            return;
        }
        tracing::warn!(operation, error = %err, "Cache call failed");
        self.coordinator
            .enter_cache_bypass_mode(&format!("cache {operation} failed: {err}"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::LocalCache;
    use crate::config::ResilienceConfig;
    use crate::models::{LedgerEvent, OutboxRecord};
    use crate::resilience::FailurePatterns;
    use crate::store::{InMemoryLedgerStore, UnitOfWork};
    use crate::testing::FlakyCache;
    use chrono::Utc;

    async fn seeded_store() -> (Arc<LedgerStoreAdapter>, Arc<DegradationCoordinator>, Wallet) {
        let config = ResilienceConfig::default();
        let coordinator = Arc::new(DegradationCoordinator::new());
        let primary = InMemoryLedgerStore::new();
        let store = Arc::new(LedgerStoreAdapter::new(
            Arc::new(primary.clone()),
            Arc::new(primary.replica_handle()),
            &config,
            coordinator.clone(),
            Arc::new(FailurePatterns::new(&config)),
        ));

        let wallet = Wallet::open("user-1", "EUR".parse().unwrap(), Utc::now());
        let event = LedgerEvent::WalletCreated {
            wallet_id: wallet.id,
            user_id: wallet.user_id.clone(),
            currency: wallet.currency.clone(),
            occurred_at: wallet.created_at,
        };
        store
            .write(&UnitOfWork::new(OutboxRecord::stage(&event).unwrap()).insert_wallet(wallet.clone()))
            .await
            .unwrap();
        (store, coordinator, wallet)
    }

    #[tokio::test]
    async fn test_miss_populates_cache_then_hits() {
        let (store, coordinator, wallet) = seeded_store().await;
        let adapter = CacheAdapter::new(
            Arc::new(LocalCache::new()),
            &CircuitBreakerSettings::default(),
            coordinator,
            store,
            Duration::from_secs(60),
        );

        let (_, first) = adapter.get_wallet(wallet.id).await.unwrap();
        let (cached, second) = adapter.get_wallet(wallet.id).await.unwrap();

        assert_eq!(first, ReadSource::Replica);
        assert_eq!(second, ReadSource::Cache);
        assert_eq!(cached.unwrap().id, wallet.id);
    }

    #[tokio::test]
    async fn test_failure_enters_bypass_and_serves_store() {
        let (store, coordinator, wallet) = seeded_store().await;
        let cache = Arc::new(FlakyCache::new());
        cache.set_available(false);
        let adapter = CacheAdapter::new(
            cache.clone(),
            &CircuitBreakerSettings::default(),
            coordinator.clone(),
            store,
            Duration::from_secs(60),
        );

        let (read, source) = adapter.get_wallet(wallet.id).await.unwrap();
        assert_eq!(read.unwrap().id, wallet.id);
        assert_eq!(source, ReadSource::Replica);
        assert!(coordinator.is_active(DegradedMode::CacheBypass));

        let calls = cache.calls();
        adapter.get_wallet(wallet.id).await.unwrap();
        assert_eq!(cache.calls(), calls);
    }

    #[tokio::test]
    async fn test_open_breaker_rejection_does_not_enter_bypass() {
        let (store, coordinator, wallet) = seeded_store().await;
        let cache = Arc::new(FlakyCache::new());
        let adapter = CacheAdapter::new(
            cache.clone(),
            &CircuitBreakerSettings::default(),
            coordinator.clone(),
            store,
            Duration::from_secs(60),
        );
        adapter.breaker().force_open("maintenance");

        let (read, source) = adapter.get_wallet(wallet.id).await.unwrap();
        assert_eq!(read.unwrap().id, wallet.id);
        assert_eq!(source, ReadSource::Replica);
        assert!(!coordinator.is_active(DegradedMode::CacheBypass));
        assert_eq!(cache.calls(), 0);
    }

    #[tokio::test]
    async fn test_recover_clears_cache_and_exits_bypass() {
        let (store, coordinator, wallet) = seeded_store().await;
        let cache = Arc::new(FlakyCache::new());
        let adapter = CacheAdapter::new(
            cache.clone(),
            &CircuitBreakerSettings::default(),
            coordinator.clone(),
            store,
            Duration::from_secs(60),
        );
        adapter.put_wallet(&wallet).await;
        cache.set_available(false);
        adapter.invalidate(wallet.id).await;
        assert!(adapter.is_bypassed());

        assert!(!adapter.recover().await);
        cache.set_available(true);
        assert!(adapter.recover().await);

        assert!(!adapter.is_bypassed());
        assert_eq!(cache.len(), 0);
    }
}
