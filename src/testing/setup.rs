use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use crate::adapters::{CacheAdapter, EventChannelAdapter, LedgerStoreAdapter};
use crate::cache::{Cache, LocalCache};
use crate::channel::InMemoryEventChannel;
use crate::config::{
    CircuitBreakerSettings, FailureWindowConfig, OutboxConfig, ResilienceConfig, RetryBackoff,
    RetryConfig,
};
use crate::models::Wallet;
use crate::monitor::HealthMonitor;
use crate::outbox::OutboxRelay;
use crate::requests::{CreateWalletRequest, DepositRequest};
use crate::resilience::{DegradationCoordinator, FailurePatterns, RetryPolicy};
use crate::services::{LedgerDependencies, LedgerFacade};
use crate::store::InMemoryLedgerStore;

/// Breaker settings that trip and recover within a test's time budget
///
/// Ten call window, opens at 50% failures once five calls are recorded and
/// allows a trial after 50ms.
pub fn breaker_settings() -> CircuitBreakerSettings {
    CircuitBreakerSettings {
        enabled: true,
        window_size: 10,
        minimum_calls: 5,
        failure_ratio: 0.5,
        reset_timeout_ms: 50,
        trial_successes: 1,
        call_timeout_ms: 500,
    }
}

pub fn resilience_config() -> ResilienceConfig {
    ResilienceConfig {
        store_primary: breaker_settings(),
        store_replica: breaker_settings(),
        cache: breaker_settings(),
        event_channel: breaker_settings(),
        retry: RetryConfig {
            enabled: true,
            max_attempts: 3,
            backoff: RetryBackoff::Constant,
            initial_delay: 1,
            max_delay: 5,
            multiplier: 1.0,
            jitter: 0.0,
        },
        contention: FailureWindowConfig {
            window_ms: 1_000,
            threshold: 3,
        },
        transient: FailureWindowConfig {
            window_ms: 1_000,
            threshold: 3,
        },
        check_interval_ms: 20,
    }
}

pub fn outbox_config() -> OutboxConfig {
    OutboxConfig {
        topic: "wallet.events".to_string(),
        batch_size: 100,
        poll_interval_ms: 10,
        max_backoff_ms: 100,
        max_attempts: 3,
    }
}

/// The whole service wired from in-memory parts
///
/// `primary` and `replica` share data but fail independently. Background
/// loops are not started; tests drive `relay` and `monitor` by hand.
pub struct TestStack<C: Cache + 'static = LocalCache> {
    pub primary: InMemoryLedgerStore,
    pub replica: InMemoryLedgerStore,
    pub channel: InMemoryEventChannel,
    pub cache: Arc<C>,
    pub coordinator: Arc<DegradationCoordinator>,
    pub patterns: Arc<FailurePatterns>,
    pub store: Arc<LedgerStoreAdapter>,
    pub cache_adapter: Arc<CacheAdapter<C>>,
    pub events: Arc<EventChannelAdapter>,
    pub relay: Arc<OutboxRelay>,
    pub monitor: HealthMonitor<C>,
    pub ledger: Arc<LedgerFacade<C>>,
}

impl TestStack<LocalCache> {
    pub fn new() -> Self {
        Self::with_cache(LocalCache::new())
    }
}

impl Default for TestStack<LocalCache> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Cache + 'static> TestStack<C> {
    pub fn with_cache(cache: C) -> Self {
        Self::build(cache, resilience_config(), outbox_config())
    }

    pub fn build(cache: C, resilience: ResilienceConfig, outbox: OutboxConfig) -> Self {
        let primary = InMemoryLedgerStore::new();
        let replica = primary.replica_handle();
        let channel = InMemoryEventChannel::new();
        let cache = Arc::new(cache);

        let coordinator = Arc::new(DegradationCoordinator::new());
        let patterns = Arc::new(FailurePatterns::new(&resilience));

        let store = Arc::new(LedgerStoreAdapter::new(
            Arc::new(primary.clone()),
            Arc::new(replica.clone()),
            &resilience,
            coordinator.clone(),
            patterns.clone(),
        ));
        let cache_adapter = Arc::new(CacheAdapter::new(
            cache.clone(),
            &resilience.cache,
            coordinator.clone(),
            store.clone(),
            Duration::from_secs(60),
        ));
        let events = Arc::new(EventChannelAdapter::new(
            Arc::new(channel.clone()),
            &resilience.event_channel,
            coordinator.clone(),
            outbox.topic.clone(),
        ));
        let relay = Arc::new(OutboxRelay::new(store.clone(), events.clone(), outbox.clone()));
        let monitor = HealthMonitor::new(
            store.clone(),
            cache_adapter.clone(),
            coordinator.clone(),
            patterns.clone(),
            resilience.check_interval(),
        );
        let ledger = Arc::new(LedgerFacade::new(LedgerDependencies {
            store: store.clone(),
            cache: cache_adapter.clone(),
            channel: events.clone(),
            coordinator: coordinator.clone(),
            patterns: patterns.clone(),
            retry: RetryPolicy::from(&resilience.retry),
            relay: relay.notifier(),
            outbox,
        }));

        Self {
            primary,
            replica,
            channel,
            cache,
            coordinator,
            patterns,
            store,
            cache_adapter,
            events,
            relay,
            monitor,
            ledger,
        }
    }

    /// Create a wallet, panicking on failure
    pub async fn wallet(&self, user_id: &str, currency: &str) -> Wallet {
        self.ledger
            .create_wallet(CreateWalletRequest {
                user_id: user_id.to_string(),
                currency: currency.to_string(),
            })
            .await
            .expect("wallet creation failed")
    }

    /// Create a wallet holding `amount`, panicking on failure
    pub async fn funded_wallet(&self, user_id: &str, currency: &str, amount: rust_decimal::Decimal) -> Wallet {
        let wallet = self.wallet(user_id, currency).await;
        self.ledger
            .deposit(DepositRequest {
                wallet_id: wallet.id,
                amount,
                reference_id: format!("seed-{}", Uuid::new_v4()),
                description: None,
            })
            .await
            .expect("seed deposit failed");
        wallet
    }

    /// Take the primary down and trip its breaker
    pub fn fail_primary(&self, reason: &str) {
        self.primary.set_available(false);
        self.store.primary_breaker().force_open(reason);
    }
}
