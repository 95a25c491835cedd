use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use metrics::counter;
use serde::Serialize;
use uuid::Uuid;

use crate::config::ResilienceConfig;
use crate::error::LedgerError;
use crate::models::{Currency, LedgerEntry, OutboxRecord, Wallet};
use crate::resilience::{
    CircuitBreaker, CircuitBreakerError, DegradationCoordinator, DegradedMode, FailurePatterns,
};
use crate::store::{LedgerStore, StoreError, UnitOfWork};

const DEFAULT_FALLBACK_TIMEOUT: Duration = Duration::from_secs(2);

/// Where a read was served from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadSource {
    Cache,
    Replica,
    Primary,
}

/// Breaker-protected access to the primary and replica stores
///
/// Writes only ever go to the primary. A technical write failure puts the
/// service in read-only mode instead of being retried elsewhere. Reads prefer
/// the replica and fall back to the primary, which is always safe to read.
pub struct LedgerStoreAdapter {
    primary: Arc<dyn LedgerStore>,
    replica: Arc<dyn LedgerStore>,
    primary_breaker: CircuitBreaker,
    replica_breaker: CircuitBreaker,
    coordinator: Arc<DegradationCoordinator>,
    patterns: Arc<FailurePatterns>,
    fallback_timeout: Duration,
}

impl LedgerStoreAdapter {
    pub fn new(
        primary: Arc<dyn LedgerStore>,
        replica: Arc<dyn LedgerStore>,
        config: &ResilienceConfig,
        coordinator: Arc<DegradationCoordinator>,
        patterns: Arc<FailurePatterns>,
    ) -> Self {
        let primary_config = config.store_primary.to_breaker_config();
        let fallback_timeout = primary_config.call_timeout.unwrap_or(DEFAULT_FALLBACK_TIMEOUT);

        Self {
            primary,
            replica,
            primary_breaker: CircuitBreaker::with_config("store_primary", primary_config)
                .with_observer(coordinator.clone()),
            replica_breaker: CircuitBreaker::with_config(
                "store_replica",
                config.store_replica.to_breaker_config(),
            )
            .with_observer(coordinator.clone()),
            coordinator,
            patterns,
            fallback_timeout,
        }
    }

    pub fn primary_breaker(&self) -> &CircuitBreaker {
        &self.primary_breaker
    }

    pub fn replica_breaker(&self) -> &CircuitBreaker {
        &self.replica_breaker
    }

    /// Commit a unit of work on the primary
    ///
    /// Domain-shaped store outcomes map to their [`LedgerError`] counterparts.
    /// Anything else enters read-only mode and fails with `ServiceDegraded`.
    #[tracing::instrument(skip_all, fields(outbox_id = %unit.outbox.id, event_type = %unit.outbox.event_type))]
    pub async fn write(&self, unit: &UnitOfWork) -> Result<(), LedgerError> {
        let result = self
            .primary_breaker
            .call_classified(self.primary.commit(unit), StoreError::is_technical)
            .await;

        match result {
            Ok(()) => Ok(()),
            Err(CircuitBreakerError::Inner(err)) if !err.is_technical() => Err(domain_error(err)),
            Err(err) => Err(self.degrade_write(&err.to_string())),
        }
    }

    /// Current primary copy of a wallet, for a read-modify-write
    ///
    /// Fails like a write when the primary cannot be reached.
    pub async fn read_for_update(&self, id: Uuid) -> Result<Wallet, LedgerError> {
        let result = self
            .primary_breaker
            .call_classified(self.primary.read_wallet(id), StoreError::is_technical)
            .await;

        match result {
            Ok(Some(wallet)) => Ok(wallet),
            Ok(None) => Err(LedgerError::WalletNotFound(id)),
            Err(err) => Err(self.degrade_write(&err.to_string())),
        }
    }

    pub async fn read_wallet(&self, id: Uuid) -> Result<(Option<Wallet>, ReadSource), LedgerError> {
        self.read_replicated("read_wallet", move |store| async move { store.read_wallet(id).await })
            .await
    }

    pub async fn read_wallets_by_user(&self, user_id: &str) -> Result<Vec<Wallet>, LedgerError> {
        let user_id = user_id.to_string();
        let (wallets, _) = self
            .read_replicated("read_wallets_by_user", move |store| {
                let user_id = user_id.clone();
                async move { store.read_wallets_by_user(&user_id).await }
            })
            .await?;
        Ok(wallets)
    }

    pub async fn find_wallet(&self, user_id: &str, currency: &Currency) -> Result<Option<Wallet>, LedgerError> {
        let user_id = user_id.to_string();
        let currency = currency.clone();
        self.read_authoritative("find_wallet", move |store| {
            let user_id = user_id.clone();
            let currency = currency.clone();
            async move { store.find_wallet(&user_id, &currency).await }
        })
        .await
    }

    pub async fn find_entry_by_reference(&self, reference_id: &str) -> Result<Option<LedgerEntry>, LedgerError> {
        let reference_id = reference_id.to_string();
        self.read_authoritative("find_entry_by_reference", move |store| {
            let reference_id = reference_id.clone();
            async move { store.find_entry_by_reference(&reference_id).await }
        })
        .await
    }

    pub async fn entries_for_wallet(
        &self,
        wallet_id: Uuid,
        until: DateTime<Utc>,
    ) -> Result<Vec<LedgerEntry>, LedgerError> {
        self.read_authoritative("entries_for_wallet", move |store| async move {
            store.entries_for_wallet(wallet_id, until).await
        })
        .await
    }

    pub async fn pending_outbox(&self, limit: usize) -> Result<Vec<OutboxRecord>, LedgerError> {
        self.on_primary("pending_outbox", self.primary.pending_outbox(limit)).await
    }

    pub async fn stalled_outbox(&self, min_attempts: u32, limit: usize) -> Result<Vec<OutboxRecord>, LedgerError> {
        self.on_primary("stalled_outbox", self.primary.stalled_outbox(min_attempts, limit))
            .await
    }

    pub async fn mark_published(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), LedgerError> {
        self.on_primary("mark_published", self.primary.mark_published(id, at)).await
    }

    pub async fn record_publish_failure(&self, id: Uuid, error: &str) -> Result<u32, LedgerError> {
        self.on_primary("record_publish_failure", self.primary.record_publish_failure(id, error))
            .await
    }

    pub async fn count_pending_outbox(&self) -> Result<u64, LedgerError> {
        self.on_primary("count_pending_outbox", self.primary.count_pending_outbox())
            .await
    }

    /// Ping the primary through its breaker; a success counts as a trial call
    pub async fn check_primary(&self) -> bool {
        match self.primary_breaker.call(self.primary.ping()).await {
            Ok(()) => true,
            Err(err) => {
                tracing::debug!(error = %err, "Primary store check failed");
                false
            }
        }
    }

    fn degrade_write(&self, reason: &str) -> LedgerError {
        tracing::warn!(reason, "Primary store write path failed");
        self.coordinator.enter_read_only_mode(reason);
        self.record_transient(reason);
        LedgerError::ServiceDegraded(DegradedMode::ReadOnly)
    }

    fn record_transient(&self, reason: &str) {
        if self.patterns.transient.record_and_check() {
            self.coordinator.enter_transient_failure_pattern(reason);
        }
    }

    async fn on_primary<T, Fut>(&self, operation: &'static str, fut: Fut) -> Result<T, LedgerError>
    where
        Fut: Future<Output = Result<T, StoreError>>,
    {
        self.primary_breaker
            .call_classified(fut, StoreError::is_technical)
            .await
            .map_err(|err| {
                self.record_transient(&err.to_string());
                tracing::warn!(operation, error = %err, "Primary store call failed");
                LedgerError::Storage(format!("{operation}: {err}"))
            })
    }

    /// Replica through its breaker, then the primary directly
    async fn read_replicated<T, F, Fut>(&self, operation: &'static str, op: F) -> Result<(T, ReadSource), LedgerError>
    where
        F: Fn(Arc<dyn LedgerStore>) -> Fut,
        Fut: Future<Output = Result<T, StoreError>>,
    {
        let replica_error = match self
            .replica_breaker
            .call_classified(op(self.replica.clone()), StoreError::is_technical)
            .await
        {
            Ok(value) => return Ok((value, ReadSource::Replica)),
            Err(err) => err,
        };

        counter!("store_replica_fallback_total", "operation" => operation).increment(1);
        tracing::debug!(operation, error = %replica_error, "Replica read failed, reading primary");

        match tokio::time::timeout(self.fallback_timeout, op(self.primary.clone())).await {
            Ok(Ok(value)) => Ok((value, ReadSource::Primary)),
            Ok(Err(err)) => Err(self.read_failed(operation, &err.to_string())),
            Err(_) => Err(self.read_failed(operation, "primary read timed out")),
        }
    }

    /// Primary through its breaker, then the replica
    async fn read_authoritative<T, F, Fut>(&self, operation: &'static str, op: F) -> Result<T, LedgerError>
    where
        F: Fn(Arc<dyn LedgerStore>) -> Fut,
        Fut: Future<Output = Result<T, StoreError>>,
    {
        let primary_error = match self
            .primary_breaker
            .call_classified(op(self.primary.clone()), StoreError::is_technical)
            .await
        {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        tracing::debug!(operation, error = %primary_error, "Primary read failed, reading replica");
        self.replica_breaker
            .call_classified(op(self.replica.clone()), StoreError::is_technical)
            .await
            .map_err(|err| self.read_failed(operation, &err.to_string()))
    }

    fn read_failed(&self, operation: &'static str, reason: &str) -> LedgerError {
        self.record_transient(reason);
        tracing::error!(operation, reason, "Store read failed on every path");
        LedgerError::Storage(format!("{operation}: {reason}"))
    }
}

fn domain_error(err: StoreError) -> LedgerError {
    match err {
        StoreError::VersionConflict { wallet_id, .. } => LedgerError::ConcurrencyConflict(wallet_id),
        StoreError::DuplicateReference(reference) => LedgerError::DuplicateReference(reference),
        StoreError::WalletExists { user_id, currency } => LedgerError::WalletAlreadyExists { user_id, currency },
        other => LedgerError::Storage(other.to_string()),
    }
}
