//! Ledger command and query façade
//!
//! The only layer with ledger domain knowledge. Every write runs as
//! read-modify-write against the primary with a version guard, retried on
//! conflict, and commits the wallet rows, the ledger entry and exactly one
//! outbox record as one unit of work.

mod funds;
mod query;
mod status;
mod transfer;
mod wallet;

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use metrics::{counter, histogram};
use rust_decimal::Decimal;
use tokio::sync::Notify;
use uuid::Uuid;

use crate::adapters::{CacheAdapter, EventChannelAdapter, LedgerStoreAdapter};
use crate::cache::Cache;
use crate::config::OutboxConfig;
use crate::error::{ErrorKind, LedgerError};
use crate::models::{EntryType, LedgerEntry, LedgerEvent, OutboxRecord, Wallet};
use crate::resilience::{DegradationCoordinator, FailurePatterns, RetryPolicy};
use crate::responses::TransactionReceipt;
use crate::store::UnitOfWork;

pub use status::HealthReporter;

/// Everything the façade is wired to
pub struct LedgerDependencies<C: Cache> {
    pub store: Arc<LedgerStoreAdapter>,
    pub cache: Arc<CacheAdapter<C>>,
    pub channel: Arc<EventChannelAdapter>,
    pub coordinator: Arc<DegradationCoordinator>,
    pub patterns: Arc<FailurePatterns>,
    pub retry: RetryPolicy,
    /// Wakes the outbox relay after a commit
    pub relay: Arc<Notify>,
    pub outbox: OutboxConfig,
}

pub struct LedgerFacade<C: Cache> {
    store: Arc<LedgerStoreAdapter>,
    cache: Arc<CacheAdapter<C>>,
    channel: Arc<EventChannelAdapter>,
    coordinator: Arc<DegradationCoordinator>,
    patterns: Arc<FailurePatterns>,
    retry: RetryPolicy,
    relay: Arc<Notify>,
    outbox: OutboxConfig,
}

/// Rows written by one successful attempt
struct Committed {
    entry: LedgerEntry,
    wallet: Wallet,
    destination: Option<Wallet>,
}

impl<C: Cache> LedgerFacade<C> {
    pub fn new(deps: LedgerDependencies<C>) -> Self {
        Self {
            store: deps.store,
            cache: deps.cache,
            channel: deps.channel,
            coordinator: deps.coordinator,
            patterns: deps.patterns,
            retry: deps.retry,
            relay: deps.relay,
            outbox: deps.outbox,
        }
    }

    pub fn coordinator(&self) -> &Arc<DegradationCoordinator> {
        &self.coordinator
    }

    /// Record outcome and latency of one façade operation
    async fn observe<T, Fut>(&self, operation: &'static str, fut: Fut) -> Result<T, LedgerError>
    where
        Fut: Future<Output = Result<T, LedgerError>>,
    {
        let started = Instant::now();
        let result = fut.await;
        let outcome = match &result {
            Ok(_) => "success",
            Err(err) => match err.kind() {
                ErrorKind::Rejected => "rejected",
                ErrorKind::Unavailable => "unavailable",
                ErrorKind::Failed => "failed",
            },
        };

        counter!("ledger_operations_total", "operation" => operation, "outcome" => outcome).increment(1);
        histogram!("ledger_operation_duration_seconds", "operation" => operation)
            .record(started.elapsed().as_secs_f64());

        if let Err(err) = &result {
            if err.is_domain() {
                tracing::debug!(operation, code = err.code(), error = %err, "Ledger operation rejected");
            } else {
                tracing::warn!(operation, code = err.code(), error = %err, "Ledger operation failed");
            }
        }
        result
    }

    /// Run one read-modify-write attempt until it commits without a version conflict
    async fn with_version_retry<T, F, Fut>(&self, attempt: F) -> Result<T, LedgerError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, LedgerError>>,
    {
        let result = self
            .retry
            .execute(attempt, LedgerError::is_retryable, |attempt, err| {
                if let LedgerError::ConcurrencyConflict(wallet_id) = err {
                    tracing::debug!(%wallet_id, attempt, "Version conflict, retrying");
                    self.note_conflict(*wallet_id);
                }
            })
            .await;

        if let Err(LedgerError::ConcurrencyConflict(wallet_id)) = &result {
            self.note_conflict(*wallet_id);
        }
        result
    }

    fn note_conflict(&self, wallet_id: Uuid) {
        counter!("ledger_version_conflicts_total").increment(1);
        if self.patterns.contention.record_and_check(&wallet_id) {
            self.coordinator
                .record_optimistic_lock_contention(&format!("repeated version conflicts on wallet {wallet_id}"));
        }
    }

    /// Receipt of an already committed reference, if any
    ///
    /// A reference reused for a different operation is `DuplicateReference`.
    async fn replay(
        &self,
        entry_type: EntryType,
        wallet_id: Uuid,
        counterparty: Option<Uuid>,
        amount: Decimal,
        reference_id: &str,
    ) -> Result<Option<TransactionReceipt>, LedgerError> {
        let Some(entry) = self.store.find_entry_by_reference(reference_id).await? else {
            return Ok(None);
        };
        if !entry.describes(entry_type, wallet_id, counterparty, amount) {
            return Err(LedgerError::DuplicateReference(reference_id.to_string()));
        }

        tracing::info!(reference_id, entry_id = %entry.id, "Replayed reference, nothing applied");
        let balance = self.current_balance(wallet_id).await?;
        let destination_balance = match counterparty {
            Some(destination) => Some(self.current_balance(destination).await?),
            None => None,
        };
        Ok(Some(TransactionReceipt {
            entry,
            balance,
            destination_balance,
            replayed: true,
        }))
    }

    async fn current_balance(&self, wallet_id: Uuid) -> Result<Decimal, LedgerError> {
        match self.store.read_wallet(wallet_id).await? {
            (Some(wallet), _) => Ok(wallet.balance),
            (None, _) => Err(LedgerError::WalletNotFound(wallet_id)),
        }
    }

    /// Settle the outcome of the retried write
    ///
    /// Losing a race on the same reference surfaces as `DuplicateReference` from
    /// the store; that is answered like any other replay.
    async fn settle(
        &self,
        result: Result<Committed, LedgerError>,
        entry_type: EntryType,
        wallet_id: Uuid,
        counterparty: Option<Uuid>,
        amount: Decimal,
        reference_id: &str,
    ) -> Result<TransactionReceipt, LedgerError> {
        match result {
            Ok(committed) => {
                let mut written = vec![&committed.wallet];
                written.extend(committed.destination.as_ref());
                self.after_commit(&written).await;
                Ok(TransactionReceipt {
                    balance: committed.wallet.balance,
                    destination_balance: committed.destination.as_ref().map(|wallet| wallet.balance),
                    entry: committed.entry,
                    replayed: false,
                })
            }
            Err(LedgerError::DuplicateReference(_)) => self
                .replay(entry_type, wallet_id, counterparty, amount, reference_id)
                .await?
                .ok_or_else(|| LedgerError::DuplicateReference(reference_id.to_string())),
            Err(err) => Err(err),
        }
    }

    /// Best-effort cache refresh and relay wake-up
    async fn after_commit(&self, wallets: &[&Wallet]) {
        for wallet in wallets {
            self.cache.put_wallet(wallet).await;
        }
        self.relay.notify_one();
    }
}

/// Stage `event` and wrap it in a unit of work
fn stage(event: &LedgerEvent) -> Result<UnitOfWork, LedgerError> {
    let record = OutboxRecord::stage(event)
        .map_err(|err| LedgerError::Storage(format!("failed to encode {} event: {err}", event.event_type())))?;
    Ok(UnitOfWork::new(record))
}

fn ensure_positive(amount: Decimal) -> Result<(), LedgerError> {
    if amount <= Decimal::ZERO {
        return Err(LedgerError::InvalidAmount(amount));
    }
    Ok(())
}
