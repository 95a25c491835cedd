use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use uuid::Uuid;

use super::{LedgerStore, StoreError, UnitOfWork};
use crate::models::{Currency, LedgerEntry, OutboxRecord, Wallet};

#[derive(Debug, Default)]
struct State {
    wallets: HashMap<Uuid, Wallet>,
    entries: Vec<LedgerEntry>,
    references: HashMap<String, usize>,
    /// Commit order
    outbox: Vec<OutboxRecord>,
}

#[derive(Debug)]
struct Faults {
    available: AtomicBool,
    fail_next: AtomicU32,
    latency: Mutex<Option<Duration>>,
}

impl Default for Faults {
    fn default() -> Self {
        Self {
            available: AtomicBool::new(true),
            fail_next: AtomicU32::new(0),
            latency: Mutex::new(None),
        }
    }
}

/// Process-local ledger store
///
/// One write lock covers every table, so a [`UnitOfWork`] is applied atomically.
/// Each handle carries its own fault injection switches; [`replica_handle`]
/// returns a handle on the same data that can fail independently, which is how
/// tests model a primary/replica pair.
///
/// [`replica_handle`]: InMemoryLedgerStore::replica_handle
#[derive(Debug, Clone, Default)]
pub struct InMemoryLedgerStore {
    state: Arc<RwLock<State>>,
    faults: Arc<Faults>,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn replica_handle(&self) -> Self {
        Self {
            state: self.state.clone(),
            faults: Arc::new(Faults::default()),
        }
    }

    /// Make every operation on this handle fail with `Unavailable`
    pub fn set_available(&self, available: bool) {
        self.faults.available.store(available, Ordering::Release);
    }

    /// Fail the next `count` operations on this handle
    pub fn fail_next(&self, count: u32) {
        self.faults.fail_next.store(count, Ordering::Release);
    }

    /// Delay every operation on this handle
    pub fn set_latency(&self, latency: Option<Duration>) {
        *self.faults.latency.lock() = latency;
    }

    pub fn outbox_records(&self) -> Vec<OutboxRecord> {
        self.state.read().outbox.clone()
    }

    pub fn entries(&self) -> Vec<LedgerEntry> {
        self.state.read().entries.clone()
    }

    pub fn wallets(&self) -> Vec<Wallet> {
        self.state.read().wallets.values().cloned().collect()
    }

    async fn check(&self) -> Result<(), StoreError> {
        let latency = *self.faults.latency.lock();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        if !self.faults.available.load(Ordering::Acquire) {
            return Err(StoreError::Unavailable("store handle is offline".to_string()));
        }
        let injected = self
            .faults
            .fail_next
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
        if injected.is_ok() {
            return Err(StoreError::Unavailable("injected failure".to_string()));
        }
        Ok(())
    }

    fn validate(state: &State, unit: &UnitOfWork) -> Result<(), StoreError> {
        if let Some(entry) = &unit.entry {
            if state.references.contains_key(&entry.reference_id) {
                return Err(StoreError::DuplicateReference(entry.reference_id.clone()));
            }
        }

        for write in &unit.wallets {
            let wallet = &write.wallet;
            match write.expected_version {
                None => {
                    let taken = state.wallets.contains_key(&wallet.id)
                        || state
                            .wallets
                            .values()
                            .any(|w| w.user_id == wallet.user_id && w.currency == wallet.currency);
                    if taken {
                        return Err(StoreError::WalletExists {
                            user_id: wallet.user_id.clone(),
                            currency: wallet.currency.clone(),
                        });
                    }
                }
                Some(expected) => {
                    let actual = state.wallets.get(&wallet.id).map(|w| w.version);
                    if actual != Some(expected) {
                        return Err(StoreError::VersionConflict {
                            wallet_id: wallet.id,
                            expected,
                            actual,
                        });
                    }
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn commit(&self, unit: &UnitOfWork) -> Result<(), StoreError> {
        self.check().await?;

        let mut state = self.state.write();
        Self::validate(&state, unit)?;

        for write in &unit.wallets {
            state.wallets.insert(write.wallet.id, write.wallet.clone());
        }
        if let Some(entry) = &unit.entry {
            let position = state.entries.len();
            state.references.insert(entry.reference_id.clone(), position);
            state.entries.push(entry.clone());
        }
        state.outbox.push(unit.outbox.clone());
        Ok(())
    }

    async fn read_wallet(&self, id: Uuid) -> Result<Option<Wallet>, StoreError> {
        self.check().await?;
        Ok(self.state.read().wallets.get(&id).cloned())
    }

    async fn read_wallets_by_user(&self, user_id: &str) -> Result<Vec<Wallet>, StoreError> {
        self.check().await?;
        let mut wallets: Vec<Wallet> = self
            .state
            .read()
            .wallets
            .values()
            .filter(|wallet| wallet.user_id == user_id)
            .cloned()
            .collect();
        wallets.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(wallets)
    }

    async fn find_wallet(&self, user_id: &str, currency: &Currency) -> Result<Option<Wallet>, StoreError> {
        self.check().await?;
        Ok(self
            .state
            .read()
            .wallets
            .values()
            .find(|wallet| wallet.user_id == user_id && &wallet.currency == currency)
            .cloned())
    }

    async fn find_entry_by_reference(&self, reference_id: &str) -> Result<Option<LedgerEntry>, StoreError> {
        self.check().await?;
        let state = self.state.read();
        Ok(state
            .references
            .get(reference_id)
            .and_then(|position| state.entries.get(*position))
            .cloned())
    }

    async fn entries_for_wallet(&self, wallet_id: Uuid, until: DateTime<Utc>) -> Result<Vec<LedgerEntry>, StoreError> {
        self.check().await?;
        Ok(self
            .state
            .read()
            .entries
            .iter()
            .filter(|entry| entry.touches(wallet_id) && entry.created_at <= until)
            .cloned()
            .collect())
    }

    async fn pending_outbox(&self, limit: usize) -> Result<Vec<OutboxRecord>, StoreError> {
        self.check().await?;
        Ok(self
            .state
            .read()
            .outbox
            .iter()
            .filter(|record| record.is_pending())
            .take(limit)
            .cloned()
            .collect())
    }

    async fn stalled_outbox(&self, min_attempts: u32, limit: usize) -> Result<Vec<OutboxRecord>, StoreError> {
        self.check().await?;
        Ok(self
            .state
            .read()
            .outbox
            .iter()
            .filter(|record| record.is_pending() && record.attempt_count >= min_attempts)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn mark_published(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), StoreError> {
        self.check().await?;
        let mut state = self.state.write();
        if let Some(record) = state.outbox.iter_mut().find(|record| record.id == id) {
            if record.published_at.is_none() {
                record.published_at = Some(at);
            }
        }
        Ok(())
    }

    async fn record_publish_failure(&self, id: Uuid, error: &str) -> Result<u32, StoreError> {
        self.check().await?;
        let mut state = self.state.write();
        match state
            .outbox
            .iter_mut()
            .find(|record| record.id == id && record.is_pending())
        {
            Some(record) => {
                record.attempt_count += 1;
                record.last_error = Some(error.to_string());
                Ok(record.attempt_count)
            }
            None => Ok(0),
        }
    }

    async fn count_pending_outbox(&self) -> Result<u64, StoreError> {
        self.check().await?;
        Ok(self
            .state
            .read()
            .outbox
            .iter()
            .filter(|record| record.is_pending())
            .count() as u64)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.check().await
    }
}
