//! Relational store seam
//!
//! Writes are expressed as a [`UnitOfWork`]: every wallet change, the ledger
//! entry and the single outbox record of one logical operation commit together
//! or not at all.

mod memory;

pub use memory::InMemoryLedgerStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{Currency, LedgerEntry, OutboxRecord, Wallet};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StoreError {
    /// The stored version differs from the expected one
    #[error("Version conflict on wallet {wallet_id}: expected {expected}, found {actual:?}")]
    VersionConflict {
        wallet_id: Uuid,
        expected: i64,
        actual: Option<i64>,
    },

    #[error("Reference {0} already exists")]
    DuplicateReference(String),

    #[error("Wallet for user {user_id} in {currency} already exists")]
    WalletExists { user_id: String, currency: Currency },

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Store operation timed out")]
    Timeout,

    #[error("Stored data is corrupt: {0}")]
    Corrupt(String),
}

impl StoreError {
    /// Technical failures count against the store breaker; domain-shaped outcomes do not
    pub fn is_technical(&self) -> bool {
        matches!(
            self,
            StoreError::Unavailable(_) | StoreError::Timeout | StoreError::Corrupt(_)
        )
    }
}

/// A wallet row to insert (`expected_version == None`) or update
#[derive(Debug, Clone)]
pub struct WalletWrite {
    pub wallet: Wallet,
    pub expected_version: Option<i64>,
}

/// Everything one ledger command writes
#[derive(Debug, Clone)]
pub struct UnitOfWork {
    pub wallets: Vec<WalletWrite>,
    pub entry: Option<LedgerEntry>,
    pub outbox: OutboxRecord,
}

impl UnitOfWork {
    pub fn new(outbox: OutboxRecord) -> Self {
        Self {
            wallets: Vec::new(),
            entry: None,
            outbox,
        }
    }

    pub fn insert_wallet(mut self, wallet: Wallet) -> Self {
        self.wallets.push(WalletWrite {
            wallet,
            expected_version: None,
        });
        self
    }

    /// Update `wallet`, guarded on the version it was derived from
    pub fn update_wallet(mut self, wallet: Wallet) -> Self {
        let expected = wallet.version - 1;
        self.wallets.push(WalletWrite {
            wallet,
            expected_version: Some(expected),
        });
        self
    }

    pub fn with_entry(mut self, entry: LedgerEntry) -> Self {
        self.entry = Some(entry);
        self
    }
}

#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Apply a unit of work atomically
    async fn commit(&self, unit: &UnitOfWork) -> Result<(), StoreError>;

    async fn read_wallet(&self, id: Uuid) -> Result<Option<Wallet>, StoreError>;

    async fn read_wallets_by_user(&self, user_id: &str) -> Result<Vec<Wallet>, StoreError>;

    async fn find_wallet(&self, user_id: &str, currency: &Currency) -> Result<Option<Wallet>, StoreError>;

    async fn find_entry_by_reference(&self, reference_id: &str) -> Result<Option<LedgerEntry>, StoreError>;

    /// Entries touching `wallet_id` created at or before `until`, oldest first
    async fn entries_for_wallet(&self, wallet_id: Uuid, until: DateTime<Utc>) -> Result<Vec<LedgerEntry>, StoreError>;

    /// Oldest pending outbox records, in `(created_at, id)` order
    async fn pending_outbox(&self, limit: usize) -> Result<Vec<OutboxRecord>, StoreError>;

    /// Pending records whose attempt count reached `min_attempts`
    async fn stalled_outbox(&self, min_attempts: u32, limit: usize) -> Result<Vec<OutboxRecord>, StoreError>;

    /// Mark a record PUBLISHED; a record already published keeps its first timestamp
    async fn mark_published(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), StoreError>;

    /// Increment the attempt count of a pending record and return the new count
    async fn record_publish_failure(&self, id: Uuid, error: &str) -> Result<u32, StoreError>;

    async fn count_pending_outbox(&self) -> Result<u64, StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;
}
