use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::adapters::ReadSource;
use crate::models::{Currency, LedgerEntry, Wallet, WalletStatus};

/// Result of a deposit, withdrawal or transfer
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionReceipt {
    pub entry: LedgerEntry,
    /// Balance of the entry's wallet (the source, for transfers)
    #[serde(with = "rust_decimal::serde::str")]
    pub balance: Decimal,
    #[serde(with = "rust_decimal::serde::str_option")]
    pub destination_balance: Option<Decimal>,
    /// The reference was already committed; nothing was applied this time
    pub replayed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceView {
    pub wallet_id: Uuid,
    pub currency: Currency,
    #[serde(with = "rust_decimal::serde::str")]
    pub balance: Decimal,
    pub status: WalletStatus,
    pub version: i64,
    pub source: ReadSource,
}

impl BalanceView {
    pub fn new(wallet: &Wallet, source: ReadSource) -> Self {
        Self {
            wallet_id: wallet.id,
            currency: wallet.currency.clone(),
            balance: wallet.balance,
            status: wallet.status,
            version: wallet.version,
            source,
        }
    }
}

/// Balance rebuilt from ledger entries
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoricalBalance {
    pub wallet_id: Uuid,
    pub currency: Currency,
    pub at: DateTime<Utc>,
    #[serde(with = "rust_decimal::serde::str")]
    pub balance: Decimal,
    pub entries_applied: usize,
}
