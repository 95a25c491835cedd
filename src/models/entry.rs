use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntryType {
    Deposit,
    Withdrawal,
    Transfer,
}

impl EntryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryType::Deposit => "DEPOSIT",
            EntryType::Withdrawal => "WITHDRAWAL",
            EntryType::Transfer => "TRANSFER",
        }
    }
}

impl FromStr for EntryType {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "DEPOSIT" => Ok(EntryType::Deposit),
            "WITHDRAWAL" => Ok(EntryType::Withdrawal),
            "TRANSFER" => Ok(EntryType::Transfer),
            other => Err(format!("unknown entry type {other}")),
        }
    }
}

impl fmt::Display for EntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntryStatus {
    Committed,
}

impl EntryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryStatus::Committed => "COMMITTED",
        }
    }
}

impl FromStr for EntryStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "COMMITTED" => Ok(EntryStatus::Committed),
            other => Err(format!("unknown entry status {other}")),
        }
    }
}

/// An immutable ledger line
///
/// Transfers are a single entry: `wallet_id` is the source and
/// `counterparty_wallet_id` the destination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: Uuid,
    pub wallet_id: Uuid,
    pub counterparty_wallet_id: Option<Uuid>,
    pub entry_type: EntryType,
    #[serde(with = "rust_decimal::serde::str")]
    pub amount: Decimal,
    pub reference_id: String,
    pub description: Option<String>,
    pub status: EntryStatus,
    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    pub fn new(
        entry_type: EntryType,
        wallet_id: Uuid,
        counterparty_wallet_id: Option<Uuid>,
        amount: Decimal,
        reference_id: impl Into<String>,
        description: Option<String>,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            wallet_id,
            counterparty_wallet_id,
            entry_type,
            amount,
            reference_id: reference_id.into(),
            description,
            status: EntryStatus::Committed,
            created_at: at,
        }
    }

    /// Signed balance change this entry applies to `wallet_id`
    pub fn effect_on(&self, wallet_id: Uuid) -> Decimal {
        match self.entry_type {
            EntryType::Deposit if self.wallet_id == wallet_id => self.amount,
            EntryType::Withdrawal if self.wallet_id == wallet_id => -self.amount,
            EntryType::Transfer if self.wallet_id == wallet_id => -self.amount,
            EntryType::Transfer if self.counterparty_wallet_id == Some(wallet_id) => self.amount,
            _ => Decimal::ZERO,
        }
    }

    /// Whether this entry is the committed result of the described operation
    pub fn describes(
        &self,
        entry_type: EntryType,
        wallet_id: Uuid,
        counterparty_wallet_id: Option<Uuid>,
        amount: Decimal,
    ) -> bool {
        self.entry_type == entry_type
            && self.wallet_id == wallet_id
            && self.counterparty_wallet_id == counterparty_wallet_id
            && self.amount == amount
    }

    pub fn touches(&self, wallet_id: Uuid) -> bool {
        self.wallet_id == wallet_id || self.counterparty_wallet_id == Some(wallet_id)
    }
}
