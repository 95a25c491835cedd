use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::LedgerError;

/// ISO-4217 style three letter currency code, stored upper case
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Currency(String);

impl Currency {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for Currency {
    type Err = LedgerError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let code = value.trim();
        if code.len() != 3 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(LedgerError::InvalidCurrency(value.to_string()));
        }
        Ok(Self(code.to_ascii_uppercase()))
    }
}

impl TryFrom<String> for Currency {
    type Error = LedgerError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Currency> for String {
    fn from(currency: Currency) -> Self {
        currency.0
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WalletStatus {
    Active,
    Frozen,
    Closed,
}

impl WalletStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WalletStatus::Active => "ACTIVE",
            WalletStatus::Frozen => "FROZEN",
            WalletStatus::Closed => "CLOSED",
        }
    }
}

impl FromStr for WalletStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "ACTIVE" => Ok(WalletStatus::Active),
            "FROZEN" => Ok(WalletStatus::Frozen),
            "CLOSED" => Ok(WalletStatus::Closed),
            other => Err(format!("unknown wallet status {other}")),
        }
    }
}

impl fmt::Display for WalletStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single-currency balance owned by one user
///
/// Mutations never change a wallet in place. They return the next version,
/// which the store only accepts while the stored version is still `version - 1`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wallet {
    pub id: Uuid,
    pub user_id: String,
    pub currency: Currency,
    #[serde(with = "rust_decimal::serde::str")]
    pub balance: Decimal,
    pub status: WalletStatus,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Wallet {
    /// A new, empty, active wallet at version 1
    pub fn open(user_id: impl Into<String>, currency: Currency, at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            currency,
            balance: Decimal::ZERO,
            status: WalletStatus::Active,
            version: 1,
            created_at: at,
            updated_at: at,
        }
    }

    pub fn ensure_active(&self) -> Result<(), LedgerError> {
        if self.status != WalletStatus::Active {
            return Err(LedgerError::WalletInactive {
                wallet_id: self.id,
                status: self.status,
            });
        }
        Ok(())
    }

    fn next(&self, at: DateTime<Utc>) -> Self {
        Self {
            version: self.version + 1,
            updated_at: at,
            ..self.clone()
        }
    }

    pub fn credited(&self, amount: Decimal, at: DateTime<Utc>) -> Result<Self, LedgerError> {
        self.ensure_active()?;
        let balance = self.balance.checked_add(amount).ok_or(LedgerError::BalanceOverflow {
            wallet_id: self.id,
            amount,
        })?;
        Ok(Self {
            balance,
            ..self.next(at)
        })
    }

    pub fn debited(&self, amount: Decimal, at: DateTime<Utc>) -> Result<Self, LedgerError> {
        self.ensure_active()?;
        if self.balance < amount {
            return Err(LedgerError::InsufficientFunds {
                wallet_id: self.id,
                balance: self.balance,
                requested: amount,
            });
        }
        let balance = self.balance.checked_sub(amount).ok_or(LedgerError::InsufficientFunds {
            wallet_id: self.id,
            balance: self.balance,
            requested: amount,
        })?;
        Ok(Self {
            balance,
            ..self.next(at)
        })
    }

    /// Allowed: ACTIVE <-> FROZEN, and ACTIVE or FROZEN -> CLOSED with a zero balance
    pub fn with_status(&self, status: WalletStatus, at: DateTime<Utc>) -> Result<Self, LedgerError> {
        let allowed = match (self.status, status) {
            (WalletStatus::Active, WalletStatus::Frozen) | (WalletStatus::Frozen, WalletStatus::Active) => true,
            (WalletStatus::Active | WalletStatus::Frozen, WalletStatus::Closed) => self.balance.is_zero(),
            _ => false,
        };
        if !allowed {
            return Err(LedgerError::InvalidStatusTransition {
                wallet_id: self.id,
                from: self.status,
                to: status,
            });
        }
        let mut next = self.next(at);
        next.status = status;
        Ok(next)
    }
}
