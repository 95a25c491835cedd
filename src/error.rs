use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::models::{Currency, WalletStatus};
use crate::resilience::DegradedMode;

/// How a failure is presented to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// The request itself cannot be honoured; retrying it will not help
    Rejected,
    /// The service is degraded and the request may succeed later
    Unavailable,
    /// An internal failure that survived every retry
    Failed,
}

/// Errors returned by the ledger façade
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LedgerError {
    #[error("Wallet {0} not found")]
    WalletNotFound(Uuid),

    #[error("Insufficient funds in wallet {wallet_id}: balance {balance}, requested {requested}")]
    InsufficientFunds {
        wallet_id: Uuid,
        balance: Decimal,
        requested: Decimal,
    },

    #[error("Invalid transfer: {0}")]
    InvalidTransfer(String),

    #[error("Reference {0} has already been used")]
    DuplicateReference(String),

    #[error("Invalid amount {0}: amounts must be greater than zero")]
    InvalidAmount(Decimal),

    #[error("Crediting {amount} would overflow the balance of wallet {wallet_id}")]
    BalanceOverflow { wallet_id: Uuid, amount: Decimal },

    #[error("User {user_id} already has a {currency} wallet")]
    WalletAlreadyExists { user_id: String, currency: Currency },

    #[error("Wallet {wallet_id} is {status}")]
    WalletInactive { wallet_id: Uuid, status: WalletStatus },

    #[error("Invalid currency code {0:?}")]
    InvalidCurrency(String),

    #[error("Wallet {wallet_id} cannot move from {from} to {to}")]
    InvalidStatusTransition {
        wallet_id: Uuid,
        from: WalletStatus,
        to: WalletStatus,
    },

    #[error("Service degraded: {0}")]
    ServiceDegraded(DegradedMode),

    #[error("Wallet {0} was modified concurrently and retries were exhausted")]
    ConcurrencyConflict(Uuid),

    #[error("Storage failure: {0}")]
    Storage(String),
}

impl LedgerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LedgerError::ServiceDegraded(_) => ErrorKind::Unavailable,
            LedgerError::ConcurrencyConflict(_) | LedgerError::Storage(_) => ErrorKind::Failed,
            _ => ErrorKind::Rejected,
        }
    }

    /// Domain failures are never retried
    pub fn is_domain(&self) -> bool {
        self.kind() == ErrorKind::Rejected
    }

    /// Version conflicts are the only failure the façade retries itself
    pub fn is_retryable(&self) -> bool {
        matches!(self, LedgerError::ConcurrencyConflict(_))
    }

    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            LedgerError::WalletNotFound(_) => "WALLET_NOT_FOUND",
            LedgerError::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
            LedgerError::InvalidTransfer(_) => "INVALID_TRANSFER",
            LedgerError::DuplicateReference(_) => "DUPLICATE_REFERENCE",
            LedgerError::InvalidAmount(_) => "INVALID_AMOUNT",
            LedgerError::BalanceOverflow { .. } => "BALANCE_OVERFLOW",
            LedgerError::WalletAlreadyExists { .. } => "WALLET_ALREADY_EXISTS",
            LedgerError::WalletInactive { .. } => "WALLET_INACTIVE",
            LedgerError::InvalidCurrency(_) => "INVALID_CURRENCY",
            LedgerError::InvalidStatusTransition { .. } => "INVALID_STATUS_TRANSITION",
            LedgerError::ServiceDegraded(_) => "SERVICE_DEGRADED",
            LedgerError::ConcurrencyConflict(_) => "CONCURRENCY_CONFLICT",
            LedgerError::Storage(_) => "STORAGE_FAILURE",
        }
    }
}
