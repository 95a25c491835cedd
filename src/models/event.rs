use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Currency, WalletStatus};

/// Audit event staged in the outbox for every committed mutation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LedgerEvent {
    WalletCreated {
        wallet_id: Uuid,
        user_id: String,
        currency: Currency,
        occurred_at: DateTime<Utc>,
    },
    FundsDeposited {
        wallet_id: Uuid,
        entry_id: Uuid,
        amount: Decimal,
        balance: Decimal,
        reference_id: String,
        occurred_at: DateTime<Utc>,
    },
    FundsWithdrawn {
        wallet_id: Uuid,
        entry_id: Uuid,
        amount: Decimal,
        balance: Decimal,
        reference_id: String,
        occurred_at: DateTime<Utc>,
    },
    FundsTransferred {
        source_wallet_id: Uuid,
        destination_wallet_id: Uuid,
        entry_id: Uuid,
        amount: Decimal,
        source_balance: Decimal,
        destination_balance: Decimal,
        reference_id: String,
        occurred_at: DateTime<Utc>,
    },
    WalletStatusChanged {
        wallet_id: Uuid,
        from: WalletStatus,
        to: WalletStatus,
        occurred_at: DateTime<Utc>,
    },
}

impl LedgerEvent {
    /// Wallet the event is ordered under; transfers are ordered under their source
    pub fn aggregate_id(&self) -> Uuid {
        match self {
            LedgerEvent::WalletCreated { wallet_id, .. }
            | LedgerEvent::FundsDeposited { wallet_id, .. }
            | LedgerEvent::FundsWithdrawn { wallet_id, .. }
            | LedgerEvent::WalletStatusChanged { wallet_id, .. } => *wallet_id,
            LedgerEvent::FundsTransferred { source_wallet_id, .. } => *source_wallet_id,
        }
    }

    pub fn event_type(&self) -> &'static str {
        match self {
            LedgerEvent::WalletCreated { .. } => "WALLET_CREATED",
            LedgerEvent::FundsDeposited { .. } => "FUNDS_DEPOSITED",
            LedgerEvent::FundsWithdrawn { .. } => "FUNDS_WITHDRAWN",
            LedgerEvent::FundsTransferred { .. } => "FUNDS_TRANSFERRED",
            LedgerEvent::WalletStatusChanged { .. } => "WALLET_STATUS_CHANGED",
        }
    }

    pub fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            LedgerEvent::WalletCreated { occurred_at, .. }
            | LedgerEvent::FundsDeposited { occurred_at, .. }
            | LedgerEvent::FundsWithdrawn { occurred_at, .. }
            | LedgerEvent::FundsTransferred { occurred_at, .. }
            | LedgerEvent::WalletStatusChanged { occurred_at, .. } => *occurred_at,
        }
    }
}
