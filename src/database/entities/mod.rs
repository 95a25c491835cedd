//! SeaORM entities for the ledger tables
//!
//! Amounts are stored as decimal text so every backend keeps full precision.

pub mod ledger_entries;
pub mod outbox_records;
pub mod wallets;

use rust_decimal::Decimal;

use crate::store::StoreError;

pub(crate) fn parse_decimal(value: &str, column: &str) -> Result<Decimal, StoreError> {
    value
        .parse()
        .map_err(|e| StoreError::Corrupt(format!("{column} {value:?}: {e}")))
}
