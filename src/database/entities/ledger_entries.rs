use sea_orm::Set;
use sea_orm::entity::prelude::*;

use super::parse_decimal;
use crate::models::LedgerEntry;
use crate::store::StoreError;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "ledger_entries")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub wallet_id: Uuid,
    pub counterparty_wallet_id: Option<Uuid>,
    pub entry_type: String,
    pub amount: String,
    #[sea_orm(unique)]
    pub reference_id: String,
    pub description: Option<String>,
    pub status: String,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl TryFrom<Model> for LedgerEntry {
    type Error = StoreError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(LedgerEntry {
            id: model.id,
            wallet_id: model.wallet_id,
            counterparty_wallet_id: model.counterparty_wallet_id,
            entry_type: model.entry_type.parse().map_err(StoreError::Corrupt)?,
            amount: parse_decimal(&model.amount, "amount")?,
            status: model.status.parse().map_err(StoreError::Corrupt)?,
            reference_id: model.reference_id,
            description: model.description,
            created_at: model.created_at,
        })
    }
}

impl From<&LedgerEntry> for ActiveModel {
    fn from(entry: &LedgerEntry) -> Self {
        Self {
            id: Set(entry.id),
            wallet_id: Set(entry.wallet_id),
            counterparty_wallet_id: Set(entry.counterparty_wallet_id),
            entry_type: Set(entry.entry_type.as_str().to_string()),
            amount: Set(entry.amount.to_string()),
            reference_id: Set(entry.reference_id.clone()),
            description: Set(entry.description.clone()),
            status: Set(entry.status.as_str().to_string()),
            created_at: Set(entry.created_at),
        }
    }
}
