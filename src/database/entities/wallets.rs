use sea_orm::Set;
use sea_orm::entity::prelude::*;

use super::parse_decimal;
use crate::models::Wallet;
use crate::store::StoreError;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "wallets")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub user_id: String,
    pub currency: String,
    pub balance: String,
    pub status: String,
    pub version: i64,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl TryFrom<Model> for Wallet {
    type Error = StoreError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Wallet {
            id: model.id,
            currency: model
                .currency
                .parse()
                .map_err(|e| StoreError::Corrupt(format!("currency: {e}")))?,
            balance: parse_decimal(&model.balance, "balance")?,
            status: model.status.parse().map_err(StoreError::Corrupt)?,
            user_id: model.user_id,
            version: model.version,
            created_at: model.created_at,
            updated_at: model.updated_at,
        })
    }
}

impl From<&Wallet> for ActiveModel {
    fn from(wallet: &Wallet) -> Self {
        Self {
            id: Set(wallet.id),
            user_id: Set(wallet.user_id.clone()),
            currency: Set(wallet.currency.to_string()),
            balance: Set(wallet.balance.to_string()),
            status: Set(wallet.status.as_str().to_string()),
            version: Set(wallet.version),
            created_at: Set(wallet.created_at),
            updated_at: Set(wallet.updated_at),
        }
    }
}
