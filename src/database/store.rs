use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnAcquireErr, DatabaseConnection, DbErr,
    EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, SqlErr, TransactionTrait,
};
use uuid::Uuid;

use super::entities::{ledger_entries, outbox_records, wallets};
use crate::models::{Currency, LedgerEntry, OutboxRecord, Wallet};
use crate::store::{LedgerStore, StoreError, UnitOfWork, WalletWrite};

/// [`LedgerStore`] over a SeaORM connection
///
/// Each [`UnitOfWork`] runs in one database transaction. Wallet updates are
/// guarded with `WHERE version = expected`, so a stale write touches no rows
/// and the whole transaction is rolled back.
#[derive(Debug, Clone)]
pub struct SeaOrmLedgerStore {
    db: DatabaseConnection,
}

impl SeaOrmLedgerStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }
}

fn technical(err: DbErr) -> StoreError {
    match err {
        DbErr::ConnectionAcquire(ConnAcquireErr::Timeout) => StoreError::Timeout,
        DbErr::Type(msg) | DbErr::Json(msg) => StoreError::Corrupt(msg),
        DbErr::TryIntoErr { from, into, .. } => StoreError::Corrupt(format!("{from} into {into}")),
        other => StoreError::Unavailable(other.to_string()),
    }
}

fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}

async fn apply_wallet<C>(conn: &C, write: &WalletWrite) -> Result<(), StoreError>
where
    C: sea_orm::ConnectionTrait,
{
    let wallet = &write.wallet;
    let Some(expected) = write.expected_version else {
        return wallets::ActiveModel::from(wallet)
            .insert(conn)
            .await
            .map(|_| ())
            .map_err(|err| {
                if is_unique_violation(&err) {
                    StoreError::WalletExists {
                        user_id: wallet.user_id.clone(),
                        currency: wallet.currency.clone(),
                    }
                } else {
                    technical(err)
                }
            });
    };

    let result = wallets::Entity::update_many()
        .col_expr(wallets::Column::Balance, Expr::value(wallet.balance.to_string()))
        .col_expr(wallets::Column::Status, Expr::value(wallet.status.as_str()))
        .col_expr(wallets::Column::Version, Expr::value(wallet.version))
        .col_expr(wallets::Column::UpdatedAt, Expr::value(wallet.updated_at))
        .filter(wallets::Column::Id.eq(wallet.id))
        .filter(wallets::Column::Version.eq(expected))
        .exec(conn)
        .await
        .map_err(technical)?;

    if result.rows_affected == 0 {
        let actual = wallets::Entity::find_by_id(wallet.id)
            .one(conn)
            .await
            .map_err(technical)?
            .map(|model| model.version);
        return Err(StoreError::VersionConflict {
            wallet_id: wallet.id,
            expected,
            actual,
        });
    }
    Ok(())
}

#[async_trait]
impl LedgerStore for SeaOrmLedgerStore {
    async fn commit(&self, unit: &UnitOfWork) -> Result<(), StoreError> {
        // Dropping the transaction on an early return rolls it back.
        let txn = self.db.begin().await.map_err(technical)?;

        for write in &unit.wallets {
            apply_wallet(&txn, write).await?;
        }

        if let Some(entry) = &unit.entry {
            ledger_entries::ActiveModel::from(entry)
                .insert(&txn)
                .await
                .map_err(|err| {
                    if is_unique_violation(&err) {
                        StoreError::DuplicateReference(entry.reference_id.clone())
                    } else {
                        technical(err)
                    }
                })?;
        }

        outbox_records::ActiveModel::from(&unit.outbox)
            .insert(&txn)
            .await
            .map_err(technical)?;

        txn.commit().await.map_err(technical)
    }

    async fn read_wallet(&self, id: Uuid) -> Result<Option<Wallet>, StoreError> {
        wallets::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .map_err(technical)?
            .map(Wallet::try_from)
            .transpose()
    }

    async fn read_wallets_by_user(&self, user_id: &str) -> Result<Vec<Wallet>, StoreError> {
        wallets::Entity::find()
            .filter(wallets::Column::UserId.eq(user_id))
            .order_by_asc(wallets::Column::CreatedAt)
            .all(&self.db)
            .await
            .map_err(technical)?
            .into_iter()
            .map(Wallet::try_from)
            .collect()
    }

    async fn find_wallet(&self, user_id: &str, currency: &Currency) -> Result<Option<Wallet>, StoreError> {
        wallets::Entity::find()
            .filter(wallets::Column::UserId.eq(user_id))
            .filter(wallets::Column::Currency.eq(currency.as_str()))
            .one(&self.db)
            .await
            .map_err(technical)?
            .map(Wallet::try_from)
            .transpose()
    }

    async fn find_entry_by_reference(&self, reference_id: &str) -> Result<Option<LedgerEntry>, StoreError> {
        ledger_entries::Entity::find()
            .filter(ledger_entries::Column::ReferenceId.eq(reference_id))
            .one(&self.db)
            .await
            .map_err(technical)?
            .map(LedgerEntry::try_from)
            .transpose()
    }

    async fn entries_for_wallet(&self, wallet_id: Uuid, until: DateTime<Utc>) -> Result<Vec<LedgerEntry>, StoreError> {
        ledger_entries::Entity::find()
            .filter(
                Condition::any()
                    .add(ledger_entries::Column::WalletId.eq(wallet_id))
                    .add(ledger_entries::Column::CounterpartyWalletId.eq(wallet_id)),
            )
            .filter(ledger_entries::Column::CreatedAt.lte(until))
            .order_by_asc(ledger_entries::Column::CreatedAt)
            .order_by_asc(ledger_entries::Column::Id)
            .all(&self.db)
            .await
            .map_err(technical)?
            .into_iter()
            .map(LedgerEntry::try_from)
            .collect()
    }

    async fn pending_outbox(&self, limit: usize) -> Result<Vec<OutboxRecord>, StoreError> {
        outbox_records::Entity::find()
            .filter(outbox_records::Column::PublishedAt.is_null())
            .order_by_asc(outbox_records::Column::CreatedAt)
            .order_by_asc(outbox_records::Column::Id)
            .limit(limit as u64)
            .all(&self.db)
            .await
            .map_err(technical)?
            .into_iter()
            .map(OutboxRecord::try_from)
            .collect()
    }

    async fn stalled_outbox(&self, min_attempts: u32, limit: usize) -> Result<Vec<OutboxRecord>, StoreError> {
        outbox_records::Entity::find()
            .filter(outbox_records::Column::PublishedAt.is_null())
            .filter(outbox_records::Column::AttemptCount.gte(min_attempts as i64))
            .order_by_asc(outbox_records::Column::CreatedAt)
            .order_by_asc(outbox_records::Column::Id)
            .limit(limit as u64)
            .all(&self.db)
            .await
            .map_err(technical)?
            .into_iter()
            .map(OutboxRecord::try_from)
            .collect()
    }

    async fn mark_published(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), StoreError> {
        outbox_records::Entity::update_many()
            .col_expr(outbox_records::Column::PublishedAt, Expr::value(at))
            .filter(outbox_records::Column::Id.eq(id))
            .filter(outbox_records::Column::PublishedAt.is_null())
            .exec(&self.db)
            .await
            .map_err(technical)?;
        Ok(())
    }

    async fn record_publish_failure(&self, id: Uuid, error: &str) -> Result<u32, StoreError> {
        let txn = self.db.begin().await.map_err(technical)?;

        let updated = outbox_records::Entity::update_many()
            .col_expr(
                outbox_records::Column::AttemptCount,
                Expr::col(outbox_records::Column::AttemptCount).add(1),
            )
            .col_expr(outbox_records::Column::LastError, Expr::value(error))
            .filter(outbox_records::Column::Id.eq(id))
            .filter(outbox_records::Column::PublishedAt.is_null())
            .exec(&txn)
            .await
            .map_err(technical)?;
        if updated.rows_affected == 0 {
            txn.commit().await.map_err(technical)?;
            return Ok(0);
        }

        let record = outbox_records::Entity::find_by_id(id)
            .one(&txn)
            .await
            .map_err(technical)?
            .ok_or_else(|| StoreError::Corrupt(format!("outbox record {id} vanished")))?;
        txn.commit().await.map_err(technical)?;

        Ok(OutboxRecord::try_from(record)?.attempt_count)
    }

    async fn count_pending_outbox(&self) -> Result<u64, StoreError> {
        outbox_records::Entity::find()
            .filter(outbox_records::Column::PublishedAt.is_null())
            .count(&self.db)
            .await
            .map_err(technical)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.db.ping().await.map_err(technical)
    }
}
