use sea_orm_migration::prelude::*;

use crate::m20260101_000001_create_wallets::Wallet;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .if_not_exists()
                    .table(LedgerEntry::Table)
                    .col(ColumnDef::new(LedgerEntry::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(LedgerEntry::WalletId).uuid().not_null())
                    .col(ColumnDef::new(LedgerEntry::CounterpartyWalletId).uuid().null())
                    .col(ColumnDef::new(LedgerEntry::EntryType).string().not_null())
                    .col(ColumnDef::new(LedgerEntry::Amount).string().not_null())
                    .col(ColumnDef::new(LedgerEntry::ReferenceId).string().not_null())
                    .col(ColumnDef::new(LedgerEntry::Description).string().null())
                    .col(ColumnDef::new(LedgerEntry::Status).string().not_null())
                    .col(
                        ColumnDef::new(LedgerEntry::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(LedgerEntry::Table, LedgerEntry::WalletId)
                            .to(Wallet::Table, Wallet::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .take(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .table(LedgerEntry::Table)
                    .col(LedgerEntry::ReferenceId)
                    .unique()
                    .name("idx_ledger_entries_reference_id")
                    .take(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .table(LedgerEntry::Table)
                    .col(LedgerEntry::WalletId)
                    .col(LedgerEntry::CreatedAt)
                    .name("idx_ledger_entries_wallet_id_created_at")
                    .take(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .table(LedgerEntry::Table)
                    .col(LedgerEntry::CounterpartyWalletId)
                    .col(LedgerEntry::CreatedAt)
                    .name("idx_ledger_entries_counterparty_wallet_id_created_at")
                    .take(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().if_exists().table(LedgerEntry::Table).take())
            .await
    }
}

#[derive(DeriveIden)]
pub enum LedgerEntry {
    #[sea_orm(iden = "ledger_entries")]
    Table,
    Id,
    WalletId,
    CounterpartyWalletId,
    EntryType,
    Amount,
    ReferenceId,
    Description,
    Status,
    CreatedAt,
}
