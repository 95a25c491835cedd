use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .if_not_exists()
                    .table(Wallet::Table)
                    .col(ColumnDef::new(Wallet::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Wallet::UserId).string().not_null())
                    .col(ColumnDef::new(Wallet::Currency).string_len(3).not_null())
                    // Decimal text keeps full precision on every backend.
                    .col(ColumnDef::new(Wallet::Balance).string().not_null())
                    .col(ColumnDef::new(Wallet::Status).string().not_null())
                    .col(ColumnDef::new(Wallet::Version).big_integer().not_null())
                    .col(
                        ColumnDef::new(Wallet::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Wallet::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .take(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .table(Wallet::Table)
                    .col(Wallet::UserId)
                    .col(Wallet::Currency)
                    .unique()
                    .name("idx_wallets_user_id_currency")
                    .take(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().if_exists().table(Wallet::Table).take())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Wallet {
    #[sea_orm(iden = "wallets")]
    Table,
    Id,
    UserId,
    Currency,
    Balance,
    Status,
    Version,
    CreatedAt,
    UpdatedAt,
}
