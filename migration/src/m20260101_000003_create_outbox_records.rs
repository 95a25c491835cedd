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
                    .table(OutboxRecord::Table)
                    .col(ColumnDef::new(OutboxRecord::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(OutboxRecord::AggregateId).uuid().not_null())
                    .col(ColumnDef::new(OutboxRecord::EventType).string().not_null())
                    .col(ColumnDef::new(OutboxRecord::Payload).text().not_null())
                    .col(
                        ColumnDef::new(OutboxRecord::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(OutboxRecord::PublishedAt)
                            .timestamp_with_time_zone()
                            .null()
                            .default(None as Option<String>),
                    )
                    .col(
                        ColumnDef::new(OutboxRecord::AttemptCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(OutboxRecord::LastError).text().null())
                    .take(),
            )
            .await?;

        // Relay scan: WHERE published_at IS NULL ORDER BY created_at
        manager
            .create_index(
                Index::create()
                    .table(OutboxRecord::Table)
                    .col(OutboxRecord::PublishedAt)
                    .col(OutboxRecord::CreatedAt)
                    .name("idx_outbox_records_published_at_created_at")
                    .take(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .table(OutboxRecord::Table)
                    .col(OutboxRecord::AggregateId)
                    .name("idx_outbox_records_aggregate_id")
                    .take(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().if_exists().table(OutboxRecord::Table).take())
            .await
    }
}

#[derive(DeriveIden)]
pub enum OutboxRecord {
    #[sea_orm(iden = "outbox_records")]
    Table,
    Id,
    AggregateId,
    EventType,
    Payload,
    CreatedAt,
    PublishedAt,
    AttemptCount,
    LastError,
}
