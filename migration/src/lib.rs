pub use sea_orm_migration::prelude::*;

mod m20260101_000001_create_wallets;
mod m20260101_000002_create_ledger_entries;
mod m20260101_000003_create_outbox_records;

pub use m20260101_000001_create_wallets::Wallet;
pub use m20260101_000002_create_ledger_entries::LedgerEntry;
pub use m20260101_000003_create_outbox_records::OutboxRecord;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260101_000001_create_wallets::Migration),
            Box::new(m20260101_000002_create_ledger_entries::Migration),
            Box::new(m20260101_000003_create_outbox_records::Migration),
        ]
    }
}
