use sea_orm_migration::prelude::*;

#[tokio::main]
async fn main() {
    cli::run_cli(wallet_ledger_migration::Migrator).await;
}
