use std::time::Duration;

use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};
use wallet_ledger_migration::{Migrator, MigratorTrait};

use crate::config::DatabaseConfig;

/// Open a connection pool to `url`
///
/// Migrations run against the primary only, and only when enabled.
#[tracing::instrument(skip_all, fields(migrate = migrate && config.run_migrations))]
pub async fn connect(url: &str, config: &DatabaseConfig, migrate: bool) -> Result<DatabaseConnection, DbErr> {
    let mut options = ConnectOptions::new(url.to_string());
    options
        .connect_timeout(Duration::from_secs(config.connect_timeout))
        .acquire_timeout(Duration::from_secs(config.connect_timeout))
        .sqlx_logging(false);
    // Every in-memory SQLite connection is a separate database.
    if url.contains(":memory:") {
        options.max_connections(1);
    }

    let db = Database::connect(options).await?;
    tracing::info!("Database connected");

    if migrate && config.run_migrations {
        Migrator::up(&db, None).await?;
        tracing::info!("Migrations applied");
    }

    Ok(db)
}
