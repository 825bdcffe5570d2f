use crate::config::DatabaseConfig;
use crate::error::AppResult;
use migration::{Migrator, MigratorTrait};
use sea_orm::{
    ConnectOptions, Database, DatabaseConnection, DatabaseTransaction, IsolationLevel,
    TransactionTrait,
};
use std::time::Duration;

pub type DbPool = DatabaseConnection;

pub async fn create_pool(config: &DatabaseConfig) -> AppResult<DbPool> {
    let mut opts = ConnectOptions::new(config.url.clone());
    opts.max_connections(config.max_connections)
        .connect_timeout(Duration::from_secs(10))
        .sqlx_logging(false);

    let pool = Database::connect(opts).await?;
    Ok(pool)
}

pub async fn run_migrations(pool: &DbPool) -> AppResult<()> {
    Migrator::up(pool, None).await?;
    Ok(())
}

/// Every mutating unit runs at SERIALIZABLE. SQLite ignores the level and
/// serialises writers on its own.
pub async fn begin_serializable<C>(db: &C) -> AppResult<DatabaseTransaction>
where
    C: TransactionTrait,
{
    let txn = db
        .begin_with_config(Some(IsolationLevel::Serializable), None)
        .await?;
    Ok(txn)
}
