//! Storage layer for the polling service.
//!
//! - **Models**: storage-neutral [`models::Poll`], [`models::Vote`] and listing types
//! - **Repositories**: the [`PollStore`] and [`VoteLedger`] traits with in-memory
//!   and sea-orm implementations
//! - **Entities / migrations**: the `PostgreSQL` schema

pub mod entities;
pub mod migrations;
pub mod models;
pub mod repositories;

use polling_common::{AppError, config::DatabaseConfig};
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use std::time::Duration;

pub use repositories::{
    MemoryPollStore, MemoryVoteLedger, PollStore, SqlPollStore, SqlVoteLedger, VoteLedger,
};

/// Initialize database connection.
pub async fn init(config: &DatabaseConfig) -> Result<DatabaseConnection, AppError> {
    tracing::debug!(
        max_connections = config.max_connections,
        min_connections = config.min_connections,
        "Connecting to database"
    );

    let mut opt = ConnectOptions::new(&config.url);

    opt.max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .connect_timeout(Duration::from_secs(10))
        .acquire_timeout(Duration::from_secs(10))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .sqlx_logging(true);

    Database::connect(opt)
        .await
        .map_err(|e| AppError::Database(e.to_string()))
}

/// Run pending migrations.
pub async fn migrate(db: &DatabaseConnection) -> Result<(), AppError> {
    use sea_orm_migration::MigratorTrait;
    migrations::Migrator::up(db, None)
        .await
        .map_err(|e| AppError::Database(e.to_string()))
}
