//! Storage layer for spendgate.
//!
//! This crate provides:
//! - Store traits whose tenant-data methods only accept tenant-scoped input
//! - An in-memory store for tests and local runs
//! - A `SeaORM` PostgreSQL store with its migrations

pub mod entities;
pub mod error;
pub mod memory;
pub mod migration;
pub mod postgres;
pub mod store;

pub use error::StoreError;
pub use memory::MemoryStore;
pub use postgres::PgStore;
pub use store::{
    CompanyStore, StatusChangeOutcome, Store, StoreResult, TradeSpendStore, UserFilter, UserStore,
    UserTotals,
};

use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};
use spendgate_shared::config::DatabaseConfig;

/// Establishes a connection pool to the database.
///
/// # Errors
///
/// Returns an error if the connection cannot be established.
pub async fn connect(config: &DatabaseConfig) -> Result<DatabaseConnection, DbErr> {
    let mut options = ConnectOptions::new(config.url.as_str());
    options
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .sqlx_logging(false);
    Database::connect(options).await
}
