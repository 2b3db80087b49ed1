//! Database module
//!
//! This module provides the relational backend:
//! - Schema and migrations
//! - Model definitions and row validation
//! - Per-user repository implementing the persistence adapter
//! - Account storage for the identity service

pub mod accounts;
pub mod models;
pub mod repository;
pub mod schema;

pub use accounts::{Account, Accounts};
pub use models::*;
pub use repository::Repository;
pub use schema::{initialize_database, latest_version, schema_version};

use crate::error::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::path::Path;
use std::time::Duration;

/// Connections held by the application pool
const POOL_SIZE: u32 = 5;

/// How long a writer waits on a locked database before failing
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

async fn open_pool(db_path: &Path, max_connections: u32) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .busy_timeout(BUSY_TIMEOUT)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal);

    Ok(SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await?)
}

/// Open the database at `db_path`, creating it and applying migrations.
///
/// Migrations run over a single connection that is closed before the
/// shared pool opens, so no pooled connection predates the schema.
pub async fn create_pool(db_path: &Path) -> Result<SqlitePool> {
    if let Some(parent) = db_path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let migrator = open_pool(db_path, 1).await?;
    initialize_database(&migrator).await?;
    migrator.close().await;

    let pool = open_pool(db_path, POOL_SIZE).await?;
    tracing::info!("Opened database at {:?}", db_path);
    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_create_pool_builds_file_and_schema() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join("creatorflow.sqlite");

        let pool = create_pool(&path).await.unwrap();
        assert!(path.exists());
        assert_eq!(schema_version(&pool).await.unwrap(), latest_version());

        // Reopening an existing file is a no-op for the schema
        drop(pool);
        let pool = create_pool(&path).await.unwrap();
        assert_eq!(schema_version(&pool).await.unwrap(), latest_version());
    }
}
