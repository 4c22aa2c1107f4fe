use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use crate::config::CatalogConfig;
use crate::error::Result;

/// Write transactions take the database write lock at `BEGIN`, so contention
/// with another process waits out `busy_timeout` instead of failing with
/// SQLITE_BUSY on a read-to-write upgrade.
pub const BEGIN_WRITE: &str = "BEGIN IMMEDIATE";

pub async fn connect(db_path: &Path, config: &CatalogConfig) -> Result<SqlitePool> {
    // Ensure parent directory exists
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path.display()))?
        .create_if_missing(true)
        .foreign_keys(true)
        .busy_timeout(Duration::from_millis(config.busy_timeout_ms))
        .journal_mode(SqliteJournalMode::Wal);

    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .connect_with(options)
        .await?;

    Ok(pool)
}

/// A migrated pool over a throwaway store, for unit tests.
#[cfg(test)]
pub(crate) async fn scratch_pool() -> (tempfile::TempDir, SqlitePool) {
    let tmp = tempfile::TempDir::new().unwrap();
    let pool = connect(&tmp.path().join("catalog.db"), &CatalogConfig::default())
        .await
        .unwrap();
    crate::migrate::run_migrations(&pool).await.unwrap();
    (tmp, pool)
}
