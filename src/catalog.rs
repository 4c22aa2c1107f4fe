//! The catalog handle: storage lifecycle and the write-side API.
//!
//! A [`Catalog`] owns one SQLite pool over the store file. Writes go through
//! a transaction that also holds the catalog's write gate, so at most one
//! write transaction is in flight per handle. Across handles and processes,
//! write transactions start with `BEGIN IMMEDIATE` and queue on SQLite's
//! write lock for up to `busy_timeout`. Readers never take either lock.
//!
//! ```text
//!  crawl driver ──▶ Ingestion ──▶ files / type_guesses
//!                      │
//!                      └──▶ reference (crawls, types, schemas)
//! ```

use sqlx::{Sqlite, SqliteConnection, SqlitePool, Transaction};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{info, warn};

use crate::config::CatalogConfig;
use crate::db;
use crate::error::Result;
use crate::files;
use crate::ledger;
use crate::migrate;
use crate::models::{CrawlId, FileId, FileRecord, GuessInput, SchemaId, TypeId};
use crate::reference;
use crate::timestamp::TimestampFormat;

pub struct Catalog {
    pool: SqlitePool,
    path: PathBuf,
    write_gate: Arc<Mutex<()>>,
    timestamps: TimestampFormat,
}

impl Catalog {
    /// Open the store at `path`, creating the file and tables if needed.
    pub async fn open(path: &Path, config: &CatalogConfig) -> Result<Self> {
        let timestamps = config.timestamps();
        timestamps.check()?;
        let existed = path.exists();
        let pool = db::connect(path, config).await?;
        migrate::run_migrations(&pool).await?;
        info!(path = %path.display(), created = !existed, "catalog opened");

        Ok(Self {
            pool,
            path: path.to_path_buf(),
            write_gate: Arc::new(Mutex::new(())),
            timestamps,
        })
    }

    pub async fn close(self) {
        self.pool.close().await;
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn timestamps(&self) -> &TimestampFormat {
        &self.timestamps
    }

    pub(crate) fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Start a write transaction. Waits for any other writer on this handle,
    /// then for the store's write lock.
    pub async fn begin_ingest(&self) -> Result<Ingestion> {
        let gate = self.write_gate.clone().lock_owned().await;
        let tx = self.pool.begin_with(db::BEGIN_WRITE).await?;
        Ok(Ingestion { tx, _gate: gate })
    }

    pub async fn get_or_create_crawl(&self, timestamp: &str) -> Result<CrawlId> {
        let mut ingest = self.begin_ingest().await?;
        let id = ingest.get_or_create_crawl(timestamp).await?;
        ingest.commit().await?;
        Ok(id)
    }

    pub async fn get_or_create_type(&self, label: &str, descriptor: &str) -> Result<TypeId> {
        let mut ingest = self.begin_ingest().await?;
        let id = ingest.get_or_create_type(label, descriptor).await?;
        ingest.commit().await?;
        Ok(id)
    }

    pub async fn get_or_create_schema(&self, label: &str, descriptor: &str) -> Result<SchemaId> {
        let mut ingest = self.begin_ingest().await?;
        let id = ingest.get_or_create_schema(label, descriptor).await?;
        ingest.commit().await?;
        Ok(id)
    }

    /// Record a single file in its own transaction.
    pub async fn record_file(&self, file: &FileRecord, crawl_timestamp: &str) -> Result<FileId> {
        let mut ingest = self.begin_ingest().await?;
        let id = ingest.record_file(file, crawl_timestamp).await?;
        ingest.commit().await?;
        Ok(id)
    }

    /// Record a single guess in its own transaction.
    pub async fn record_guess(
        &self,
        file_id: FileId,
        crawl_id: CrawlId,
        guess: &GuessInput,
    ) -> Result<()> {
        let mut ingest = self.begin_ingest().await?;
        ingest.record_guess(file_id, crawl_id, guess).await?;
        ingest.commit().await
    }

    /// Record a file and all of its guesses atomically.
    ///
    /// Either the file row and every guess row land, or none of them do.
    pub async fn ingest_file(
        &self,
        file: &FileRecord,
        crawl_timestamp: &str,
        guesses: &[GuessInput],
    ) -> Result<FileId> {
        let mut ingest = self.begin_ingest().await?;
        let written = write_file(&mut ingest, file, crawl_timestamp, guesses).await;
        match written {
            Ok(file_id) => {
                ingest.commit().await?;
                Ok(file_id)
            }
            Err(err) => {
                if let Err(rollback_err) = ingest.rollback().await {
                    warn!(
                        file = %file.name,
                        error = %rollback_err,
                        "rollback failed after ingest error"
                    );
                }
                Err(err)
            }
        }
    }
}

async fn write_file(
    ingest: &mut Ingestion,
    file: &FileRecord,
    crawl_timestamp: &str,
    guesses: &[GuessInput],
) -> Result<FileId> {
    let crawl_id = ingest.get_or_create_crawl(crawl_timestamp).await?;
    let file_id = ingest.record_file_in_crawl(crawl_id, file).await?;
    for guess in guesses {
        ingest.record_guess(file_id, crawl_id, guess).await?;
    }
    Ok(file_id)
}

/// An open write transaction. Dropping it without [`commit`](Ingestion::commit)
/// rolls back every row written through it.
pub struct Ingestion {
    tx: Transaction<'static, Sqlite>,
    _gate: OwnedMutexGuard<()>,
}

impl Ingestion {
    fn conn(&mut self) -> &mut SqliteConnection {
        &mut self.tx
    }

    pub async fn get_or_create_crawl(&mut self, timestamp: &str) -> Result<CrawlId> {
        reference::get_or_create_crawl(self.conn(), timestamp).await
    }

    pub async fn get_or_create_type(&mut self, label: &str, descriptor: &str) -> Result<TypeId> {
        reference::get_or_create_type(self.conn(), label, descriptor).await
    }

    pub async fn get_or_create_schema(
        &mut self,
        label: &str,
        descriptor: &str,
    ) -> Result<SchemaId> {
        reference::get_or_create_schema(self.conn(), label, descriptor).await
    }

    pub async fn record_file(&mut self, file: &FileRecord, crawl_timestamp: &str) -> Result<FileId> {
        files::record_file(self.conn(), file, crawl_timestamp).await
    }

    pub async fn record_file_in_crawl(
        &mut self,
        crawl_id: CrawlId,
        file: &FileRecord,
    ) -> Result<FileId> {
        files::insert_file(self.conn(), crawl_id, file).await
    }

    pub async fn record_guess(
        &mut self,
        file_id: FileId,
        crawl_id: CrawlId,
        guess: &GuessInput,
    ) -> Result<()> {
        ledger::record_guess(self.conn(), file_id, crawl_id, guess).await
    }

    pub async fn commit(self) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }

    pub async fn rollback(self) -> Result<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}
