//! File observations: one row per file per crawl.
//!
//! Rows are appended, never updated. Re-observing a path in a later crawl adds
//! a new row next to the old one, so the table is a history of what each crawl
//! saw rather than a mirror of the live filesystem.

use sqlx::SqliteConnection;

use crate::error::{CatalogError, Result};
use crate::models::{CrawlId, FileId, FileRecord};
use crate::reference;

/// Record a file under the crawl identified by `crawl_timestamp`, creating
/// the crawl row on first use.
pub async fn record_file(
    conn: &mut SqliteConnection,
    file: &FileRecord,
    crawl_timestamp: &str,
) -> Result<FileId> {
    let crawl_id = reference::get_or_create_crawl(conn, crawl_timestamp).await?;
    insert_file(conn, crawl_id, file).await
}

/// Insert a file row under an already-resolved crawl.
pub async fn insert_file(
    conn: &mut SqliteConnection,
    crawl_id: CrawlId,
    file: &FileRecord,
) -> Result<FileId> {
    if file.size < 0 {
        return Err(CatalogError::MalformedInput(format!(
            "negative size {} for '{}'",
            file.size, file.name
        )));
    }

    let done = sqlx::query(
        "INSERT INTO files (crawl_id, name, owner, size, modified, parent_path) VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(crawl_id.get())
    .bind(&file.name)
    .bind(&file.owner)
    .bind(file.size)
    .bind(&file.modified)
    .bind(&file.parent_path)
    .execute(&mut *conn)
    .await
    .map_err(|e| CatalogError::from_insert(e, "file"))?;

    Ok(FileId(done.last_insert_rowid()))
}

/// The crawl a file was observed in, or `None` if the file does not exist.
pub async fn crawl_of(conn: &mut SqliteConnection, file_id: FileId) -> Result<Option<CrawlId>> {
    let crawl: Option<i64> = sqlx::query_scalar("SELECT crawl_id FROM files WHERE file_id = ?")
        .bind(file_id.get())
        .fetch_optional(&mut *conn)
        .await?;
    Ok(crawl.map(CrawlId))
}
