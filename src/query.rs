//! Read-only views over the catalog.
//!
//! Queries that assemble a result from several statements (the summaries,
//! and [`Catalog::file_summaries_under_path`]) run inside one read
//! transaction, so the result reflects a single snapshot even while a crawl
//! is writing. The rest are single statements against the pool. Nothing here
//! mutates a table.
//!
//! # Path prefixes
//!
//! [`Catalog::files_under_path`] matches whole path components: trailing `/`
//! separators are stripped from the prefix, and a file matches when its parent
//! path equals the prefix or continues it with `/`. So `/a/b` matches `/a/b`
//! and `/a/b/c` but not `/a/bb`. An empty prefix matches every file.

use serde::Serialize;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use std::str::FromStr;
use tracing::debug;

use crate::catalog::Catalog;
use crate::error::{CatalogError, Result};
use crate::models::{
    Crawl, CrawlId, FileId, FileObservation, SchemaDescriptor, SchemaId, TypeDescriptor, TypeGuess,
    TypeId,
};

/// One guess joined with its file, type, and schema rows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GuessSummary {
    pub file_id: FileId,
    pub file_name: String,
    pub crawl_id: CrawlId,
    #[serde(rename = "type")]
    pub type_descriptor: TypeDescriptor,
    #[serde(rename = "schema")]
    pub schema_descriptor: SchemaDescriptor,
    pub score: f64,
}

/// A file observation with its crawl and all of its guesses, best first.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileSummary {
    pub id: FileId,
    pub name: String,
    pub owner: String,
    pub size: i64,
    pub modified: String,
    pub parent_path: String,
    pub crawl: Crawl,
    pub guesses: Vec<GuessSummary>,
}

impl FileSummary {
    /// The highest-scoring guess, if any.
    pub fn best_guess(&self) -> Option<&GuessSummary> {
        self.guesses.first()
    }

    pub fn path(&self) -> String {
        join_path(&self.parent_path, &self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TypeSummary {
    #[serde(flatten)]
    pub descriptor: TypeDescriptor,
    pub guesses: Vec<GuessSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchemaSummary {
    #[serde(flatten)]
    pub descriptor: SchemaDescriptor,
    pub guesses: Vec<GuessSummary>,
}

/// Row counts for each catalog table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CatalogStats {
    pub crawls: i64,
    pub files: i64,
    pub types: i64,
    pub schemas: i64,
    pub guesses: i64,
}

const GUESS_SELECT: &str = r#"
    SELECT g.file_id, f.name AS file_name, g.crawl_id, g.score,
           t.type_id, t.type_label, t.type_descriptor,
           s.schema_id, s.schema_label, s.schema_descriptor
    FROM type_guesses g
    JOIN files f ON f.file_id = g.file_id
    JOIN types t ON t.type_id = g.type_id
    JOIN schemas s ON s.schema_id = g.schema_id
"#;

const GUESS_ORDER: &str = "ORDER BY g.score DESC, g.rowid ASC";

const FILE_COLUMNS: &str = "file_id, crawl_id, name, owner, size, modified, parent_path";

impl Catalog {
    /// Ids of every file observation under `prefix`, in insertion order.
    pub async fn files_under_path(&self, prefix: &str) -> Result<Vec<FileId>> {
        let mut conn = self.pool().acquire().await?;
        file_ids_under(&mut conn, prefix).await
    }

    /// Summaries of every file under `prefix`, in insertion order, read from
    /// one snapshot.
    pub async fn file_summaries_under_path(&self, prefix: &str) -> Result<Vec<FileSummary>> {
        let mut tx = self.pool().begin().await?;
        let mut summaries = Vec::new();
        for id in file_ids_under(&mut tx, prefix).await? {
            if let Some(summary) = load_file_summary(&mut tx, id).await? {
                summaries.push(summary);
            }
        }
        tx.commit().await?;
        Ok(summaries)
    }

    pub async fn file_summary(&self, id: FileId) -> Result<Option<FileSummary>> {
        let mut tx = self.pool().begin().await?;
        let summary = load_file_summary(&mut tx, id).await?;
        tx.commit().await?;
        Ok(summary)
    }

    /// Raw guess rows for one file, in the order they were recorded.
    pub async fn guesses_of_file(&self, id: FileId) -> Result<Vec<TypeGuess>> {
        let rows = sqlx::query(
            r#"
            SELECT file_id, crawl_id, type_id, schema_id, score
            FROM type_guesses
            WHERE file_id = ?
            ORDER BY rowid
            "#,
        )
        .bind(id.get())
        .fetch_all(self.pool())
        .await?;
        Ok(rows
            .iter()
            .map(|row| TypeGuess {
                file_id: FileId(row.get("file_id")),
                crawl_id: CrawlId(row.get("crawl_id")),
                type_id: TypeId(row.get("type_id")),
                schema_id: SchemaId(row.get("schema_id")),
                score: row.get("score"),
            })
            .collect())
    }

    pub async fn type_summary(&self, id: TypeId) -> Result<Option<TypeSummary>> {
        let mut tx = self.pool().begin().await?;

        let row = sqlx::query("SELECT type_id, type_label, type_descriptor FROM types WHERE type_id = ?")
            .bind(id.get())
            .fetch_optional(&mut *tx)
            .await?;
        let descriptor = match row {
            Some(row) => type_from_row(&row),
            None => return Ok(None),
        };

        let guesses = guesses_where(&mut tx, "g.type_id", id.get()).await?;
        tx.commit().await?;
        Ok(Some(TypeSummary {
            descriptor,
            guesses,
        }))
    }

    pub async fn schema_summary(&self, id: SchemaId) -> Result<Option<SchemaSummary>> {
        let mut tx = self.pool().begin().await?;

        let row = sqlx::query(
            "SELECT schema_id, schema_label, schema_descriptor FROM schemas WHERE schema_id = ?",
        )
        .bind(id.get())
        .fetch_optional(&mut *tx)
        .await?;
        let descriptor = match row {
            Some(row) => schema_from_row(&row),
            None => return Ok(None),
        };

        let guesses = guesses_where(&mut tx, "g.schema_id", id.get()).await?;
        tx.commit().await?;
        Ok(Some(SchemaSummary {
            descriptor,
            guesses,
        }))
    }

    /// Like [`file_summary`](Catalog::file_summary), but a malformed id is "not found".
    pub async fn file_summary_str(&self, raw: &str) -> Result<Option<FileSummary>> {
        match parse_id::<FileId>(raw) {
            Some(id) => self.file_summary(id).await,
            None => Ok(None),
        }
    }

    pub async fn type_summary_str(&self, raw: &str) -> Result<Option<TypeSummary>> {
        match parse_id::<TypeId>(raw) {
            Some(id) => self.type_summary(id).await,
            None => Ok(None),
        }
    }

    pub async fn schema_summary_str(&self, raw: &str) -> Result<Option<SchemaSummary>> {
        match parse_id::<SchemaId>(raw) {
            Some(id) => self.schema_summary(id).await,
            None => Ok(None),
        }
    }

    pub async fn list_crawls(&self) -> Result<Vec<Crawl>> {
        let rows = sqlx::query("SELECT crawl_id, last_examined FROM crawls ORDER BY crawl_id")
            .fetch_all(self.pool())
            .await?;
        Ok(rows
            .iter()
            .map(|row| Crawl {
                id: CrawlId(row.get("crawl_id")),
                last_examined: row.get("last_examined"),
            })
            .collect())
    }

    /// Every observation of one file across crawls, oldest first.
    pub async fn file_history(&self, parent_path: &str, name: &str) -> Result<Vec<FileObservation>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM files WHERE parent_path = ? AND name = ? ORDER BY file_id",
            FILE_COLUMNS
        ))
        .bind(parent_path)
        .bind(name)
        .fetch_all(self.pool())
        .await?;
        Ok(rows.iter().map(file_from_row).collect())
    }

    pub async fn stats(&self) -> Result<CatalogStats> {
        let row = sqlx::query(
            r#"
            SELECT
                (SELECT COUNT(*) FROM crawls) AS crawls,
                (SELECT COUNT(*) FROM files) AS files,
                (SELECT COUNT(*) FROM types) AS types,
                (SELECT COUNT(*) FROM schemas) AS schemas,
                (SELECT COUNT(*) FROM type_guesses) AS guesses
            "#,
        )
        .fetch_one(self.pool())
        .await?;

        Ok(CatalogStats {
            crawls: row.get("crawls"),
            files: row.get("files"),
            types: row.get("types"),
            schemas: row.get("schemas"),
            guesses: row.get("guesses"),
        })
    }
}

fn parse_id<T>(raw: &str) -> Option<T>
where
    T: FromStr<Err = CatalogError>,
{
    match raw.parse::<T>() {
        Ok(id) => Some(id),
        Err(err) => {
            debug!(%err, "malformed id treated as not found");
            None
        }
    }
}

async fn file_ids_under(conn: &mut SqliteConnection, prefix: &str) -> Result<Vec<FileId>> {
    let prefix = normalize_prefix(prefix);
    let ids: Vec<i64> = if prefix.is_empty() {
        sqlx::query_scalar("SELECT file_id FROM files ORDER BY file_id")
            .fetch_all(&mut *conn)
            .await?
    } else {
        let nested = if prefix.ends_with('/') {
            prefix.clone()
        } else {
            format!("{}/", prefix)
        };
        sqlx::query_scalar(
            r#"
            SELECT file_id FROM files
            WHERE parent_path = ? OR substr(parent_path, 1, length(?)) = ?
            ORDER BY file_id
            "#,
        )
        .bind(&prefix)
        .bind(&nested)
        .bind(&nested)
        .fetch_all(&mut *conn)
        .await?
    };
    Ok(ids.into_iter().map(FileId).collect())
}

async fn load_file_summary(conn: &mut SqliteConnection, id: FileId) -> Result<Option<FileSummary>> {
    let file = sqlx::query(&format!(
        "SELECT {} FROM files WHERE file_id = ?",
        FILE_COLUMNS
    ))
    .bind(id.get())
    .fetch_optional(&mut *conn)
    .await?;
    let file = match file {
        Some(row) => file_from_row(&row),
        None => return Ok(None),
    };

    let crawl_row = sqlx::query("SELECT crawl_id, last_examined FROM crawls WHERE crawl_id = ?")
        .bind(file.crawl_id.get())
        .fetch_one(&mut *conn)
        .await?;
    let crawl = Crawl {
        id: CrawlId(crawl_row.get("crawl_id")),
        last_examined: crawl_row.get("last_examined"),
    };

    let guesses = guesses_where(conn, "g.file_id", id.get()).await?;

    Ok(Some(FileSummary {
        id: file.id,
        name: file.name,
        owner: file.owner,
        size: file.size,
        modified: file.modified,
        parent_path: file.parent_path,
        crawl,
        guesses,
    }))
}

async fn guesses_where(
    conn: &mut SqliteConnection,
    column: &str,
    id: i64,
) -> Result<Vec<GuessSummary>> {
    let rows = sqlx::query(&format!(
        "{} WHERE {} = ? {}",
        GUESS_SELECT, column, GUESS_ORDER
    ))
    .bind(id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(rows.iter().map(guess_from_row).collect())
}

fn guess_from_row(row: &SqliteRow) -> GuessSummary {
    GuessSummary {
        file_id: FileId(row.get("file_id")),
        file_name: row.get("file_name"),
        crawl_id: CrawlId(row.get("crawl_id")),
        type_descriptor: type_from_row(row),
        schema_descriptor: schema_from_row(row),
        score: row.get("score"),
    }
}

fn file_from_row(row: &SqliteRow) -> FileObservation {
    FileObservation {
        id: FileId(row.get("file_id")),
        crawl_id: CrawlId(row.get("crawl_id")),
        name: row.get("name"),
        owner: row.get("owner"),
        size: row.get("size"),
        modified: row.get("modified"),
        parent_path: row.get("parent_path"),
    }
}

fn type_from_row(row: &SqliteRow) -> TypeDescriptor {
    TypeDescriptor {
        id: TypeId(row.get("type_id")),
        label: row.get("type_label"),
        descriptor: row.get("type_descriptor"),
    }
}

fn schema_from_row(row: &SqliteRow) -> SchemaDescriptor {
    SchemaDescriptor {
        id: SchemaId(row.get("schema_id")),
        label: row.get("schema_label"),
        descriptor: row.get("schema_descriptor"),
    }
}

/// Strip trailing separators, keeping a bare `/` intact.
pub fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim_end_matches('/');
    if trimmed.is_empty() && prefix.starts_with('/') {
        "/".to_string()
    } else {
        trimmed.to_string()
    }
}

fn join_path(parent: &str, name: &str) -> String {
    if parent.ends_with('/') {
        format!("{}{}", parent, name)
    } else {
        format!("{}/{}", parent, name)
    }
}
