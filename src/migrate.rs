//! Table definitions for the five catalog tables.
//!
//! Every statement is `IF NOT EXISTS`, so opening an existing store is a no-op.

use sqlx::SqlitePool;

use crate::db;
use crate::error::Result;

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS crawls (
        crawl_id INTEGER PRIMARY KEY AUTOINCREMENT,
        last_examined TEXT NOT NULL,
        UNIQUE(last_examined)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS files (
        file_id INTEGER PRIMARY KEY AUTOINCREMENT,
        crawl_id INTEGER NOT NULL,
        name TEXT NOT NULL,
        owner TEXT NOT NULL,
        size INTEGER NOT NULL,
        modified TEXT NOT NULL,
        parent_path TEXT NOT NULL,
        FOREIGN KEY (crawl_id) REFERENCES crawls(crawl_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS types (
        type_id INTEGER PRIMARY KEY AUTOINCREMENT,
        type_label TEXT NOT NULL,
        type_descriptor TEXT NOT NULL,
        UNIQUE(type_label, type_descriptor)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS schemas (
        schema_id INTEGER PRIMARY KEY AUTOINCREMENT,
        schema_label TEXT NOT NULL,
        schema_descriptor TEXT NOT NULL,
        UNIQUE(schema_label, schema_descriptor)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS type_guesses (
        file_id INTEGER NOT NULL,
        crawl_id INTEGER NOT NULL,
        type_id INTEGER NOT NULL,
        schema_id INTEGER NOT NULL,
        score REAL NOT NULL,
        FOREIGN KEY (file_id) REFERENCES files(file_id),
        FOREIGN KEY (crawl_id) REFERENCES crawls(crawl_id),
        FOREIGN KEY (type_id) REFERENCES types(type_id),
        FOREIGN KEY (schema_id) REFERENCES schemas(schema_id)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_files_parent_path ON files(parent_path)",
    "CREATE INDEX IF NOT EXISTS idx_files_crawl_id ON files(crawl_id)",
    "CREATE INDEX IF NOT EXISTS idx_type_guesses_file_id ON type_guesses(file_id)",
    "CREATE INDEX IF NOT EXISTS idx_type_guesses_type_id ON type_guesses(type_id)",
    "CREATE INDEX IF NOT EXISTS idx_type_guesses_schema_id ON type_guesses(schema_id)",
];

pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    let mut tx = pool.begin_with(db::BEGIN_WRITE).await?;
    for statement in SCHEMA {
        sqlx::query(statement).execute(&mut *tx).await?;
    }
    tx.commit().await?;
    Ok(())
}
