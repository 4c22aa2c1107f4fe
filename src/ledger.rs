//! Type guesses: append-only (file, type, schema, score) facts.
//!
//! No ranking or deduplication happens here. A file may carry any number of
//! competing guesses; picking the best one is a query-time concern.

use sqlx::SqliteConnection;
use tracing::warn;

use crate::error::{CatalogError, Result};
use crate::files;
use crate::models::{CrawlId, FileId, GuessInput, SchemaId, TypeId};
use crate::reference;

/// Attach one guess to a recorded file, creating type and schema rows as needed.
///
/// `file_id` must exist and must have been observed in `crawl_id`.
pub async fn record_guess(
    conn: &mut SqliteConnection,
    file_id: FileId,
    crawl_id: CrawlId,
    guess: &GuessInput,
) -> Result<()> {
    check_score(guess.score)?;

    match files::crawl_of(conn, file_id).await? {
        None => {
            return Err(CatalogError::ReferentialViolation(format!(
                "file {} does not exist",
                file_id
            )))
        }
        Some(owner) if owner != crawl_id => {
            return Err(CatalogError::ReferentialViolation(format!(
                "file {} belongs to crawl {}, not crawl {}",
                file_id, owner, crawl_id
            )))
        }
        Some(_) => {}
    }

    let type_id =
        reference::get_or_create_type(conn, &guess.type_label, &guess.type_descriptor).await?;
    let schema_id =
        reference::get_or_create_schema(conn, &guess.schema_label, &guess.schema_descriptor)
            .await?;

    insert_guess(conn, file_id, crawl_id, type_id, schema_id, guess.score).await
}

async fn insert_guess(
    conn: &mut SqliteConnection,
    file_id: FileId,
    crawl_id: CrawlId,
    type_id: TypeId,
    schema_id: SchemaId,
    score: f64,
) -> Result<()> {
    sqlx::query(
        "INSERT INTO type_guesses (file_id, crawl_id, type_id, schema_id, score) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(file_id.get())
    .bind(crawl_id.get())
    .bind(type_id.get())
    .bind(schema_id.get())
    .bind(score)
    .execute(&mut *conn)
    .await
    .map_err(|e| CatalogError::from_insert(e, "type guess"))?;
    Ok(())
}

/// Scores are conventionally in `[0.0, 1.0]`; only non-finite values are refused.
fn check_score(score: f64) -> Result<()> {
    if !score.is_finite() {
        return Err(CatalogError::MalformedInput(format!(
            "score must be finite, got {}",
            score
        )));
    }
    if !(0.0..=1.0).contains(&score) {
        warn!(score, "guess score outside [0.0, 1.0]");
    }
    Ok(())
}
