//! Catalog error types.
//!
//! Storage and referential errors abort the in-flight operation and are
//! returned to the caller. Malformed identifiers are reported here but the
//! query layer degrades them to "not found" (see [`crate::query`]).

use thiserror::Error;

/// Errors raised by catalog operations.
#[derive(Error, Debug)]
pub enum CatalogError {
    /// The store could not be opened, read, or written.
    #[error("storage failure: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("storage i/o failure: {0}")]
    Io(#[from] std::io::Error),

    /// An insertion referenced a crawl, file, type, or schema row that does not exist.
    #[error("referential violation: {0}")]
    ReferentialViolation(String),

    /// A caller-supplied value (identifier, score) could not be accepted.
    #[error("malformed input: {0}")]
    MalformedInput(String),
}

pub type Result<T> = std::result::Result<T, CatalogError>;

impl CatalogError {
    /// Map a storage error, turning foreign-key failures into
    /// [`CatalogError::ReferentialViolation`].
    pub(crate) fn from_insert(err: sqlx::Error, what: &str) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.is_foreign_key_violation() {
                return CatalogError::ReferentialViolation(format!(
                    "{} references a missing row: {}",
                    what,
                    db_err.message()
                ));
            }
        }
        CatalogError::Storage(err)
    }

    /// True when the error came from a UNIQUE constraint.
    pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
        matches!(err, sqlx::Error::Database(db_err) if db_err.is_unique_violation())
    }
}
