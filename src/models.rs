//! Core data models for the catalog.
//!
//! Identifiers are catalog-assigned surrogate integers wrapped in newtypes so
//! a file id can never be passed where a type id is expected.

use serde::Serialize;
use std::fmt;
use std::str::FromStr;

use crate::error::CatalogError;

macro_rules! surrogate_id {
    ($(#[$meta:meta])* $name:ident, $kind:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl $name {
            pub fn get(self) -> i64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = CatalogError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.trim().parse::<i64>().map($name).map_err(|_| {
                    CatalogError::MalformedInput(format!("invalid {} id: '{}'", $kind, s))
                })
            }
        }
    };
}

surrogate_id!(
    /// Id of a row in `crawls`.
    CrawlId,
    "crawl"
);
surrogate_id!(
    /// Id of a row in `files`.
    FileId,
    "file"
);
surrogate_id!(
    /// Id of a row in `types`.
    TypeId,
    "type"
);
surrogate_id!(
    /// Id of a row in `schemas`.
    SchemaId,
    "schema"
);

/// One logical sweep of the filesystem, keyed by its caller-supplied timestamp.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Crawl {
    pub id: CrawlId,
    pub last_examined: String,
}

/// A file's metadata as seen during one crawl.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileObservation {
    pub id: FileId,
    pub crawl_id: CrawlId,
    pub name: String,
    pub owner: String,
    pub size: i64,
    pub modified: String,
    pub parent_path: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TypeDescriptor {
    pub id: TypeId,
    pub label: String,
    pub descriptor: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchemaDescriptor {
    pub id: SchemaId,
    pub label: String,
    pub descriptor: String,
}

/// A stored guess row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TypeGuess {
    pub file_id: FileId,
    pub crawl_id: CrawlId,
    pub type_id: TypeId,
    pub schema_id: SchemaId,
    pub score: f64,
}

/// Metadata for a file about to be recorded.
#[derive(Debug, Clone, PartialEq)]
pub struct FileRecord {
    pub name: String,
    pub owner: String,
    pub size: i64,
    pub modified: String,
    pub parent_path: String,
}

/// A (type, schema, score) guess about to be recorded.
#[derive(Debug, Clone, PartialEq)]
pub struct GuessInput {
    pub type_label: String,
    pub type_descriptor: String,
    pub schema_label: String,
    pub schema_descriptor: String,
    pub score: f64,
}

impl GuessInput {
    pub fn new(
        type_label: impl Into<String>,
        type_descriptor: impl Into<String>,
        schema_label: impl Into<String>,
        schema_descriptor: impl Into<String>,
        score: f64,
    ) -> Self {
        Self {
            type_label: type_label.into(),
            type_descriptor: type_descriptor.into(),
            schema_label: schema_label.into(),
            schema_descriptor: schema_descriptor.into(),
            score,
        }
    }
}
