//! # crawlcat
//!
//! An embedded metadata catalog for filesystem crawls.
//!
//! For each crawl the catalog records which files were seen, and which
//! structural type and schema an inference adapter guessed for each one, with
//! a confidence score. Everything lives in one SQLite file with five tables:
//!
//! ```text
//! ┌──────────┐      ┌──────────┐      ┌──────────────┐      ┌──────────┐
//! │  crawls  │◀─────│  files   │◀─────│ type_guesses │─────▶│  types   │
//! └──────────┘      └──────────┘      └──────┬───────┘      └──────────┘
//!       ▲                                    │              ┌──────────┐
//!       └────────────────────────────────────┴─────────────▶│ schemas  │
//!                                                           └──────────┘
//! ```
//!
//! ## Data Flow
//!
//! 1. The **crawl driver** ([`crawl`]) walks a tree and asks an
//!    [`inference::InferenceAdapter`] about each file.
//! 2. Each file and its guesses are written in one transaction through
//!    [`catalog::Catalog::ingest_file`]. Crawl, type, and schema rows are
//!    deduplicated by natural key ([`reference`]).
//! 3. The **query layer** ([`query`]) reads path-prefix listings and
//!    file/type/schema summaries back out. It never writes.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`catalog`] | Store lifecycle and the write-side API |
//! | [`reference`] | Get-or-create for crawls, types, schemas |
//! | [`files`] | Append-only file observations |
//! | [`ledger`] | Append-only type guesses |
//! | [`query`] | Read-only views |
//! | [`crawl`] | Filesystem crawl driver |
//! | [`inference`] | Inference adapter trait and placeholders |
//! | [`adhoc`] | `--query` command parsing and rendering |
//! | [`progress`] | Crawl progress on stderr |
//! | [`timestamp`] | Crawl key and mtime formatting |
//! | [`config`] | TOML configuration |
//! | [`db`] | Database connection |
//! | [`migrate`] | Table definitions |

pub mod adhoc;
pub mod catalog;
pub mod config;
pub mod crawl;
pub mod db;
pub mod error;
pub mod files;
pub mod inference;
pub mod ledger;
pub mod migrate;
pub mod models;
pub mod progress;
pub mod query;
pub mod reference;
pub mod timestamp;

pub use catalog::{Catalog, Ingestion};
pub use error::{CatalogError, Result};
pub use models::{CrawlId, FileId, FileRecord, GuessInput, SchemaId, TypeGuess, TypeId};
