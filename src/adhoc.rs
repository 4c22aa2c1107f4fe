//! Ad hoc queries for `catalog <storedir> --query <q>`.
//!
//! | Query | Result |
//! |-------|--------|
//! | `crawls` | every crawl, oldest first |
//! | `stats` | row counts per table |
//! | `files <prefix>` | file summaries under a path prefix |
//! | `file <id>` | one file summary |
//! | `type <id>` | a type and the guesses that reference it |
//! | `schema <id>` | a schema and the guesses that reference it |
//!
//! Output is pretty-printed JSON. A malformed or unknown id prints
//! `not found: <kind> <raw>` rather than failing.

use anyhow::{bail, Result};
use serde::Serialize;

use crate::catalog::Catalog;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdhocQuery {
    Crawls,
    Stats,
    FilesUnder(String),
    File(String),
    Type(String),
    Schema(String),
}

impl AdhocQuery {
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        let (verb, arg) = match raw.split_once(char::is_whitespace) {
            Some((verb, arg)) => (verb, arg.trim()),
            None => (raw, ""),
        };

        let query = match verb {
            "crawls" => AdhocQuery::Crawls,
            "stats" => AdhocQuery::Stats,
            "files" => AdhocQuery::FilesUnder(arg.to_string()),
            "file" => AdhocQuery::File(require_arg(verb, arg)?),
            "type" => AdhocQuery::Type(require_arg(verb, arg)?),
            "schema" => AdhocQuery::Schema(require_arg(verb, arg)?),
            other => bail!(
                "Unknown query: '{}'. Available: crawls, stats, files <prefix>, file <id>, type <id>, schema <id>",
                other
            ),
        };
        Ok(query)
    }
}

fn require_arg(verb: &str, arg: &str) -> Result<String> {
    if arg.is_empty() {
        bail!("query '{}' needs an id", verb);
    }
    Ok(arg.to_string())
}

/// Run a query and render its output.
pub async fn run_query(catalog: &Catalog, query: &AdhocQuery) -> Result<String> {
    match query {
        AdhocQuery::Crawls => to_json(&catalog.list_crawls().await?),
        AdhocQuery::Stats => to_json(&catalog.stats().await?),
        AdhocQuery::FilesUnder(prefix) => {
            to_json(&catalog.file_summaries_under_path(prefix).await?)
        }
        AdhocQuery::File(raw) => match catalog.file_summary_str(raw).await? {
            Some(summary) => to_json(&summary),
            None => Ok(not_found("file", raw)),
        },
        AdhocQuery::Type(raw) => match catalog.type_summary_str(raw).await? {
            Some(summary) => to_json(&summary),
            None => Ok(not_found("type", raw)),
        },
        AdhocQuery::Schema(raw) => match catalog.schema_summary_str(raw).await? {
            Some(summary) => to_json(&summary),
            None => Ok(not_found("schema", raw)),
        },
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

fn not_found(kind: &str, raw: &str) -> String {
    format!("not found: {} {}", kind, raw)
}
