//! Deduplicated reference rows: crawls, type descriptors, schema descriptors.
//!
//! All three domains resolve the same way: select by natural key, and insert
//! only when absent. The tables carry UNIQUE constraints on the natural key, so
//! an insert that loses a race fails with a unique violation; the resolver then
//! re-selects and returns the winner's id instead of creating a duplicate.

use sqlx::SqliteConnection;
use tracing::debug;

use crate::error::{CatalogError, Result};
use crate::models::{CrawlId, SchemaId, TypeId};

/// SQL for one reference domain, keyed on `keys.len()` text columns.
struct Domain {
    name: &'static str,
    select: &'static str,
    insert: &'static str,
}

const CRAWLS: Domain = Domain {
    name: "crawl",
    select: "SELECT crawl_id FROM crawls WHERE last_examined = ?",
    insert: "INSERT INTO crawls (last_examined) VALUES (?)",
};

const TYPES: Domain = Domain {
    name: "type",
    select: "SELECT type_id FROM types WHERE type_label = ? AND type_descriptor = ?",
    insert: "INSERT INTO types (type_label, type_descriptor) VALUES (?, ?)",
};

const SCHEMAS: Domain = Domain {
    name: "schema",
    select: "SELECT schema_id FROM schemas WHERE schema_label = ? AND schema_descriptor = ?",
    insert: "INSERT INTO schemas (schema_label, schema_descriptor) VALUES (?, ?)",
};

/// Resolve a crawl timestamp to its id. Matching is byte-for-byte.
pub async fn get_or_create_crawl(conn: &mut SqliteConnection, timestamp: &str) -> Result<CrawlId> {
    get_or_create(conn, &CRAWLS, &[timestamp]).await.map(CrawlId)
}

pub async fn get_or_create_type(
    conn: &mut SqliteConnection,
    label: &str,
    descriptor: &str,
) -> Result<TypeId> {
    get_or_create(conn, &TYPES, &[label, descriptor])
        .await
        .map(TypeId)
}

pub async fn get_or_create_schema(
    conn: &mut SqliteConnection,
    label: &str,
    descriptor: &str,
) -> Result<SchemaId> {
    get_or_create(conn, &SCHEMAS, &[label, descriptor])
        .await
        .map(SchemaId)
}

async fn get_or_create(conn: &mut SqliteConnection, domain: &Domain, keys: &[&str]) -> Result<i64> {
    if let Some(id) = lookup(conn, domain, keys).await? {
        debug!(domain = domain.name, id, "reference hit");
        return Ok(id);
    }
    insert_or_reselect(conn, domain, keys).await
}

/// Insert a row known to be absent. If another connection inserted the same
/// key since the lookup, return that row's id instead.
async fn insert_or_reselect(
    conn: &mut SqliteConnection,
    domain: &Domain,
    keys: &[&str],
) -> Result<i64> {
    let mut insert = sqlx::query(domain.insert);
    for key in keys {
        insert = insert.bind(*key);
    }

    let inserted = insert.execute(&mut *conn).await;
    match inserted {
        Ok(done) => {
            let id = done.last_insert_rowid();
            debug!(domain = domain.name, id, "reference created");
            Ok(id)
        }
        Err(err) if CatalogError::is_unique_violation(&err) => {
            debug!(domain = domain.name, "lost insert race, re-selecting winner");
            lookup(conn, domain, keys).await?.ok_or_else(|| {
                CatalogError::Storage(sqlx::Error::Protocol(format!(
                    "{} row vanished after unique conflict",
                    domain.name
                )))
            })
        }
        Err(err) => Err(err.into()),
    }
}

async fn lookup(conn: &mut SqliteConnection, domain: &Domain, keys: &[&str]) -> Result<Option<i64>> {
    let mut select = sqlx::query_scalar::<_, i64>(domain.select);
    for key in keys {
        select = select.bind(*key);
    }
    Ok(select.fetch_optional(&mut *conn).await?)
}
