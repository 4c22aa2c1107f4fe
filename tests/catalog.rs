//! Integration tests for the catalog library API.
//!
//! Each test opens a fresh store in a temporary directory and drives the
//! public API the way a crawl driver or UI collaborator would.

use crawlcat::config::CatalogConfig;
use crawlcat::db;
use crawlcat::{Catalog, CatalogError, FileId, FileRecord, GuessInput};
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

async fn open_fresh() -> (TempDir, PathBuf, Catalog) {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("catalog.db");
    let catalog = Catalog::open(&path, &CatalogConfig::default()).await.unwrap();
    (tmp, path, catalog)
}

fn file(name: &str, parent: &str) -> FileRecord {
    FileRecord {
        name: name.to_string(),
        owner: "u".to_string(),
        size: 120,
        modified: "2021-06-01 10:00:00".to_string(),
        parent_path: parent.to_string(),
    }
}

fn csv_guess(score: f64) -> GuessInput {
    GuessInput::new("csv", "CSV", "s1", "desc1", score)
}

#[tokio::test]
async fn test_end_to_end_single_file() {
    let (_tmp, _path, catalog) = open_fresh().await;

    let crawl_id = catalog.get_or_create_crawl("T1").await.unwrap();
    let file_id = catalog
        .record_file(
            &FileRecord {
                name: "a.csv".to_string(),
                owner: "u".to_string(),
                size: 120,
                modified: "2021-06-01 10:00:00".to_string(),
                parent_path: "/data".to_string(),
            },
            "T1",
        )
        .await
        .unwrap();
    catalog
        .record_guess(file_id, crawl_id, &csv_guess(1.0))
        .await
        .unwrap();

    let stats = catalog.stats().await.unwrap();
    assert_eq!(stats.crawls, 1);
    assert_eq!(stats.files, 1);
    assert_eq!(stats.types, 1);
    assert_eq!(stats.schemas, 1);
    assert_eq!(stats.guesses, 1);

    let summary = catalog.file_summary(file_id).await.unwrap().unwrap();
    assert_eq!(summary.name, "a.csv");
    assert_eq!(summary.owner, "u");
    assert_eq!(summary.size, 120);
    assert_eq!(summary.modified, "2021-06-01 10:00:00");
    assert_eq!(summary.parent_path, "/data");
    assert_eq!(summary.path(), "/data/a.csv");
    assert_eq!(summary.crawl.id, crawl_id);
    assert_eq!(summary.crawl.last_examined, "T1");
    assert_eq!(summary.guesses.len(), 1);
    assert_eq!(summary.guesses[0].score, 1.0);
    assert_eq!(summary.guesses[0].type_descriptor.label, "csv");
    assert_eq!(summary.guesses[0].schema_descriptor.descriptor, "desc1");

    catalog.close().await;
}

#[tokio::test]
async fn test_reference_resolution_is_idempotent() {
    let (_tmp, _path, catalog) = open_fresh().await;

    let t1 = catalog.get_or_create_type("xml", "XML").await.unwrap();
    let t2 = catalog.get_or_create_type("xml", "XML").await.unwrap();
    assert_eq!(t1, t2);

    let s1 = catalog.get_or_create_schema("s", "d").await.unwrap();
    let s2 = catalog.get_or_create_schema("s", "d").await.unwrap();
    assert_eq!(s1, s2);

    let stats = catalog.stats().await.unwrap();
    assert_eq!(stats.types, 1);
    assert_eq!(stats.schemas, 1);
    catalog.close().await;
}

#[tokio::test]
async fn test_crawl_keys_are_exact_match() {
    let (_tmp, _path, catalog) = open_fresh().await;

    let a = catalog.get_or_create_crawl("2020-01-01 00:00:00").await.unwrap();
    let b = catalog.get_or_create_crawl("2020-01-01 00:00:01").await.unwrap();
    assert_ne!(a, b);

    let crawls = catalog.list_crawls().await.unwrap();
    assert_eq!(crawls.len(), 2);
    assert_eq!(crawls[0].last_examined, "2020-01-01 00:00:00");
    catalog.close().await;
}

#[tokio::test]
async fn test_path_prefix_matches_whole_components() {
    let (_tmp, _path, catalog) = open_fresh().await;

    let x = catalog.ingest_file(&file("x", "/a/b"), "T1", &[]).await.unwrap();
    let _y = catalog.ingest_file(&file("y", "/a/bb"), "T1", &[]).await.unwrap();
    let z = catalog.ingest_file(&file("z", "/a/b"), "T1", &[]).await.unwrap();
    let deep = catalog.ingest_file(&file("w", "/a/b/c"), "T1", &[]).await.unwrap();

    assert_eq!(catalog.files_under_path("/a/b").await.unwrap(), vec![x, z, deep]);
    assert_eq!(catalog.files_under_path("/a/b/").await.unwrap(), vec![x, z, deep]);
    assert_eq!(catalog.files_under_path("/a/b/c").await.unwrap(), vec![deep]);
    assert_eq!(catalog.files_under_path("/a").await.unwrap().len(), 4);
    assert_eq!(catalog.files_under_path("/").await.unwrap().len(), 4);
    assert!(catalog.files_under_path("/q").await.unwrap().is_empty());
    catalog.close().await;
}

#[tokio::test]
async fn test_observation_history_is_append_only() {
    let (_tmp, _path, catalog) = open_fresh().await;

    let first = catalog
        .ingest_file(&file("a.csv", "/data"), "2021-01-01 00:00:00", &[csv_guess(0.5)])
        .await
        .unwrap();
    let mut later = file("a.csv", "/data");
    later.size = 240;
    let second = catalog
        .ingest_file(&later, "2021-02-01 00:00:00", &[csv_guess(0.9)])
        .await
        .unwrap();
    assert_ne!(first, second);

    let history = catalog.file_history("/data", "a.csv").await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].size, 120);
    assert_eq!(history[1].size, 240);
    assert_ne!(history[0].crawl_id, history[1].crawl_id);

    let old = catalog.file_summary(first).await.unwrap().unwrap();
    assert_eq!(old.crawl.last_examined, "2021-01-01 00:00:00");
    assert_eq!(old.guesses[0].score, 0.5);
    catalog.close().await;
}

#[tokio::test]
async fn test_failed_guess_rolls_back_the_file() {
    let (_tmp, _path, catalog) = open_fresh().await;

    let result = catalog
        .ingest_file(
            &file("a.csv", "/data"),
            "T1",
            &[csv_guess(1.0), csv_guess(f64::NAN)],
        )
        .await;
    assert!(matches!(result, Err(CatalogError::MalformedInput(_))));

    let stats = catalog.stats().await.unwrap();
    assert_eq!(stats.crawls, 0);
    assert_eq!(stats.files, 0);
    assert_eq!(stats.types, 0);
    assert_eq!(stats.guesses, 0);
    catalog.close().await;
}

#[tokio::test]
async fn test_dropped_ingestion_rolls_back() {
    let (_tmp, _path, catalog) = open_fresh().await;

    {
        let mut ingest = catalog.begin_ingest().await.unwrap();
        ingest.record_file(&file("a.csv", "/data"), "T1").await.unwrap();
    }
    assert_eq!(catalog.stats().await.unwrap().files, 0);

    let mut ingest = catalog.begin_ingest().await.unwrap();
    let crawl_id = ingest.get_or_create_crawl("T1").await.unwrap();
    let file_id = ingest
        .record_file_in_crawl(crawl_id, &file("a.csv", "/data"))
        .await
        .unwrap();
    ingest.record_guess(file_id, crawl_id, &csv_guess(0.7)).await.unwrap();
    ingest.commit().await.unwrap();

    let stats = catalog.stats().await.unwrap();
    assert_eq!(stats.files, 1);
    assert_eq!(stats.guesses, 1);
    catalog.close().await;
}

#[tokio::test]
async fn test_explicit_rollback_discards_writes() {
    let (_tmp, _path, catalog) = open_fresh().await;

    let mut ingest = catalog.begin_ingest().await.unwrap();
    let file_id = ingest.record_file(&file("a.csv", "/data"), "T1").await.unwrap();
    ingest.get_or_create_type("csv", "CSV").await.unwrap();
    ingest.rollback().await.unwrap();

    assert!(catalog.file_summary(file_id).await.unwrap().is_none());
    let stats = catalog.stats().await.unwrap();
    assert_eq!(stats.crawls, 0);
    assert_eq!(stats.files, 0);
    assert_eq!(stats.types, 0);
    catalog.close().await;
}

#[tokio::test]
async fn test_raw_guess_rows_keep_recording_order() {
    let (_tmp, _path, catalog) = open_fresh().await;

    let id = catalog
        .ingest_file(
            &file("a.csv", "/data"),
            "T1",
            &[csv_guess(0.2), GuessInput::new("xml", "XML", "s1", "desc1", 0.8)],
        )
        .await
        .unwrap();
    let summary = catalog.file_summary(id).await.unwrap().unwrap();

    let rows = catalog.guesses_of_file(id).await.unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].score, 0.2);
    assert_eq!(rows[1].score, 0.8);
    assert!(rows.iter().all(|g| g.file_id == id && g.crawl_id == summary.crawl.id));
    assert_ne!(rows[0].type_id, rows[1].type_id);
    assert_eq!(rows[0].schema_id, rows[1].schema_id);
    assert!(catalog.guesses_of_file(FileId(999)).await.unwrap().is_empty());
    catalog.close().await;
}

#[tokio::test]
async fn test_prefix_listing_returns_full_summaries() {
    let (_tmp, _path, catalog) = open_fresh().await;

    catalog
        .ingest_file(&file("x", "/a/b"), "T1", &[csv_guess(0.4)])
        .await
        .unwrap();
    catalog.ingest_file(&file("y", "/a/bb"), "T1", &[]).await.unwrap();
    catalog.ingest_file(&file("z", "/a/b/c"), "T2", &[]).await.unwrap();

    let summaries = catalog.file_summaries_under_path("/a/b/").await.unwrap();
    let names: Vec<&str> = summaries.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["x", "z"]);
    assert_eq!(summaries[0].guesses.len(), 1);
    assert_eq!(summaries[1].crawl.last_examined, "T2");
    assert!(catalog.file_summaries_under_path("/q").await.unwrap().is_empty());
    catalog.close().await;
}

#[tokio::test]
async fn test_open_rejects_unrenderable_timestamp_format() {
    let tmp = TempDir::new().unwrap();
    let config = CatalogConfig {
        timestamp_format: "%Y-%Q".to_string(),
        ..CatalogConfig::default()
    };
    let result = Catalog::open(&tmp.path().join("catalog.db"), &config).await;
    assert!(matches!(result, Err(CatalogError::MalformedInput(_))));
}

#[tokio::test]
async fn test_guess_for_missing_file_is_referential_violation() {
    let (_tmp, _path, catalog) = open_fresh().await;

    let crawl_id = catalog.get_or_create_crawl("T1").await.unwrap();
    let err = catalog
        .record_guess(FileId(12345), crawl_id, &csv_guess(1.0))
        .await
        .unwrap_err();
    assert!(matches!(err, CatalogError::ReferentialViolation(_)));
    assert_eq!(catalog.stats().await.unwrap().guesses, 0);
    catalog.close().await;
}

#[tokio::test]
async fn test_summaries_rank_guesses_and_tolerate_none() {
    let (_tmp, _path, catalog) = open_fresh().await;

    let bare = catalog.ingest_file(&file("empty", "/d"), "T1", &[]).await.unwrap();
    let summary = catalog.file_summary(bare).await.unwrap().unwrap();
    assert!(summary.guesses.is_empty());
    assert!(summary.best_guess().is_none());

    let ranked = catalog
        .ingest_file(
            &file("a.csv", "/d"),
            "T1",
            &[
                csv_guess(0.2),
                GuessInput::new("xml", "XML", "s1", "desc1", 0.8),
                csv_guess(0.5),
            ],
        )
        .await
        .unwrap();
    let summary = catalog.file_summary(ranked).await.unwrap().unwrap();
    let scores: Vec<f64> = summary.guesses.iter().map(|g| g.score).collect();
    assert_eq!(scores, vec![0.8, 0.5, 0.2]);
    assert_eq!(summary.best_guess().unwrap().type_descriptor.label, "xml");

    let csv = summary.guesses[1].type_descriptor.id;
    let type_summary = catalog.type_summary(csv).await.unwrap().unwrap();
    assert_eq!(type_summary.descriptor.label, "csv");
    assert_eq!(type_summary.guesses.len(), 2);
    assert!(type_summary.guesses.iter().all(|g| g.file_name == "a.csv"));

    let schema = summary.guesses[0].schema_descriptor.id;
    let schema_summary = catalog.schema_summary(schema).await.unwrap().unwrap();
    assert_eq!(schema_summary.guesses.len(), 3);
    catalog.close().await;
}

#[tokio::test]
async fn test_malformed_ids_degrade_to_not_found() {
    let (_tmp, _path, catalog) = open_fresh().await;

    assert!(catalog.file_summary_str("not-a-number").await.unwrap().is_none());
    assert!(catalog.type_summary_str("").await.unwrap().is_none());
    assert!(catalog.schema_summary_str("1.5").await.unwrap().is_none());
    assert!(catalog.file_summary_str("99").await.unwrap().is_none());
    catalog.close().await;
}

#[tokio::test]
async fn test_reopen_preserves_rows() {
    let (_tmp, path, catalog) = open_fresh().await;
    let id = catalog
        .ingest_file(&file("a.csv", "/data"), "T1", &[csv_guess(1.0)])
        .await
        .unwrap();
    catalog.close().await;

    let reopened = Catalog::open(&path, &CatalogConfig::default()).await.unwrap();
    let summary = reopened.file_summary(id).await.unwrap().unwrap();
    assert_eq!(summary.guesses.len(), 1);
    assert_eq!(reopened.get_or_create_crawl("T1").await.unwrap(), summary.crawl.id);
    reopened.close().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_ingestion_keeps_references_unique_and_intact() {
    let (_tmp, path, catalog) = open_fresh().await;
    let catalog = Arc::new(catalog);

    let mut handles = Vec::new();
    for worker in 0..8 {
        let catalog = Arc::clone(&catalog);
        handles.push(tokio::spawn(async move {
            for i in 0..10 {
                let label = format!("type-{}", i % 3);
                let guesses = vec![
                    GuessInput::new(label.clone(), "desc", "shared", "schema", 0.5),
                    GuessInput::new(label, "desc", format!("schema-{}", i % 2), "s", 0.25),
                ];
                catalog
                    .ingest_file(
                        &file(&format!("f{}-{}", worker, i), "/data"),
                        &format!("crawl-{}", worker % 2),
                        &guesses,
                    )
                    .await
                    .unwrap();
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let stats = catalog.stats().await.unwrap();
    assert_eq!(stats.crawls, 2);
    assert_eq!(stats.files, 80);
    assert_eq!(stats.types, 3);
    assert_eq!(stats.schemas, 3);
    assert_eq!(stats.guesses, 160);

    // Every guess must point at live rows, checked over an independent connection.
    let pool = db::connect(&path, &CatalogConfig::default()).await.unwrap();
    let dangling: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM type_guesses g
        LEFT JOIN files f ON f.file_id = g.file_id
        LEFT JOIN crawls c ON c.crawl_id = g.crawl_id
        LEFT JOIN types t ON t.type_id = g.type_id
        LEFT JOIN schemas s ON s.schema_id = g.schema_id
        WHERE f.file_id IS NULL OR c.crawl_id IS NULL OR t.type_id IS NULL OR s.schema_id IS NULL
        "#,
    )
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(dangling, 0);

    let mismatched: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM type_guesses g JOIN files f ON f.file_id = g.file_id WHERE f.crawl_id != g.crawl_id",
    )
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(mismatched, 0);
    pool.close().await;

    if let Ok(catalog) = Arc::try_unwrap(catalog) {
        catalog.close().await;
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_separate_handles_on_one_store_lose_no_writes() {
    let (_tmp, path, first) = open_fresh().await;
    let second = Catalog::open(&path, &CatalogConfig::default()).await.unwrap();
    let handles = [Arc::new(first), Arc::new(second)];

    let mut tasks = Vec::new();
    for worker in 0..8 {
        let catalog = Arc::clone(&handles[worker % 2]);
        tasks.push(tokio::spawn(async move {
            let mut failures = Vec::new();
            for i in 0..25 {
                let guesses = [
                    GuessInput::new(format!("type-{}", i % 3), "desc", "shared", "schema", 0.5),
                    GuessInput::new("csv", "CSV", format!("schema-{}", i % 2), "s", 0.25),
                ];
                let result = catalog
                    .ingest_file(
                        &file(&format!("f{}-{}", worker, i), "/data"),
                        &format!("crawl-{}", i % 2),
                        &guesses,
                    )
                    .await;
                if let Err(err) = result {
                    failures.push(err.to_string());
                }
            }
            failures
        }));
    }
    let mut failures = Vec::new();
    for task in tasks {
        failures.extend(task.await.unwrap());
    }
    assert!(failures.is_empty(), "failed writes: {:?}", failures);

    let [first, second] = handles;
    let stats = first.stats().await.unwrap();
    assert_eq!(stats, second.stats().await.unwrap());
    assert_eq!(stats.crawls, 2);
    assert_eq!(stats.files, 200);
    assert_eq!(stats.types, 4);
    assert_eq!(stats.schemas, 3);
    assert_eq!(stats.guesses, 400);

    for id in first.files_under_path("/data").await.unwrap() {
        let rows = first.guesses_of_file(id).await.unwrap();
        assert_eq!(rows.len(), 2);
    }

    for catalog in [first, second] {
        if let Ok(catalog) = Arc::try_unwrap(catalog) {
            catalog.close().await;
        }
    }
}
