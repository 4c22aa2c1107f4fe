//! Filesystem crawl driver.
//!
//! Walks a directory tree, asks an [`InferenceAdapter`] about each file, and
//! records the file with its guesses in one transaction. A single crawl
//! timestamp is shared by every file in the traversal.
//!
//! Files that cannot be read, or that the adapter rejects, are skipped with a
//! warning. Storage and referential failures abort the crawl.

use anyhow::{bail, Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::Serialize;
use std::fs::Metadata;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::catalog::Catalog;
use crate::config::CrawlConfig;
use crate::error::CatalogError;
use crate::inference::InferenceAdapter;
use crate::models::{FileRecord, GuessInput};
use crate::progress::{CrawlProgressEvent, CrawlProgressReporter};
use crate::timestamp::TimestampFormat;

const PROGRESS_EVERY: u64 = 100;

/// Store files SQLite keeps next to the catalog.
const STORE_SUFFIXES: &[&str] = &["", "-wal", "-shm", "-journal"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CrawlReport {
    pub crawl_timestamp: String,
    pub files_recorded: u64,
    pub guesses_recorded: u64,
    pub files_skipped: u64,
}

pub async fn run_crawl(
    catalog: &Catalog,
    root: &Path,
    config: &CrawlConfig,
    adapter: &mut dyn InferenceAdapter,
    crawl_timestamp: &str,
    progress: &dyn CrawlProgressReporter,
) -> Result<CrawlReport> {
    if !root.exists() {
        bail!("Crawl root does not exist: {}", root.display());
    }
    let root = root
        .canonicalize()
        .with_context(|| format!("Failed to resolve crawl root: {}", root.display()))?;
    let root_label = normalize_path_to_forward_slashes(&root);

    info!(root = %root_label, crawl = crawl_timestamp, adapter = adapter.name(), "starting crawl");
    progress.report(&CrawlProgressEvent::Discovering {
        root: root_label.clone(),
    });

    let mut report = CrawlReport {
        crawl_timestamp: crawl_timestamp.to_string(),
        files_recorded: 0,
        guesses_recorded: 0,
        files_skipped: 0,
    };

    let store_paths = store_paths(catalog.path());
    let paths = discover_files(&root, config, &store_paths, &mut report.files_skipped)?;
    let total = paths.len() as u64;

    for (i, path) in paths.iter().enumerate() {
        let n = i as u64 + 1;

        let record = match describe_file(path, config, catalog.timestamps()) {
            Ok(record) => record,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "skipping unreadable file");
                report.files_skipped += 1;
                continue;
            }
        };

        let guesses: Vec<GuessInput> = match adapter.infer(path) {
            Ok(inferences) => inferences.into_iter().map(|inf| inf.into_guess()).collect(),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "inference failed, skipping file");
                report.files_skipped += 1;
                continue;
            }
        };

        match catalog.ingest_file(&record, crawl_timestamp, &guesses).await {
            Ok(_) => {
                report.files_recorded += 1;
                report.guesses_recorded += guesses.len() as u64;
            }
            Err(CatalogError::MalformedInput(reason)) => {
                warn!(path = %path.display(), %reason, "rejected file, skipping");
                report.files_skipped += 1;
            }
            Err(err) => {
                return Err(err).with_context(|| format!("Failed to record {}", path.display()))
            }
        }

        if n % PROGRESS_EVERY == 0 || n == total {
            progress.report(&CrawlProgressEvent::Ingesting {
                root: root_label.clone(),
                n,
                total,
            });
        }
    }

    progress.report(&CrawlProgressEvent::Finished {
        root: root_label.clone(),
        recorded: report.files_recorded,
        skipped: report.files_skipped,
    });
    info!(
        root = %root_label,
        files = report.files_recorded,
        guesses = report.guesses_recorded,
        skipped = report.files_skipped,
        "crawl complete"
    );
    Ok(report)
}

/// Files under `root` that pass the include/exclude globs, in path order.
fn discover_files(
    root: &Path,
    config: &CrawlConfig,
    store_paths: &[PathBuf],
    skipped: &mut u64,
) -> Result<Vec<PathBuf>> {
    if root.is_file() {
        return Ok(vec![root.to_path_buf()]);
    }

    let include_set = build_globset(&config.include_globs)?;

    let mut default_excludes = vec!["**/.git/**".to_string(), "**/target/**".to_string()];
    default_excludes.extend(config.exclude_globs.iter().cloned());
    let exclude_set = build_globset(&default_excludes)?;

    let mut paths = Vec::new();
    let walker = WalkDir::new(root)
        .follow_links(config.follow_symlinks)
        .sort_by_file_name();
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                warn!(error = %err, "skipping unreadable entry");
                *skipped += 1;
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        if store_paths.iter().any(|p| p == path) {
            continue;
        }

        let relative = path.strip_prefix(root).unwrap_or(path);
        let rel_str = normalize_path_to_forward_slashes(relative);

        if exclude_set.is_match(&rel_str) {
            continue;
        }
        if !include_set.is_match(&rel_str) {
            continue;
        }

        paths.push(path.to_path_buf());
    }

    Ok(paths)
}

fn describe_file(path: &Path, config: &CrawlConfig, timestamps: &TimestampFormat) -> Result<FileRecord> {
    let metadata = std::fs::metadata(path)?;
    let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);

    let canonical = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    let name = canonical
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let parent_path = canonical
        .parent()
        .map(normalize_path_to_forward_slashes)
        .unwrap_or_default();

    Ok(FileRecord {
        name,
        owner: file_owner(&metadata, config),
        size: i64::try_from(metadata.len()).unwrap_or(i64::MAX),
        modified: timestamps.format_system_time(modified),
        parent_path,
    })
}

fn file_owner(metadata: &Metadata, config: &CrawlConfig) -> String {
    match &config.owner {
        Some(owner) => owner.clone(),
        None => platform_owner(metadata),
    }
}

#[cfg(unix)]
fn platform_owner(metadata: &Metadata) -> String {
    use std::os::unix::fs::MetadataExt;
    metadata.uid().to_string()
}

#[cfg(not(unix))]
fn platform_owner(_metadata: &Metadata) -> String {
    "unknown".to_string()
}

/// Paths of the catalog file and its SQLite side files, so a crawl rooted
/// above the store does not catalog itself.
fn store_paths(store: &Path) -> Vec<PathBuf> {
    let store = store.canonicalize().unwrap_or_else(|_| store.to_path_buf());
    STORE_SUFFIXES
        .iter()
        .map(|suffix| {
            let mut os = store.clone().into_os_string();
            os.push(suffix);
            PathBuf::from(os)
        })
        .collect()
}

fn normalize_path_to_forward_slashes(path: &Path) -> String {
    let s = path.to_string_lossy();
    if std::path::MAIN_SEPARATOR == '/' {
        s.into_owned()
    } else {
        s.replace(std::path::MAIN_SEPARATOR, "/")
    }
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}
