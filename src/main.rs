//! # Catalog CLI (`catalog`)
//!
//! ```bash
//! catalog <storedir> --crawl <dir>   # crawl a tree and record what was found
//! catalog <storedir> --query <q>     # ad hoc query, e.g. "file 3" or "files /data"
//! ```
//!
//! `<storedir>` is the SQLite store file; it is created on first use.
//! Settings are read from the TOML file named by `CATALOG_CONFIG`, if set.
//! Log verbosity follows `RUST_LOG` (default `info`); logs go to stderr.

use anyhow::Context;
use clap::{ArgGroup, Parser};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use crawlcat::adhoc::{self, AdhocQuery};
use crawlcat::catalog::Catalog;
use crawlcat::config;
use crawlcat::crawl;
use crawlcat::inference;
use crawlcat::progress::ProgressMode;

/// Record filesystem crawls and the type/schema guesses made about each file.
#[derive(Parser)]
#[command(name = "catalog", version)]
#[command(group(ArgGroup::new("verb").required(true).args(["crawl", "query"])))]
struct Cli {
    /// Path to the catalog store file.
    storedir: PathBuf,

    /// Crawl this directory (or single file) and record every file found.
    #[arg(long, value_name = "DIR")]
    crawl: Option<PathBuf>,

    /// Run an ad hoc query: crawls, stats, files <prefix>, file <id>, type <id>, schema <id>.
    #[arg(long, value_name = "Q")]
    query: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cfg = config::load_from_env()?;

    if let Some(root) = cli.crawl {
        let mode = ProgressMode::from_setting(&cfg.crawl.progress)
            .unwrap_or_else(ProgressMode::for_terminal);
        let mut adapter = inference::from_config(&cfg.inference)?;

        let catalog = Catalog::open(&cli.storedir, &cfg.catalog)
            .await
            .with_context(|| format!("Failed to open catalog: {}", cli.storedir.display()))?;
        let crawl_timestamp = catalog.timestamps().now();
        let result = crawl::run_crawl(
            &catalog,
            &root,
            &cfg.crawl,
            adapter.as_mut(),
            &crawl_timestamp,
            mode.reporter().as_ref(),
        )
        .await;
        catalog.close().await;
        let report = result?;

        println!("crawl {}", report.crawl_timestamp);
        println!("  files recorded: {}", report.files_recorded);
        println!("  guesses recorded: {}", report.guesses_recorded);
        println!("  files skipped: {}", report.files_skipped);
        println!("ok");
    } else if let Some(raw) = cli.query {
        let query = AdhocQuery::parse(&raw)?;
        let catalog = Catalog::open(&cli.storedir, &cfg.catalog)
            .await
            .with_context(|| format!("Failed to open catalog: {}", cli.storedir.display()))?;
        let result = adhoc::run_query(&catalog, &query).await;
        catalog.close().await;
        println!("{}", result?);
    }

    Ok(())
}
