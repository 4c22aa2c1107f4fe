use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

use crate::timestamp::{TimestampFormat, DEFAULT_TIMESTAMP_FORMAT};

/// Environment variable naming an optional TOML config file.
pub const CONFIG_ENV: &str = "CATALOG_CONFIG";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub crawl: CrawlConfig,
    #[serde(default)]
    pub inference: InferenceConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CatalogConfig {
    #[serde(default = "default_timestamp_format")]
    pub timestamp_format: String,
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            timestamp_format: default_timestamp_format(),
            busy_timeout_ms: default_busy_timeout_ms(),
            max_connections: default_max_connections(),
        }
    }
}

impl CatalogConfig {
    pub fn timestamps(&self) -> TimestampFormat {
        TimestampFormat::new(self.timestamp_format.clone())
    }
}

fn default_timestamp_format() -> String {
    DEFAULT_TIMESTAMP_FORMAT.to_string()
}
fn default_busy_timeout_ms() -> u64 {
    5000
}
fn default_max_connections() -> u32 {
    4
}

#[derive(Debug, Deserialize, Clone)]
pub struct CrawlConfig {
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    #[serde(default)]
    pub follow_symlinks: bool,
    /// Owner recorded for every file. Falls back to the numeric uid.
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default = "default_progress")]
    pub progress: String,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            include_globs: default_include_globs(),
            exclude_globs: Vec::new(),
            follow_symlinks: false,
            owner: None,
            progress: default_progress(),
        }
    }
}

fn default_include_globs() -> Vec<String> {
    vec!["**/*".to_string()]
}
fn default_progress() -> String {
    "auto".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct InferenceConfig {
    #[serde(default = "default_inference_mode")]
    pub mode: String,
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default = "default_score")]
    pub score: f64,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            mode: default_inference_mode(),
            seed: None,
            score: default_score(),
        }
    }
}

fn default_inference_mode() -> String {
    "coin-flip".to_string()
}
fn default_score() -> f64 {
    1.0
}

/// Load the config named by `CATALOG_CONFIG`, or defaults when unset.
pub fn load_from_env() -> Result<Config> {
    match std::env::var_os(CONFIG_ENV) {
        Some(path) => load_config(Path::new(&path)),
        None => Ok(Config::default()),
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    if config.catalog.max_connections == 0 {
        anyhow::bail!("catalog.max_connections must be >= 1");
    }

    config
        .catalog
        .timestamps()
        .check()
        .context("catalog.timestamp_format")?;

    match config.crawl.progress.as_str() {
        "auto" | "off" | "human" | "json" => {}
        other => anyhow::bail!(
            "Unknown crawl.progress: '{}'. Must be auto, off, human, or json.",
            other
        ),
    }

    match config.inference.mode.as_str() {
        "coin-flip" | "unstructured" => {}
        other => anyhow::bail!(
            "Unknown inference.mode: '{}'. Must be coin-flip or unstructured.",
            other
        ),
    }

    if !config.inference.score.is_finite() {
        anyhow::bail!("inference.score must be a finite number");
    }

    Ok(())
}
