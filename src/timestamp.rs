//! Text timestamps stored in the catalog.
//!
//! Crawl keys and file modification times are stored as fixed-width,
//! lexicographically sortable strings (`YYYY-MM-DD HH:MM:SS`, UTC by default).
//! The formatter is an explicit value handed to [`Catalog::open`](crate::catalog::Catalog::open)
//! and to the crawl driver rather than a process-wide singleton.

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Utc};
use std::time::SystemTime;

use crate::error::{CatalogError, Result};

pub const DEFAULT_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimestampFormat {
    pattern: String,
}

impl TimestampFormat {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
        }
    }

    /// Reject patterns chrono cannot render. Formatting with such a pattern
    /// would panic inside `to_string`.
    pub fn check(&self) -> Result<()> {
        if self.pattern.trim().is_empty() {
            return Err(CatalogError::MalformedInput(
                "timestamp format must not be empty".to_string(),
            ));
        }
        if StrftimeItems::new(&self.pattern).any(|item| matches!(item, Item::Error)) {
            return Err(CatalogError::MalformedInput(format!(
                "invalid timestamp format '{}'",
                self.pattern
            )));
        }
        Ok(())
    }

    pub fn format(&self, at: DateTime<Utc>) -> String {
        at.format(&self.pattern).to_string()
    }

    pub fn now(&self) -> String {
        self.format(Utc::now())
    }

    /// Format a filesystem time. Times before the epoch clamp to the epoch.
    pub fn format_system_time(&self, at: SystemTime) -> String {
        let at: DateTime<Utc> = match at.duration_since(SystemTime::UNIX_EPOCH) {
            Ok(_) => at.into(),
            Err(_) => DateTime::<Utc>::default(),
        };
        self.format(at)
    }
}

impl Default for TimestampFormat {
    fn default() -> Self {
        Self::new(DEFAULT_TIMESTAMP_FORMAT)
    }
}
