//! Crawl progress on stderr.
//!
//! Stdout carries the crawl report and query output, so progress lines
//! never go there. `[crawl].progress` picks the reporter: `human`, `json`
//! (one object per line), `off`, or `auto` (human when stderr is a terminal).

use serde::Serialize;
use std::io::Write;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum CrawlProgressEvent {
    /// Walking the tree; the file count is not known yet.
    Discovering { root: String },
    /// `n` of `total` discovered files handled so far.
    Ingesting { root: String, n: u64, total: u64 },
    Finished {
        root: String,
        recorded: u64,
        skipped: u64,
    },
}

impl CrawlProgressEvent {
    fn human_line(&self) -> String {
        match self {
            CrawlProgressEvent::Discovering { root } => format!("crawl {}: walking tree", root),
            CrawlProgressEvent::Ingesting { root, n, total } => format!(
                "crawl {}: {} of {} files",
                root,
                group_thousands(*n),
                group_thousands(*total)
            ),
            CrawlProgressEvent::Finished {
                root,
                recorded,
                skipped,
            } => format!(
                "crawl {}: done, {} recorded, {} skipped",
                root,
                group_thousands(*recorded),
                group_thousands(*skipped)
            ),
        }
    }
}

pub trait CrawlProgressReporter: Send + Sync {
    fn report(&self, event: &CrawlProgressEvent);
}

pub struct HumanProgress;

impl CrawlProgressReporter for HumanProgress {
    fn report(&self, event: &CrawlProgressEvent) {
        emit(&event.human_line());
    }
}

pub struct JsonProgress;

impl CrawlProgressReporter for JsonProgress {
    fn report(&self, event: &CrawlProgressEvent) {
        if let Ok(line) = serde_json::to_string(event) {
            emit(&line);
        }
    }
}

pub struct NoProgress;

impl CrawlProgressReporter for NoProgress {
    fn report(&self, _event: &CrawlProgressEvent) {}
}

// Progress is best effort; a closed stderr must not fail the crawl.
fn emit(line: &str) {
    let mut stderr = std::io::stderr().lock();
    let _ = writeln!(stderr, "{}", line);
    let _ = stderr.flush();
}

fn group_thousands(n: u64) -> String {
    let digits = n.to_string();
    let head = digits.len() % 3;
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.char_indices() {
        if i > 0 && (i + 3 - head) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// `None` for an unrecognised setting.
    pub fn from_setting(setting: &str) -> Option<Self> {
        match setting {
            "auto" => Some(Self::for_terminal()),
            "off" => Some(ProgressMode::Off),
            "human" => Some(ProgressMode::Human),
            "json" => Some(ProgressMode::Json),
            _ => None,
        }
    }

    pub fn for_terminal() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    pub fn reporter(self) -> Box<dyn CrawlProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(HumanProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}
