//! Type definitions for the feed ingestion module.

use serde::Deserialize;
use tokio::time::Duration;

/// A feed item title longer than this is a validation failure; the item is
/// skipped, never truncated.
pub const MAX_TITLE_LEN: usize = 500;

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (compatible; trendwire/0.9; feed aggregator)";
pub const DEFAULT_FETCH_CONCURRENCY: usize = 4;

/// Per-cycle fetch settings, read from the environment at startup.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub user_agent: String,
    pub timeout: Duration,
    pub concurrency: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        FetchConfig {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout: DEFAULT_REQUEST_TIMEOUT,
            concurrency: DEFAULT_FETCH_CONCURRENCY,
        }
    }
}

/// Outcome of fetching a single source. Failures are isolated per source
/// and never abort the rest of the cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceStatus {
    Fetched { new: usize, skipped: usize },
    RequestFailed,
    ParseFailed,
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct SourceOutcome {
    pub source: String,
    pub status: SourceStatus,
}

#[derive(Debug, Clone, Default)]
pub struct FetchSummary {
    pub outcomes: Vec<SourceOutcome>,
}

impl FetchSummary {
    pub fn new_total(&self) -> usize {
        self.outcomes
            .iter()
            .map(|o| match o.status {
                SourceStatus::Fetched { new, .. } => new,
                _ => 0,
            })
            .sum()
    }

    pub fn skipped_total(&self) -> usize {
        self.outcomes
            .iter()
            .map(|o| match o.status {
                SourceStatus::Fetched { skipped, .. } => skipped,
                _ => 0,
            })
            .sum()
    }
}

/// JSON Feed structure for parsing
#[derive(Debug, Deserialize)]
pub struct JsonFeed {
    #[serde(default)]
    pub items: Vec<JsonFeedItem>,
}

/// JSON Feed item structure
#[derive(Debug, Deserialize)]
pub struct JsonFeedItem {
    pub id: Option<String>,
    pub url: Option<String>,
    pub title: Option<String>,
    pub content_text: Option<String>,
    pub content_html: Option<String>,
    pub summary: Option<String>,
    pub image: Option<String>,
    pub date_published: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub authors: Vec<JsonFeedAuthor>,
}

#[derive(Debug, Deserialize)]
pub struct JsonFeedAuthor {
    pub name: Option<String>,
}
