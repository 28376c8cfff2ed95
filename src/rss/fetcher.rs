//! Main feed fetching functionality.

use futures::stream::{self, StreamExt};
use reqwest::header;
use std::future::Future;
use std::io::Read;
use std::pin::Pin;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use super::client::fetch_with_fallback;
use super::parser::{parse_feed, FeedItem};
use super::types::{FetchConfig, FetchSummary, SourceOutcome, SourceStatus, MAX_TITLE_LEN};
use super::util::{decode_feed_body, is_valid_url, try_decompressions};
use crate::db::{Database, NewArticle, Source};
use crate::TARGET_WEB_REQUEST;

/// Polls feed sources and lands new articles in the store. Sources are
/// independent and network-bound, so they are fetched with bounded
/// parallelism; a failure on one never aborts the others.
pub struct FeedFetcher {
    db: Database,
    config: FetchConfig,
}

impl FeedFetcher {
    pub fn new(db: Database, config: FetchConfig) -> Self {
        FeedFetcher { db, config }
    }

    /// Fetch every source, returning per-source new/skipped accounting.
    pub async fn fetch_all(
        &self,
        sources: &[Source],
        cancel: &watch::Receiver<bool>,
    ) -> FetchSummary {
        let outcomes = stream::iter(sources)
            .map(|source| -> Pin<Box<dyn Future<Output = SourceOutcome> + Send + '_>> {
                let mut cancel = cancel.clone();
                Box::pin(async move {
                    if *cancel.borrow() {
                        debug!(target: TARGET_WEB_REQUEST, "Cancellation observed, skipping source: {}", source.name);
                        return SourceOutcome {
                            source: source.name.clone(),
                            status: SourceStatus::Cancelled,
                        };
                    }
                    tokio::select! {
                        outcome = self.fetch_source(source) => outcome,
                        // Shutdown drops the in-flight request instead of
                        // letting it run out its timeout.
                        _ = cancel.changed() => {
                            debug!(target: TARGET_WEB_REQUEST, "Cancellation observed mid-fetch, abandoning source: {}", source.name);
                            SourceOutcome {
                                source: source.name.clone(),
                                status: SourceStatus::Cancelled,
                            }
                        }
                    }
                })
            })
            .buffer_unordered(self.config.concurrency.max(1))
            .collect::<Vec<_>>()
            .await;

        let summary = FetchSummary { outcomes };
        info!(
            target: TARGET_WEB_REQUEST,
            "Fetch cycle complete: {} new, {} skipped across {} sources",
            summary.new_total(),
            summary.skipped_total(),
            summary.outcomes.len()
        );
        summary
    }

    async fn fetch_source(&self, source: &Source) -> SourceOutcome {
        let status = self.fetch_source_status(source).await;

        match &status {
            SourceStatus::Fetched { new, skipped } => {
                if *new > 0 {
                    info!(target: TARGET_WEB_REQUEST, "Processed feed {}: {} new articles, {} skipped", source.name, new, skipped);
                } else {
                    debug!(target: TARGET_WEB_REQUEST, "Processed feed {}: no new articles", source.name);
                }
            }
            SourceStatus::RequestFailed | SourceStatus::ParseFailed => {
                warn!(target: TARGET_WEB_REQUEST, "Feed {} failed: {:?}", source.name, status);
            }
            SourceStatus::Cancelled => {}
        }

        SourceOutcome {
            source: source.name.clone(),
            status,
        }
    }

    async fn fetch_source_status(&self, source: &Source) -> SourceStatus {
        if !is_valid_url(&source.feed_url) {
            warn!(target: TARGET_WEB_REQUEST, "Skipping invalid feed URL for {}: {}", source.name, source.feed_url);
            return SourceStatus::RequestFailed;
        }

        let (response, browser_emulation_used) =
            match fetch_with_fallback(&source.feed_url, &self.config).await {
                Ok(ok) => ok,
                Err(err) => {
                    error!(target: TARGET_WEB_REQUEST, "Request to {} failed: {}", source.feed_url, err);
                    return SourceStatus::RequestFailed;
                }
            };

        if browser_emulation_used {
            info!(target: TARGET_WEB_REQUEST, "Browser emulation was required for {}", source.feed_url);
        }

        if !response.status().is_success() {
            warn!(target: TARGET_WEB_REQUEST, "Non-success status {} from {}", response.status(), source.feed_url);
            return SourceStatus::RequestFailed;
        }

        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|ct| ct.to_str().ok())
            .map(|s| s.to_lowercase());

        // Extract the content encoding before consuming the response
        let content_encoding = response
            .headers()
            .get(header::CONTENT_ENCODING)
            .and_then(|value| value.to_str().ok())
            .map(|s| s.to_lowercase());

        let bytes = match response.bytes().await {
            Ok(b) => b,
            Err(err) => {
                error!(target: TARGET_WEB_REQUEST, "Failed to read response bytes from {}: {}", source.feed_url, err);
                return SourceStatus::RequestFailed;
            }
        };

        // Try different decompression methods
        let decompressed_bytes = if content_encoding.as_deref() == Some("br") {
            let mut decoded = Vec::new();
            let mut reader = brotli::Decompressor::new(&bytes[..], 4096);
            if reader.read_to_end(&mut decoded).is_ok() && !decoded.is_empty() {
                debug!(target: TARGET_WEB_REQUEST, "Successfully decompressed brotli content from {}", source.feed_url);
                decoded
            } else {
                debug!(target: TARGET_WEB_REQUEST, "Brotli decompression failed for {}, trying other methods", source.feed_url);
                try_decompressions(&bytes, &source.feed_url)
            }
        } else {
            try_decompressions(&bytes, &source.feed_url)
        };

        let body = match decode_feed_body(&decompressed_bytes, content_type.as_deref()) {
            Some(body) => body,
            None => {
                error!(target: TARGET_WEB_REQUEST, "Could not determine character encoding for {}", source.feed_url);
                return SourceStatus::ParseFailed;
            }
        };

        let items = match parse_feed(&body, content_type.as_deref()) {
            Ok(items) => items,
            Err(err) => {
                error!(target: TARGET_WEB_REQUEST, "Error parsing feed {}: {}", source.feed_url, err);
                return SourceStatus::ParseFailed;
            }
        };

        let (new, skipped) = self.store_items(source, items).await;
        SourceStatus::Fetched { new, skipped }
    }

    /// Normalize and store feed items, deduplicating by URL. Returns
    /// (new, skipped) counts for the source.
    async fn store_items(&self, source: &Source, items: Vec<FeedItem>) -> (usize, usize) {
        let mut new = 0;
        let mut skipped = 0;

        for item in items {
            let title = item.title.as_deref().unwrap_or("").trim().to_string();

            if title.chars().count() > MAX_TITLE_LEN {
                warn!(
                    target: TARGET_WEB_REQUEST,
                    "Rejecting item with over-long title ({} chars) from {}: {}",
                    title.chars().count(),
                    source.name,
                    item.url
                );
                continue;
            }

            match self.db.article_exists(&item.url).await {
                Ok(true) => {
                    debug!(target: TARGET_WEB_REQUEST, "Skipping already stored article: {}", item.url);
                    skipped += 1;
                    continue;
                }
                Ok(false) => {}
                Err(err) => {
                    error!(target: TARGET_WEB_REQUEST, "Existence check failed for {}: {}", item.url, err);
                    continue;
                }
            }

            let article = normalize_item(source, &title, item);

            match self.db.insert_article(&article).await {
                Ok(true) => new += 1,
                // Another writer landed the same URL between the existence
                // check and the insert.
                Ok(false) => skipped += 1,
                Err(err) => {
                    error!(target: TARGET_WEB_REQUEST, "Failed to store article {}: {}", article.url, err);
                }
            }
        }

        (new, skipped)
    }
}

/// Fill missing fields from what the feed offered: author falls back to the
/// source name, content and summary fall back to each other, and the
/// publish time falls back to ingestion time.
fn normalize_item(source: &Source, title: &str, item: FeedItem) -> NewArticle {
    let content = item
        .content
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .or_else(|| {
            item.summary
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
        })
        .unwrap_or("")
        .to_string();

    let summary = item
        .summary
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| content.chars().take(300).collect());

    let author = item
        .author
        .as_deref()
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .unwrap_or(&source.name)
        .to_string();

    NewArticle {
        title: title.to_string(),
        content,
        summary,
        url: item.url,
        author,
        source: source.name.clone(),
        published_at: item.published_at.unwrap_or_else(chrono::Utc::now),
        category: item.category.or_else(|| source.category.clone()),
        image_url: item.image_url,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn test_source() -> Source {
        Source {
            id: 1,
            name: "Example Wire".to_string(),
            feed_url: "https://example.com/feed.xml".to_string(),
            category: Some("politics".to_string()),
            active: true,
        }
    }

    fn item(url: &str, title: &str) -> FeedItem {
        FeedItem {
            title: Some(title.to_string()),
            url: url.to_string(),
            author: None,
            content: Some("Body text.".to_string()),
            summary: None,
            image_url: None,
            category: None,
            published_at: Some(Utc::now()),
        }
    }

    async fn fetcher() -> FeedFetcher {
        let db = Database::new_in_memory().await.unwrap();
        FeedFetcher::new(db, FetchConfig::default())
    }

    #[tokio::test]
    async fn dedup_accounting_counts_new_and_skipped() {
        let fetcher = fetcher().await;
        let source = test_source();

        // 1 of 3 items pre-existing
        let pre = normalize_item(&source, "Already here", item("https://example.com/a", "Already here"));
        fetcher.db.insert_article(&pre).await.unwrap();

        let items = vec![
            item("https://example.com/a", "Already here"),
            item("https://example.com/b", "Fresh one"),
            item("https://example.com/c", "Fresh two"),
        ];
        let (new, skipped) = fetcher.store_items(&source, items).await;
        assert_eq!(new, 2);
        assert_eq!(skipped, 1);
    }

    #[tokio::test]
    async fn reingesting_the_same_item_stores_one_article() {
        let fetcher = fetcher().await;
        let source = test_source();

        let (new, _) = fetcher
            .store_items(&source, vec![item("https://example.com/x", "One")])
            .await;
        assert_eq!(new, 1);

        let (new, skipped) = fetcher
            .store_items(&source, vec![item("https://example.com/x", "One")])
            .await;
        assert_eq!(new, 0);
        assert_eq!(skipped, 1);
    }

    #[tokio::test]
    async fn overlong_titles_are_rejected_not_truncated() {
        let fetcher = fetcher().await;
        let source = test_source();

        let long_title = "x".repeat(MAX_TITLE_LEN + 1);
        let (new, skipped) = fetcher
            .store_items(&source, vec![item("https://example.com/long", &long_title)])
            .await;
        assert_eq!(new, 0);
        assert_eq!(skipped, 0);
        assert!(!fetcher
            .db
            .article_exists("https://example.com/long")
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn normalization_fills_fallback_fields() {
        let source = test_source();
        let feed_item = FeedItem {
            title: Some("Bare item".to_string()),
            url: "https://example.com/bare".to_string(),
            author: None,
            content: None,
            summary: Some("Only a summary.".to_string()),
            image_url: None,
            category: None,
            published_at: None,
        };

        let article = normalize_item(&source, "Bare item", feed_item);
        assert_eq!(article.author, "Example Wire");
        assert_eq!(article.content, "Only a summary.");
        assert_eq!(article.category.as_deref(), Some("politics"));
        assert!(article.published_at <= Utc::now());
    }
}
