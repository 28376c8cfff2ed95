//! Feed parsing for RSS, Atom, and JSON Feed payloads.

use anyhow::Result;
use chrono::{DateTime, Utc};
use feed_rs::parser;
use std::io::Cursor;
use tracing::{debug, error};

use super::types::{JsonFeed, JsonFeedItem};
use super::util::{cleanup_xml, parse_date};
use crate::TARGET_WEB_REQUEST;

/// A feed entry normalized to the fields the article store cares about.
/// Only entries with a non-empty link survive parsing.
#[derive(Debug, Clone)]
pub struct FeedItem {
    pub title: Option<String>,
    pub url: String,
    pub author: Option<String>,
    pub content: Option<String>,
    pub summary: Option<String>,
    pub image_url: Option<String>,
    pub category: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
}

/// Parse a feed body into items. JSON Feed when the content type says so,
/// otherwise RSS/Atom with one cleanup-and-retry pass on malformed XML.
pub fn parse_feed(text: &str, content_type: Option<&str>) -> Result<Vec<FeedItem>> {
    if let Some(ct) = content_type {
        if ct.contains("json") {
            debug!(target: TARGET_WEB_REQUEST, "Processing as JSON feed");
            return parse_json_feed(text);
        }
    }

    debug!(target: TARGET_WEB_REQUEST, "Processing as XML feed");
    let reader = Cursor::new(text);
    match parser::parse(reader) {
        Ok(feed) => Ok(feed.entries.into_iter().filter_map(item_from_entry).collect()),
        Err(first_err) => {
            // Try cleaning the XML first
            let cleaned_xml = cleanup_xml(text);

            if cleaned_xml.contains("<rss") || cleaned_xml.contains("<feed") {
                let reader = Cursor::new(&cleaned_xml);
                match parser::parse(reader) {
                    Ok(feed) => {
                        Ok(feed.entries.into_iter().filter_map(item_from_entry).collect())
                    }
                    Err(second_err) => {
                        error!(
                            target: TARGET_WEB_REQUEST,
                            "Failed to parse feed after cleanup. First error: {}. Second error: {}",
                            first_err,
                            second_err
                        );
                        Err(anyhow::anyhow!("XML parsing error even after cleanup"))
                    }
                }
            } else {
                let preview = if text
                    .chars()
                    .all(|c| c.is_ascii_graphic() || c.is_whitespace())
                {
                    text.chars().take(100).collect::<String>()
                } else {
                    "[binary data]".to_string()
                };
                error!(
                    target: TARGET_WEB_REQUEST,
                    "Feed doesn't appear to be RSS or Atom. Content preview: {}",
                    preview
                );
                Err(anyhow::anyhow!("Content is not RSS or Atom feed"))
            }
        }
    }
}

fn parse_json_feed(text: &str) -> Result<Vec<FeedItem>> {
    let feed: JsonFeed = serde_json::from_str(text)
        .map_err(|err| anyhow::anyhow!("JSON parsing error: {}", err))?;

    Ok(feed.items.into_iter().filter_map(item_from_json).collect())
}

fn item_from_json(item: JsonFeedItem) -> Option<FeedItem> {
    let url = item.url.or(item.id).filter(|u| !u.trim().is_empty())?;

    let author = item.authors.into_iter().find_map(|a| a.name);
    let content = item.content_text.or(item.content_html);
    let published_at = item.date_published.as_deref().and_then(parse_date);

    Some(FeedItem {
        title: item.title,
        url,
        author,
        content,
        summary: item.summary,
        image_url: item.image,
        category: item.tags.into_iter().next(),
        published_at,
    })
}

fn item_from_entry(entry: feed_rs::model::Entry) -> Option<FeedItem> {
    let url = entry
        .links
        .first()
        .map(|link| link.href.clone())
        .filter(|u| !u.trim().is_empty())?;

    let author = entry
        .authors
        .first()
        .map(|person| person.name.clone())
        .filter(|name| !name.trim().is_empty());

    let image_url = entry
        .media
        .iter()
        .find_map(|media| {
            media
                .thumbnails
                .first()
                .map(|thumb| thumb.image.uri.clone())
                .or_else(|| {
                    media
                        .content
                        .iter()
                        .find_map(|content| content.url.as_ref().map(|u| u.to_string()))
                })
        });

    let category = entry
        .categories
        .first()
        .map(|category| category.term.clone())
        .filter(|term| !term.trim().is_empty());

    Some(FeedItem {
        title: entry.title.map(|t| t.content),
        url,
        author,
        content: entry.content.and_then(|c| c.body),
        summary: entry.summary.map(|t| t.content),
        image_url,
        category,
        published_at: entry.published.or(entry.updated),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const RSS_SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>Example Wire</title>
    <item>
      <title>  Coalition talks stall over budget  </title>
      <link>https://example.com/coalition-talks</link>
      <description>Talks stalled on Tuesday.</description>
      <pubDate>Tue, 01 Jul 2025 09:30:00 +0000</pubDate>
    </item>
    <item>
      <title>No link item</title>
    </item>
  </channel>
</rss>"#;

    const JSON_SAMPLE: &str = r#"{
        "version": "https://jsonfeed.org/version/1.1",
        "title": "Example JSON Wire",
        "items": [
            {
                "id": "https://example.com/poll-results",
                "url": "https://example.com/poll-results",
                "title": "Poll results released",
                "content_text": "The latest poll shows a tight race.",
                "date_published": "2025-07-01T10:00:00Z",
                "authors": [{"name": "A. Reporter"}]
            },
            {"title": "item without any link"}
        ]
    }"#;

    #[test]
    fn parses_rss_entries_and_drops_linkless_items() {
        let items = parse_feed(RSS_SAMPLE, Some("application/rss+xml")).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].url, "https://example.com/coalition-talks");
        assert!(items[0].published_at.is_some());
    }

    #[test]
    fn parses_json_feed_when_content_type_says_so() {
        let items = parse_feed(JSON_SAMPLE, Some("application/feed+json")).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].author.as_deref(), Some("A. Reporter"));
        assert_eq!(
            items[0].content.as_deref(),
            Some("The latest poll shows a tight race.")
        );
    }

    #[test]
    fn recovers_malformed_xml_via_cleanup() {
        let dirty = format!("junk-prefix{}", RSS_SAMPLE.trim_start_matches("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n"));
        let items = parse_feed(&dirty, None).unwrap();
        assert_eq!(items.len(), 1);
    }

    #[test]
    fn rejects_non_feed_content() {
        assert!(parse_feed("<html><body>not a feed</body></html>", None).is_err());
    }
}
