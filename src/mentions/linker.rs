use anyhow::Result;
use chrono::Utc;
use std::time::Duration;
use tracing::{debug, error, info};

use super::matcher::MentionMatcher;
use crate::db::Database;
use crate::TARGET_MENTION;

#[derive(Debug, Clone, Copy, Default)]
pub struct LinkSummary {
    pub articles_scanned: usize,
    pub relations_written: usize,
}

/// Scans recently ingested articles for tracked-entity mentions and
/// persists the article-entity relations.
pub struct MentionLinker {
    db: Database,
}

impl MentionLinker {
    pub fn new(db: Database) -> Self {
        MentionLinker { db }
    }

    /// Link mentions across articles created within `lookback`. Relation
    /// upserts are idempotent, so rescanning an article is harmless; a
    /// failure persisting one relation is logged and skipped.
    pub async fn link_recent(&self, lookback: Duration) -> Result<LinkSummary> {
        let roster = self.db.list_tracked_entities().await?;
        if roster.is_empty() {
            debug!(target: TARGET_MENTION, "No tracked entities, skipping mention pass");
            return Ok(LinkSummary::default());
        }

        let matcher = MentionMatcher::new(&roster);
        if matcher.is_empty() {
            debug!(target: TARGET_MENTION, "Roster produced no usable keywords, skipping mention pass");
            return Ok(LinkSummary::default());
        }

        let since = Utc::now() - chrono::Duration::from_std(lookback)?;
        let articles = self.db.articles_created_since(since).await?;

        let mut summary = LinkSummary {
            articles_scanned: articles.len(),
            relations_written: 0,
        };

        for article in &articles {
            let text = format!("{} {} {}", article.title, article.summary, article.content);

            for entity_id in matcher.find_mentions(&text) {
                match self.db.link_entity_to_article(article.id, entity_id).await {
                    Ok(()) => summary.relations_written += 1,
                    Err(err) => {
                        error!(
                            target: TARGET_MENTION,
                            "Failed to link entity {} to article {}: {}", entity_id, article.id, err
                        );
                    }
                }
            }
        }

        info!(
            target: TARGET_MENTION,
            "Mention pass: {} articles scanned, {} relations written",
            summary.articles_scanned,
            summary.relations_written
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::NewArticle;
    use std::time::Duration;

    async fn seed_db() -> Database {
        let db = Database::new_in_memory().await.unwrap();

        sqlx::query("INSERT INTO tracked_entities (id, first_name, last_name) VALUES (1, 'Maria', 'Keller')")
            .execute(db.pool())
            .await
            .unwrap();

        db.insert_article(&NewArticle {
            title: "Keller unveils budget plan".to_string(),
            content: "Full text of the budget coverage.".to_string(),
            summary: "Budget plan unveiled.".to_string(),
            url: "https://example.com/budget".to_string(),
            author: "Wire".to_string(),
            source: "Example Wire".to_string(),
            published_at: Utc::now(),
            category: None,
            image_url: None,
        })
        .await
        .unwrap();

        db
    }

    #[tokio::test]
    async fn links_mentions_for_recent_articles() {
        let db = seed_db().await;
        let linker = MentionLinker::new(db.clone());

        let summary = linker.link_recent(Duration::from_secs(3600)).await.unwrap();
        assert_eq!(summary.articles_scanned, 1);
        assert_eq!(summary.relations_written, 1);

        let entity_ids = db.get_article_entity_ids(1).await.unwrap();
        assert_eq!(entity_ids, vec![1]);
    }

    #[tokio::test]
    async fn relinking_is_idempotent() {
        let db = seed_db().await;
        let linker = MentionLinker::new(db.clone());

        linker.link_recent(Duration::from_secs(3600)).await.unwrap();
        linker.link_recent(Duration::from_secs(3600)).await.unwrap();

        let entity_ids = db.get_article_entity_ids(1).await.unwrap();
        assert_eq!(entity_ids.len(), 1);
    }
}
