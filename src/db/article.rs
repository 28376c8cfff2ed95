use chrono::{DateTime, Utc};
use rand::Rng;
use sqlx::Row;
use tokio::time::{sleep, Duration};
use tracing::{debug, error, info, instrument};
use url::Url;

use super::core::{Database, DbLockErrorExt};
use crate::TARGET_DB;

/// A normalized feed item ready for insertion.
#[derive(Debug, Clone)]
pub struct NewArticle {
    pub title: String,
    pub content: String,
    pub summary: String,
    pub url: String,
    pub author: String,
    pub source: String,
    pub published_at: DateTime<Utc>,
    pub category: Option<String>,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Article {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub summary: String,
    pub url: String,
    pub author: String,
    pub source: String,
    pub published_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub category: Option<String>,
    pub image_url: Option<String>,
}

pub(crate) fn article_from_row(row: &sqlx::sqlite::SqliteRow) -> Article {
    Article {
        id: row.get("id"),
        title: row.get("title"),
        content: row.get("content"),
        summary: row.get("summary"),
        url: row.get("url"),
        author: row.get("author"),
        source: row.get("source"),
        published_at: DateTime::from_timestamp(row.get("published_at"), 0)
            .unwrap_or(DateTime::UNIX_EPOCH),
        created_at: DateTime::from_timestamp(row.get("created_at"), 0)
            .unwrap_or(DateTime::UNIX_EPOCH),
        category: row.get("category"),
        image_url: row.get("image_url"),
    }
}

impl Database {
    #[instrument(target = "db_query", level = "debug", skip(self))]
    pub async fn article_exists(&self, url: &str) -> Result<bool, sqlx::Error> {
        if Url::parse(url).is_err() {
            error!(target: TARGET_DB, "Existence check for an invalid URL: {}", url);
            return Err(sqlx::Error::Protocol("Invalid URL provided".into()));
        }

        let row = sqlx::query("SELECT 1 FROM articles WHERE url = ?1")
            .bind(url)
            .fetch_optional(self.pool())
            .await?;

        Ok(row.is_some())
    }

    /// Insert a new article, returning false when the URL is already stored.
    /// The unique constraint on url is the dedup backstop under concurrent
    /// writers; re-ingesting a known URL is a no-op, not an error.
    #[instrument(target = "db_query", level = "debug", skip(self, article))]
    pub async fn insert_article(&self, article: &NewArticle) -> Result<bool, sqlx::Error> {
        if let Err(e) = Url::parse(&article.url) {
            error!(target: TARGET_DB, "Attempted to insert an invalid URL ({}): {}", article.url, e);
            return Err(sqlx::Error::Protocol("Invalid URL provided".into()));
        }

        let created_at = Utc::now().timestamp();

        let mut backoff = 100; // initial delay in milliseconds
        let max_retries = 5;

        for attempt in 1..=max_retries {
            let result = sqlx::query(
                r#"
                INSERT INTO articles
                    (title, content, summary, url, author, source, published_at, created_at, category, image_url)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                ON CONFLICT(url) DO NOTHING
                "#,
            )
            .bind(&article.title)
            .bind(&article.content)
            .bind(&article.summary)
            .bind(&article.url)
            .bind(&article.author)
            .bind(&article.source)
            .bind(article.published_at.timestamp())
            .bind(created_at)
            .bind(&article.category)
            .bind(&article.image_url)
            .execute(self.pool())
            .await;

            match result {
                Ok(done) => {
                    let inserted = done.rows_affected() > 0;
                    debug!(target: TARGET_DB, "Article {}: {}", if inserted { "inserted" } else { "already stored" }, article.url);
                    return Ok(inserted);
                }
                Err(err) => {
                    if err.is_database_lock_error() {
                        info!(target: TARGET_DB, "Database is locked, waiting {}ms before retrying attempt {}/{}: {}", backoff, attempt, max_retries, article.url);
                        sleep(Duration::from_millis(backoff)).await;
                        backoff = backoff.saturating_mul(2); // exponential backoff
                        if attempt == max_retries {
                            // Introduce some randomness to avoid the "thundering herd problem"
                            let random_jitter = rand::rng().random_range(0..200);
                            backoff += random_jitter;
                            sleep(Duration::from_millis(backoff)).await;
                        }
                    } else {
                        error!(target: TARGET_DB, "Failed to insert article: {}", err);
                        return Err(err);
                    }
                }
            }
        }

        Err(sqlx::Error::Protocol(
            "Maximum retries exceeded for inserting article".into(),
        ))
    }

    /// Insert a batch of articles in one transaction, skipping URLs that are
    /// already stored. Returns the number actually inserted.
    pub async fn batch_insert_articles(&self, articles: &[NewArticle]) -> Result<u64, sqlx::Error> {
        let created_at = Utc::now().timestamp();
        let mut tx = self.pool().begin().await?;
        let mut inserted = 0u64;

        for article in articles {
            let done = sqlx::query(
                r#"
                INSERT INTO articles
                    (title, content, summary, url, author, source, published_at, created_at, category, image_url)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                ON CONFLICT(url) DO NOTHING
                "#,
            )
            .bind(&article.title)
            .bind(&article.content)
            .bind(&article.summary)
            .bind(&article.url)
            .bind(&article.author)
            .bind(&article.source)
            .bind(article.published_at.timestamp())
            .bind(created_at)
            .bind(&article.category)
            .bind(&article.image_url)
            .execute(&mut *tx)
            .await?;
            inserted += done.rows_affected();
        }

        tx.commit().await?;
        Ok(inserted)
    }

    /// Candidate articles for ranking: published within the window, newest
    /// first, capped at the oversampled limit.
    pub async fn articles_published_since(
        &self,
        since: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<Article>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT id, title, content, summary, url, author, source,
                   published_at, created_at, category, image_url
            FROM articles
            WHERE published_at >= ?1
            ORDER BY published_at DESC
            LIMIT ?2
            "#,
        )
        .bind(since.timestamp())
        .bind(limit)
        .fetch_all(self.pool())
        .await?;

        Ok(rows.iter().map(article_from_row).collect())
    }

    /// Articles ingested within the lookback, used by the mention linker.
    pub async fn articles_created_since(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Vec<Article>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT id, title, content, summary, url, author, source,
                   published_at, created_at, category, image_url
            FROM articles
            WHERE created_at >= ?1
            ORDER BY created_at DESC
            "#,
        )
        .bind(since.timestamp())
        .fetch_all(self.pool())
        .await?;

        Ok(rows.iter().map(article_from_row).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn article(url: &str, minutes_ago: i64) -> NewArticle {
        NewArticle {
            title: format!("Title for {}", url),
            content: "Body.".to_string(),
            summary: "Summary.".to_string(),
            url: url.to_string(),
            author: "Wire".to_string(),
            source: "Example Wire".to_string(),
            published_at: Utc::now() - chrono::Duration::minutes(minutes_ago),
            category: None,
            image_url: None,
        }
    }

    #[tokio::test]
    async fn insert_is_idempotent_by_url() {
        let db = Database::new_in_memory().await.unwrap();

        assert!(db.insert_article(&article("https://example.com/a", 1)).await.unwrap());
        assert!(!db.insert_article(&article("https://example.com/a", 1)).await.unwrap());

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM articles")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(count, 1);
        assert!(db.article_exists("https://example.com/a").await.unwrap());
    }

    #[tokio::test]
    async fn batch_insert_skips_known_urls() {
        let db = Database::new_in_memory().await.unwrap();
        db.insert_article(&article("https://example.com/a", 1)).await.unwrap();

        let inserted = db
            .batch_insert_articles(&[
                article("https://example.com/a", 1),
                article("https://example.com/b", 2),
            ])
            .await
            .unwrap();
        assert_eq!(inserted, 1);
    }

    #[tokio::test]
    async fn window_query_honors_bounds_and_limit() {
        let db = Database::new_in_memory().await.unwrap();
        db.insert_article(&article("https://example.com/recent", 10)).await.unwrap();
        db.insert_article(&article("https://example.com/older", 30)).await.unwrap();
        db.insert_article(&article("https://example.com/ancient", 60 * 48)).await.unwrap();

        let since = Utc::now() - chrono::Duration::hours(1);
        let within = db.articles_published_since(since, 10).await.unwrap();
        assert_eq!(within.len(), 2);
        assert_eq!(within[0].url, "https://example.com/recent");

        let capped = db.articles_published_since(since, 1).await.unwrap();
        assert_eq!(capped.len(), 1);
    }

    #[tokio::test]
    async fn invalid_urls_are_rejected() {
        let db = Database::new_in_memory().await.unwrap();
        assert!(db.insert_article(&article("not a url", 1)).await.is_err());
        assert!(db.article_exists("not a url").await.is_err());
    }
}
