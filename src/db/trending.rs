use chrono::{DateTime, Utc};
use sqlx::Row;
use std::time::Duration;
use tracing::debug;

use super::article::{article_from_row, Article};
use super::core::Database;
use crate::TARGET_DB;

/// One precomputed trending entry. Batches are keyed by time window and
/// replaced wholesale on refresh.
#[derive(Debug, Clone)]
pub struct TrendingCacheRow {
    pub article_id: i64,
    pub time_window: String,
    pub trending_score: f64,
    pub engagement_score: f64,
    pub velocity_score: f64,
    pub authority_score: f64,
    pub content_score: f64,
    pub recency_score: f64,
    pub reason: String,
    pub calculated_at: DateTime<Utc>,
}

impl Database {
    /// Replace the entire cached batch for a window. Delete and insert run
    /// in one transaction so readers never observe a mixed batch.
    pub async fn replace_trending_batch(
        &self,
        time_window: &str,
        rows: &[TrendingCacheRow],
    ) -> Result<(), sqlx::Error> {
        let mut tx = self.pool().begin().await?;

        sqlx::query("DELETE FROM trending_cache WHERE time_window = ?1")
            .bind(time_window)
            .execute(&mut *tx)
            .await?;

        for row in rows {
            sqlx::query(
                r#"
                INSERT INTO trending_cache
                    (article_id, time_window, trending_score, engagement_score,
                     velocity_score, authority_score, content_score, recency_score,
                     reason, calculated_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                "#,
            )
            .bind(row.article_id)
            .bind(time_window)
            .bind(row.trending_score)
            .bind(row.engagement_score)
            .bind(row.velocity_score)
            .bind(row.authority_score)
            .bind(row.content_score)
            .bind(row.recency_score)
            .bind(&row.reason)
            .bind(row.calculated_at.timestamp())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        debug!(target: TARGET_DB, "Replaced trending batch for window {} with {} rows", time_window, rows.len());
        Ok(())
    }

    /// Cached entries for a window younger than `max_age`, best first.
    /// Rows past the staleness threshold are never returned.
    pub async fn read_fresh_trending_batch(
        &self,
        time_window: &str,
        max_age: Duration,
        limit: i64,
    ) -> Result<Vec<(Article, TrendingCacheRow)>, sqlx::Error> {
        let cutoff = Utc::now().timestamp() - max_age.as_secs() as i64;

        let rows = sqlx::query(
            r#"
            SELECT a.id, a.title, a.content, a.summary, a.url, a.author, a.source,
                   a.published_at, a.created_at, a.category, a.image_url,
                   t.article_id, t.time_window, t.trending_score, t.engagement_score,
                   t.velocity_score, t.authority_score, t.content_score,
                   t.recency_score, t.reason, t.calculated_at
            FROM trending_cache t
            JOIN articles a ON a.id = t.article_id
            WHERE t.time_window = ?1 AND t.calculated_at >= ?2
            ORDER BY t.trending_score DESC, a.published_at DESC
            LIMIT ?3
            "#,
        )
        .bind(time_window)
        .bind(cutoff)
        .bind(limit)
        .fetch_all(self.pool())
        .await?;

        Ok(rows
            .iter()
            .map(|row| {
                let article = article_from_row(row);
                let cache = TrendingCacheRow {
                    article_id: row.get("article_id"),
                    time_window: row.get("time_window"),
                    trending_score: row.get("trending_score"),
                    engagement_score: row.get("engagement_score"),
                    velocity_score: row.get("velocity_score"),
                    authority_score: row.get("authority_score"),
                    content_score: row.get("content_score"),
                    recency_score: row.get("recency_score"),
                    reason: row.get("reason"),
                    calculated_at: DateTime::from_timestamp(row.get("calculated_at"), 0)
                        .unwrap_or(DateTime::UNIX_EPOCH),
                };
                (article, cache)
            })
            .collect())
    }
}
