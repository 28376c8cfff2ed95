use chrono::{DateTime, Utc};
use sqlx::Row;
use tracing::debug;

use super::core::Database;
use crate::TARGET_DB;

#[derive(Debug, Clone)]
pub struct SourceAuthorityRow {
    pub source_name: String,
    pub authority_score: f64,
    pub credibility_score: f64,
    pub reach_score: f64,
    pub total_articles: i64,
    pub avg_engagement: f64,
    pub last_calculated: DateTime<Utc>,
}

/// Raw per-source aggregates the estimator computes scores from.
#[derive(Debug, Clone, Default)]
pub struct SourceAggregates {
    pub article_count: i64,
    pub avg_views: f64,
    pub avg_shares: f64,
    pub avg_comments: f64,
    pub avg_likes: f64,
}

impl Database {
    /// Article count and average engagement counters across a source's
    /// articles. Articles without counters count as zeroes.
    pub async fn source_engagement_aggregates(
        &self,
        source_name: &str,
    ) -> Result<SourceAggregates, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(a.id) AS article_count,
                   COALESCE(AVG(COALESCE(c.views, 0)), 0.0) AS avg_views,
                   COALESCE(AVG(COALESCE(c.shares, 0)), 0.0) AS avg_shares,
                   COALESCE(AVG(COALESCE(c.comments, 0)), 0.0) AS avg_comments,
                   COALESCE(AVG(COALESCE(c.likes, 0)), 0.0) AS avg_likes
            FROM articles a
            LEFT JOIN engagement_counters c ON c.article_id = a.id
            WHERE a.source = ?1
            "#,
        )
        .bind(source_name)
        .fetch_one(self.pool())
        .await?;

        Ok(SourceAggregates {
            article_count: row.get("article_count"),
            avg_views: row.get("avg_views"),
            avg_shares: row.get("avg_shares"),
            avg_comments: row.get("avg_comments"),
            avg_likes: row.get("avg_likes"),
        })
    }

    /// Full-overwrite upsert of a source's authority row.
    pub async fn upsert_source_authority(
        &self,
        row: &SourceAuthorityRow,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO source_authority
                (source_name, authority_score, credibility_score, reach_score,
                 total_articles, avg_engagement, last_calculated)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(source_name) DO UPDATE SET
                authority_score = excluded.authority_score,
                credibility_score = excluded.credibility_score,
                reach_score = excluded.reach_score,
                total_articles = excluded.total_articles,
                avg_engagement = excluded.avg_engagement,
                last_calculated = excluded.last_calculated
            "#,
        )
        .bind(&row.source_name)
        .bind(row.authority_score)
        .bind(row.credibility_score)
        .bind(row.reach_score)
        .bind(row.total_articles)
        .bind(row.avg_engagement)
        .bind(row.last_calculated.timestamp())
        .execute(self.pool())
        .await?;

        debug!(target: TARGET_DB, "Upserted authority for source: {}", row.source_name);
        Ok(())
    }

    pub async fn read_source_authority(
        &self,
        source_name: &str,
    ) -> Result<Option<SourceAuthorityRow>, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT source_name, authority_score, credibility_score, reach_score,
                   total_articles, avg_engagement, last_calculated
            FROM source_authority
            WHERE source_name = ?1
            "#,
        )
        .bind(source_name)
        .fetch_optional(self.pool())
        .await?;

        Ok(row.map(|row| SourceAuthorityRow {
            source_name: row.get("source_name"),
            authority_score: row.get("authority_score"),
            credibility_score: row.get("credibility_score"),
            reach_score: row.get("reach_score"),
            total_articles: row.get("total_articles"),
            avg_engagement: row.get("avg_engagement"),
            last_calculated: DateTime::from_timestamp(row.get("last_calculated"), 0)
                .unwrap_or(DateTime::UNIX_EPOCH),
        }))
    }

    /// Every distinct source name that has at least one stored article.
    pub async fn list_article_sources(&self) -> Result<Vec<String>, sqlx::Error> {
        sqlx::query_scalar::<_, String>("SELECT DISTINCT source FROM articles ORDER BY source")
            .fetch_all(self.pool())
            .await
    }
}
