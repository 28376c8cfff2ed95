use chrono::{DateTime, Utc};
use rand::Rng;
use sqlx::Row;
use tokio::time::{sleep, Duration};
use tracing::{debug, error, info, instrument};

use super::core::{Database, DbLockErrorExt};
use crate::TARGET_DB;

/// An engagement event ready for the append-only log. The event type has
/// been validated upstream; see `engagement::EventType`.
#[derive(Debug, Clone)]
pub struct NewEngagementEvent {
    pub article_id: i64,
    pub event_type: String,
    pub client_ip: Option<String>,
    pub user_agent: Option<String>,
    pub metadata: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CounterRow {
    pub article_id: i64,
    pub views: i64,
    pub shares: i64,
    pub comments: i64,
    pub likes: i64,
    pub last_updated: DateTime<Utc>,
}

impl Database {
    /// Append an engagement event and bump the matching counter column in
    /// one transaction. Either both rows land or neither does.
    #[instrument(target = "db_query", level = "debug", skip(self, event))]
    pub async fn record_engagement(&self, event: &NewEngagementEvent) -> Result<(), sqlx::Error> {
        let (views, shares, comments, likes) = match event.event_type.as_str() {
            "view" => (1i64, 0i64, 0i64, 0i64),
            "share" => (0, 1, 0, 0),
            "comment" => (0, 0, 1, 0),
            "like" => (0, 0, 0, 1),
            other => {
                error!(target: TARGET_DB, "Rejecting unknown engagement event type: {}", other);
                return Err(sqlx::Error::Protocol(
                    format!("Unknown engagement event type: {}", other).into(),
                ));
            }
        };

        let now = Utc::now().timestamp();

        let mut backoff = 50; // initial delay in milliseconds, hot path
        let max_retries = 5;

        for attempt in 1..=max_retries {
            let result = self
                .record_engagement_tx(event, (views, shares, comments, likes), now)
                .await;

            match result {
                Ok(()) => {
                    debug!(target: TARGET_DB, "Recorded {} event for article {}", event.event_type, event.article_id);
                    return Ok(());
                }
                Err(err) => {
                    if err.is_database_lock_error() {
                        info!(target: TARGET_DB, "Database is locked, waiting {}ms before retrying attempt {}/{}", backoff, attempt, max_retries);
                        sleep(Duration::from_millis(backoff)).await;
                        backoff = backoff.saturating_mul(2);
                        if attempt == max_retries {
                            let random_jitter = rand::rng().random_range(0..100);
                            backoff += random_jitter;
                            sleep(Duration::from_millis(backoff)).await;
                        }
                    } else {
                        error!(target: TARGET_DB, "Failed to record engagement event: {}", err);
                        return Err(err);
                    }
                }
            }
        }

        Err(sqlx::Error::Protocol(
            "Maximum retries exceeded for recording engagement".into(),
        ))
    }

    async fn record_engagement_tx(
        &self,
        event: &NewEngagementEvent,
        (views, shares, comments, likes): (i64, i64, i64, i64),
        now: i64,
    ) -> Result<(), sqlx::Error> {
        let mut tx = self.pool().begin().await?;

        sqlx::query(
            r#"
            INSERT INTO engagement_events
                (article_id, event_type, client_ip, user_agent, metadata, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(event.article_id)
        .bind(&event.event_type)
        .bind(&event.client_ip)
        .bind(&event.user_agent)
        .bind(&event.metadata)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO engagement_counters
                (article_id, views, shares, comments, likes, last_updated)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(article_id) DO UPDATE SET
                views = views + excluded.views,
                shares = shares + excluded.shares,
                comments = comments + excluded.comments,
                likes = likes + excluded.likes,
                last_updated = excluded.last_updated
            "#,
        )
        .bind(event.article_id)
        .bind(views)
        .bind(shares)
        .bind(comments)
        .bind(likes)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await
    }

    pub async fn read_counters(
        &self,
        article_id: i64,
    ) -> Result<Option<CounterRow>, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT article_id, views, shares, comments, likes, last_updated
            FROM engagement_counters
            WHERE article_id = ?1
            "#,
        )
        .bind(article_id)
        .fetch_optional(self.pool())
        .await?;

        Ok(row.map(|row| CounterRow {
            article_id: row.get("article_id"),
            views: row.get("views"),
            shares: row.get("shares"),
            comments: row.get("comments"),
            likes: row.get("likes"),
            last_updated: DateTime::from_timestamp(row.get("last_updated"), 0)
                .unwrap_or(DateTime::UNIX_EPOCH),
        }))
    }

    /// Count events for an article in a half-open time range.
    pub async fn count_events_between(
        &self,
        article_id: i64,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)
            FROM engagement_events
            WHERE article_id = ?1 AND created_at >= ?2 AND created_at < ?3
            "#,
        )
        .bind(article_id)
        .bind(from.timestamp())
        .bind(to.timestamp())
        .fetch_one(self.pool())
        .await
    }
}
