use anyhow::Result;
use chrono::Utc;
use std::time::Duration;
use tracing::debug;

use super::types::{Counters, EventType};
use crate::db::{Database, NewEngagementEvent};
use crate::TARGET_ENGAGEMENT;

/// Records engagement events and answers counter/velocity queries. Event
/// append and counter upsert share one transaction in the store, so the
/// counters always equal the event log's aggregate.
pub struct EngagementTracker {
    db: Database,
}

impl EngagementTracker {
    pub fn new(db: Database) -> Self {
        EngagementTracker { db }
    }

    pub async fn track_event(
        &self,
        article_id: i64,
        event_type: EventType,
        client_ip: Option<String>,
        user_agent: Option<String>,
        metadata: Option<serde_json::Value>,
    ) -> Result<()> {
        let metadata = metadata.map(|m| m.to_string());

        self.db
            .record_engagement(&NewEngagementEvent {
                article_id,
                event_type: event_type.to_string(),
                client_ip,
                user_agent,
                metadata,
            })
            .await?;

        debug!(target: TARGET_ENGAGEMENT, "Tracked {} for article {}", event_type, article_id);
        Ok(())
    }

    /// Counters for an article; unknown articles get zeroes, never an error.
    pub async fn get_counters(&self, article_id: i64) -> Result<Counters> {
        let row = self.db.read_counters(article_id).await?;

        Ok(match row {
            Some(row) => Counters {
                article_id: row.article_id,
                views: row.views,
                shares: row.shares,
                comments: row.comments,
                likes: row.likes,
                last_updated: Some(row.last_updated),
            },
            None => Counters::zero(article_id),
        })
    }

    /// Engagement momentum over `window` compared to the equal-length
    /// preceding window, bounded to [-1, 1]. A quiet prior window maps to
    /// 1.0 when anything happened and 0.0 when nothing did.
    pub async fn get_velocity(&self, article_id: i64, window: Duration) -> Result<f64> {
        let now = Utc::now();
        let span = chrono::Duration::from_std(window)?;

        let current = self
            .db
            .count_events_between(article_id, now - span, now)
            .await?;
        let previous = self
            .db
            .count_events_between(article_id, now - span - span, now - span)
            .await?;

        let velocity = if previous == 0 {
            if current > 0 {
                1.0
            } else {
                0.0
            }
        } else {
            ((current - previous) as f64 / previous as f64).clamp(-1.0, 1.0)
        };

        debug!(
            target: TARGET_ENGAGEMENT,
            "Velocity for article {}: current={}, previous={}, velocity={}",
            article_id, current, previous, velocity
        );
        Ok(velocity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::NewArticle;

    async fn db_with_article() -> (Database, i64) {
        let db = Database::new_in_memory().await.unwrap();
        db.insert_article(&NewArticle {
            title: "Seed".to_string(),
            content: "Seed content.".to_string(),
            summary: "Seed.".to_string(),
            url: "https://example.com/seed".to_string(),
            author: "Wire".to_string(),
            source: "Example Wire".to_string(),
            published_at: Utc::now(),
            category: None,
            image_url: None,
        })
        .await
        .unwrap();
        (db, 1)
    }

    async fn insert_event_at(db: &Database, article_id: i64, seconds_ago: i64) {
        sqlx::query(
            "INSERT INTO engagement_events (article_id, event_type, created_at) VALUES (?1, 'view', ?2)",
        )
        .bind(article_id)
        .bind(Utc::now().timestamp() - seconds_ago)
        .execute(db.pool())
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn share_on_fresh_article_creates_counter_row() {
        let (db, article_id) = db_with_article().await;
        let tracker = EngagementTracker::new(db);

        tracker
            .track_event(article_id, EventType::Share, None, None, None)
            .await
            .unwrap();

        let counters = tracker.get_counters(article_id).await.unwrap();
        assert_eq!(
            (counters.views, counters.shares, counters.comments, counters.likes),
            (0, 1, 0, 0)
        );
    }

    #[tokio::test]
    async fn counters_accumulate_per_event_type() {
        let (db, article_id) = db_with_article().await;
        let tracker = EngagementTracker::new(db);

        for _ in 0..3 {
            tracker
                .track_event(article_id, EventType::View, None, None, None)
                .await
                .unwrap();
        }
        tracker
            .track_event(article_id, EventType::Like, None, None, None)
            .await
            .unwrap();

        let counters = tracker.get_counters(article_id).await.unwrap();
        assert_eq!(counters.views, 3);
        assert_eq!(counters.likes, 1);
    }

    #[tokio::test]
    async fn unknown_article_gets_zero_counters() {
        let (db, _) = db_with_article().await;
        let tracker = EngagementTracker::new(db);

        let counters = tracker.get_counters(999).await.unwrap();
        assert_eq!(counters.views, 0);
        assert!(counters.last_updated.is_none());
    }

    #[tokio::test]
    async fn velocity_is_one_when_prior_window_was_quiet() {
        let (db, article_id) = db_with_article().await;
        let tracker = EngagementTracker::new(db.clone());

        for _ in 0..5 {
            insert_event_at(&db, article_id, 60).await;
        }

        let velocity = tracker
            .get_velocity(article_id, Duration::from_secs(3600))
            .await
            .unwrap();
        assert_eq!(velocity, 1.0);
    }

    #[tokio::test]
    async fn velocity_is_zero_with_no_events_at_all() {
        let (db, article_id) = db_with_article().await;
        let tracker = EngagementTracker::new(db);

        let velocity = tracker
            .get_velocity(article_id, Duration::from_secs(3600))
            .await
            .unwrap();
        assert_eq!(velocity, 0.0);
    }

    #[tokio::test]
    async fn velocity_halving_is_minus_half() {
        let (db, article_id) = db_with_article().await;
        let tracker = EngagementTracker::new(db.clone());

        // previous window: 10 events, current window: 5
        for _ in 0..10 {
            insert_event_at(&db, article_id, 5400).await;
        }
        for _ in 0..5 {
            insert_event_at(&db, article_id, 60).await;
        }

        let velocity = tracker
            .get_velocity(article_id, Duration::from_secs(3600))
            .await
            .unwrap();
        assert_eq!(velocity, -0.5);
    }

    #[tokio::test]
    async fn velocity_is_clamped_to_plus_one() {
        let (db, article_id) = db_with_article().await;
        let tracker = EngagementTracker::new(db.clone());

        insert_event_at(&db, article_id, 5400).await;
        for _ in 0..20 {
            insert_event_at(&db, article_id, 60).await;
        }

        let velocity = tracker
            .get_velocity(article_id, Duration::from_secs(3600))
            .await
            .unwrap();
        assert_eq!(velocity, 1.0);
    }
}
