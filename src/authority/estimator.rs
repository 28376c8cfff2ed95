use anyhow::Result;
use chrono::Utc;
use serde::Serialize;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

use crate::db::{Database, SourceAggregates, SourceAuthorityRow};
use crate::trending::EngagementWeights;
use crate::TARGET_AUTHORITY;

/// Blended per-source credibility/reach metrics. All scores live in [0, 1].
#[derive(Debug, Clone, Serialize)]
pub struct Authority {
    pub source_name: String,
    pub authority_score: f64,
    pub credibility_score: f64,
    pub reach_score: f64,
    pub total_articles: i64,
    pub avg_engagement: f64,
}

impl Authority {
    /// Sources with no recorded data are treated neutrally, never penalized.
    pub fn neutral(source_name: &str) -> Self {
        Authority {
            source_name: source_name.to_string(),
            authority_score: 0.5,
            credibility_score: 0.5,
            reach_score: 0.5,
            total_articles: 0,
            avg_engagement: 0.0,
        }
    }
}

/// Computes the documented authority formulas from raw aggregates.
pub(crate) fn compute_authority(source_name: &str, agg: &SourceAggregates) -> Authority {
    let article_count = agg.article_count as f64;

    let authority_score = 0.3 * (article_count / 100.0).min(1.0)
        + 0.7 * ((agg.avg_views + 10.0 * agg.avg_shares) / 1000.0).min(1.0);

    let credibility_score = if agg.avg_shares == 0.0 {
        0.5
    } else {
        ((agg.avg_comments + agg.avg_likes) / agg.avg_shares / 10.0).min(1.0)
    };

    let reach_score = if agg.article_count == 0 {
        0.0
    } else {
        ((agg.avg_views / article_count) / 1000.0).min(1.0)
    };

    let weights = EngagementWeights::default();
    let avg_engagement = (weights.view * agg.avg_views
        + weights.share * agg.avg_shares
        + weights.comment * agg.avg_comments
        + weights.like * agg.avg_likes)
        / 4.0;

    Authority {
        source_name: source_name.to_string(),
        authority_score,
        credibility_score,
        reach_score,
        total_articles: agg.article_count,
        avg_engagement,
    }
}

/// Recomputes and serves per-source authority rows.
pub struct AuthorityEstimator {
    db: Database,
}

impl AuthorityEstimator {
    pub fn new(db: Database) -> Self {
        AuthorityEstimator { db }
    }

    /// Aggregate the source's article and engagement history, recompute the
    /// scores, and overwrite the stored row.
    pub async fn recompute(&self, source_name: &str) -> Result<Authority> {
        let agg = self.db.source_engagement_aggregates(source_name).await?;
        let authority = compute_authority(source_name, &agg);

        self.db
            .upsert_source_authority(&SourceAuthorityRow {
                source_name: authority.source_name.clone(),
                authority_score: authority.authority_score,
                credibility_score: authority.credibility_score,
                reach_score: authority.reach_score,
                total_articles: authority.total_articles,
                avg_engagement: authority.avg_engagement,
                last_calculated: Utc::now(),
            })
            .await?;

        debug!(
            target: TARGET_AUTHORITY,
            "Recomputed authority for {}: authority={:.3}, credibility={:.3}, reach={:.3}",
            source_name, authority.authority_score, authority.credibility_score, authority.reach_score
        );
        Ok(authority)
    }

    /// Recompute every source that has stored articles. Per-source failures
    /// are logged and skipped. Returns how many sources were refreshed.
    pub async fn recompute_all(&self) -> Result<usize> {
        let sources = self.db.list_article_sources().await?;
        let mut refreshed = 0;

        for source_name in &sources {
            match self.recompute(source_name).await {
                Ok(_) => refreshed += 1,
                Err(err) => {
                    error!(target: TARGET_AUTHORITY, "Failed to recompute authority for {}: {}", source_name, err);
                }
            }
        }

        info!(target: TARGET_AUTHORITY, "Authority sweep refreshed {}/{} sources", refreshed, sources.len());
        Ok(refreshed)
    }

    /// Refresh every source on a fixed interval until the cancellation
    /// signal fires. The first sweep runs immediately; sweep failures are
    /// logged and the next tick retries.
    pub async fn run_periodic(&self, interval: Duration, mut cancel: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(target: TARGET_AUTHORITY, "Authority sweep started with interval {:?}", interval);

        loop {
            tokio::select! {
                changed = cancel.changed() => {
                    // A dropped sender counts as cancellation.
                    if changed.is_err() || *cancel.borrow() {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    if let Err(err) = self.recompute_all().await {
                        error!(target: TARGET_AUTHORITY, "Authority sweep failed: {}", err);
                    }
                }
            }
        }

        info!(target: TARGET_AUTHORITY, "Authority sweep stopped");
    }

    /// The stored row, or the neutral default for unseen sources.
    pub async fn get_authority(&self, source_name: &str) -> Result<Authority> {
        let row = self.db.read_source_authority(source_name).await?;

        Ok(match row {
            Some(row) => Authority {
                source_name: row.source_name,
                authority_score: row.authority_score,
                credibility_score: row.credibility_score,
                reach_score: row.reach_score,
                total_articles: row.total_articles,
                avg_engagement: row.avg_engagement,
            },
            None => Authority::neutral(source_name),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_history_scores_to_floor() {
        let authority = compute_authority("quiet", &SourceAggregates::default());
        assert_eq!(authority.authority_score, 0.0);
        assert_eq!(authority.credibility_score, 0.5); // no shares means neutral credibility
        assert_eq!(authority.reach_score, 0.0);
        assert_eq!(authority.avg_engagement, 0.0);
    }

    #[test]
    fn formulas_match_documented_constants() {
        let agg = SourceAggregates {
            article_count: 50,
            avg_views: 400.0,
            avg_shares: 20.0,
            avg_comments: 30.0,
            avg_likes: 50.0,
        };
        let authority = compute_authority("wire", &agg);

        // 0.3·min(50/100,1) + 0.7·min((400+200)/1000,1)
        assert!((authority.authority_score - (0.3 * 0.5 + 0.7 * 0.6)).abs() < 1e-9);
        // min((30+50)/20/10, 1)
        assert!((authority.credibility_score - 0.4).abs() < 1e-9);
        // min((400/50)/1000, 1)
        assert!((authority.reach_score - 0.008).abs() < 1e-9);
        // (400 + 5·20 + 3·30 + 2·50)/4
        assert!((authority.avg_engagement - 172.5).abs() < 1e-9);
    }

    #[test]
    fn scores_saturate_at_one() {
        let agg = SourceAggregates {
            article_count: 100,
            avg_views: 1_000_000.0,
            avg_shares: 10_000.0,
            avg_comments: 1_000_000.0,
            avg_likes: 1_000_000.0,
        };
        let authority = compute_authority("giant", &agg);
        assert_eq!(authority.authority_score, 1.0);
        assert_eq!(authority.credibility_score, 1.0);
        assert_eq!(authority.reach_score, 1.0);
    }

    #[tokio::test]
    async fn unseen_source_gets_neutral_default() {
        let db = Database::new_in_memory().await.unwrap();
        let estimator = AuthorityEstimator::new(db);

        let authority = estimator.get_authority("never-seen").await.unwrap();
        assert_eq!(authority.authority_score, 0.5);
        assert_eq!(authority.credibility_score, 0.5);
        assert_eq!(authority.reach_score, 0.5);
        assert_eq!(authority.total_articles, 0);
        assert_eq!(authority.avg_engagement, 0.0);
    }

    #[tokio::test]
    async fn recompute_all_sweeps_every_source() {
        let db = Database::new_in_memory().await.unwrap();

        for (i, source) in ["Wire A", "Wire B"].iter().enumerate() {
            db.insert_article(&crate::db::NewArticle {
                title: format!("Story {}", i),
                content: "Body.".to_string(),
                summary: "Summary.".to_string(),
                url: format!("https://example.com/story-{}", i),
                author: "Staff".to_string(),
                source: source.to_string(),
                published_at: Utc::now(),
                category: None,
                image_url: None,
            })
            .await
            .unwrap();
        }

        let estimator = AuthorityEstimator::new(db.clone());
        let refreshed = estimator.recompute_all().await.unwrap();
        assert_eq!(refreshed, 2);

        assert!(db.read_source_authority("Wire A").await.unwrap().is_some());
        assert!(db.read_source_authority("Wire B").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn periodic_sweep_runs_immediately_and_stops_on_cancel() {
        let db = Database::new_in_memory().await.unwrap();

        db.insert_article(&crate::db::NewArticle {
            title: "Seed".to_string(),
            content: "Seed content.".to_string(),
            summary: "Seed.".to_string(),
            url: "https://example.com/sweep-seed".to_string(),
            author: "Wire".to_string(),
            source: "Example Wire".to_string(),
            published_at: Utc::now(),
            category: None,
            image_url: None,
        })
        .await
        .unwrap();

        let estimator = std::sync::Arc::new(AuthorityEstimator::new(db.clone()));
        let (cancel_tx, cancel_rx) = tokio::sync::watch::channel(false);
        let handle = {
            let estimator = estimator.clone();
            tokio::spawn(async move {
                estimator
                    .run_periodic(Duration::from_secs(3600), cancel_rx)
                    .await
            })
        };

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(db.read_source_authority("Example Wire").await.unwrap().is_some());

        cancel_tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("sweep did not stop after cancellation")
            .unwrap();
    }

    #[tokio::test]
    async fn recompute_overwrites_stored_row() {
        let db = Database::new_in_memory().await.unwrap();

        db.insert_article(&crate::db::NewArticle {
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

        let estimator = AuthorityEstimator::new(db.clone());
        estimator.recompute("Example Wire").await.unwrap();

        let stored = estimator.get_authority("Example Wire").await.unwrap();
        assert_eq!(stored.total_articles, 1);
        // one article, no engagement: authority comes only from volume
        assert!((stored.authority_score - 0.3 * 0.01).abs() < 1e-9);
    }
}
