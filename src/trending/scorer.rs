use anyhow::Result;
use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use tracing::{debug, info, warn};

use super::content::content_score;
use super::types::{
    EngagementWeights, RankedArticle, TimeWindow, TrendingSubscores, TrendingWeights,
    ENGAGEMENT_NORM_CAP, RECENCY_FLOOR, TRENDING_CACHE_MAX_AGE, TRENDING_OVERSAMPLE,
};
use crate::authority::AuthorityEstimator;
use crate::db::{Article, Database, TrendingCacheRow};
use crate::engagement::EngagementTracker;
use crate::TARGET_TRENDING;

/// Authority sub-score blend over the estimator's three factors.
const AUTHORITY_BLEND: (f64, f64, f64) = (0.4, 0.3, 0.3);

const REASON_VELOCITY_THRESHOLD: f64 = 0.7;
const REASON_ENGAGEMENT_THRESHOLD: f64 = 0.7;
const REASON_AUTHORITY_THRESHOLD: f64 = 0.8;
const REASON_CONTENT_THRESHOLD: f64 = 0.8;
const REASON_RECENCY_THRESHOLD: f64 = 0.9;

/// Computes the five-factor trending ranking, serving precomputed batches
/// from the cache while they are fresh.
pub struct TrendingScorer {
    db: Database,
    tracker: EngagementTracker,
    estimator: AuthorityEstimator,
    weights: TrendingWeights,
    event_weights: EngagementWeights,
}

impl TrendingScorer {
    pub fn new(db: Database) -> Self {
        TrendingScorer {
            tracker: EngagementTracker::new(db.clone()),
            estimator: AuthorityEstimator::new(db.clone()),
            db,
            weights: TrendingWeights::default(),
            event_weights: EngagementWeights::default(),
        }
    }

    /// Top `limit` trending articles for `window`. A fresh cached batch is
    /// served directly; otherwise the ranking is computed synchronously and
    /// the full batch is persisted detached, so a cache-write failure never
    /// fails the read.
    pub async fn get_trending(
        &self,
        limit: usize,
        window: TimeWindow,
    ) -> Result<Vec<RankedArticle>> {
        let cached = match self
            .db
            .read_fresh_trending_batch(window.as_str(), TRENDING_CACHE_MAX_AGE, limit as i64)
            .await
        {
            Ok(rows) => rows,
            Err(err) => {
                warn!(target: TARGET_TRENDING, "Trending cache read failed, recomputing: {}", err);
                Vec::new()
            }
        };

        if !cached.is_empty() {
            debug!(target: TARGET_TRENDING, "Serving {} cached entries for window {}", cached.len(), window);
            return Ok(cached
                .into_iter()
                .map(|(article, row)| RankedArticle {
                    article,
                    trending_score: row.trending_score,
                    subscores: TrendingSubscores {
                        engagement: row.engagement_score,
                        velocity: row.velocity_score,
                        authority: row.authority_score,
                        content: row.content_score,
                        recency: row.recency_score,
                    },
                    reason: row.reason,
                })
                .collect());
        }

        let ranked = self.compute(limit, window).await?;

        // Persist the full batch in the background; the caller already has
        // its response.
        let db = self.db.clone();
        let rows = cache_rows(&ranked);
        let window_name = window.as_str();
        tokio::spawn(async move {
            if let Err(err) = db.replace_trending_batch(window_name, &rows).await {
                warn!(target: TARGET_TRENDING, "Failed to persist trending batch for {}: {}", window_name, err);
            }
        });

        Ok(ranked.into_iter().take(limit).collect())
    }

    /// Score every candidate in the window, best first. Returns the whole
    /// oversampled set; callers truncate for display.
    async fn compute(&self, limit: usize, window: TimeWindow) -> Result<Vec<RankedArticle>> {
        let now = Utc::now();
        let since = now - chrono::Duration::from_std(window.duration())?;
        let candidates = self
            .db
            .articles_published_since(since, (limit.max(1) * TRENDING_OVERSAMPLE) as i64)
            .await?;

        debug!(target: TARGET_TRENDING, "Scoring {} candidates for window {}", candidates.len(), window);

        let mut ranked = Vec::with_capacity(candidates.len());
        for article in candidates {
            let subscores = self.subscores_for(&article, window, now).await?;
            let trending_score = self.weights.engagement * subscores.engagement
                + self.weights.velocity * subscores.velocity
                + self.weights.authority * subscores.authority
                + self.weights.content * subscores.content
                + self.weights.recency * subscores.recency;

            ranked.push(RankedArticle {
                reason: reason_for(&subscores),
                article,
                trending_score,
                subscores,
            });
        }

        let ranked = rank(ranked);
        info!(target: TARGET_TRENDING, "Computed trending batch for {}: {} entries", window, ranked.len());
        Ok(ranked)
    }

    async fn subscores_for(
        &self,
        article: &Article,
        window: TimeWindow,
        now: DateTime<Utc>,
    ) -> Result<TrendingSubscores> {
        let counters = self.tracker.get_counters(article.id).await?;
        let weighted = self.event_weights.view * counters.views as f64
            + self.event_weights.share * counters.shares as f64
            + self.event_weights.comment * counters.comments as f64
            + self.event_weights.like * counters.likes as f64;
        let engagement = (weighted / ENGAGEMENT_NORM_CAP).min(1.0);

        let raw_velocity = self
            .tracker
            .get_velocity(article.id, window.duration())
            .await?;
        let velocity = (raw_velocity + 1.0) / 2.0;

        let auth = self.estimator.get_authority(&article.source).await?;
        let (wa, wc, wr) = AUTHORITY_BLEND;
        let authority =
            wa * auth.authority_score + wc * auth.credibility_score + wr * auth.reach_score;

        let content = content_score(&article.title, &article.content);

        let age_seconds = (now - article.published_at).num_seconds().max(0) as f64;
        let half_life = window.recency_half_life().as_secs() as f64;
        let recency = (-age_seconds / half_life).exp().max(RECENCY_FLOOR);

        Ok(TrendingSubscores {
            engagement,
            velocity,
            authority,
            content,
            recency,
        })
    }
}

/// Sort by score descending, ties broken by more recent publish time.
fn rank(mut ranked: Vec<RankedArticle>) -> Vec<RankedArticle> {
    ranked.sort_by(|a, b| {
        b.trending_score
            .partial_cmp(&a.trending_score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| b.article.published_at.cmp(&a.article.published_at))
    });
    ranked
}

fn cache_rows(ranked: &[RankedArticle]) -> Vec<TrendingCacheRow> {
    let calculated_at = Utc::now();
    ranked
        .iter()
        .map(|entry| TrendingCacheRow {
            article_id: entry.article.id,
            time_window: String::new(), // set by the batch writer
            trending_score: entry.trending_score,
            engagement_score: entry.subscores.engagement,
            velocity_score: entry.subscores.velocity,
            authority_score: entry.subscores.authority,
            content_score: entry.subscores.content,
            recency_score: entry.subscores.recency,
            reason: entry.reason.clone(),
            calculated_at,
        })
        .collect()
}

/// The dominant factor names the reason when it clears its threshold;
/// otherwise the ranking is attributed to the blend.
fn reason_for(subscores: &TrendingSubscores) -> String {
    let checks = [
        (
            subscores.velocity,
            REASON_VELOCITY_THRESHOLD,
            "rapidly gaining engagement",
        ),
        (
            subscores.engagement,
            REASON_ENGAGEMENT_THRESHOLD,
            "drawing heavy reader engagement",
        ),
        (
            subscores.authority,
            REASON_AUTHORITY_THRESHOLD,
            "covered by high-authority sources",
        ),
        (
            subscores.content,
            REASON_CONTENT_THRESHOLD,
            "high-signal coverage",
        ),
        (subscores.recency, REASON_RECENCY_THRESHOLD, "just published"),
    ];

    for (value, threshold, label) in checks {
        if value > threshold {
            return label.to_string();
        }
    }
    "trending across multiple factors".to_string()
}
