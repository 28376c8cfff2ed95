//! Type definitions and the canonical scoring configuration.

use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::db::Article;

/// Cached trending batches older than this are never served.
pub const TRENDING_CACHE_MAX_AGE: Duration = Duration::from_secs(15 * 60);

/// Candidate selection oversamples the requested limit to give the ranker
/// head-room.
pub const TRENDING_OVERSAMPLE: usize = 3;

/// Weighted engagement sums are normalized against this cap when computing
/// the engagement sub-score.
pub const ENGAGEMENT_NORM_CAP: f64 = 1000.0;

/// Recency decay never drops below this floor.
pub const RECENCY_FLOOR: f64 = 0.01;

/// A named lookback interval, used consistently for candidate selection,
/// velocity comparison, and recency decay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimeWindow {
    OneHour,
    SixHours,
    TwentyFourHours,
    SevenDays,
}

impl TimeWindow {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeWindow::OneHour => "1h",
            TimeWindow::SixHours => "6h",
            TimeWindow::TwentyFourHours => "24h",
            TimeWindow::SevenDays => "7d",
        }
    }

    pub fn duration(&self) -> Duration {
        match self {
            TimeWindow::OneHour => Duration::from_secs(60 * 60),
            TimeWindow::SixHours => Duration::from_secs(6 * 60 * 60),
            TimeWindow::TwentyFourHours => Duration::from_secs(24 * 60 * 60),
            TimeWindow::SevenDays => Duration::from_secs(7 * 24 * 60 * 60),
        }
    }

    /// Shorter windows decay faster; a one-hour ranking should not be
    /// dominated by articles from forty minutes ago.
    pub fn recency_half_life(&self) -> Duration {
        match self {
            TimeWindow::OneHour => Duration::from_secs(30 * 60),
            TimeWindow::SixHours => Duration::from_secs(2 * 60 * 60),
            TimeWindow::TwentyFourHours => Duration::from_secs(6 * 60 * 60),
            TimeWindow::SevenDays => Duration::from_secs(2 * 24 * 60 * 60),
        }
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for TimeWindow {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1h" => Ok(TimeWindow::OneHour),
            "6h" => Ok(TimeWindow::SixHours),
            "24h" => Ok(TimeWindow::TwentyFourHours),
            "7d" => Ok(TimeWindow::SevenDays),
            other => Err(anyhow::anyhow!("Unknown time window: {}", other)),
        }
    }
}

/// The canonical final-score weight table. The weights sum to 1.0.
#[derive(Debug, Clone, Copy)]
pub struct TrendingWeights {
    pub engagement: f64,
    pub velocity: f64,
    pub authority: f64,
    pub content: f64,
    pub recency: f64,
}

impl Default for TrendingWeights {
    fn default() -> Self {
        TrendingWeights {
            engagement: 0.30,
            velocity: 0.25,
            authority: 0.20,
            content: 0.15,
            recency: 0.10,
        }
    }
}

impl TrendingWeights {
    pub fn sum(&self) -> f64 {
        self.engagement + self.velocity + self.authority + self.content + self.recency
    }
}

/// The canonical per-event-type weighting, shared by the engagement
/// sub-score and the authority estimator's average engagement.
#[derive(Debug, Clone, Copy)]
pub struct EngagementWeights {
    pub view: f64,
    pub share: f64,
    pub comment: f64,
    pub like: f64,
}

impl Default for EngagementWeights {
    fn default() -> Self {
        EngagementWeights {
            view: 1.0,
            share: 5.0,
            comment: 3.0,
            like: 2.0,
        }
    }
}

/// The five factor scores, each in [0, 1].
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct TrendingSubscores {
    pub engagement: f64,
    pub velocity: f64,
    pub authority: f64,
    pub content: f64,
    pub recency: f64,
}

/// One ranked article with its final score, factor breakdown, and a
/// human-readable reason.
#[derive(Debug, Clone)]
pub struct RankedArticle {
    pub article: Article,
    pub trending_score: f64,
    pub subscores: TrendingSubscores,
    pub reason: String,
}
