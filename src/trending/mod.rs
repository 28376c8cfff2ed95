//! Multi-factor trending ranking over recent articles, backed by a
//! freshness-bounded cache of precomputed batches.

mod content;
mod scorer;
mod types;

pub use self::content::content_score;
pub use self::scorer::TrendingScorer;
pub use self::types::*;
