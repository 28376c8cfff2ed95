// Re-export the Database struct and other public items
mod article;
mod authority;
pub mod core;
mod engagement;
mod entity;
mod schema;
mod source;
mod trending;

// Re-export Database and essential traits
pub use self::article::{Article, NewArticle};
pub use self::authority::{SourceAggregates, SourceAuthorityRow};
pub use self::core::Database;
pub use self::core::DbLockErrorExt;
pub use self::engagement::{CounterRow, NewEngagementEvent};
pub use self::entity::TrackedEntity;
pub use self::source::Source;
pub use self::trending::TrendingCacheRow;
pub use sqlx::Row;
