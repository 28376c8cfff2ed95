pub mod authority;
pub mod db;
pub mod engagement;
pub mod environment;
pub mod logging;
pub mod mentions;
pub mod pipeline;
pub mod rss;
pub mod scheduler;
pub mod trending;

pub const TARGET_WEB_REQUEST: &str = "web_request";
pub const TARGET_DB: &str = "db_query";
pub const TARGET_MENTION: &str = "mention";
pub const TARGET_ENGAGEMENT: &str = "engagement";
pub const TARGET_AUTHORITY: &str = "authority";
pub const TARGET_TRENDING: &str = "trending";
pub const TARGET_SCHEDULER: &str = "scheduler";
