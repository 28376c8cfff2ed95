//! Engagement telemetry: the append-only event log, rolling counters, and
//! the bounded velocity indicator.

mod tracker;
mod types;

pub use self::tracker::EngagementTracker;
pub use self::types::{Counters, EventType};
