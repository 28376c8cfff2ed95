use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The engagement event kinds the tracker accepts. Anything else is
/// rejected at parse time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    View,
    Share,
    Comment,
    Like,
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventType::View => write!(f, "view"),
            EventType::Share => write!(f, "share"),
            EventType::Comment => write!(f, "comment"),
            EventType::Like => write!(f, "like"),
        }
    }
}

impl FromStr for EventType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "view" => Ok(EventType::View),
            "share" => Ok(EventType::Share),
            "comment" => Ok(EventType::Comment),
            "like" => Ok(EventType::Like),
            other => Err(anyhow::anyhow!("Unknown engagement event type: {}", other)),
        }
    }
}

/// Rolling per-article counters. An article with no recorded events has
/// all-zero counters rather than a missing row.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Counters {
    pub article_id: i64,
    pub views: i64,
    pub shares: i64,
    pub comments: i64,
    pub likes: i64,
    pub last_updated: Option<DateTime<Utc>>,
}

impl Counters {
    pub fn zero(article_id: i64) -> Self {
        Counters {
            article_id,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_type_round_trips_through_strings() {
        for kind in ["view", "share", "comment", "like"] {
            let parsed: EventType = kind.parse().unwrap();
            assert_eq!(parsed.to_string(), kind);
        }
    }

    #[test]
    fn unknown_event_types_are_rejected() {
        assert!("clap".parse::<EventType>().is_err());
        assert!("".parse::<EventType>().is_err());
    }
}
