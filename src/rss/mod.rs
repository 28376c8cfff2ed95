//! Feed ingestion module.
//!
//! This module handles the fetching, parsing, and normalization of
//! syndicated feeds into stored articles.

mod client;
mod fetcher;
mod parser;
mod types;
mod util;

pub use self::fetcher::FeedFetcher;
pub use self::parser::{parse_feed, FeedItem};
pub use self::types::*;
pub use self::util::{is_valid_url, parse_date};
