//! Per-source authority estimation from historical engagement.

mod estimator;

pub use self::estimator::{Authority, AuthorityEstimator};
