//! Stored tweets and engagement edges

pub mod engagements;
#[cfg(test)]
pub mod memory;
pub mod store;
pub mod tweets;

pub use engagements::{EdgeFilter, EdgeKind, EdgePair, EngagementEdge};
pub use store::{PgStore, Store, StoreError};
pub use tweets::{Tweet, TweetRecord};
