//! Sync services: rate-limited fetching, single-flight guard and the syncs themselves

pub mod error;
pub mod fetcher;
pub mod guard;
pub mod sync;

pub use fetcher::{CooldownPolicy, RateLimitedFetcher};
pub use guard::{SyncGuard, SyncKind};
pub use sync::{EngagementSyncReport, SyncError, SyncReport, Syncer, TweetSyncReport};
