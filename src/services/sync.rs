//! Tweet and engagement syncs.
//!
//! The tweet sync pulls the account timeline into `tweets`. The engagement
//! syncs read candidate tweets back out of storage, walk their likers or
//! retweeters through the [`RateLimitedFetcher`] and replace the matching
//! edge collection wholesale.

use std::sync::Arc;

use futures::TryStreamExt;
use log::{error, info, warn};
use thiserror::Error;

use super::fetcher::{CooldownPolicy, RateLimitedFetcher};
use super::guard::{SyncGuard, SyncKind};
use crate::constants::MAX_PAGE_SIZE;
use crate::domain::{EdgeFilter, EdgeKind, EdgePair, Store, StoreError, TweetRecord};
use crate::twitter::{TwitterApi, TwitterError, paginate};

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("a {} sync is already running", .0.as_str())]
    AlreadyRunning(SyncKind),

    #[error("Twitter request failed: {0}")]
    Provider(#[from] TwitterError),

    #[error("storage failed: {0}")]
    Persistence(#[from] StoreError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TweetSyncReport {
    /// The timeline came back empty; nothing was written.
    Empty,
    Stored { fetched: usize, written: u64 },
    /// The provider rate limited the timeline walk. Nothing was written and
    /// no retry is attempted; the next trigger starts over.
    RateLimited { limit: u32, fetched: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngagementSyncReport {
    /// No stored tweet qualified; the provider was not contacted.
    NoCandidates,
    Replaced {
        candidates: usize,
        skipped: usize,
        /// Distinct edges written after collapsing repeats.
        edges: u64,
        cleared: u64,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncReport {
    Tweets(TweetSyncReport),
    Engagement(EdgeKind, EngagementSyncReport),
}

pub struct Syncer {
    api: Arc<dyn TwitterApi>,
    store: Arc<dyn Store>,
    fetcher: RateLimitedFetcher,
    account_id: String,
    guard: SyncGuard,
}

impl Syncer {
    pub fn new(
        api: Arc<dyn TwitterApi>,
        store: Arc<dyn Store>,
        account_id: impl Into<String>,
        cooldown: CooldownPolicy,
    ) -> Self {
        Self {
            fetcher: RateLimitedFetcher::new(api.clone(), cooldown),
            api,
            store,
            account_id: account_id.into(),
            guard: SyncGuard::new(),
        }
    }

    pub fn guard(&self) -> &SyncGuard {
        &self.guard
    }

    pub async fn run(&self, kind: SyncKind) -> Result<SyncReport, SyncError> {
        match kind {
            SyncKind::Tweets => self.sync_tweets().await.map(SyncReport::Tweets),
            SyncKind::Likes => self
                .sync_engagement(EdgeKind::Liked)
                .await
                .map(|r| SyncReport::Engagement(EdgeKind::Liked, r)),
            SyncKind::Retweets => self
                .sync_engagement(EdgeKind::Retweeted)
                .await
                .map(|r| SyncReport::Engagement(EdgeKind::Retweeted, r)),
        }
    }

    /// Pull the whole timeline and upsert it in one batch keyed by tweet id.
    pub async fn sync_tweets(&self) -> Result<TweetSyncReport, SyncError> {
        let _permit = self
            .guard
            .try_acquire(SyncKind::Tweets)
            .ok_or(SyncError::AlreadyRunning(SyncKind::Tweets))?;

        let api = self.api.as_ref();
        let mut timeline = std::pin::pin!(paginate(
            self.account_id.clone(),
            MAX_PAGE_SIZE,
            move |request| api.fetch_timeline(request),
        ));

        let mut records = Vec::new();
        loop {
            match timeline.try_next().await {
                Ok(Some(tweet)) => records.push(TweetRecord::from(tweet)),
                Ok(None) => break,
                Err(TwitterError::RateLimited { limit, .. }) => {
                    warn!(
                        "[tweets] Hit the rate limit after {} tweets: limit for this endpoint is {} requests",
                        records.len(),
                        limit
                    );
                    return Ok(TweetSyncReport::RateLimited {
                        limit,
                        fetched: records.len(),
                    });
                }
                Err(e) => {
                    error!("[tweets] Timeline fetch failed: {}", e);
                    return Err(e.into());
                }
            }
        }

        if records.is_empty() {
            info!("[tweets] No tweets found");
            return Ok(TweetSyncReport::Empty);
        }

        let written = self.store.upsert_tweets(&records).await.map_err(|e| {
            error!("[tweets] Upsert failed: {}", e);
            e
        })?;
        info!(
            "[tweets] Stored {} tweets ({} rows changed)",
            records.len(),
            written
        );

        Ok(TweetSyncReport::Stored {
            fetched: records.len(),
            written,
        })
    }

    /// Rebuild the `kind` edge collection from the provider.
    ///
    /// Clear and re-insert are two separate writes with no transaction
    /// around them, so a reader can see an empty collection in between.
    pub async fn sync_engagement(&self, kind: EdgeKind) -> Result<EngagementSyncReport, SyncError> {
        let sync_kind = SyncKind::from(kind);
        let tag = kind.as_str();
        let _permit = self
            .guard
            .try_acquire(sync_kind)
            .ok_or(SyncError::AlreadyRunning(sync_kind))?;

        let candidates = self.store.engagement_candidates().await?;
        if candidates.is_empty() {
            info!("[{}] No liked tweets to check", tag);
            return Ok(EngagementSyncReport::NoCandidates);
        }
        info!("[{}] Checking {} tweets", tag, candidates.len());

        let mut edges = Vec::new();
        let mut skipped = 0;
        for tweet in &candidates {
            match self.fetcher.fetch_all(kind, &tweet.tweet_id).await {
                Ok(users) => edges.extend(
                    users
                        .into_iter()
                        .map(|user| EdgePair::new(tweet.tweet_id.clone(), user.id)),
                ),
                Err(e) => {
                    error!("[{}] Skipping tweet {}: {}", tag, tweet.tweet_id, e);
                    skipped += 1;
                }
            }
        }

        let existing = self.store.count_edges(kind, EdgeFilter::All).await?;
        let cleared = if existing > 0 {
            self.store.clear_edges(kind).await?
        } else {
            0
        };
        let written = if edges.is_empty() {
            0
        } else {
            self.store.upsert_edges(kind, &edges).await?
        };
        info!(
            "[{}] Replaced {} old edges with {} from {} tweets ({} skipped)",
            tag,
            cleared,
            written,
            candidates.len(),
            skipped
        );

        Ok(EngagementSyncReport::Replaced {
            candidates: candidates.len(),
            skipped,
            edges: written,
            cleared,
        })
    }
}
