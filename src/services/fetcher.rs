//! Rate-limited walk over the liking / retweeting users of one tweet.
//!
//! A rate-limit response pauses the walk for a cooldown and then re-issues
//! the whole request from the first page. Users collected before the pause
//! are kept; repeats collapse later at the edge upsert key. Only one
//! cooldown is taken per tweet: if the retry fails too, that error is
//! returned as-is.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::{Stream, TryStreamExt};
use log::{info, warn};

use crate::constants::{DEFAULT_COOLDOWN_SECS, MAX_PAGE_SIZE};
use crate::domain::EdgeKind;
use crate::twitter::{TwitterApi, TwitterError, TwitterUser, paginate, seconds_until_reset};

/// How long to pause after the provider reports a rate limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CooldownPolicy {
    /// Always wait this long; the reset time is only logged.
    Fixed(Duration),
    /// Wait until the provider's reset time plus `margin`.
    UntilReset { margin: Duration },
}

impl Default for CooldownPolicy {
    fn default() -> Self {
        CooldownPolicy::Fixed(Duration::from_secs(DEFAULT_COOLDOWN_SECS))
    }
}

impl CooldownPolicy {
    pub fn pause_for(&self, seconds_until_reset: i64) -> Duration {
        match self {
            CooldownPolicy::Fixed(duration) => *duration,
            CooldownPolicy::UntilReset { margin } => {
                Duration::from_secs(seconds_until_reset.max(0) as u64) + *margin
            }
        }
    }
}

pub struct RateLimitedFetcher {
    api: Arc<dyn TwitterApi>,
    cooldown: CooldownPolicy,
    page_size: u32,
}

impl RateLimitedFetcher {
    pub fn new(api: Arc<dyn TwitterApi>, cooldown: CooldownPolicy) -> Self {
        Self {
            api,
            cooldown,
            page_size: MAX_PAGE_SIZE,
        }
    }

    /// Every user behind the endpoint for `kind`, page boundaries hidden.
    pub fn users(
        &self,
        kind: EdgeKind,
        tweet_id: &str,
    ) -> impl Stream<Item = Result<TwitterUser, TwitterError>> + Send + '_ {
        let api = self.api.as_ref();
        paginate(tweet_id.to_string(), self.page_size, move |request| match kind {
            EdgeKind::Liked => api.fetch_likers(request),
            EdgeKind::Retweeted => api.fetch_retweeters(request),
        })
    }

    /// Collect all users for one tweet, sitting out at most one rate limit.
    pub async fn fetch_all(
        &self,
        kind: EdgeKind,
        tweet_id: &str,
    ) -> Result<Vec<TwitterUser>, TwitterError> {
        let mut users = Vec::new();

        let (reset, limit) = match self.drain(kind, tweet_id, &mut users).await {
            Ok(()) => return Ok(users),
            Err(TwitterError::RateLimited { reset, limit }) => (reset, limit),
            Err(e) => return Err(e),
        };

        let until_reset = seconds_until_reset(reset, Utc::now());
        let pause = self.cooldown.pause_for(until_reset);
        warn!(
            "[fetcher] Hit the rate limit fetching {} of tweet {}: limit for this endpoint is {} requests",
            kind.as_str(),
            tweet_id,
            limit
        );
        info!(
            "[fetcher] Window resets in {}s, waiting {}s before retrying tweet {}",
            until_reset,
            pause.as_secs(),
            tweet_id
        );
        tokio::time::sleep(pause).await;

        self.drain(kind, tweet_id, &mut users).await?;
        Ok(users)
    }

    async fn drain(
        &self,
        kind: EdgeKind,
        tweet_id: &str,
        out: &mut Vec<TwitterUser>,
    ) -> Result<(), TwitterError> {
        let mut users = std::pin::pin!(self.users(kind, tweet_id));
        while let Some(user) = users.try_next().await? {
            out.push(user);
        }
        Ok(())
    }
}
