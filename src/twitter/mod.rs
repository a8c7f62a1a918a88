//! Twitter v2 API - typed responses, the capability trait the syncs run
//! against, and cursor pagination over it.

mod client;
mod error;
#[cfg(test)]
pub mod fake;

pub use client::TwitterClient;
pub use error::{TwitterError, seconds_until_reset};

use async_trait::async_trait;
use futures::{Stream, TryStreamExt, stream};
use serde::{Deserialize, Serialize};
use std::future::Future;

/// One page worth of a paginated endpoint call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    /// Account id for the timeline, tweet id for likers / retweeters
    pub target_id: String,
    pub max_results: u32,
    pub pagination_token: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_token: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct PublicTweetMetrics {
    pub retweet_count: i64,
    pub reply_count: i64,
    pub like_count: i64,
    pub quote_count: i64,
}

/// Timeline entry as returned with `tweet.fields=public_metrics`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct TimelineTweet {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub public_metrics: Option<PublicTweetMetrics>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct TwitterUser {
    pub id: String,
    pub name: String,
    pub username: String,
}

/// The provider calls the syncs and commands depend on.
#[async_trait]
pub trait TwitterApi: Send + Sync {
    async fn fetch_timeline(&self, request: PageRequest)
    -> Result<Page<TimelineTweet>, TwitterError>;

    async fn fetch_likers(&self, request: PageRequest) -> Result<Page<TwitterUser>, TwitterError>;

    async fn fetch_retweeters(
        &self,
        request: PageRequest,
    ) -> Result<Page<TwitterUser>, TwitterError>;

    /// `Ok(None)` when the handle does not resolve to an account.
    async fn fetch_user_by_handle(&self, handle: &str)
    -> Result<Option<TwitterUser>, TwitterError>;
}

enum Cursor {
    Start,
    Next(String),
    Done,
}

/// Lazily walk every page of a cursor-paginated endpoint, yielding items in
/// provider order. A page is only requested once the previous one is drained.
pub fn paginate<'a, T, F, Fut>(
    target_id: String,
    page_size: u32,
    mut fetch_page: F,
) -> impl Stream<Item = Result<T, TwitterError>> + Send + 'a
where
    T: Send + 'a,
    F: FnMut(PageRequest) -> Fut + Send + 'a,
    Fut: Future<Output = Result<Page<T>, TwitterError>> + Send + 'a,
{
    stream::try_unfold(Cursor::Start, move |cursor| {
        let pagination_token = match cursor {
            Cursor::Start => Some(None),
            Cursor::Next(token) => Some(Some(token)),
            Cursor::Done => None,
        };
        let pending = pagination_token.map(|pagination_token| {
            fetch_page(PageRequest {
                target_id: target_id.clone(),
                max_results: page_size,
                pagination_token,
            })
        });

        async move {
            let Some(pending) = pending else {
                return Ok::<_, TwitterError>(None);
            };
            let page = pending.await?;
            let next = match page.next_token {
                Some(token) => Cursor::Next(token),
                None => Cursor::Done,
            };
            Ok(Some((page.items, next)))
        }
    })
    .map_ok(|items| stream::iter(items.into_iter().map(Ok::<T, TwitterError>)))
    .try_flatten()
}
