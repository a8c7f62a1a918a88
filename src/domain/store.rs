//! Persistence seam for the syncs and commands, with the Postgres implementation.

use std::collections::HashMap;
use std::hash::Hash;

use async_trait::async_trait;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use super::engagements::{self, EdgeFilter, EdgeKind, EdgePair, EngagementEdge};
use super::tweets::{self, Tweet, TweetRecord};
use crate::constants::UPSERT_CHUNK_SIZE;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Three logical collections: tweets, liked edges, retweet edges.
#[async_trait]
pub trait Store: Send + Sync {
    /// Batch upsert keyed by `tweet_id`. Returns the number of rows written.
    async fn upsert_tweets(&self, records: &[TweetRecord]) -> Result<u64, StoreError>;

    async fn count_tweets(&self) -> Result<i64, StoreError>;

    async fn engagement_candidates(&self) -> Result<Vec<Tweet>, StoreError>;

    async fn count_edges(&self, kind: EdgeKind, filter: EdgeFilter<'_>)
    -> Result<i64, StoreError>;

    async fn find_edges(
        &self,
        kind: EdgeKind,
        filter: EdgeFilter<'_>,
    ) -> Result<Vec<EngagementEdge>, StoreError>;

    async fn clear_edges(&self, kind: EdgeKind) -> Result<u64, StoreError>;

    /// Batch insert-if-absent keyed by `(tweet_id, user_id)`.
    async fn upsert_edges(&self, kind: EdgeKind, edges: &[EdgePair]) -> Result<u64, StoreError>;
}

/// Collapse repeated keys, keeping the last value at the position the key first appeared.
pub fn dedup_by_key<T, K, F>(items: &[T], key: F) -> Vec<T>
where
    T: Clone,
    K: Eq + Hash,
    F: Fn(&T) -> K,
{
    let mut positions: HashMap<K, usize> = HashMap::new();
    let mut out: Vec<T> = Vec::with_capacity(items.len());
    for item in items {
        match positions.get(&key(item)) {
            Some(&index) => out[index] = item.clone(),
            None => {
                positions.insert(key(item), out.len());
                out.push(item.clone());
            }
        }
    }
    out
}

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Open a pool and apply the embedded migrations.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(Self { pool })
    }
}

#[async_trait]
impl Store for PgStore {
    async fn upsert_tweets(&self, records: &[TweetRecord]) -> Result<u64, StoreError> {
        let records = dedup_by_key(records, |r| r.tweet_id.clone());
        let mut written = 0;
        for chunk in records.chunks(UPSERT_CHUNK_SIZE) {
            written += tweets::upsert_tweets(&self.pool, chunk).await?;
        }
        Ok(written)
    }

    async fn count_tweets(&self) -> Result<i64, StoreError> {
        Ok(tweets::count_tweets(&self.pool).await?)
    }

    async fn engagement_candidates(&self) -> Result<Vec<Tweet>, StoreError> {
        Ok(tweets::list_engagement_candidates(&self.pool).await?)
    }

    async fn count_edges(
        &self,
        kind: EdgeKind,
        filter: EdgeFilter<'_>,
    ) -> Result<i64, StoreError> {
        Ok(engagements::count_edges(&self.pool, kind, filter).await?)
    }

    async fn find_edges(
        &self,
        kind: EdgeKind,
        filter: EdgeFilter<'_>,
    ) -> Result<Vec<EngagementEdge>, StoreError> {
        Ok(engagements::find_edges(&self.pool, kind, filter).await?)
    }

    async fn clear_edges(&self, kind: EdgeKind) -> Result<u64, StoreError> {
        Ok(engagements::clear_edges(&self.pool, kind).await?)
    }

    async fn upsert_edges(&self, kind: EdgeKind, edges: &[EdgePair]) -> Result<u64, StoreError> {
        let edges = dedup_by_key(edges, |e| e.clone());
        let mut written = 0;
        for chunk in edges.chunks(UPSERT_CHUNK_SIZE) {
            written += engagements::upsert_edges(&self.pool, kind, chunk).await?;
        }
        Ok(written)
    }
}
