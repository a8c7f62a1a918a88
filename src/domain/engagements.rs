//! Engagement edges - which users liked or retweeted which tweets

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{Executor, Postgres, QueryBuilder};

/// The two edge collections
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    Liked,
    Retweeted,
}

impl EdgeKind {
    fn table(&self) -> &'static str {
        match self {
            EdgeKind::Liked => "liked_edges",
            EdgeKind::Retweeted => "retweet_edges",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeKind::Liked => "likes",
            EdgeKind::Retweeted => "retweets",
        }
    }
}

/// `(tweet, user)` pair produced by an engagement sync
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EdgePair {
    pub tweet_id: String,
    pub user_id: String,
}

impl EdgePair {
    pub fn new(tweet_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            tweet_id: tweet_id.into(),
            user_id: user_id.into(),
        }
    }
}

/// A stored edge
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct EngagementEdge {
    pub tweet_id: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Row filter for count / find queries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeFilter<'a> {
    All,
    Tweet(&'a str),
    User(&'a str),
}

impl<'a> EdgeFilter<'a> {
    fn where_clause(&self) -> &'static str {
        match self {
            EdgeFilter::All => "",
            EdgeFilter::Tweet(_) => "WHERE tweet_id = $1",
            EdgeFilter::User(_) => "WHERE user_id = $1",
        }
    }

    fn value(&self) -> Option<&'a str> {
        match self {
            EdgeFilter::All => None,
            EdgeFilter::Tweet(id) | EdgeFilter::User(id) => Some(id),
        }
    }

    pub fn matches(&self, pair: &EdgePair) -> bool {
        match self {
            EdgeFilter::All => true,
            EdgeFilter::Tweet(id) => pair.tweet_id == *id,
            EdgeFilter::User(id) => pair.user_id == *id,
        }
    }
}

pub async fn count_edges<'e, E>(
    executor: E,
    kind: EdgeKind,
    filter: EdgeFilter<'_>,
) -> Result<i64, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let query = format!(
        "SELECT COUNT(*) FROM {} {}",
        kind.table(),
        filter.where_clause()
    );

    let mut q = sqlx::query_as::<_, (i64,)>(&query);
    if let Some(value) = filter.value() {
        q = q.bind(value);
    }
    let (count,) = q.fetch_one(executor).await?;
    Ok(count)
}

pub async fn find_edges<'e, E>(
    executor: E,
    kind: EdgeKind,
    filter: EdgeFilter<'_>,
) -> Result<Vec<EngagementEdge>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let query = format!(
        "SELECT tweet_id, user_id, created_at, updated_at FROM {} {} ORDER BY tweet_id, user_id",
        kind.table(),
        filter.where_clause()
    );

    let mut q = sqlx::query_as::<_, EngagementEdge>(&query);
    if let Some(value) = filter.value() {
        q = q.bind(value);
    }
    q.fetch_all(executor).await
}

/// Delete every edge of the given kind
pub async fn clear_edges<'e, E>(executor: E, kind: EdgeKind) -> Result<u64, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let query = format!("DELETE FROM {}", kind.table());
    let result = sqlx::query(&query).execute(executor).await?;
    Ok(result.rows_affected())
}

/// Insert-if-absent one chunk of edges; an existing pair only gets `updated_at` bumped.
///
/// The chunk must not contain the same pair twice.
pub async fn upsert_edges<'e, E>(
    executor: E,
    kind: EdgeKind,
    edges: &[EdgePair],
) -> Result<u64, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    if edges.is_empty() {
        return Ok(0);
    }

    let mut builder: QueryBuilder<Postgres> =
        QueryBuilder::new(format!("INSERT INTO {} (tweet_id, user_id) ", kind.table()));
    builder.push_values(edges, |mut row, edge| {
        row.push_bind(&edge.tweet_id).push_bind(&edge.user_id);
    });
    builder.push(" ON CONFLICT (tweet_id, user_id) DO UPDATE SET updated_at = NOW()");

    let result = builder.build().execute(executor).await?;
    Ok(result.rows_affected())
}
