//! Tweet domain - model and DB queries for the tracked account's tweets
//!
//! All functions use the generic Executor pattern, allowing them to work with
//! both `&PgPool` and `&mut PgConnection`.

use chrono::{DateTime, Utc};
use sqlx::{Executor, Postgres, QueryBuilder};

use crate::constants::RETWEET_PREFIX;
use crate::twitter::TimelineTweet;

/// Flat record written by the tweet sync; every field is overwritten on upsert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TweetRecord {
    pub tweet_id: String,
    pub retweet_count: i64,
    pub reply_count: i64,
    pub like_count: i64,
    pub quote_count: i64,
    pub text: String,
}

impl From<TimelineTweet> for TweetRecord {
    fn from(tweet: TimelineTweet) -> Self {
        let metrics = tweet.public_metrics.unwrap_or_default();
        Self {
            tweet_id: tweet.id,
            retweet_count: metrics.retweet_count.max(0),
            reply_count: metrics.reply_count.max(0),
            like_count: metrics.like_count.max(0),
            quote_count: metrics.quote_count.max(0),
            text: tweet.text,
        }
    }
}

/// A stored tweet
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Tweet {
    pub tweet_id: String,
    pub retweet_count: i64,
    pub reply_count: i64,
    pub like_count: i64,
    pub quote_count: i64,
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Tweet {
    /// Liked at least once and not one of the account's own retweets.
    pub fn is_engagement_candidate(&self) -> bool {
        is_engagement_candidate(self.like_count, &self.text)
    }
}

pub fn is_engagement_candidate(like_count: i64, text: &str) -> bool {
    like_count >= 1 && !text.starts_with(RETWEET_PREFIX)
}

/// Upsert one chunk of tweets keyed by `tweet_id`. Rows whose fields are
/// unchanged are left alone, so `updated_at` only moves on real changes.
///
/// The chunk must not contain the same `tweet_id` twice.
pub async fn upsert_tweets<'e, E>(executor: E, records: &[TweetRecord]) -> Result<u64, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    if records.is_empty() {
        return Ok(0);
    }

    let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
        "INSERT INTO tweets (tweet_id, retweet_count, reply_count, like_count, quote_count, text) ",
    );
    builder.push_values(records, |mut row, record| {
        row.push_bind(&record.tweet_id)
            .push_bind(record.retweet_count)
            .push_bind(record.reply_count)
            .push_bind(record.like_count)
            .push_bind(record.quote_count)
            .push_bind(&record.text);
    });
    builder.push(
        r#"
        ON CONFLICT (tweet_id) DO UPDATE SET
            retweet_count = EXCLUDED.retweet_count,
            reply_count = EXCLUDED.reply_count,
            like_count = EXCLUDED.like_count,
            quote_count = EXCLUDED.quote_count,
            text = EXCLUDED.text,
            updated_at = NOW()
        WHERE (tweets.retweet_count, tweets.reply_count, tweets.like_count, tweets.quote_count, tweets.text)
            IS DISTINCT FROM
            (EXCLUDED.retweet_count, EXCLUDED.reply_count, EXCLUDED.like_count, EXCLUDED.quote_count, EXCLUDED.text)
        "#,
    );

    let result = builder.build().execute(executor).await?;
    Ok(result.rows_affected())
}

/// Tweets whose engagement is worth refreshing, oldest first
pub async fn list_engagement_candidates<'e, E>(executor: E) -> Result<Vec<Tweet>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(
        r#"
        SELECT tweet_id, retweet_count, reply_count, like_count, quote_count, text,
               created_at, updated_at
        FROM tweets
        WHERE like_count >= 1 AND NOT starts_with(text, $1)
        ORDER BY created_at, tweet_id
        "#,
    )
    .bind(RETWEET_PREFIX)
    .fetch_all(executor)
    .await
}

pub async fn count_tweets<'e, E>(executor: E) -> Result<i64, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM tweets")
        .fetch_one(executor)
        .await?;
    Ok(count)
}
