//! In-memory `Store` for tests, recording every call it receives.

use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;

use super::engagements::{EdgeFilter, EdgeKind, EdgePair, EngagementEdge};
use super::store::{Store, StoreError, dedup_by_key};
use super::tweets::{Tweet, TweetRecord};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    UpsertTweets(usize),
    CountTweets,
    Candidates,
    CountEdges(EdgeKind),
    FindEdges(EdgeKind),
    ClearEdges(EdgeKind),
    UpsertEdges(EdgeKind, usize),
}

#[derive(Default)]
struct State {
    tweets: Vec<Tweet>,
    liked: Vec<EngagementEdge>,
    retweeted: Vec<EngagementEdge>,
    ops: Vec<Op>,
    failing: HashSet<&'static str>,
}

impl State {
    fn edges(&mut self, kind: EdgeKind) -> &mut Vec<EngagementEdge> {
        match kind {
            EdgeKind::Liked => &mut self.liked,
            EdgeKind::Retweeted => &mut self.retweeted,
        }
    }

    fn check(&self, op: &'static str) -> Result<(), StoreError> {
        if self.failing.contains(op) {
            return Err(StoreError::Database(sqlx::Error::PoolTimedOut));
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ops(&self) -> Vec<Op> {
        self.state.lock().unwrap().ops.clone()
    }

    pub fn tweets(&self) -> Vec<Tweet> {
        self.state.lock().unwrap().tweets.clone()
    }

    pub fn pairs(&self, kind: EdgeKind) -> Vec<EdgePair> {
        let mut state = self.state.lock().unwrap();
        let mut pairs: Vec<EdgePair> = state
            .edges(kind)
            .iter()
            .map(|e| EdgePair::new(e.tweet_id.clone(), e.user_id.clone()))
            .collect();
        pairs.sort();
        pairs
    }

    pub fn seed_edges(&self, kind: EdgeKind, pairs: &[EdgePair]) {
        let now = Utc::now();
        let mut state = self.state.lock().unwrap();
        state.edges(kind).extend(pairs.iter().map(|p| EngagementEdge {
            tweet_id: p.tweet_id.clone(),
            user_id: p.user_id.clone(),
            created_at: now,
            updated_at: now,
        }));
    }

    /// Make the named trait method fail with a database error from now on.
    pub fn fail(&self, op: &'static str) {
        self.state.lock().unwrap().failing.insert(op);
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn upsert_tweets(&self, records: &[TweetRecord]) -> Result<u64, StoreError> {
        let mut state = self.state.lock().unwrap();
        state.ops.push(Op::UpsertTweets(records.len()));
        state.check("upsert_tweets")?;

        let now = Utc::now();
        let mut written = 0;
        for record in dedup_by_key(records, |r| r.tweet_id.clone()) {
            match state.tweets.iter_mut().find(|t| t.tweet_id == record.tweet_id) {
                Some(existing) => {
                    let unchanged = existing.retweet_count == record.retweet_count
                        && existing.reply_count == record.reply_count
                        && existing.like_count == record.like_count
                        && existing.quote_count == record.quote_count
                        && existing.text == record.text;
                    if !unchanged {
                        existing.retweet_count = record.retweet_count;
                        existing.reply_count = record.reply_count;
                        existing.like_count = record.like_count;
                        existing.quote_count = record.quote_count;
                        existing.text = record.text;
                        existing.updated_at = now;
                        written += 1;
                    }
                }
                None => {
                    state.tweets.push(Tweet {
                        tweet_id: record.tweet_id,
                        retweet_count: record.retweet_count,
                        reply_count: record.reply_count,
                        like_count: record.like_count,
                        quote_count: record.quote_count,
                        text: record.text,
                        created_at: now,
                        updated_at: now,
                    });
                    written += 1;
                }
            }
        }
        Ok(written)
    }

    async fn count_tweets(&self) -> Result<i64, StoreError> {
        let mut state = self.state.lock().unwrap();
        state.ops.push(Op::CountTweets);
        state.check("count_tweets")?;
        Ok(state.tweets.len() as i64)
    }

    async fn engagement_candidates(&self) -> Result<Vec<Tweet>, StoreError> {
        let mut state = self.state.lock().unwrap();
        state.ops.push(Op::Candidates);
        state.check("engagement_candidates")?;
        Ok(state
            .tweets
            .iter()
            .filter(|t| t.is_engagement_candidate())
            .cloned()
            .collect())
    }

    async fn count_edges(
        &self,
        kind: EdgeKind,
        filter: EdgeFilter<'_>,
    ) -> Result<i64, StoreError> {
        let mut state = self.state.lock().unwrap();
        state.ops.push(Op::CountEdges(kind));
        state.check("count_edges")?;
        let count = state
            .edges(kind)
            .iter()
            .filter(|e| filter.matches(&EdgePair::new(e.tweet_id.clone(), e.user_id.clone())))
            .count();
        Ok(count as i64)
    }

    async fn find_edges(
        &self,
        kind: EdgeKind,
        filter: EdgeFilter<'_>,
    ) -> Result<Vec<EngagementEdge>, StoreError> {
        let mut state = self.state.lock().unwrap();
        state.ops.push(Op::FindEdges(kind));
        state.check("find_edges")?;
        Ok(state
            .edges(kind)
            .iter()
            .filter(|e| filter.matches(&EdgePair::new(e.tweet_id.clone(), e.user_id.clone())))
            .cloned()
            .collect())
    }

    async fn clear_edges(&self, kind: EdgeKind) -> Result<u64, StoreError> {
        let mut state = self.state.lock().unwrap();
        state.ops.push(Op::ClearEdges(kind));
        state.check("clear_edges")?;
        let edges = state.edges(kind);
        let removed = edges.len() as u64;
        edges.clear();
        Ok(removed)
    }

    async fn upsert_edges(&self, kind: EdgeKind, edges: &[EdgePair]) -> Result<u64, StoreError> {
        let mut state = self.state.lock().unwrap();
        state.ops.push(Op::UpsertEdges(kind, edges.len()));
        state.check("upsert_edges")?;

        let now = Utc::now();
        let stored = state.edges(kind);
        let mut written = 0;
        for pair in dedup_by_key(edges, |e| e.clone()) {
            match stored
                .iter_mut()
                .find(|e| e.tweet_id == pair.tweet_id && e.user_id == pair.user_id)
            {
                Some(existing) => existing.updated_at = now,
                None => stored.push(EngagementEdge {
                    tweet_id: pair.tweet_id,
                    user_id: pair.user_id,
                    created_at: now,
                    updated_at: now,
                }),
            }
            written += 1;
        }
        Ok(written)
    }
}
