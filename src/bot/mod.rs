//! Command layer between the chat transport and the syncs / store.
//!
//! Nothing here talks to Discord directly: callers hand in the command and
//! its arguments and get back the text to reply with.

mod commands;

pub use commands::{CountCommand, USERNAME_OPTION, normalize_handle, parse_trigger};

use std::sync::Arc;

use log::{error, info};
use thiserror::Error;

use crate::constants::USER_NOT_FOUND_REPLY;
use crate::domain::{EdgeFilter, EdgeKind, Store, StoreError};
use crate::services::{EngagementSyncReport, SyncError, SyncKind, SyncReport, Syncer, TweetSyncReport};
use crate::twitter::{TwitterApi, TwitterError};

pub const ADDING_REPLY: &str = "Adding...";

#[derive(Debug, Error)]
pub enum BotError {
    #[error("user lookup failed: {0}")]
    Provider(#[from] TwitterError),

    #[error("count failed: {0}")]
    Persistence(#[from] StoreError),
}

pub struct Bot {
    syncer: Arc<Syncer>,
    api: Arc<dyn TwitterApi>,
    store: Arc<dyn Store>,
    admin_role_id: String,
    brand_name: String,
}

impl Bot {
    pub fn new(
        syncer: Arc<Syncer>,
        api: Arc<dyn TwitterApi>,
        store: Arc<dyn Store>,
        admin_role_id: impl Into<String>,
        brand_name: impl Into<String>,
    ) -> Self {
        Self {
            syncer,
            api,
            store,
            admin_role_id: admin_role_id.into(),
            brand_name: brand_name.into(),
        }
    }

    pub fn brand_name(&self) -> &str {
        &self.brand_name
    }

    /// Reply for `/likes` or `/retweets`. The store is only touched once the
    /// handle resolves to an account.
    pub async fn count_reply(&self, command: CountCommand, username: &str) -> Result<String, BotError> {
        let handle = normalize_handle(username);
        if handle.is_empty() {
            return Ok(USER_NOT_FOUND_REPLY.to_string());
        }

        let Some(user) = self.api.fetch_user_by_handle(handle).await? else {
            info!("[bot] /{} for unknown handle @{}", command.name(), handle);
            return Ok(USER_NOT_FOUND_REPLY.to_string());
        };

        let count = self
            .store
            .count_edges(command.edge_kind(), EdgeFilter::User(&user.id))
            .await?;

        Ok(command.reply(handle, count, &self.brand_name))
    }

    /// The sync an operator message asks for, if its author may start one.
    pub fn operator_trigger(&self, content: &str, roles: &[String]) -> Option<SyncKind> {
        let kind = parse_trigger(content)?;
        if !roles.iter().any(|role| *role == self.admin_role_id) {
            info!("[bot] Ignoring {} trigger from a member without the admin role", kind.as_str());
            return None;
        }
        Some(kind)
    }

    /// Run one sync to completion and describe the outcome.
    pub async fn run_sync(&self, kind: SyncKind) -> String {
        match self.syncer.run(kind).await {
            Ok(report) => sync_reply(&report),
            Err(SyncError::AlreadyRunning(kind)) => {
                format!("A {} sync is already running, try again once it is done", kind.as_str())
            }
            Err(e) => {
                error!("[bot] {} sync failed: {}", kind.as_str(), e);
                format!("Adding {} failed, check the logs", kind.as_str())
            }
        }
    }
}

fn sync_reply(report: &SyncReport) -> String {
    match report {
        SyncReport::Tweets(TweetSyncReport::Stored { .. }) => {
            "Tweets added into the Database".to_string()
        }
        SyncReport::Tweets(TweetSyncReport::Empty) => "No tweets found to add".to_string(),
        SyncReport::Tweets(TweetSyncReport::RateLimited { .. }) => {
            "Twitter rate limited the tweet fetch, nothing was added. Try again in 15 minutes"
                .to_string()
        }
        SyncReport::Engagement(kind, EngagementSyncReport::NoCandidates) => format!(
            "No liked tweets stored yet, nothing to check for {}. Run !getTweets first",
            kind.as_str()
        ),
        SyncReport::Engagement(EdgeKind::Liked, EngagementSyncReport::Replaced { .. }) => {
            "Likes added into the Database".to_string()
        }
        SyncReport::Engagement(EdgeKind::Retweeted, EngagementSyncReport::Replaced { .. }) => {
            "Retweets added into the Database".to_string()
        }
    }
}
