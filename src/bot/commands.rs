//! Parsing of chat input into bot commands.

use crate::domain::EdgeKind;
use crate::services::SyncKind;

/// Slash commands that report a user's engagement count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountCommand {
    Likes,
    Retweets,
}

impl CountCommand {
    pub const ALL: [CountCommand; 2] = [CountCommand::Likes, CountCommand::Retweets];

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "likes" => Some(CountCommand::Likes),
            "retweets" => Some(CountCommand::Retweets),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            CountCommand::Likes => "likes",
            CountCommand::Retweets => "retweets",
        }
    }

    pub fn description(&self, brand: &str) -> String {
        match self {
            CountCommand::Likes => {
                format!("Checks how many tweets a user liked on {brand}'s Twitter page")
            }
            CountCommand::Retweets => {
                format!("Checks how many times a user retweeted on {brand}'s Twitter page")
            }
        }
    }

    pub fn edge_kind(&self) -> EdgeKind {
        match self {
            CountCommand::Likes => EdgeKind::Liked,
            CountCommand::Retweets => EdgeKind::Retweeted,
        }
    }

    pub fn reply(&self, handle: &str, count: i64, brand: &str) -> String {
        match self {
            CountCommand::Likes => format!("User @{handle} liked {count} tweets on {brand}"),
            CountCommand::Retweets => format!("User @{handle} retweeted {count} times on {brand}"),
        }
    }
}

/// Name of the single string option both count commands take.
pub const USERNAME_OPTION: &str = "username";

/// Strip surrounding whitespace and one leading `@` from a typed handle.
pub fn normalize_handle(raw: &str) -> &str {
    let trimmed = raw.trim();
    trimmed.strip_prefix('@').unwrap_or(trimmed).trim()
}

/// Map an operator text trigger to the sync it starts. Matching is exact
/// apart from surrounding whitespace.
pub fn parse_trigger(content: &str) -> Option<SyncKind> {
    match content.trim() {
        "!getTweets" => Some(SyncKind::Tweets),
        "!getLikes" => Some(SyncKind::Likes),
        "!getRetweets" => Some(SyncKind::Retweets),
        _ => None,
    }
}
