use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TwitterError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The provider rejected the call with HTTP 429.
    /// `reset` is the epoch second at which the window reopens.
    #[error("rate limited (limit {limit} requests, resets at {reset})")]
    RateLimited { reset: i64, limit: u32 },

    #[error("Twitter API error {status}: {message}")]
    Api { status: u16, message: String },
}

impl TwitterError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, TwitterError::RateLimited { .. })
    }
}

/// Seconds from `now` until the provider's reset epoch; negative once it has passed.
pub fn seconds_until_reset(reset: i64, now: DateTime<Utc>) -> i64 {
    reset - now.timestamp()
}
