//! Application constants

/// Largest page the Twitter v2 timeline and engagement endpoints accept
pub const MAX_PAGE_SIZE: u32 = 100;

/// Text prefix the provider uses for the account's own retweets
pub const RETWEET_PREFIX: &str = "RT";

/// Cooldown after a rate-limit hit (15 minute window + 1 minute slack)
pub const DEFAULT_COOLDOWN_SECS: u64 = 16 * 60;

/// Slack added on top of the provider's reset time in `reset` wait mode
pub const RESET_MARGIN_SECS: u64 = 60;

/// Rows per INSERT statement, keeps bind parameters well under Postgres' limit
pub const UPSERT_CHUNK_SIZE: usize = 1000;

/// Delay before re-opening a dropped gateway session
pub const GATEWAY_RECONNECT_SECS: u64 = 5;

/// Reply for a handle the provider does not know
pub const USER_NOT_FOUND_REPLY: &str = "User does not exist";

/// Gateway events buffered between the websocket task and the handler
pub const EVENT_CHANNEL_CAPACITY: usize = 256;
