//! Process configuration, read once at startup.

use std::time::Duration;

use thiserror::Error;

use crate::constants::{DEFAULT_COOLDOWN_SECS, RESET_MARGIN_SECS};
use crate::services::fetcher::CooldownPolicy;

const DEFAULT_TWITTER_API_URL: &str = "https://api.twitter.com";
const DEFAULT_BRAND_NAME: &str = "Exothium";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{var} has an invalid value: {value:?}")]
    Invalid { var: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub twitter_account_id: String,
    pub twitter_bearer_token: String,
    pub twitter_api_url: String,
    pub discord_token: String,
    pub guild_id: Option<String>,
    pub admin_role_id: String,
    pub database_url: String,
    pub database_max_connections: u32,
    pub cooldown: CooldownPolicy,
    pub brand_name: String,
    pub port: u16,
}

impl Config {
    /// Load from the process environment, after merging a `.env` file if one exists.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |var: &'static str| {
            lookup(var)
                .filter(|v| !v.trim().is_empty())
                .ok_or(ConfigError::Missing(var))
        };
        let optional = |var: &'static str| lookup(var).filter(|v| !v.trim().is_empty());

        let cooldown_secs = match optional("RATE_LIMIT_COOLDOWN_SECS") {
            Some(raw) => parse_number("RATE_LIMIT_COOLDOWN_SECS", &raw)?,
            None => DEFAULT_COOLDOWN_SECS,
        };

        let cooldown = match optional("RATE_LIMIT_WAIT").as_deref() {
            None | Some("fixed") => CooldownPolicy::Fixed(Duration::from_secs(cooldown_secs)),
            Some("reset") => CooldownPolicy::UntilReset {
                margin: Duration::from_secs(RESET_MARGIN_SECS),
            },
            Some(other) => {
                return Err(ConfigError::Invalid {
                    var: "RATE_LIMIT_WAIT",
                    value: other.to_string(),
                });
            }
        };

        Ok(Self {
            twitter_account_id: required("TWITTER_ACCOUNT_ID")?,
            twitter_bearer_token: required("TWITTER_BEARER_TOKEN")?,
            twitter_api_url: optional("TWITTER_API_URL")
                .unwrap_or_else(|| DEFAULT_TWITTER_API_URL.to_string()),
            discord_token: required("DISCORD_TOKEN")?,
            guild_id: optional("GUILD_ID"),
            admin_role_id: required("ADMIN_ROLE_ID")?,
            database_url: required("DATABASE_URL")?,
            database_max_connections: match optional("DATABASE_MAX_CONNECTIONS") {
                Some(raw) => parse_number("DATABASE_MAX_CONNECTIONS", &raw)?,
                None => 5,
            },
            cooldown,
            brand_name: optional("BRAND_NAME").unwrap_or_else(|| DEFAULT_BRAND_NAME.to_string()),
            port: match optional("PORT") {
                Some(raw) => parse_number("PORT", &raw)?,
                None => 3000,
            },
        })
    }
}

fn parse_number<T: std::str::FromStr>(var: &'static str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::Invalid {
        var,
        value: raw.to_string(),
    })
}
