//! Discord transport: REST client, gateway session and the event handler
//! wiring both to the bot.

mod error;
mod gateway;
mod handler;
mod rest;
pub mod types;

pub use error::DiscordError;
pub use gateway::{Gateway, GatewayEvent, decode_dispatch};
pub use handler::{EventHandler, command_definitions};
pub use rest::DiscordRest;

/// REST base for API v10
pub const DISCORD_API_URL: &str = "https://discord.com/api/v10";
