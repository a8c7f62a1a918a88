//! Turns gateway events into bot calls and REST replies.
//!
//! Every command runs on its own task so a long engagement sync never holds
//! up the event loop.

use std::sync::Arc;

use log::{error, info};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::gateway::GatewayEvent;
use super::rest::DiscordRest;
use super::types::{
    APPLICATION_COMMAND, CommandDefinition, CommandOption, Interaction, Message, Ready,
    STRING_OPTION,
};
use crate::bot::{ADDING_REPLY, Bot, CountCommand, USERNAME_OPTION};
use crate::services::SyncKind;

const COMMAND_FAILED_REPLY: &str = "Something went wrong, try again later";

pub struct EventHandler {
    bot: Arc<Bot>,
    rest: DiscordRest,
    guild_id: Option<String>,
}

impl EventHandler {
    pub fn new(bot: Arc<Bot>, rest: DiscordRest, guild_id: Option<String>) -> Self {
        Self {
            bot,
            rest,
            guild_id,
        }
    }

    /// Drain the gateway channel until the sender side closes.
    pub async fn run(self: Arc<Self>, mut events: mpsc::Receiver<GatewayEvent>) {
        while let Some(event) = events.recv().await {
            self.clone().handle(event);
        }
    }

    /// Start handling one event; `None` when the event needs no work.
    pub fn handle(self: Arc<Self>, event: GatewayEvent) -> Option<JoinHandle<()>> {
        match event {
            GatewayEvent::Ready(ready) => Some(tokio::spawn(async move {
                self.on_ready(ready).await;
            })),
            GatewayEvent::InteractionCreate(interaction) => {
                if interaction.kind != APPLICATION_COMMAND {
                    return None;
                }
                let command = CountCommand::from_name(&interaction.data.as_ref()?.name)?;
                Some(tokio::spawn(async move {
                    self.on_count_command(command, interaction).await;
                }))
            }
            GatewayEvent::MessageCreate(message) => {
                if message.author.bot {
                    return None;
                }
                let roles = message
                    .member
                    .as_ref()
                    .map(|m| m.roles.as_slice())
                    .unwrap_or_default();
                let kind = self.bot.operator_trigger(&message.content, roles)?;
                Some(tokio::spawn(async move {
                    self.on_trigger(kind, message).await;
                }))
            }
        }
    }

    async fn on_ready(&self, ready: Ready) {
        info!(
            "[gateway] Ready as {} (session {})",
            ready.user.username, ready.session_id
        );
        let commands = command_definitions(self.bot.brand_name());
        match self
            .rest
            .register_commands(&ready.application.id, self.guild_id.as_deref(), &commands)
            .await
        {
            Ok(()) => info!(
                "[bot] Registered {} commands {}",
                commands.len(),
                match &self.guild_id {
                    Some(guild) => format!("on guild {guild}"),
                    None => "globally".to_string(),
                }
            ),
            Err(e) => error!("[bot] Command registration failed: {}", e),
        }
    }

    async fn on_count_command(&self, command: CountCommand, interaction: Interaction) {
        if let Err(e) = self
            .rest
            .defer_interaction(&interaction.id, &interaction.token)
            .await
        {
            error!("[bot] Could not acknowledge /{}: {}", command.name(), e);
            return;
        }

        let username = interaction.string_option(USERNAME_OPTION).unwrap_or_default();
        let reply = match self.bot.count_reply(command, username).await {
            Ok(reply) => reply,
            Err(e) => {
                error!("[bot] /{} for {:?} failed: {}", command.name(), username, e);
                COMMAND_FAILED_REPLY.to_string()
            }
        };

        if let Err(e) = self
            .rest
            .edit_original_response(&interaction.application_id, &interaction.token, &reply)
            .await
        {
            error!("[bot] Could not answer /{}: {}", command.name(), e);
        }
    }

    async fn on_trigger(&self, kind: SyncKind, message: Message) {
        info!("[bot] {} sync requested by {}", kind.as_str(), message.author.username);
        if let Err(e) = self
            .rest
            .create_message(&message.channel_id, ADDING_REPLY, None)
            .await
        {
            error!("[bot] Could not post progress message: {}", e);
        }

        let reply = self.bot.run_sync(kind).await;

        if let Err(e) = self
            .rest
            .create_message(&message.channel_id, &reply, Some(&message.id))
            .await
        {
            error!("[bot] Could not post {} sync result: {}", kind.as_str(), e);
        }
    }
}

/// The `/likes` and `/retweets` definitions, each with one required handle option.
pub fn command_definitions(brand: &str) -> Vec<CommandDefinition> {
    CountCommand::ALL
        .iter()
        .map(|command| CommandDefinition {
            name: command.name().to_string(),
            description: command.description(brand),
            options: vec![CommandOption {
                name: USERNAME_OPTION.to_string(),
                description: "User's @ on Twitter".to_string(),
                kind: STRING_OPTION,
                required: true,
            }],
        })
        .collect()
}
