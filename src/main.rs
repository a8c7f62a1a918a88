use std::sync::Arc;

use anyhow::Context;
use log::{error, info};
use tokio::sync::mpsc;

use engagement_bot::bot::Bot;
use engagement_bot::config::Config;
use engagement_bot::constants::EVENT_CHANNEL_CAPACITY;
use engagement_bot::discord::{DISCORD_API_URL, DiscordRest, EventHandler, Gateway};
use engagement_bot::domain::{PgStore, Store};
use engagement_bot::logging;
use engagement_bot::routes::{self, AppState};
use engagement_bot::services::Syncer;
use engagement_bot::twitter::{TwitterApi, TwitterClient};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();
    let config = Config::from_env()?;

    let store: Arc<dyn Store> = Arc::new(
        PgStore::connect(&config.database_url, config.database_max_connections)
            .await
            .context("Failed to connect to database")?,
    );
    let twitter: Arc<dyn TwitterApi> = Arc::new(TwitterClient::new(
        &config.twitter_api_url,
        &config.twitter_bearer_token,
    )?);

    let syncer = Arc::new(Syncer::new(
        twitter.clone(),
        store.clone(),
        config.twitter_account_id.clone(),
        config.cooldown,
    ));
    let bot = Arc::new(Bot::new(
        syncer.clone(),
        twitter,
        store.clone(),
        config.admin_role_id.clone(),
        config.brand_name.clone(),
    ));

    let app = routes::routes().with_state(Arc::new(AppState { syncer, store }));
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {addr}"))?;
    info!("[health] Listening on http://{}", addr);
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!("[health] Server failed: {}", e);
        }
    });

    let rest = DiscordRest::new(DISCORD_API_URL, &config.discord_token)?;
    let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
    let handler = Arc::new(EventHandler::new(bot, rest.clone(), config.guild_id.clone()));
    tokio::spawn(handler.run(events_rx));

    info!("[gateway] Tracking Twitter account {}", config.twitter_account_id);
    Gateway::new(rest, &config.discord_token).run(events_tx).await;
    Ok(())
}
