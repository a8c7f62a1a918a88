//! Gateway websocket session: Hello, Identify, heartbeats, and the three
//! dispatch events the bot cares about.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use serde_json::json;
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::protocol::Message as WsMessage;

use super::error::DiscordError;
use super::rest::DiscordRest;
use super::types::{
    GatewayPayload, Hello, INTENTS, Identify, IdentifyProperties, Interaction, Message, Ready,
};
use crate::constants::GATEWAY_RECONNECT_SECS;

const OP_DISPATCH: i32 = 0;
const OP_HEARTBEAT: i32 = 1;
const OP_IDENTIFY: i32 = 2;
const OP_RECONNECT: i32 = 7;
const OP_INVALID_SESSION: i32 = 9;
const OP_HELLO: i32 = 10;
const OP_HEARTBEAT_ACK: i32 = 11;

#[derive(Debug, Clone)]
pub enum GatewayEvent {
    Ready(Ready),
    InteractionCreate(Interaction),
    MessageCreate(Message),
}

pub struct Gateway {
    rest: DiscordRest,
    token: String,
}

impl Gateway {
    pub fn new(rest: DiscordRest, token: &str) -> Self {
        Self {
            rest,
            token: token.strip_prefix("Bot ").unwrap_or(token).to_string(),
        }
    }

    /// Keep a session open until the event receiver goes away, opening a
    /// fresh one after every drop.
    pub async fn run(&self, events: mpsc::Sender<GatewayEvent>) {
        loop {
            match self.session(&events).await {
                Ok(()) => info!("[gateway] Session ended"),
                Err(e) => error!("[gateway] Session failed: {}", e),
            }
            if events.is_closed() {
                info!("[gateway] Event receiver dropped, not reconnecting");
                return;
            }
            info!("[gateway] Reconnecting in {}s", GATEWAY_RECONNECT_SECS);
            tokio::time::sleep(Duration::from_secs(GATEWAY_RECONNECT_SECS)).await;
        }
    }

    async fn session(&self, events: &mpsc::Sender<GatewayEvent>) -> Result<(), DiscordError> {
        let url = self.rest.gateway_url().await?;
        let (ws, _) = connect_async(format!("{url}/?v=10&encoding=json")).await?;
        let (mut write, mut read) = ws.split();

        let hello: Hello = match read.next().await {
            Some(Ok(WsMessage::Text(text))) => {
                let payload: GatewayPayload = serde_json::from_str(&text)?;
                if payload.op != OP_HELLO {
                    return Err(DiscordError::Gateway(format!(
                        "expected Hello, got opcode {}",
                        payload.op
                    )));
                }
                serde_json::from_value(payload.d.unwrap_or_default())?
            }
            Some(Ok(other)) => {
                return Err(DiscordError::Gateway(format!("unexpected first frame: {other:?}")));
            }
            Some(Err(e)) => return Err(e.into()),
            None => return Err(DiscordError::Gateway("closed before Hello".into())),
        };
        debug!("[gateway] Hello, heartbeat every {}ms", hello.heartbeat_interval);

        let identify = identify_payload(&self.token)?;
        write
            .send(WsMessage::Text(serde_json::to_string(&identify)?.into()))
            .await?;

        let mut sequence: Option<u64> = None;
        let mut acked = true;
        let mut heartbeat = tokio::time::interval(Duration::from_millis(hello.heartbeat_interval));
        // first tick fires immediately
        heartbeat.tick().await;

        loop {
            tokio::select! {
                _ = heartbeat.tick() => {
                    if !acked {
                        warn!("[gateway] Heartbeat not acknowledged, dropping session");
                        return Ok(());
                    }
                    write.send(WsMessage::Text(heartbeat_payload(sequence).into())).await?;
                    acked = false;
                }
                frame = read.next() => {
                    let text = match frame {
                        Some(Ok(WsMessage::Text(text))) => text,
                        Some(Ok(WsMessage::Close(frame))) => {
                            info!("[gateway] Closed by Discord: {:?}", frame);
                            return Ok(());
                        }
                        Some(Ok(_)) => continue,
                        Some(Err(e)) => return Err(e.into()),
                        None => return Ok(()),
                    };

                    let payload: GatewayPayload = match serde_json::from_str(&text) {
                        Ok(payload) => payload,
                        Err(e) => {
                            warn!("[gateway] Unparseable payload: {}", e);
                            continue;
                        }
                    };
                    if let Some(s) = payload.s {
                        sequence = Some(s);
                    }

                    match payload.op {
                        OP_DISPATCH => {
                            let name = payload.t.unwrap_or_default();
                            let data = payload.d.unwrap_or_default();
                            let event = match decode_dispatch(&name, data) {
                                Ok(Some(event)) => event,
                                Ok(None) => continue,
                                Err(e) => {
                                    warn!("[gateway] Bad {} payload: {}", name, e);
                                    continue;
                                }
                            };
                            if events.send(event).await.is_err() {
                                return Ok(());
                            }
                        }
                        OP_HEARTBEAT => {
                            write.send(WsMessage::Text(heartbeat_payload(sequence).into())).await?;
                        }
                        OP_HEARTBEAT_ACK => acked = true,
                        OP_RECONNECT => {
                            info!("[gateway] Discord asked for a reconnect");
                            return Ok(());
                        }
                        OP_INVALID_SESSION => {
                            warn!("[gateway] Session invalidated");
                            return Ok(());
                        }
                        op => debug!("[gateway] Ignoring opcode {}", op),
                    }
                }
            }
        }
    }
}

/// Events the bot handles; everything else is `Ok(None)`.
pub fn decode_dispatch(
    name: &str,
    data: serde_json::Value,
) -> Result<Option<GatewayEvent>, serde_json::Error> {
    let event = match name {
        "READY" => GatewayEvent::Ready(serde_json::from_value(data)?),
        "INTERACTION_CREATE" => GatewayEvent::InteractionCreate(serde_json::from_value(data)?),
        "MESSAGE_CREATE" => GatewayEvent::MessageCreate(serde_json::from_value(data)?),
        _ => return Ok(None),
    };
    Ok(Some(event))
}

fn identify_payload(token: &str) -> Result<GatewayPayload, serde_json::Error> {
    let identify = Identify {
        token: token.to_string(),
        intents: INTENTS,
        properties: IdentifyProperties {
            os: std::env::consts::OS.to_string(),
            browser: "engagement-bot".to_string(),
            device: "engagement-bot".to_string(),
        },
    };
    Ok(GatewayPayload {
        op: OP_IDENTIFY,
        d: Some(serde_json::to_value(&identify)?),
        s: None,
        t: None,
    })
}

fn heartbeat_payload(sequence: Option<u64>) -> String {
    json!({ "op": OP_HEARTBEAT, "d": sequence }).to_string()
}
