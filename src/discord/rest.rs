use std::time::Duration;

use log::warn;
use reqwest::{Client, Method, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::error::DiscordError;
use super::types::{CommandDefinition, DEFERRED_CHANNEL_MESSAGE};

const REQUEST_TIMEOUT_SECS: u64 = 30;
const MAX_ATTEMPTS: u32 = 3;
const MAX_RETRY_AFTER_SECS: f64 = 60.0;

/// Bot-token REST client for command registration and replies.
#[derive(Clone)]
pub struct DiscordRest {
    base_url: String,
    bot_token: String,
    http: Client,
}

impl DiscordRest {
    pub fn new(base_url: &str, bot_token: &str) -> Result<Self, DiscordError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .user_agent(format!(
                "DiscordBot (engagement-bot, {})",
                env!("CARGO_PKG_VERSION")
            ))
            .build()?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            bot_token: bot_token
                .strip_prefix("Bot ")
                .unwrap_or(bot_token)
                .to_string(),
            http,
        })
    }

    /// Send one request, sitting out Discord's own 429s a couple of times.
    async fn send<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<Response, DiscordError> {
        let url = format!("{}{}", self.base_url, path);
        let mut attempt = 0;

        loop {
            attempt += 1;
            let mut req = self
                .http
                .request(method.clone(), &url)
                .header("Authorization", format!("Bot {}", self.bot_token));
            if let Some(body) = body {
                req = req.json(body);
            }
            let resp = req.send().await?;
            let status = resp.status();

            if status == StatusCode::TOO_MANY_REQUESTS {
                let retry_after = resp
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<f64>().ok())
                    .unwrap_or(1.0);
                if attempt < MAX_ATTEMPTS {
                    warn!(
                        "[discord] Rate limited on {} {}, retrying in {}s",
                        method, path, retry_after
                    );
                    tokio::time::sleep(retry_delay(retry_after)).await;
                    continue;
                }
                return Err(DiscordError::RateLimited { retry_after });
            }

            if !status.is_success() {
                let message = resp.text().await?;
                return Err(DiscordError::Api {
                    status: status.as_u16(),
                    message,
                });
            }

            return Ok(resp);
        }
    }

    /// Websocket URL for the bot gateway
    pub async fn gateway_url(&self) -> Result<String, DiscordError> {
        #[derive(Deserialize)]
        struct GatewayBot {
            url: String,
        }

        let resp = self.send::<()>(Method::GET, "/gateway/bot", None).await?;
        let gateway: GatewayBot = serde_json::from_slice(&resp.bytes().await?)?;
        Ok(gateway.url)
    }

    /// Replace the application's commands on one guild, or globally without one.
    pub async fn register_commands(
        &self,
        application_id: &str,
        guild_id: Option<&str>,
        commands: &[CommandDefinition],
    ) -> Result<(), DiscordError> {
        let path = match guild_id {
            Some(guild_id) => format!("/applications/{application_id}/guilds/{guild_id}/commands"),
            None => format!("/applications/{application_id}/commands"),
        };
        self.send(Method::PUT, &path, Some(commands)).await?;
        Ok(())
    }

    /// Acknowledge an interaction; the answer follows via `edit_original_response`.
    pub async fn defer_interaction(
        &self,
        interaction_id: &str,
        token: &str,
    ) -> Result<(), DiscordError> {
        let path = format!("/interactions/{interaction_id}/{token}/callback");
        let body = json!({ "type": DEFERRED_CHANNEL_MESSAGE });
        self.send(Method::POST, &path, Some(&body)).await?;
        Ok(())
    }

    pub async fn edit_original_response(
        &self,
        application_id: &str,
        token: &str,
        content: &str,
    ) -> Result<(), DiscordError> {
        let path = format!("/webhooks/{application_id}/{token}/messages/@original");
        let body = json!({ "content": content });
        self.send(Method::PATCH, &path, Some(&body)).await?;
        Ok(())
    }

    /// Post to a channel, optionally as a reply to `reply_to`.
    pub async fn create_message(
        &self,
        channel_id: &str,
        content: &str,
        reply_to: Option<&str>,
    ) -> Result<(), DiscordError> {
        let mut body = json!({ "content": content });
        if let Some(message_id) = reply_to {
            body["message_reference"] = json!({ "message_id": message_id });
        }
        self.send(Method::POST, &format!("/channels/{channel_id}/messages"), Some(&body))
            .await?;
        Ok(())
    }
}

/// Sleep for a `retry-after` value, clamped to `0..=60s`. Values that are not a
/// number fall back to one second.
fn retry_delay(retry_after: f64) -> Duration {
    Duration::try_from_secs_f64(retry_after.clamp(0.0, MAX_RETRY_AFTER_SECS))
        .unwrap_or(Duration::from_secs(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discord::types::{CommandOption, STRING_OPTION};
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> DiscordRest {
        DiscordRest::new(&server.uri(), "Bot secret").expect("client")
    }

    fn likes_command() -> CommandDefinition {
        CommandDefinition {
            name: "likes".into(),
            description: "count likes".into(),
            options: vec![CommandOption {
                name: "username".into(),
                description: "handle".into(),
                kind: STRING_OPTION,
                required: true,
            }],
        }
    }

    #[tokio::test]
    async fn commands_go_to_the_guild_when_configured() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/applications/app/guilds/g1/commands"))
            .and(header("authorization", "Bot secret"))
            .and(body_json(json!([{
                "name": "likes",
                "description": "count likes",
                "options": [{"name": "username", "description": "handle", "type": 3, "required": true}]
            }])))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(1)
            .mount(&server)
            .await;

        client(&server)
            .register_commands("app", Some("g1"), &[likes_command()])
            .await
            .expect("registered");
    }

    #[tokio::test]
    async fn commands_are_global_without_a_guild() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/applications/app/commands"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(1)
            .mount(&server)
            .await;

        client(&server)
            .register_commands("app", None, &[likes_command()])
            .await
            .expect("registered");
    }

    #[tokio::test]
    async fn deferred_interaction_then_edit() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/interactions/i1/tok/callback"))
            .and(body_json(json!({"type": 5})))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PATCH"))
            .and(path("/webhooks/app/tok/messages/@original"))
            .and(body_json(json!({"content": "User does not exist"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "m"})))
            .expect(1)
            .mount(&server)
            .await;

        let rest = client(&server);
        rest.defer_interaction("i1", "tok").await.expect("deferred");
        rest.edit_original_response("app", "tok", "User does not exist")
            .await
            .expect("edited");
    }

    #[tokio::test]
    async fn reply_carries_message_reference() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/channels/c1/messages"))
            .and(body_json(json!({
                "content": "Tweets added into the Database",
                "message_reference": {"message_id": "m1"}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "m2"})))
            .expect(1)
            .mount(&server)
            .await;

        client(&server)
            .create_message("c1", "Tweets added into the Database", Some("m1"))
            .await
            .expect("sent");
    }

    #[tokio::test]
    async fn rate_limit_is_retried_after_retry_after() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/channels/c1/messages"))
            .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "0"))
            .up_to_n_times(1)
            .with_priority(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/channels/c1/messages"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "m"})))
            .expect(1)
            .mount(&server)
            .await;

        client(&server)
            .create_message("c1", "Adding...", None)
            .await
            .expect("sent after retry");
    }

    #[test]
    fn retry_after_is_clamped() {
        assert_eq!(retry_delay(1.5), Duration::from_millis(1500));
        assert_eq!(retry_delay(-3.0), Duration::ZERO);
        assert_eq!(retry_delay(f64::INFINITY), Duration::from_secs(60));
        assert_eq!(retry_delay(f64::NAN), Duration::from_secs(1));
        assert_eq!("inf".parse::<f64>().map(retry_delay), Ok(Duration::from_secs(60)));
    }

    #[tokio::test]
    async fn api_errors_keep_status_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/gateway/bot"))
            .respond_with(ResponseTemplate::new(401).set_body_string("401: Unauthorized"))
            .mount(&server)
            .await;

        let err = client(&server).gateway_url().await.unwrap_err();
        assert!(matches!(err, DiscordError::Api { status: 401, ref message } if message.contains("Unauthorized")));
    }

    #[tokio::test]
    async fn gateway_url_is_read_from_the_bot_endpoint() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/gateway/bot"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"url": "wss://gateway.discord.gg", "shards": 1})),
            )
            .mount(&server)
            .await;

        assert_eq!(
            client(&server).gateway_url().await.expect("url"),
            "wss://gateway.discord.gg"
        );
    }
}
