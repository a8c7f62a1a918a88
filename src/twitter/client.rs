use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;

use super::{Page, PageRequest, TimelineTweet, TwitterApi, TwitterError, TwitterUser};

const REQUEST_TIMEOUT_SECS: u64 = 30;

/// App-only (bearer) client for the read endpoints the syncs use.
#[derive(Clone)]
pub struct TwitterClient {
    base_url: String,
    bearer_token: String,
    http: Client,
}

impl TwitterClient {
    pub fn new(base_url: &str, bearer_token: &str) -> Result<Self, TwitterError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .user_agent(format!("engagement-bot/{}", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            bearer_token: bearer_token.to_string(),
            http,
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, TwitterError> {
        let resp = self
            .http
            .get(format!("{}{}", self.base_url, path))
            .header("Authorization", format!("Bearer {}", self.bearer_token))
            .query(query)
            .send()
            .await?;

        let resp = check_status(resp).await?;
        let bytes = resp.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn get_page<T: DeserializeOwned>(
        &self,
        path: &str,
        request: &PageRequest,
        fields: &[(&str, &str)],
    ) -> Result<Page<T>, TwitterError> {
        let mut query: Vec<(&str, String)> = vec![("max_results", request.max_results.to_string())];
        query.extend(fields.iter().map(|(k, v)| (*k, v.to_string())));
        if let Some(token) = &request.pagination_token {
            query.push(("pagination_token", token.clone()));
        }

        let envelope: Envelope<Vec<T>> = self.get_json(path, &query).await?;
        Ok(Page {
            items: envelope.data.unwrap_or_default(),
            next_token: envelope.meta.and_then(|m| m.next_token),
        })
    }
}

/// Map 429 to `RateLimited` using the `x-rate-limit-*` headers, any other
/// non-2xx to `Api` with the response body as message.
async fn check_status(resp: Response) -> Result<Response, TwitterError> {
    let status = resp.status();

    if status == StatusCode::TOO_MANY_REQUESTS {
        let header = |name: &str| {
            resp.headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_owned)
        };
        // Without a reset header assume a full 15 minute window
        let reset = header("x-rate-limit-reset")
            .and_then(|v| v.parse().ok())
            .unwrap_or_else(|| Utc::now().timestamp() + 15 * 60);
        let limit = header("x-rate-limit-limit")
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);
        return Err(TwitterError::RateLimited { reset, limit });
    }

    if !status.is_success() {
        let text = resp.text().await?;
        return Err(TwitterError::Api {
            status: status.as_u16(),
            message: text,
        });
    }

    Ok(resp)
}

fn percent_encode(s: &str) -> String {
    percent_encoding::utf8_percent_encode(s, percent_encoding::NON_ALPHANUMERIC).to_string()
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: Option<T>,
    meta: Option<ResponseMeta>,
}

#[derive(Debug, Deserialize)]
struct ResponseMeta {
    next_token: Option<String>,
}

#[async_trait]
impl TwitterApi for TwitterClient {
    async fn fetch_timeline(
        &self,
        request: PageRequest,
    ) -> Result<Page<TimelineTweet>, TwitterError> {
        let path = format!("/2/users/{}/tweets", percent_encode(&request.target_id));
        self.get_page(&path, &request, &[("tweet.fields", "public_metrics")])
            .await
    }

    async fn fetch_likers(&self, request: PageRequest) -> Result<Page<TwitterUser>, TwitterError> {
        let path = format!("/2/tweets/{}/liking_users", percent_encode(&request.target_id));
        self.get_page(&path, &request, &[]).await
    }

    async fn fetch_retweeters(
        &self,
        request: PageRequest,
    ) -> Result<Page<TwitterUser>, TwitterError> {
        let path = format!("/2/tweets/{}/retweeted_by", percent_encode(&request.target_id));
        self.get_page(&path, &request, &[]).await
    }

    async fn fetch_user_by_handle(
        &self,
        handle: &str,
    ) -> Result<Option<TwitterUser>, TwitterError> {
        let path = format!("/2/users/by/username/{}", percent_encode(handle));

        // Unknown handles come back as 200 with an `errors` array and no `data`;
        // malformed ones as 400.
        match self.get_json::<Envelope<TwitterUser>>(&path, &[]).await {
            Ok(envelope) => Ok(envelope.data),
            Err(TwitterError::Api { status: 400 | 404, .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }
}
