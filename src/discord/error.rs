use thiserror::Error;

#[derive(Debug, Error)]
pub enum DiscordError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("Discord API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("rate limited, retry after {retry_after}s")]
    RateLimited { retry_after: f64 },

    #[error("gateway error: {0}")]
    Gateway(String),
}
