//! Health endpoints (/health, /status)

use axum::{Json, Router, extract::State, http::StatusCode, routing::get};
use serde::Serialize;
use std::sync::Arc;

use crate::domain::{EdgeFilter, EdgeKind, Store};
use crate::services::error::LogErr;
use crate::services::{SyncKind, Syncer};

pub struct AppState {
    pub syncer: Arc<Syncer>,
    pub store: Arc<dyn Store>,
}

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(health))
        .route("/status", get(status))
}

async fn health() -> &'static str {
    "ok"
}

#[derive(Debug, Serialize)]
struct SyncStatus {
    kind: SyncKind,
    running: bool,
}

#[derive(Debug, Serialize)]
struct StatusResponse {
    syncs: Vec<SyncStatus>,
    tweets: i64,
    liked_edges: i64,
    retweet_edges: i64,
}

/// GET /status - which syncs are running, plus collection sizes
async fn status(State(state): State<Arc<AppState>>) -> Result<Json<StatusResponse>, StatusCode> {
    let syncs = SyncKind::ALL
        .into_iter()
        .map(|kind| SyncStatus {
            kind,
            running: state.syncer.guard().is_running(kind),
        })
        .collect();

    let tweets = state
        .store
        .count_tweets()
        .await
        .log_status("[status] Count tweets", StatusCode::SERVICE_UNAVAILABLE)?;
    let liked_edges = state
        .store
        .count_edges(EdgeKind::Liked, EdgeFilter::All)
        .await
        .log_status("[status] Count likes", StatusCode::SERVICE_UNAVAILABLE)?;
    let retweet_edges = state
        .store
        .count_edges(EdgeKind::Retweeted, EdgeFilter::All)
        .await
        .log_status("[status] Count retweets", StatusCode::SERVICE_UNAVAILABLE)?;

    Ok(Json(StatusResponse {
        syncs,
        tweets,
        liked_edges,
        retweet_edges,
    }))
}
