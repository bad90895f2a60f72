//! HTTP route handlers for the twivility service.
//!
//! This module contains the route handlers that expose the cached timeline as
//! JSON, plus the router that wires them together.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use log::{error, info};
use serde_json::{json, Value};

use crate::cache::TweetCache;
use crate::store::{self, Record};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub cache: Arc<TweetCache>,
}

/// Builds the application router without middleware layers.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/accts", get(handle_accounts))
        .route("/tweets/:acct", get(handle_tweets))
        .route("/dump", get(handle_dump))
        .route("/health", get(handle_health))
        .with_state(state)
}

/// Handles GET requests to the `/health` endpoint.
///
/// # Example Response
///
/// ```json
/// {
///   "status": "healthy",
///   "service": "twivility"
/// }
/// ```
pub async fn handle_health() -> Json<Value> {
    Json(json!({"status": "healthy", "service": "twivility"}))
}

/// Handles GET requests to `/accts`: every account handle with cached tweets.
pub async fn handle_accounts(State(state): State<AppState>) -> Json<Vec<String>> {
    let accounts = state.cache.accounts().await;
    info!("GET /accts - returning list of len {}", accounts.len());
    Json(accounts)
}

/// Handles GET requests to `/tweets/:acct`: the account's tweets, newest first.
///
/// Unknown accounts get an empty list rather than a 404.
pub async fn handle_tweets(
    State(state): State<AppState>,
    Path(acct): Path<String>,
) -> Json<Vec<Record>> {
    let tweets = state.cache.tweets_for(&acct).await;
    info!(
        "GET /tweets/{} - returning list of len {}",
        acct,
        tweets.len()
    );
    Json(tweets)
}

/// Handles GET requests to `/dump`: the whole cache as a `{"TweetList": [...]}` document.
pub async fn handle_dump(State(state): State<AppState>) -> Response {
    let records = state.cache.records().await;
    match store::to_json(&records) {
        Ok(body) => ([(header::CONTENT_TYPE, "application/json")], body).into_response(),
        Err(e) => {
            error!("Failed to serialize tweet dump: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"status": "error", "message": "Failed to serialize tweets", "error": e.to_string()})),
            )
                .into_response()
        }
    }
}
