//! Configuration and listing handlers.

use axum::{extract::State, Json};
use std::sync::Arc;

use super::AppState;
use crate::config::Config;

/// GET /list - names of all configured feeds.
pub async fn list_feeds(State(state): State<Arc<AppState>>) -> Json<Vec<String>> {
    Json(state.config.feeds.keys().cloned().collect())
}

/// GET /config - the running configuration. Secrets are not serialized.
pub async fn get_config(State(state): State<Arc<AppState>>) -> Json<Config> {
    Json(state.config.as_ref().clone())
}
