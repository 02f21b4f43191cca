//! Feed handlers: RSS documents and HTML pages, served through the cache.

use axum::{
    extract::{Path, State},
    http::header,
    response::{Html, IntoResponse, Response},
};
use chrono::Utc;
use std::sync::Arc;

use super::AppState;
use crate::config::{Config, FeedConfig};
use crate::render::{render_feed_page, render_feeds_page, render_rss, FeedSummary};
use crate::store::ItemRepository;
use crate::web::error::ApiError;
use crate::{FeedhubError, Result};

fn feed_config<'a>(config: &'a Config, name: &str) -> Result<&'a FeedConfig> {
    config
        .feeds
        .get(name)
        .ok_or_else(|| FeedhubError::NotFound(format!("feed {name}")))
}

/// GET|HEAD /rss/:name - RSS document of a feed, junk excluded.
pub async fn get_rss(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> std::result::Result<Response, ApiError> {
    let config = Arc::clone(&state.config);
    let db = state.db.clone();
    let key = format!("feed::{name}");

    let data = state
        .cache
        .get(&key, move || async move {
            let feed = feed_config(&config, &name)?;
            let items = ItemRepository::new(db.pool())
                .load(&name, config.system.max_total, true)
                .await?;
            render_rss(&name, feed, &config.server.base_url, &items, Utc::now())
        })
        .await
        .map_err(|e| {
            tracing::warn!(key = %key, "failed to get feed, {}", e);
            ApiError::from(e)
        })?;

    Ok((
        [(header::CONTENT_TYPE, "application/xml; charset=UTF-8")],
        data,
    )
        .into_response())
}

/// GET /feed/:name - HTML page of a feed, junk included.
pub async fn get_feed_page(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> std::result::Result<Response, ApiError> {
    let config = Arc::clone(&state.config);
    let db = state.db.clone();
    let templates = Arc::clone(&state.templates);
    let key = name.clone();

    let data = state
        .cache
        .get(&key, move || async move {
            let feed = feed_config(&config, &name)?;
            let items = ItemRepository::new(db.pool())
                .load(&name, config.system.max_total, false)
                .await?;
            render_feed_page(
                &templates,
                &name,
                feed,
                &config.server.base_url,
                &items,
                Utc::now(),
            )
        })
        .await
        .map_err(|e| ApiError::from(e).with_page(&state.templates))?;

    Ok(html(data))
}

/// GET /feeds - index of every feed with stored items.
pub async fn get_feeds_page(
    State(state): State<Arc<AppState>>,
) -> std::result::Result<Response, ApiError> {
    let config = Arc::clone(&state.config);
    let db = state.db.clone();
    let templates = Arc::clone(&state.templates);

    let data = state
        .cache
        .get("feeds", move || async move {
            let repo = ItemRepository::new(db.pool());
            let mut summaries = Vec::new();
            for (name, feed) in &config.feeds {
                let newest = match repo.load(name, 1, true).await {
                    Ok(items) => items.into_iter().next(),
                    Err(e) => {
                        tracing::debug!(feed = %name, "skip feed on index page, {}", e);
                        None
                    }
                };
                if let Some(newest) = newest {
                    summaries.push(FeedSummary {
                        name: name.clone(),
                        title: feed.title.clone(),
                        description: feed.description.clone(),
                        last_updated: newest.published_at,
                        sources: feed.sources.len(),
                    });
                }
            }
            render_feeds_page(&templates, &config.server.base_url, &summaries)
        })
        .await
        .map_err(|e| ApiError::from(e).with_page(&state.templates))?;

    Ok(html(data))
}

fn html(data: bytes::Bytes) -> Response {
    Html(data).into_response()
}
