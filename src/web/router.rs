//! Router configuration.

use axum::{middleware, routing::get, Router};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::compression::CompressionLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use super::handlers::{get_config, get_feed_page, get_feeds_page, get_rss, list_feeds, AppState};
use super::middleware::{rate_limit, RateLimitState};

/// Create the application router.
///
/// The read routes are rate limited per client; `/config` and `/health`
/// are not.
pub fn create_router(app_state: Arc<AppState>, limiter: Arc<RateLimitState>) -> Router {
    let timeout = Duration::from_secs(app_state.config.server.response_timeout_secs.max(1));

    let read_routes = Router::new()
        .route("/rss/:name", get(get_rss))
        .route("/feed/:name", get(get_feed_page))
        .route("/feeds", get(get_feeds_page))
        .route("/list", get(list_feeds))
        .layer(middleware::from_fn(move |req, next| {
            rate_limit(Arc::clone(&limiter), req, next)
        }));

    Router::new()
        .merge(read_routes)
        .route("/config", get(get_config))
        .with_state(app_state)
        .merge(create_health_router())
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(TimeoutLayer::new(timeout))
                .layer(CompressionLayer::new()),
        )
}

/// Create a health check router.
pub fn create_health_router() -> Router {
    Router::new().route("/health", get(health_check))
}

async fn health_check() -> &'static str {
    "OK"
}
