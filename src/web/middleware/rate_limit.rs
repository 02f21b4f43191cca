//! Per-client rate limiting for the read routes.

use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use std::{net::SocketAddr, num::NonZeroU32, sync::Arc, time::Duration};
use tokio_util::sync::CancellationToken;

/// Requests per second allowed for each client IP.
pub struct RateLimitState {
    limiter: Option<DefaultKeyedRateLimiter<String>>,
}

impl RateLimitState {
    /// Create a limiter; zero disables limiting.
    pub fn new(per_second: u32) -> Self {
        let limiter = NonZeroU32::new(per_second).map(|n| RateLimiter::keyed(Quota::per_second(n)));
        Self { limiter }
    }

    /// Whether `ip` may make another request now.
    pub fn check(&self, ip: &str) -> bool {
        match &self.limiter {
            Some(limiter) => limiter.check_key(&ip.to_string()).is_ok(),
            None => true,
        }
    }

    /// Drop state of clients whose quota has fully replenished.
    pub fn cleanup(&self) {
        if let Some(limiter) = &self.limiter {
            limiter.retain_recent();
            limiter.shrink_to_fit();
        }
    }

    /// Run `cleanup` every five minutes until `cancel` fires.
    pub fn start_cleanup_task(self: Arc<Self>, cancel: CancellationToken) {
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(Duration::from_secs(300)) => self.cleanup(),
                    _ = cancel.cancelled() => break,
                }
            }
        });
    }
}

/// Extract client IP from request.
fn client_ip(req: &Request<Body>) -> String {
    // First hop of X-Forwarded-For when behind a reverse proxy.
    if let Some(ip) = req
        .headers()
        .get("X-Forwarded-For")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
    {
        return ip.trim().to_string();
    }

    if let Some(real_ip) = req
        .headers()
        .get("X-Real-IP")
        .and_then(|v| v.to_str().ok())
    {
        return real_ip.trim().to_string();
    }

    if let Some(ConnectInfo(addr)) = req.extensions().get::<ConnectInfo<SocketAddr>>() {
        return addr.ip().to_string();
    }

    "unknown".to_string()
}

/// Reject requests over the per-IP quota with 429.
pub async fn rate_limit(state: Arc<RateLimitState>, req: Request<Body>, next: Next) -> Response {
    let ip = client_ip(&req);

    if !state.check(&ip) {
        tracing::warn!(ip = %ip, path = %req.uri().path(), "rate limit exceeded");
        return (
            StatusCode::TOO_MANY_REQUESTS,
            "Too many requests. Please try again later.",
        )
            .into_response();
    }

    next.run(req).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limit_per_ip() {
        let state = RateLimitState::new(3);

        assert!(state.check("127.0.0.1"));
        assert!(state.check("127.0.0.1"));
        assert!(state.check("127.0.0.1"));
        assert!(!state.check("127.0.0.1"));

        // Other clients have their own quota.
        assert!(state.check("192.168.1.1"));
    }

    #[test]
    fn test_zero_disables() {
        let state = RateLimitState::new(0);
        for _ in 0..100 {
            assert!(state.check("127.0.0.1"));
        }
        state.cleanup();
    }

    #[test]
    fn test_client_ip() {
        let req = Request::builder()
            .header("X-Forwarded-For", "10.0.0.1, 10.0.0.2")
            .body(Body::empty())
            .unwrap();
        assert_eq!(client_ip(&req), "10.0.0.1");

        let req = Request::builder()
            .header("X-Real-IP", "10.0.0.3")
            .body(Body::empty())
            .unwrap();
        assert_eq!(client_ip(&req), "10.0.0.3");

        let mut req = Request::builder().body(Body::empty()).unwrap();
        req.extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([10, 0, 0, 4], 5000))));
        assert_eq!(client_ip(&req), "10.0.0.4");

        let req = Request::builder().body(Body::empty()).unwrap();
        assert_eq!(client_ip(&req), "unknown");
    }
}
