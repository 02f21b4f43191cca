//! HTTP server.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use super::handlers::AppState;
use super::middleware::RateLimitState;
use super::router::create_router;
use crate::config::ServerConfig;
use crate::{FeedhubError, Result};

/// Read-path HTTP server.
pub struct WebServer {
    addr: SocketAddr,
    app_state: Arc<AppState>,
    limiter: Arc<RateLimitState>,
}

impl WebServer {
    pub fn new(config: &ServerConfig, app_state: Arc<AppState>) -> Result<Self> {
        let addr = format!("{}:{}", config.host, config.port)
            .parse()
            .map_err(|e| {
                FeedhubError::Config(format!(
                    "invalid listen address {}:{}: {e}",
                    config.host, config.port
                ))
            })?;

        Ok(Self {
            addr,
            app_state,
            limiter: Arc::new(RateLimitState::new(config.rate_limit_per_sec)),
        })
    }

    /// Get the server address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Bind the listener. Returns the server ready to serve and the actual
    /// bound address, which differs from `addr()` when port 0 was requested.
    pub async fn bind(self) -> Result<(BoundServer, SocketAddr)> {
        let listener = TcpListener::bind(self.addr).await?;
        let local_addr = listener.local_addr()?;
        Ok((
            BoundServer {
                listener,
                app_state: self.app_state,
                limiter: self.limiter,
            },
            local_addr,
        ))
    }

    /// Bind and serve until `cancel` fires.
    pub async fn run(self, cancel: CancellationToken) -> Result<()> {
        let (server, _) = self.bind().await?;
        server.serve(cancel).await
    }
}

/// A server with a bound listener.
pub struct BoundServer {
    listener: TcpListener,
    app_state: Arc<AppState>,
    limiter: Arc<RateLimitState>,
}

impl BoundServer {
    /// Serve requests; in-flight requests finish after `cancel` fires.
    pub async fn serve(self, cancel: CancellationToken) -> Result<()> {
        let local_addr = self.listener.local_addr()?;
        Arc::clone(&self.limiter).start_cleanup_task(cancel.clone());

        let router = create_router(self.app_state, self.limiter);

        tracing::info!("http server listening on http://{}", local_addr);
        axum::serve(
            self.listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await?;

        tracing::info!("http server stopped");
        Ok(())
    }
}
