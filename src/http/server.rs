//! HTTP server implementation.
//

use anyhow::{Context, Result};
use axum::Router;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::config::{Config, ConfigTrait};
use crate::controller::controller::Controller;

const DEFAULT_NAME: &str = "revcache";
const DEFAULT_PORT: &str = "8020";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Server trait for HTTP server operations.
#[async_trait::async_trait]
pub trait Server: Send + Sync {
    /// Starts the server and blocks until it stops.
    async fn listen_and_serve(&self) -> Result<()>;

    /// True while the server is accepting connections.
    fn is_alive(&self) -> bool;
}

/// HTTP server implementation.
pub struct HttpServer {
    shutdown_token: CancellationToken,
    config: Config,
    router: Router,
    is_alive: AtomicBool,
}

impl HttpServer {
    /// Creates a new HTTP server.
    pub fn new(
        shutdown_token: CancellationToken,
        config: Config,
        controllers: Vec<Box<dyn Controller>>,
    ) -> Arc<Self> {
        Arc::new(Self {
            shutdown_token,
            config,
            router: Self::build_router(controllers),
            is_alive: AtomicBool::new(false),
        })
    }

    /// The fully layered router, for serving without a socket.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Starts the HTTP server (async version).
    pub async fn listen_and_serve(&self) -> Result<()> {
        let api_cfg = self.config.api().context("API configuration is required")?;

        let name = api_cfg.name.as_deref().unwrap_or(DEFAULT_NAME);
        let port = api_cfg.port.as_deref().unwrap_or(DEFAULT_PORT);

        // Ensure port starts with ':'
        let port = if port.starts_with(':') {
            port.to_string()
        } else {
            format!(":{}", port)
        };

        let addr: SocketAddr = format!("0.0.0.0{}", port)
            .parse()
            .context("Failed to parse server address")?;

        let listener = TcpListener::bind(&addr)
            .await
            .context("Failed to bind TCP listener")?;

        info!(
            component = "server",
            event = "started",
            name = name,
            port = port,
            "server started"
        );

        let shutdown_token = self.shutdown_token.clone();
        let serve_future =
            axum::serve(listener, self.router.clone()).with_graceful_shutdown(async move {
                shutdown_token.cancelled().await;
            });

        self.is_alive.store(true, Ordering::Relaxed);
        let result = serve_future.await;
        self.is_alive.store(false, Ordering::Relaxed);

        if let Err(e) = result {
            error!(
                component = "server",
                event = "listen_and_serve_failed",
                name = name,
                port = port,
                error = %e,
                "server failed to listen and serve"
            );
            return Err(e.into());
        }

        info!(
            component = "server",
            event = "stopped",
            name = name,
            port = port,
            "server stopped"
        );

        Ok(())
    }

    /// Builds the router with all controllers.
    fn build_router(controllers: Vec<Box<dyn Controller>>) -> Router {
        let mut router = Router::new();
        for controller in controllers {
            router = controller.add_route(router);
        }

        router
            .layer(TraceLayer::new_for_http())
            .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
    }
}

#[async_trait::async_trait]
impl Server for HttpServer {
    async fn listen_and_serve(&self) -> Result<()> {
        HttpServer::listen_and_serve(self).await
    }

    fn is_alive(&self) -> bool {
        self.is_alive.load(Ordering::Relaxed)
    }
}
