//! Web Server
//!
//! Binds the router and serves until the shutdown token fires.

use super::metrics::Metrics;
use super::rest::RestRouter;
use super::views::Views;
use crate::catalog::CrdCatalog;
use crate::error::{Error, Result};
use std::net::{IpAddr, SocketAddr, ToSocketAddrs};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

// =============================================================================
// Server Configuration
// =============================================================================

/// Configuration for the web server
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address
    pub addr: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
        }
    }
}

impl ServerConfig {
    /// Build from a hostname (or IP) and port
    pub fn from_host_port(hostname: &str, port: u16) -> Result<Self> {
        if let Ok(ip) = hostname.parse::<IpAddr>() {
            return Ok(Self {
                addr: SocketAddr::new(ip, port),
            });
        }

        let invalid = |reason: String| {
            Error::Configuration(format!(
                "Invalid listen address {}:{}: {}",
                hostname, port, reason
            ))
        };
        let addr = (hostname, port)
            .to_socket_addrs()
            .map_err(|e| invalid(e.to_string()))?
            .next()
            .ok_or_else(|| invalid("hostname resolved to no addresses".to_string()))?;
        Ok(Self { addr })
    }
}

// =============================================================================
// Web Server
// =============================================================================

/// HTTP server for the CRD browser
pub struct WebServer {
    config: ServerConfig,
    catalog: CrdCatalog,
    shutdown: CancellationToken,
}

impl WebServer {
    /// The catalog stops fetching as soon as `shutdown` fires
    pub fn new(config: ServerConfig, catalog: CrdCatalog, shutdown: CancellationToken) -> Self {
        let catalog = catalog.with_cancellation(shutdown.clone());
        Self {
            config,
            catalog,
            shutdown,
        }
    }

    /// Run the server until shutdown
    pub async fn run(self) -> Result<()> {
        let views = Arc::new(Views::new()?);
        let metrics = Arc::new(Metrics::new()?);

        info!("Serving CRDs from {}", self.catalog.source_description());
        let app = RestRouter::new(self.catalog, views, metrics).build();

        let listener = tokio::net::TcpListener::bind(self.config.addr)
            .await
            .map_err(|e| Error::Internal(format!("Failed to bind {}: {}", self.config.addr, e)))?;

        info!("Starting webserver ({})", self.config.addr);

        let shutdown = self.shutdown.clone();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                shutdown.cancelled().await;
                info!("Webserver shutting down");
            })
            .await
            .map_err(|e| Error::Internal(format!("Webserver error: {}", e)))?;

        Ok(())
    }

    /// Trigger graceful shutdown
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }
}
