//! # HTTP Server
//!
//! Combines the upload and health routers into one axum server.

use std::io;
use std::net::SocketAddr;

use axum::{extract::DefaultBodyLimit, Router};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use super::config::HttpServerConfig;
use super::health_routes::health_routes;
use super::upload_routes::upload_routes;
use crate::context::AppContext;

/// HTTP server for uploads
pub struct HttpServer {
    config: HttpServerConfig,
    router: Router,
}

impl HttpServer {
    /// Create a server for `ctx` with the given configuration
    pub fn new(config: HttpServerConfig, ctx: AppContext) -> Self {
        let router = Self::build_router(&config, ctx);
        Self { config, router }
    }

    /// Build the combined router with all endpoints
    pub fn build_router(config: &HttpServerConfig, ctx: AppContext) -> Router {
        Router::new()
            // Health check at root level
            .merge(health_routes())
            // Upload endpoint under /api
            .nest("/api", upload_routes(ctx))
            .layer(
                ServiceBuilder::new()
                    .layer(TraceLayer::new_for_http())
                    .layer(DefaultBodyLimit::disable())
                    .layer(RequestBodyLimitLayer::new(config.max_body_bytes)),
            )
    }

    /// Get the socket address
    pub fn socket_addr(&self) -> String {
        self.config.socket_addr()
    }

    /// Get the router (for testing)
    pub fn router(self) -> Router {
        self.router
    }

    /// Start the HTTP server and serve until the process is stopped
    pub async fn start(self) -> io::Result<()> {
        let addr: SocketAddr = self.config.socket_addr().parse().map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("Invalid socket address '{}': {}", self.config.socket_addr(), e),
            )
        })?;

        let listener = TcpListener::bind(addr).await?;
        tracing::info!(%addr, "ingestd listening");
        tracing::info!("upload endpoint: POST http://{}/api/upload", addr);

        axum::serve(listener, self.router).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::{UploaderRegistry, ValidatorRegistry};
    use crate::storage::MemoryDocumentStore;
    use std::sync::Arc;

    fn ctx() -> AppContext {
        AppContext::new(
            UploaderRegistry::new(),
            ValidatorRegistry::new(),
            Arc::new(MemoryDocumentStore::new()),
        )
    }

    #[test]
    fn test_server_with_custom_port() {
        let server = HttpServer::new(HttpServerConfig::with_port(8080), ctx());
        assert_eq!(server.socket_addr(), "0.0.0.0:8080");
    }

    #[test]
    fn test_router_builds() {
        let server = HttpServer::new(HttpServerConfig::default(), ctx());
        let _router = server.router();
    }
}
