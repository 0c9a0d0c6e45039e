//! # HTTP Server Module
//!
//! axum server exposing the upload pipeline.
//!
//! # Endpoints
//!
//! - `POST /api/upload` - Signed CSV upload
//! - `GET /health` - Health check
//!
//! Errors are returned as `{"err": "<message>"}` with 401 for authentication
//! failures, 400 for bad requests, 500 for store failures and 413 for bodies
//! over `max_body_bytes`.

pub mod config;
pub mod health_routes;
pub mod server;
pub mod upload_routes;

pub use config::HttpServerConfig;
pub use server::HttpServer;
