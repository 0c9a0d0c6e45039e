//! ingestd - Signed bulk CSV ingestion
//!
//! Uploaders POST header-less CSV signed with a pre-shared key. Each row is
//! mapped onto the uploader's declared columns, checked against the field
//! validators, and the whole batch is written to the uploader's collection
//! in one all-or-nothing insert.

pub mod cli;
pub mod config;
pub mod context;
pub mod http_server;
pub mod ingest;
pub mod storage;
pub mod telemetry;
