//! CLI command implementations
//!
//! `start` serves uploads until stopped. `check`, `sign` and `query` print one
//! JSON object to stdout and exit.

use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use serde_json::{json, Value};

use crate::config::AppConfig;
use crate::http_server::HttpServer;
use crate::ingest::compute_signature;
use crate::storage::{DocumentStore, FileDocumentStore};
use crate::telemetry::init_tracing;

use super::args::{Cli, Command};
use super::errors::{CliError, CliResult};
use super::io::write_response;

/// Main CLI entry point
///
/// Parses arguments, installs logging and dispatches to the command.
/// This is the only function that main.rs should call.
pub fn run() -> CliResult<()> {
    let cli = Cli::parse_args();
    init_tracing(&cli.log_level, cli.log_format)?;
    run_command(cli.command)
}

/// Run the appropriate command based on CLI args
pub fn run_command(cmd: Command) -> CliResult<()> {
    match cmd {
        Command::Start { config, port } => start(&config, port),
        Command::Check { config } => check(&config),
        Command::Sign {
            config,
            uploader,
            ts,
        } => sign(&config, &uploader, ts),
        Command::Query { config, collection } => query(&config, &collection),
    }
}

fn runtime() -> CliResult<tokio::runtime::Runtime> {
    tokio::runtime::Runtime::new()
        .map_err(|e| CliError::boot_failed(format!("Failed to create tokio runtime: {}", e)))
}

/// Start the upload server
///
/// Loads and validates the configuration, opens the store under
/// `data_dir` and serves until the process is stopped.
pub fn start(config_path: &Path, port: Option<u16>) -> CliResult<()> {
    let mut config = AppConfig::load(config_path)?;
    if let Some(port) = port {
        config.http.port = port;
    }

    let store: Arc<dyn DocumentStore> = Arc::new(FileDocumentStore::new(config.data_path()));
    let ctx = config.build_context(store)?;

    if ctx.uploaders().is_empty() {
        tracing::warn!("no uploaders configured; every upload will be rejected");
    }
    tracing::info!(
        data_dir = %config.data_path().display(),
        uploaders = ?ctx.uploaders().identities(),
        validators = ctx.validators().len(),
        "configuration loaded"
    );

    let server = HttpServer::new(config.http.clone(), ctx);
    runtime()?.block_on(async {
        server
            .start()
            .await
            .map_err(|e| CliError::boot_failed(format!("HTTP server failed: {}", e)))
    })
}

/// Validate the configuration and print a summary
pub fn check(config_path: &Path) -> CliResult<()> {
    let config = AppConfig::load(config_path)?;
    write_response(summary(&config)?)
}

/// Summary of a validated configuration
pub fn summary(config: &AppConfig) -> CliResult<Value> {
    let uploaders = config.uploader_registry()?;
    let validators = config.validator_registry()?;

    let uploaders: Vec<Value> = uploaders
        .identities()
        .into_iter()
        .filter_map(|id| uploaders.get(id))
        .map(|u| {
            json!({
                "uploader": u.identity(),
                "columns": u.columns(),
                "generates_ids": !u.has_id_column(),
            })
        })
        .collect();

    Ok(json!({
        "data_dir": config.data_path().display().to_string(),
        "listen": config.http.socket_addr(),
        "max_body_bytes": config.http.max_body_bytes,
        "uploaders": uploaders,
        "validators": validators.patterns(),
    }))
}

/// Print the signature and query string for an upload
pub fn sign(config_path: &Path, uploader: &str, ts: Option<String>) -> CliResult<()> {
    let config = AppConfig::load(config_path)?;
    let ts = ts.unwrap_or_else(|| Utc::now().timestamp().to_string());
    write_response(signed_query(&config, uploader, &ts)?)
}

/// Signature plus a ready-to-use, percent-encoded query string
pub fn signed_query(config: &AppConfig, uploader: &str, ts: &str) -> CliResult<Value> {
    let entry = config
        .uploaders
        .get(uploader)
        .ok_or_else(|| CliError::unknown_uploader(uploader))?;
    let signature = compute_signature(uploader, ts, &entry.psk);

    let query = format!(
        "u={}&ts={}&signature={}",
        urlencoding::encode(uploader),
        urlencoding::encode(ts),
        urlencoding::encode(&signature)
    );

    Ok(json!({
        "u": uploader,
        "ts": ts,
        "signature": signature,
        "query": query,
    }))
}

/// Print every stored document of a collection
pub fn query(config_path: &Path, collection: &str) -> CliResult<()> {
    let config = AppConfig::load(config_path)?;
    let store = FileDocumentStore::new(config.data_path());
    let result = runtime()?.block_on(read_collection(&store, collection))?;
    write_response(result)
}

/// Stored documents of `collection` as JSON
pub async fn read_collection(store: &dyn DocumentStore, collection: &str) -> CliResult<Value> {
    let stored = store.read_collection(collection).await?;

    let documents = stored
        .iter()
        .map(|doc| {
            serde_json::from_slice::<Value>(&doc.body).map_err(|e| {
                CliError::store_error(format!(
                    "Document '{}' in '{}' is not valid JSON: {}",
                    doc.document_id, collection, e
                ))
            })
        })
        .collect::<CliResult<Vec<Value>>>()?;

    Ok(json!({
        "collection": collection,
        "count": documents.len(),
        "documents": documents,
    }))
}
