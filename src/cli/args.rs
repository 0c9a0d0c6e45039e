//! CLI argument definitions using clap
//!
//! Commands:
//! - ingestd start --config <path> [--port <port>]
//! - ingestd check --config <path>
//! - ingestd sign --config <path> --uploader <id> [--ts <timestamp>]
//! - ingestd query --config <path> --collection <name>

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::telemetry::LogFormat;

/// ingestd - Signed bulk CSV ingestion
#[derive(Parser, Debug)]
#[command(name = "ingestd")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Log level used when RUST_LOG is not set
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Compact)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the upload server
    Start {
        /// Path to configuration file
        #[arg(long, default_value = "./config.json")]
        config: PathBuf,

        /// Port to listen on, overriding the configuration
        #[arg(long)]
        port: Option<u16>,
    },

    /// Validate the configuration and exit
    Check {
        /// Path to configuration file
        #[arg(long, default_value = "./config.json")]
        config: PathBuf,
    },

    /// Compute the signature and query string for an upload
    Sign {
        /// Path to configuration file
        #[arg(long, default_value = "./config.json")]
        config: PathBuf,

        /// Uploader identity
        #[arg(long, short)]
        uploader: String,

        /// Timestamp to sign (default: current unix time in seconds)
        #[arg(long)]
        ts: Option<String>,
    },

    /// Print every stored document of a collection and exit
    Query {
        /// Path to configuration file
        #[arg(long, default_value = "./config.json")]
        config: PathBuf,

        /// Collection (uploader identity) to read
        #[arg(long, short)]
        collection: String,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
