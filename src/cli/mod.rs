//! CLI module for ingestd
//!
//! Provides command-line interface for:
//! - start: Serve uploads over HTTP
//! - check: Validate configuration
//! - sign: Compute an upload signature
//! - query: Dump a stored collection

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, Command};
pub use commands::{
    check, query, read_collection, run, run_command, sign, signed_query, start, summary,
};
pub use errors::{CliError, CliErrorCode, CliResult};
pub use io::{write_response, write_response_to};
