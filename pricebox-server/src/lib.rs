//! HTTP service and command-line tooling for the price archive.
//!
//! `serve` exposes ingestion and export over HTTP; `ingest` and `export`
//! run the same pipelines against a local archive file.
#![forbid(unsafe_code)]

use std::sync::Arc;

use clap::{Parser, Subcommand};

mod commands;
mod config;
mod error;
pub mod http;

pub use error::CliError;
pub use http::{router, serve};

use config::{ExportArgs, IngestArgs, ServeArgs};

/// Run the `pricebox` CLI with the current process arguments and environment.
pub fn run() -> Result<(), CliError> {
    let cli = Cli::try_parse()?;
    match cli.command {
        Command::Serve(args) => run_serve(args),
        Command::Ingest(args) => commands::run_ingest(args),
        Command::Export(args) => commands::run_export(args),
    }
}

fn run_serve(args: ServeArgs) -> Result<(), CliError> {
    let config = args.into_config()?;
    let store = Arc::new(config.store.open()?);
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(CliError::Runtime)?;
    let address = config.address();
    runtime
        .block_on(serve(store, &address, config.max_upload_bytes))
        .map_err(|source| CliError::Serve { address, source })
}

#[derive(Debug, Parser)]
#[command(
    name = "pricebox",
    about = "Ingest and export price archives backed by SQLite",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Serve the HTTP API.
    Serve(ServeArgs),
    /// Ingest a ZIP archive from disk.
    Ingest(IngestArgs),
    /// Export the store to a ZIP archive on disk.
    Export(ExportArgs),
}

#[cfg(test)]
mod tests;
