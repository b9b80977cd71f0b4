//! Layered configuration for the `serve`, `ingest` and `export` subcommands.
//!
//! Each subcommand's arguments merge CLI flags over environment variables
//! (`PRICEBOX_CMDS_<SUBCOMMAND>_<OPTION>`) over configuration files before
//! being resolved into a config struct with every default filled in.

use std::time::Duration;

use camino::Utf8PathBuf;
use clap::Parser;
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use pricebox_core::{DEFAULT_BUSY_TIMEOUT, SqliteRecordStore};
use pricebox_data::EXPORT_FILE_NAME;
use serde::{Deserialize, Serialize};

use crate::CliError;

pub(crate) const ARG_DATABASE: &str = "database";
pub(crate) const ARG_HOST: &str = "host";
pub(crate) const ARG_PORT: &str = "port";
pub(crate) const ARG_MAX_UPLOAD_BYTES: &str = "max-upload-bytes";
pub(crate) const ARG_BUSY_TIMEOUT_MS: &str = "busy-timeout-ms";
pub(crate) const ARG_ARCHIVE: &str = "archive";
pub(crate) const ARG_OUTPUT: &str = "output";
pub(crate) const ENV_INGEST_ARCHIVE: &str = "PRICEBOX_CMDS_INGEST_ARCHIVE";

pub(crate) const DEFAULT_DATABASE: &str = "prices.db";
pub(crate) const DEFAULT_HOST: &str = "0.0.0.0";
pub(crate) const DEFAULT_PORT: u16 = 8080;
pub(crate) const DEFAULT_MAX_UPLOAD_BYTES: usize = 32 * 1024 * 1024;

/// Where the record store lives and how long writers wait on locks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct StoreConfig {
    pub(crate) database: Utf8PathBuf,
    pub(crate) busy_timeout: Duration,
}

impl StoreConfig {
    fn resolve(database: Option<Utf8PathBuf>, busy_timeout_ms: Option<u64>) -> Self {
        Self {
            database: database.unwrap_or_else(|| Utf8PathBuf::from(DEFAULT_DATABASE)),
            busy_timeout: busy_timeout_ms.map_or(DEFAULT_BUSY_TIMEOUT, Duration::from_millis),
        }
    }

    pub(crate) fn open(&self) -> Result<SqliteRecordStore, CliError> {
        let store = SqliteRecordStore::open_with_busy_timeout(&self.database, self.busy_timeout)?;
        Ok(store)
    }
}

/// CLI arguments for the `serve` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    long_about = "Serve the price archive HTTP API. Uploads are ingested \
                 into the SQLite store; downloads export every stored \
                 record as a ZIP archive.",
    about = "Run the HTTP service"
)]
#[ortho_config(prefix = "PRICEBOX")]
pub(crate) struct ServeArgs {
    /// Path to the SQLite database file.
    #[arg(long = ARG_DATABASE, value_name = "path")]
    #[serde(default)]
    pub(crate) database: Option<Utf8PathBuf>,
    /// Interface to listen on.
    #[arg(long = ARG_HOST, value_name = "addr")]
    #[serde(default)]
    pub(crate) host: Option<String>,
    /// TCP port to listen on.
    #[arg(long = ARG_PORT, value_name = "port")]
    #[serde(default)]
    pub(crate) port: Option<u16>,
    /// Largest accepted request body, in bytes.
    #[arg(long = ARG_MAX_UPLOAD_BYTES, value_name = "bytes")]
    #[serde(default)]
    pub(crate) max_upload_bytes: Option<usize>,
    /// How long a writer waits for a locked database, in milliseconds.
    #[arg(long = ARG_BUSY_TIMEOUT_MS, value_name = "ms")]
    #[serde(default)]
    pub(crate) busy_timeout_ms: Option<u64>,
}

impl ServeArgs {
    pub(crate) fn into_config(self) -> Result<ServeConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        ServeConfig::try_from(merged)
    }
}

/// Resolved `serve` configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ServeConfig {
    pub(crate) store: StoreConfig,
    pub(crate) host: String,
    pub(crate) port: u16,
    pub(crate) max_upload_bytes: usize,
}

impl ServeConfig {
    /// `host:port` string handed to the listener.
    pub(crate) fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl TryFrom<ServeArgs> for ServeConfig {
    type Error = CliError;

    fn try_from(args: ServeArgs) -> Result<Self, Self::Error> {
        let max_upload_bytes = args.max_upload_bytes.unwrap_or(DEFAULT_MAX_UPLOAD_BYTES);
        if max_upload_bytes == 0 {
            return Err(CliError::InvalidArgument {
                field: ARG_MAX_UPLOAD_BYTES,
                reason: "must be greater than zero",
            });
        }
        let host = args.host.unwrap_or_else(|| DEFAULT_HOST.to_owned());
        if host.trim().is_empty() {
            return Err(CliError::InvalidArgument {
                field: ARG_HOST,
                reason: "must not be empty",
            });
        }
        Ok(Self {
            store: StoreConfig::resolve(args.database, args.busy_timeout_ms),
            host,
            port: args.port.unwrap_or(DEFAULT_PORT),
            max_upload_bytes,
        })
    }
}

/// CLI arguments for the `ingest` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    long_about = "Ingest a ZIP archive holding data.csv into the SQLite \
                 store and print the resulting aggregate snapshot as JSON.",
    about = "Ingest a price archive from disk"
)]
#[ortho_config(prefix = "PRICEBOX")]
pub(crate) struct IngestArgs {
    /// Path to the ZIP archive to ingest.
    #[arg(value_name = "archive")]
    #[serde(default)]
    pub(crate) archive: Option<Utf8PathBuf>,
    /// Path to the SQLite database file.
    #[arg(long = ARG_DATABASE, value_name = "path")]
    #[serde(default)]
    pub(crate) database: Option<Utf8PathBuf>,
    /// How long a writer waits for a locked database, in milliseconds.
    #[arg(long = ARG_BUSY_TIMEOUT_MS, value_name = "ms")]
    #[serde(default)]
    pub(crate) busy_timeout_ms: Option<u64>,
}

impl IngestArgs {
    pub(crate) fn into_config(self) -> Result<IngestConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        IngestConfig::try_from(merged)
    }
}

/// Resolved `ingest` configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct IngestConfig {
    pub(crate) archive: Utf8PathBuf,
    pub(crate) store: StoreConfig,
}

impl TryFrom<IngestArgs> for IngestConfig {
    type Error = CliError;

    fn try_from(args: IngestArgs) -> Result<Self, Self::Error> {
        let archive = args.archive.ok_or(CliError::MissingArgument {
            field: ARG_ARCHIVE,
            env: ENV_INGEST_ARCHIVE,
        })?;
        Ok(Self {
            archive,
            store: StoreConfig::resolve(args.database, args.busy_timeout_ms),
        })
    }
}

/// CLI arguments for the `export` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    long_about = "Export every stored record as a ZIP archive holding \
                 data.csv, ordered by identifier.",
    about = "Export the store to a price archive"
)]
#[ortho_config(prefix = "PRICEBOX")]
pub(crate) struct ExportArgs {
    /// Destination for the ZIP archive.
    #[arg(long = ARG_OUTPUT, value_name = "path")]
    #[serde(default)]
    pub(crate) output: Option<Utf8PathBuf>,
    /// Path to the SQLite database file.
    #[arg(long = ARG_DATABASE, value_name = "path")]
    #[serde(default)]
    pub(crate) database: Option<Utf8PathBuf>,
    /// How long a reader waits for a locked database, in milliseconds.
    #[arg(long = ARG_BUSY_TIMEOUT_MS, value_name = "ms")]
    #[serde(default)]
    pub(crate) busy_timeout_ms: Option<u64>,
}

impl ExportArgs {
    pub(crate) fn into_config(self) -> Result<ExportConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        Ok(ExportConfig::from(merged))
    }
}

/// Resolved `export` configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ExportConfig {
    pub(crate) output: Utf8PathBuf,
    pub(crate) store: StoreConfig,
}

impl From<ExportArgs> for ExportConfig {
    fn from(args: ExportArgs) -> Self {
        Self {
            output: args
                .output
                .unwrap_or_else(|| Utf8PathBuf::from(EXPORT_FILE_NAME)),
            store: StoreConfig::resolve(args.database, args.busy_timeout_ms),
        }
    }
}

#[cfg(test)]
pub(crate) fn serve_config_from_layers_for_test(
    layers: Vec<ortho_config::MergeLayer<'static>>,
) -> Result<ServeConfig, CliError> {
    let merged = ServeArgs::merge_from_layers(layers).map_err(CliError::from)?;
    ServeConfig::try_from(merged)
}
