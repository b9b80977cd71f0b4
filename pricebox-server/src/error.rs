//! Error types emitted by the `pricebox` binary.
//!
//! Keep this error type reasonably small, as many helpers return
//! `Result<_, CliError>` and the workspace enables `clippy::result_large_err`.

use std::sync::Arc;

use camino::Utf8PathBuf;
use pricebox_core::StoreError;
use pricebox_data::{ExportError, IngestError};
use thiserror::Error;

/// Errors emitted by the `pricebox` binary.
#[derive(Debug, Error)]
pub enum CliError {
    /// Provided arguments failed Clap validation.
    #[error(transparent)]
    ArgumentParsing(#[from] clap::Error),
    /// Configuration layering failed (files, env, CLI).
    #[error("failed to load configuration: {0}")]
    Configuration(#[from] Arc<ortho_config::OrthoError>),
    /// A required option is missing after configuration merging.
    #[error("missing {field} (set --{field} or {env})")]
    MissingArgument {
        /// Flag name of the missing option.
        field: &'static str,
        /// Environment variable that can supply it.
        env: &'static str,
    },
    /// An option was supplied with an unusable value.
    #[error("invalid {field}: {reason}")]
    InvalidArgument {
        /// Flag name of the rejected option.
        field: &'static str,
        /// Why the value was rejected.
        reason: &'static str,
    },
    /// Opening the record store failed.
    #[error(transparent)]
    OpenStore(#[from] StoreError),
    /// Reading the archive to ingest failed.
    #[error("failed to read archive at {path:?}: {source}")]
    ReadArchive {
        /// Archive path as configured.
        path: Utf8PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
    /// Ingesting the archive failed.
    #[error("{}: {source}", .source.stage())]
    Ingest {
        /// Pipeline failure.
        #[source]
        source: IngestError,
    },
    /// Exporting the store failed.
    #[error("{}: {source}", .source.stage())]
    Export {
        /// Pipeline failure.
        #[source]
        source: ExportError,
    },
    /// Writing the exported archive failed.
    #[error("failed to write export to {path:?}: {source}")]
    WriteExport {
        /// Output path as configured.
        path: Utf8PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
    /// Serializing the ingestion summary failed.
    #[error("failed to serialize ingestion summary: {0}")]
    SerializeSummary(#[source] serde_json::Error),
    /// Writing command output failed.
    #[error("failed to write command output: {0}")]
    WriteOutput(#[source] std::io::Error),
    /// Building the async runtime failed.
    #[error("failed to start async runtime: {0}")]
    Runtime(#[source] std::io::Error),
    /// Binding or running the HTTP listener failed.
    #[error("failed to serve on {address}: {source}")]
    Serve {
        /// Listener address as configured.
        address: String,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
}
