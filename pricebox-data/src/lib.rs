//! Archive ingestion and export pipelines for the price service.
//!
//! Responsibilities:
//! - Unpack uploaded ZIP containers and locate the `data.csv` member.
//! - Parse delimited rows into validated [`pricebox_core::Record`] values.
//! - Drive a [`pricebox_core::RecordStore`] for ingestion and export.
//! - Classify every failure with a [`FailureKind`] and [`Stage`].
//!
//! Boundaries:
//! - Storage details live behind `RecordStore` in `pricebox-core`.
//! - No HTTP or process concerns; callers own transport and status codes.
//!
//! Invariants:
//! - Parsing completes before the store is touched, so malformed input never
//!   produces a partial write.
//! - Exported archives re-ingest cleanly.

#![forbid(unsafe_code)]

pub mod archive;
mod error;
mod export;
mod ingest;
pub mod tabular;

pub use error::{FailureKind, Stage};
pub use export::{EXPORT_FILE_NAME, ExportError, export_archive};
pub use ingest::{IngestError, ingest_archive};
