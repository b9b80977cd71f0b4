//! Facade crate for the price archive service.
//!
//! This crate re-exports the core record types and exposes the SQLite store
//! and the ingestion and export pipelines behind feature flags.

#![forbid(unsafe_code)]

pub use pricebox_core::{
    AggregateSnapshot, Record, RecordError, RecordStore, StoreError, StoreSource, validate_price,
};

#[cfg(feature = "store-sqlite")]
pub use pricebox_core::{DEFAULT_BUSY_TIMEOUT, SqliteRecordStore};

#[cfg(feature = "pipeline")]
pub use pricebox_data::{
    EXPORT_FILE_NAME, ExportError, FailureKind, IngestError, Stage, archive, export_archive,
    ingest_archive, tabular,
};
