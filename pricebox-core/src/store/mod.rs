//! Data access traits for persisted records.
//!
//! The `RecordStore` trait is the store-access object handed to the ingestion
//! and export pipelines. Implementations acquire whatever connection or
//! transaction they need per call and release it before returning, so no
//! store state leaks between requests.

use thiserror::Error;

use crate::{AggregateSnapshot, Record};

#[cfg(feature = "store-sqlite")]
mod sqlite;

#[cfg(feature = "store-sqlite")]
pub use sqlite::{DEFAULT_BUSY_TIMEOUT, SqliteRecordStore};

/// Boxed backend error carried by [`StoreError`].
pub type StoreSource = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors raised by [`RecordStore`] implementations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A connection to the backing store could not be acquired.
    #[error("failed to open record store at {location}: {source}")]
    Unavailable {
        /// Human-readable store location.
        location: String,
        /// Backend error.
        #[source]
        source: StoreSource,
    },
    /// Initialising the record table failed.
    #[error("failed to initialise record schema: {source}")]
    Schema {
        /// Backend error.
        #[source]
        source: StoreSource,
    },
    /// Opening the ingestion transaction failed.
    #[error("failed to begin ingestion transaction: {source}")]
    TransactionUnavailable {
        /// Backend error.
        #[source]
        source: StoreSource,
    },
    /// Writing a record failed; the transaction was rolled back.
    #[error("failed to insert record {id}: {source}")]
    InsertFailed {
        /// Identifier of the record being inserted.
        id: i64,
        /// Backend error.
        #[source]
        source: StoreSource,
    },
    /// Committing the ingestion transaction failed.
    #[error("failed to commit ingestion transaction: {source}")]
    CommitFailed {
        /// Backend error.
        #[source]
        source: StoreSource,
    },
    /// A read against the store failed.
    #[error("failed to {operation}: {source}")]
    QueryFailed {
        /// Short description of the failed read.
        operation: &'static str,
        /// Backend error.
        #[source]
        source: StoreSource,
    },
}

/// Transactional access to the persisted record set.
///
/// # Examples
///
/// ```rust
/// use std::sync::Mutex;
/// use pricebox_core::{AggregateSnapshot, Record, RecordStore, StoreError};
///
/// #[derive(Default)]
/// struct VecStore {
///     rows: Mutex<Vec<Record>>,
/// }
///
/// impl RecordStore for VecStore {
///     fn ingest(&self, records: &[Record]) -> Result<AggregateSnapshot, StoreError> {
///         let mut rows = self.rows.lock().unwrap_or_else(|err| err.into_inner());
///         let mut inserted = 0;
///         for record in records {
///             if rows.iter().all(|row| row.id != record.id) {
///                 rows.push(record.clone());
///                 inserted += 1;
///             }
///         }
///         Ok(AggregateSnapshot { total_items: inserted, ..AggregateSnapshot::default() })
///     }
///
///     fn records(&self) -> Result<Vec<Record>, StoreError> {
///         Ok(self.rows.lock().unwrap_or_else(|err| err.into_inner()).clone())
///     }
/// }
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let created_at = chrono::NaiveDate::from_ymd_opt(2024, 1, 1).ok_or("invalid date")?;
/// let record = Record::new(7, created_at, "Kettle".into(), "kitchen".into(), 30.0)?;
/// let store = VecStore::default();
///
/// assert_eq!(store.ingest(std::slice::from_ref(&record))?.total_items, 1);
/// assert_eq!(store.ingest(&[record])?.total_items, 0);
/// # Ok(())
/// # }
/// ```
pub trait RecordStore {
    /// Insert `records` as one atomic unit and report aggregates.
    ///
    /// Records whose identifier already exists are skipped without error and
    /// without overwriting the stored row. Any other failure rolls back the
    /// whole batch. `total_items` counts only the rows this call inserted;
    /// the category and price totals span the entire store and are computed
    /// inside the same transaction.
    fn ingest(&self, records: &[Record]) -> Result<AggregateSnapshot, StoreError>;

    /// Return every persisted record ordered by ascending identifier.
    fn records(&self) -> Result<Vec<Record>, StoreError>;
}

impl<S: RecordStore + ?Sized> RecordStore for std::sync::Arc<S> {
    fn ingest(&self, records: &[Record]) -> Result<AggregateSnapshot, StoreError> {
        (**self).ingest(records)
    }

    fn records(&self) -> Result<Vec<Record>, StoreError> {
        (**self).records()
    }
}
