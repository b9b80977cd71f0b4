//! Test-only `RecordStore` implementations used by unit, behaviour and
//! server tests.

use std::collections::{BTreeMap, BTreeSet};
use std::io;
use std::sync::{Mutex, PoisonError};

use crate::{AggregateSnapshot, Record, RecordStore, StoreError, StoreSource};

/// In-memory `RecordStore` with the same conflict-ignore semantics as the
/// SQLite store.
///
/// Rows are keyed by identifier, so listing returns them in ascending order.
#[derive(Default, Debug)]
pub struct MemoryStore {
    rows: Mutex<BTreeMap<i64, Record>>,
}

impl MemoryStore {
    /// Create a store pre-populated with `records`.
    pub fn with_records<I>(records: I) -> Self
    where
        I: IntoIterator<Item = Record>,
    {
        Self {
            rows: Mutex::new(records.into_iter().map(|row| (row.id, row)).collect()),
        }
    }
}

impl RecordStore for MemoryStore {
    fn ingest(&self, records: &[Record]) -> Result<AggregateSnapshot, StoreError> {
        let mut rows = self.rows.lock().unwrap_or_else(PoisonError::into_inner);
        let mut total_items = 0;
        for record in records {
            if !rows.contains_key(&record.id) {
                rows.insert(record.id, record.clone());
                total_items += 1;
            }
        }
        let categories: BTreeSet<_> = rows.values().map(|row| row.category.as_str()).collect();
        Ok(AggregateSnapshot {
            total_items,
            total_categories: categories.len() as u64,
            total_price: rows.values().map(|row| row.price).sum(),
        })
    }

    fn records(&self) -> Result<Vec<Record>, StoreError> {
        let rows = self.rows.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(rows.values().cloned().collect())
    }
}

/// Operation at which a [`FailingStore`] reports an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePoint {
    /// The store cannot be reached at all.
    Connect,
    /// The ingestion transaction cannot be opened.
    Begin,
    /// Inserting the first record fails.
    Insert,
    /// The commit fails after all inserts.
    Commit,
    /// Every read fails.
    Query,
}

/// `RecordStore` that always fails at a configured point.
#[derive(Debug, Clone, Copy)]
pub struct FailingStore {
    point: FailurePoint,
}

impl FailingStore {
    /// Create a store failing at `point`.
    #[must_use]
    pub const fn new(point: FailurePoint) -> Self {
        Self { point }
    }

    fn error(self, records: &[Record]) -> StoreError {
        let source: StoreSource = Box::new(io::Error::other("injected store failure"));
        match self.point {
            FailurePoint::Connect => StoreError::Unavailable {
                location: "memory".into(),
                source,
            },
            FailurePoint::Begin => StoreError::TransactionUnavailable { source },
            FailurePoint::Insert => StoreError::InsertFailed {
                id: records.first().map_or(0, |record| record.id),
                source,
            },
            FailurePoint::Commit => StoreError::CommitFailed { source },
            FailurePoint::Query => StoreError::QueryFailed {
                operation: "list records",
                source,
            },
        }
    }
}

impl RecordStore for FailingStore {
    fn ingest(&self, records: &[Record]) -> Result<AggregateSnapshot, StoreError> {
        Err(self.error(records))
    }

    fn records(&self) -> Result<Vec<Record>, StoreError> {
        Err(self.error(&[]))
    }
}
