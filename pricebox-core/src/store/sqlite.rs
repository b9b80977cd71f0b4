//! SQLite-backed record store.
//!
//! The store keeps only the database location. Every operation opens its own
//! connection, so handles can be shared across threads and requests without
//! sharing a live connection.

use std::io;
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs_utf8};
use log::{debug, warn};
use rusqlite::{Connection, Transaction, TransactionBehavior};

use crate::{AggregateSnapshot, Record};

use super::{RecordStore, StoreError};

/// Default time a connection waits for a competing writer before failing.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const CREATE_PRICES_TABLE: &str = "CREATE TABLE IF NOT EXISTS prices (
    id INTEGER PRIMARY KEY,
    created_at TEXT NOT NULL,
    name TEXT NOT NULL,
    category TEXT NOT NULL,
    price REAL NOT NULL CHECK (price >= 0)
)";

// Only an identifier clash is ignored; every other constraint still fails.
const INSERT_RECORD: &str = "INSERT INTO prices (id, created_at, name, category, price)
    VALUES (?1, ?2, ?3, ?4, ?5)
    ON CONFLICT(id) DO NOTHING";

const SELECT_TOTALS: &str = "SELECT COUNT(*), COUNT(DISTINCT category), SUM(price) FROM prices";

const SELECT_RECORDS: &str =
    "SELECT id, created_at, name, category, price FROM prices ORDER BY id";

/// Record store persisted in a single SQLite database file.
#[derive(Debug, Clone)]
pub struct SqliteRecordStore {
    path: Utf8PathBuf,
    busy_timeout: Duration,
}

impl SqliteRecordStore {
    /// Open the database at `path`, creating it and the `prices` table when
    /// missing. Parent directories are created automatically.
    pub fn open(path: &Utf8Path) -> Result<Self, StoreError> {
        Self::open_with_busy_timeout(path, DEFAULT_BUSY_TIMEOUT)
    }

    /// Like [`SqliteRecordStore::open`] with a custom writer-lock wait.
    pub fn open_with_busy_timeout(
        path: &Utf8Path,
        busy_timeout: Duration,
    ) -> Result<Self, StoreError> {
        ensure_parent_dir(path)?;
        let store = Self {
            path: path.to_path_buf(),
            busy_timeout,
        };
        let connection = store.connect()?;
        connection
            .execute_batch(CREATE_PRICES_TABLE)
            .map_err(|source| StoreError::Schema {
                source: source.into(),
            })?;
        debug!("record store ready at {path}");
        Ok(store)
    }

    /// Location of the backing database file.
    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    fn connect(&self) -> Result<Connection, StoreError> {
        let connection =
            Connection::open(self.path.as_std_path()).map_err(|source| self.unavailable(source))?;
        connection
            .busy_timeout(self.busy_timeout)
            .map_err(|source| self.unavailable(source))?;
        Ok(connection)
    }

    fn unavailable(&self, source: rusqlite::Error) -> StoreError {
        StoreError::Unavailable {
            location: self.path.to_string(),
            source: source.into(),
        }
    }
}

impl RecordStore for SqliteRecordStore {
    fn ingest(&self, records: &[Record]) -> Result<AggregateSnapshot, StoreError> {
        let mut connection = self.connect()?;
        // IMMEDIATE takes the writer lock up front so concurrent ingestions
        // queue on the busy timeout instead of failing at their first insert.
        let transaction = connection
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|source| StoreError::TransactionUnavailable {
                source: source.into(),
            })?;

        let total_items = insert_records(&transaction, records).inspect_err(|err| {
            warn!("rolling back ingestion of {} records: {err}", records.len());
        })?;
        let (total_categories, total_price) = read_totals(&transaction)?;

        transaction
            .commit()
            .map_err(|source| StoreError::CommitFailed {
                source: source.into(),
            })?;

        Ok(AggregateSnapshot {
            total_items,
            total_categories,
            total_price,
        })
    }

    fn records(&self) -> Result<Vec<Record>, StoreError> {
        let connection = self.connect()?;
        let mut statement =
            connection
                .prepare(SELECT_RECORDS)
                .map_err(|source| StoreError::QueryFailed {
                    operation: "prepare record listing",
                    source: source.into(),
                })?;
        let rows = statement
            .query_map([], |row| {
                Ok(Record {
                    id: row.get(0)?,
                    created_at: row.get(1)?,
                    name: row.get(2)?,
                    category: row.get(3)?,
                    price: row.get(4)?,
                })
            })
            .map_err(|source| StoreError::QueryFailed {
                operation: "list records",
                source: source.into(),
            })?;
        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|source| StoreError::QueryFailed {
                operation: "read record row",
                source: source.into(),
            })
    }
}

fn insert_records(transaction: &Transaction<'_>, records: &[Record]) -> Result<u64, StoreError> {
    if records.is_empty() {
        return Ok(0);
    }

    let mut statement =
        transaction
            .prepare_cached(INSERT_RECORD)
            .map_err(|source| StoreError::QueryFailed {
                operation: "prepare record insert",
                source: source.into(),
            })?;

    let mut inserted = 0_u64;
    for record in records {
        let changed = statement
            .execute((
                record.id,
                record.created_at,
                record.name.as_str(),
                record.category.as_str(),
                record.price,
            ))
            .map_err(|source| StoreError::InsertFailed {
                id: record.id,
                source: source.into(),
            })?;
        // Zero changes means the identifier was already present.
        if changed > 0 {
            inserted += 1;
        }
    }

    Ok(inserted)
}

fn read_totals(transaction: &Transaction<'_>) -> Result<(u64, f64), StoreError> {
    let (rows, categories, sum): (i64, u64, Option<f64>) = transaction
        .query_row(SELECT_TOTALS, [], |row| {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?))
        })
        .map_err(|source| StoreError::QueryFailed {
            operation: "compute store aggregates",
            source: source.into(),
        })?;
    // SQLite yields NULL for an empty table and for a sum that overflowed.
    match sum {
        None if rows == 0 => Ok((categories, 0.0)),
        Some(total) if total.is_finite() => Ok((categories, total)),
        _ => Err(StoreError::QueryFailed {
            operation: "compute store aggregates",
            source: io::Error::other("price total exceeds the representable range").into(),
        }),
    }
}

fn ensure_parent_dir(path: &Utf8Path) -> Result<(), StoreError> {
    let Some(parent) = path.parent() else {
        return Ok(());
    };
    if parent.as_os_str().is_empty() || parent == Utf8Path::new("/") {
        return Ok(());
    }

    let (base, relative) = if parent.is_absolute() {
        ("/", parent.strip_prefix("/").unwrap_or(parent))
    } else {
        (".", parent)
    };

    fs_utf8::Dir::open_ambient_dir(base, ambient_authority())
        .and_then(|dir| dir.create_dir_all(relative))
        .map_err(|source| StoreError::Unavailable {
            location: path.to_string(),
            source: source.into(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rstest::{fixture, rstest};
    use tempfile::TempDir;

    fn record(id: i64, category: &str, price: f64) -> Record {
        Record {
            id,
            created_at: NaiveDate::from_ymd_opt(2024, 2, 29).expect("valid date"),
            name: format!("item-{id}"),
            category: category.into(),
            price,
        }
    }

    struct StoreFixture {
        store: SqliteRecordStore,
        _dir: TempDir,
    }

    #[fixture]
    fn store() -> StoreFixture {
        let dir = TempDir::new().expect("create temp dir");
        let path = Utf8PathBuf::from_path_buf(dir.path().join("prices.db")).expect("utf-8 path");
        let store = SqliteRecordStore::open(&path).expect("open store");
        StoreFixture { store, _dir: dir }
    }

    fn row_count(store: &SqliteRecordStore) -> i64 {
        let conn = Connection::open(store.path().as_std_path()).expect("open database");
        conn.query_row("SELECT COUNT(*) FROM prices", [], |row| row.get(0))
            .expect("count rows")
    }

    #[rstest]
    fn ingest_reports_inserted_rows_and_global_totals(store: StoreFixture) {
        let batch = [record(1, "A", 10.0), record(2, "A", 20.0), record(3, "B", 5.0)];

        let snapshot = store.store.ingest(&batch).expect("ingest batch");

        assert_eq!(
            snapshot,
            AggregateSnapshot {
                total_items: 3,
                total_categories: 2,
                total_price: 35.0,
            }
        );
    }

    #[rstest]
    fn reingesting_a_batch_inserts_nothing(store: StoreFixture) {
        let batch = [record(1, "A", 10.0), record(2, "B", 2.5)];
        store.store.ingest(&batch).expect("first ingest");

        let snapshot = store.store.ingest(&batch).expect("second ingest");

        assert_eq!(snapshot.total_items, 0);
        assert_eq!(snapshot.total_categories, 2);
        assert_eq!(snapshot.total_price, 12.5);
        assert_eq!(row_count(&store.store), 2);
    }

    #[rstest]
    fn conflicting_identifier_keeps_original_row(store: StoreFixture) {
        let original = record(5, "A", 1.0);
        store
            .store
            .ingest(std::slice::from_ref(&original))
            .expect("first ingest");

        let mut clash = record(5, "Z", 100.0);
        clash.name = "clash".into();
        let snapshot = store.store.ingest(&[clash]).expect("ingest clash");

        assert_eq!(snapshot.total_items, 0);
        assert_eq!(store.store.records().expect("list"), vec![original]);
    }

    #[rstest]
    fn duplicate_identifier_within_batch_is_counted_once(store: StoreFixture) {
        let batch = [record(1, "A", 1.0), record(1, "B", 2.0)];
        let snapshot = store.store.ingest(&batch).expect("ingest batch");
        assert_eq!(snapshot.total_items, 1);
        assert_eq!(snapshot.total_categories, 1);
    }

    #[rstest]
    fn failed_insert_rolls_back_whole_batch(store: StoreFixture) {
        // The CHECK constraint rejects the third row after two good inserts.
        let batch = [record(1, "A", 1.0), record(2, "A", 2.0), record(3, "A", -3.0)];

        let err = store.store.ingest(&batch).expect_err("negative price");

        assert!(matches!(err, StoreError::InsertFailed { id: 3, .. }));
        assert_eq!(row_count(&store.store), 0);
        assert!(store.store.records().expect("list").is_empty());
    }

    #[rstest]
    fn identifier_clash_is_ignored_but_constraint_violation_is_not(store: StoreFixture) {
        store.store.ingest(&[record(1, "A", 1.0)]).expect("seed");
        let batch = [record(1, "B", 9.0), record(2, "A", 2.0), record(3, "A", -1.0)];

        let err = store.store.ingest(&batch).expect_err("negative price");

        assert!(matches!(err, StoreError::InsertFailed { id: 3, .. }));
        assert_eq!(store.store.records().expect("list"), vec![record(1, "A", 1.0)]);
    }

    #[rstest]
    fn overflowing_price_total_fails_and_rolls_back(store: StoreFixture) {
        let batch = [record(1, "A", f64::MAX), record(2, "A", f64::MAX)];

        let err = store.store.ingest(&batch).expect_err("total overflows");

        assert!(matches!(
            err,
            StoreError::QueryFailed {
                operation: "compute store aggregates",
                ..
            }
        ));
        assert_eq!(row_count(&store.store), 0);
    }

    #[rstest]
    fn empty_batch_reports_existing_totals(store: StoreFixture) {
        store
            .store
            .ingest(&[record(1, "A", 4.0)])
            .expect("seed store");
        let snapshot = store.store.ingest(&[]).expect("empty ingest");
        assert_eq!(
            snapshot,
            AggregateSnapshot {
                total_items: 0,
                total_categories: 1,
                total_price: 4.0,
            }
        );
    }

    #[rstest]
    fn empty_store_reports_zero_totals(store: StoreFixture) {
        let snapshot = store.store.ingest(&[]).expect("empty ingest");
        assert_eq!(snapshot, AggregateSnapshot::default());
    }

    #[rstest]
    fn records_are_listed_by_ascending_identifier(store: StoreFixture) {
        let batch = [record(30, "A", 1.0), record(10, "B", 2.0), record(20, "C", 3.0)];
        store.store.ingest(&batch).expect("ingest");

        let ids: Vec<_> = store
            .store
            .records()
            .expect("list")
            .into_iter()
            .map(|entry| entry.id)
            .collect();

        assert_eq!(ids, vec![10, 20, 30]);
    }

    #[rstest]
    fn records_round_trip_all_fields(store: StoreFixture) {
        let stored = record(42, "garden", 7.25);
        store
            .store
            .ingest(std::slice::from_ref(&stored))
            .expect("ingest");
        assert_eq!(store.store.records().expect("list"), vec![stored]);
    }

    #[rstest]
    fn open_creates_parent_directories() {
        let dir = TempDir::new().expect("create temp dir");
        let nested = Utf8PathBuf::from_path_buf(dir.path().join("nested/deeper/prices.db"))
            .expect("utf-8 path");

        SqliteRecordStore::open(&nested).expect("open nested store");

        assert!(nested.exists(), "database should be created at nested path");
    }

    #[rstest]
    fn open_is_idempotent(store: StoreFixture) {
        store.store.ingest(&[record(1, "A", 1.0)]).expect("seed");
        let reopened = SqliteRecordStore::open(store.store.path()).expect("reopen");
        assert_eq!(reopened.records().expect("list").len(), 1);
    }

    #[rstest]
    fn open_reports_unavailable_store() {
        let dir = TempDir::new().expect("create temp dir");
        let as_dir = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf-8 path");

        let err = SqliteRecordStore::open(&as_dir).expect_err("directory is not a database");

        assert!(matches!(
            err,
            StoreError::Unavailable { .. } | StoreError::Schema { .. }
        ));
    }
}
