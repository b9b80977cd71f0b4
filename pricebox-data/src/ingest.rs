//! Archive-to-store ingestion pipeline.

use log::{debug, info};
use pricebox_core::{AggregateSnapshot, RecordStore, StoreError};
use thiserror::Error;

use crate::archive::{ArchiveError, DATA_MEMBER, unpack};
use crate::error::{FailureKind, Stage};
use crate::tabular::{ParseError, parse};

/// Errors returned by [`ingest_archive`].
#[derive(Debug, Error)]
pub enum IngestError {
    /// The upload could not be unpacked.
    #[error(transparent)]
    Archive(#[from] ArchiveError),
    /// The data member could not be parsed.
    #[error(transparent)]
    Parse(#[from] ParseError),
    /// The store rejected the batch; nothing was persisted.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl IngestError {
    /// Failure classification for the request boundary.
    #[must_use]
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Archive(err) => err.kind(),
            Self::Parse(err) => err.kind(),
            Self::Store(err) => FailureKind::from(err),
        }
    }

    /// Stage that produced the failure.
    #[must_use]
    pub const fn stage(&self) -> Stage {
        match self {
            Self::Archive(_) => Stage::Unpack,
            Self::Parse(_) => Stage::Parse,
            Self::Store(_) => Stage::Persist,
        }
    }
}

/// Unpack, parse and persist an uploaded archive as one atomic batch.
///
/// Each stage runs to completion before the next starts, so a bad row is
/// reported before the store is touched. Re-submitting an archive that was
/// already ingested is safe and reports zero new items.
///
/// # Examples
/// ```
/// use pricebox_core::test_support::MemoryStore;
/// use pricebox_data::archive::{DATA_MEMBER, package};
/// use pricebox_data::ingest_archive;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let csv = "id,create_date,name,category,price\n1,2024-01-01,Lamp,home,10\n";
/// let upload = package(DATA_MEMBER, csv.as_bytes())?;
/// let store = MemoryStore::default();
///
/// let snapshot = ingest_archive(&store, &upload)?;
/// assert_eq!(snapshot.total_items, 1);
/// assert_eq!(ingest_archive(&store, &upload)?.total_items, 0);
/// # Ok(())
/// # }
/// ```
pub fn ingest_archive<S>(store: &S, bytes: &[u8]) -> Result<AggregateSnapshot, IngestError>
where
    S: RecordStore + ?Sized,
{
    let member = unpack(bytes, DATA_MEMBER)?;
    debug!("unpacked {} ({} bytes)", member.member(), member.len());

    let records = parse(member)?;
    debug!("parsed {} records", records.len());

    let snapshot = store.ingest(&records)?;
    info!(
        "ingested {} of {} records; store holds {} categories totalling {:.2}",
        snapshot.total_items,
        records.len(),
        snapshot.total_categories,
        snapshot.total_price
    );
    Ok(snapshot)
}
