//! Store-to-archive export pipeline.

use log::{debug, info};
use pricebox_core::{RecordStore, StoreError};
use thiserror::Error;

use crate::archive::{ArchiveError, DATA_MEMBER, package};
use crate::error::{FailureKind, Stage};
use crate::tabular::{WriteError, write_records};

/// File name suggested to clients downloading an export.
pub const EXPORT_FILE_NAME: &str = "prices.zip";

/// Errors returned by [`export_archive`].
#[derive(Debug, Error)]
pub enum ExportError {
    /// Reading the stored records failed.
    #[error(transparent)]
    Query(StoreError),
    /// Rendering the records failed.
    #[error(transparent)]
    Serialize(#[from] WriteError),
    /// Building the container failed.
    #[error(transparent)]
    Package(#[from] ArchiveError),
}

impl From<StoreError> for ExportError {
    fn from(error: StoreError) -> Self {
        Self::Query(error)
    }
}

impl ExportError {
    /// Failure classification for the request boundary.
    #[must_use]
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Query(err) => match FailureKind::from(err) {
                FailureKind::StoreUnavailable => FailureKind::StoreUnavailable,
                _ => FailureKind::QueryFailed,
            },
            Self::Serialize(_) => FailureKind::SerializationFailed,
            Self::Package(_) => FailureKind::PackagingFailed,
        }
    }

    /// Stage that produced the failure.
    #[must_use]
    pub const fn stage(&self) -> Stage {
        match self {
            Self::Query(_) => Stage::Query,
            Self::Serialize(_) => Stage::Serialize,
            Self::Package(_) => Stage::Package,
        }
    }
}

/// Render every stored record into a ZIP archive holding one `data.csv`.
///
/// Rows appear in ascending identifier order behind the fixed header line.
/// An empty store yields an archive whose member holds only the header.
pub fn export_archive<S>(store: &S) -> Result<Vec<u8>, ExportError>
where
    S: RecordStore + ?Sized,
{
    let records = store.records()?;
    debug!("loaded {} records for export", records.len());

    let text = write_records(&records)?;
    let archive = package(DATA_MEMBER, &text)?;
    info!(
        "exported {} records ({} bytes compressed)",
        records.len(),
        archive.len()
    );
    Ok(archive)
}
