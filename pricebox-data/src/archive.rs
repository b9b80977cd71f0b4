//! ZIP container handling for the tabular payload.
//!
//! Ingestion unpacks a single named member from an uploaded buffer; export
//! packages freshly rendered text as the sole member of a new container.

use std::io::{self, Cursor, Read, Write};

use thiserror::Error;
use zip::result::ZipError;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::error::FailureKind;

/// Member name holding the tabular payload, on upload and download alike.
pub const DATA_MEMBER: &str = "data.csv";

/// Errors raised while reading or building containers.
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// The buffer is not a well-formed ZIP container.
    #[error("invalid zip file: {source}")]
    MalformedArchive {
        /// Error reported by the ZIP reader.
        #[source]
        source: ZipError,
    },
    /// No entry carries the expected name.
    #[error("{member} not found in zip file")]
    MemberNotFound {
        /// Name that was looked up.
        member: String,
    },
    /// The entry exists but its contents could not be read back.
    #[error("failed to read {member} from zip file: {source}")]
    MemberUnreadable {
        /// Name of the unreadable entry.
        member: String,
        /// Decompression or checksum failure.
        #[source]
        source: io::Error,
    },
    /// Writing a new container failed.
    #[error("failed to package {member} into zip file: {source}")]
    Packaging {
        /// Name of the member being written.
        member: String,
        /// Error reported by the ZIP writer.
        #[source]
        source: ZipError,
    },
}

impl ArchiveError {
    /// Failure classification for the request boundary.
    #[must_use]
    pub const fn kind(&self) -> FailureKind {
        match self {
            Self::MalformedArchive { .. } => FailureKind::MalformedArchive,
            Self::MemberNotFound { .. } => FailureKind::MemberNotFound,
            Self::MemberUnreadable { .. } => FailureKind::MemberUnreadable,
            Self::Packaging { .. } => FailureKind::PackagingFailed,
        }
    }
}

/// Fully decompressed contents of one container member.
#[derive(Debug)]
pub struct MemberStream {
    member: String,
    contents: Cursor<Vec<u8>>,
}

impl MemberStream {
    /// Name of the member the bytes came from.
    #[must_use]
    pub fn member(&self) -> &str {
        &self.member
    }

    /// Decompressed size in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.contents.get_ref().len()
    }

    /// Whether the member was empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.contents.get_ref().is_empty()
    }
}

impl Read for MemberStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.contents.read(buf)
    }
}

/// Locate `member` inside the ZIP container held in `bytes`.
///
/// The member is decompressed eagerly so checksum and codec failures are
/// reported here rather than part-way through parsing. Name matching is exact
/// and case-sensitive.
///
/// # Examples
/// ```
/// use std::io::Read;
/// use pricebox_data::archive::{DATA_MEMBER, package, unpack};
///
/// # fn main() -> Result<(), pricebox_data::archive::ArchiveError> {
/// let bytes = package(DATA_MEMBER, b"id,create_date,name,category,price\n")?;
/// let mut stream = unpack(&bytes, DATA_MEMBER)?;
/// let mut text = String::new();
/// stream.read_to_string(&mut text).expect("utf-8 payload");
/// assert!(text.starts_with("id,"));
/// # Ok(())
/// # }
/// ```
pub fn unpack(bytes: &[u8], member: &str) -> Result<MemberStream, ArchiveError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))
        .map_err(|source| ArchiveError::MalformedArchive { source })?;

    let mut entry = archive.by_name(member).map_err(|source| match source {
        ZipError::FileNotFound => ArchiveError::MemberNotFound {
            member: member.to_owned(),
        },
        other => ArchiveError::MemberUnreadable {
            member: member.to_owned(),
            source: into_io_error(other),
        },
    })?;

    let mut contents = Vec::new();
    entry
        .read_to_end(&mut contents)
        .map_err(|source| ArchiveError::MemberUnreadable {
            member: member.to_owned(),
            source,
        })?;

    Ok(MemberStream {
        member: member.to_owned(),
        contents: Cursor::new(contents),
    })
}

/// Build a deflate-compressed ZIP container holding `payload` as `member`.
pub fn package(member: &str, payload: &[u8]) -> Result<Vec<u8>, ArchiveError> {
    let packaging = |source: ZipError| ArchiveError::Packaging {
        member: member.to_owned(),
        source,
    };

    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    writer.start_file(member, options).map_err(packaging)?;
    writer
        .write_all(payload)
        .map_err(|source| packaging(ZipError::Io(source)))?;
    let cursor = writer.finish().map_err(packaging)?;
    Ok(cursor.into_inner())
}

fn into_io_error(error: ZipError) -> io::Error {
    match error {
        ZipError::Io(source) => source,
        other => io::Error::other(other),
    }
}
