//! Closed failure taxonomy shared by the ingestion and export pipelines.
//!
//! Every pipeline error maps onto exactly one [`FailureKind`] and one
//! [`Stage`], which keeps the request boundary's status mapping a plain
//! `match` instead of message inspection.

use std::fmt;

use pricebox_core::StoreError;

/// Pipeline stage at which a failure occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Opening the uploaded container and extracting the data member.
    Unpack,
    /// Converting delimited text into records.
    Parse,
    /// Applying records to the store.
    Persist,
    /// Reading records back from the store.
    Query,
    /// Rendering records as delimited text.
    Serialize,
    /// Building the outgoing container.
    Package,
}

impl Stage {
    /// Lower-case stage name used in error payloads.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unpack => "unpack",
            Self::Parse => "parse",
            Self::Persist => "persist",
            Self::Query => "query",
            Self::Serialize => "serialize",
            Self::Package => "package",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Every reason an ingestion or export can fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// The upload is not a readable container.
    MalformedArchive,
    /// The container lacks the data member.
    MemberNotFound,
    /// The data member exists but could not be decompressed.
    MemberUnreadable,
    /// The data member has no header line.
    TruncatedInput,
    /// A row has too few fields or is not valid delimited text.
    MalformedRecord,
    /// A row's identifier is not an integer.
    InvalidIdentifier,
    /// A row's creation date cannot be parsed.
    InvalidDate,
    /// A row's price is not a non-negative number.
    InvalidPrice,
    /// The store could not be reached.
    StoreUnavailable,
    /// The ingestion transaction could not be opened.
    TransactionUnavailable,
    /// A record insert failed and the batch was rolled back.
    InsertFailed,
    /// The ingestion transaction could not be committed.
    CommitFailed,
    /// A store read failed.
    QueryFailed,
    /// Records could not be rendered as delimited text.
    SerializationFailed,
    /// The outgoing container could not be built.
    PackagingFailed,
}

impl FailureKind {
    /// Whether the failure is attributable to the submitted input.
    ///
    /// # Examples
    ///
    /// ```
    /// use pricebox_data::FailureKind;
    ///
    /// assert!(FailureKind::InvalidPrice.is_client_error());
    /// assert!(!FailureKind::CommitFailed.is_client_error());
    /// ```
    #[must_use]
    pub const fn is_client_error(self) -> bool {
        matches!(
            self,
            Self::MalformedArchive
                | Self::MemberNotFound
                | Self::MemberUnreadable
                | Self::TruncatedInput
                | Self::MalformedRecord
                | Self::InvalidIdentifier
                | Self::InvalidDate
                | Self::InvalidPrice
        )
    }
}

impl From<&StoreError> for FailureKind {
    fn from(error: &StoreError) -> Self {
        match error {
            StoreError::Unavailable { .. } | StoreError::Schema { .. } => Self::StoreUnavailable,
            StoreError::TransactionUnavailable { .. } => Self::TransactionUnavailable,
            StoreError::InsertFailed { .. } => Self::InsertFailed,
            StoreError::CommitFailed { .. } => Self::CommitFailed,
            StoreError::QueryFailed { .. } => Self::QueryFailed,
        }
    }
}
