//! Core domain types for the price archive service.
//!
//! These models provide basic validation to keep downstream
//! components honest. Constructors return `Result` to surface
//! invalid input early.

#![forbid(unsafe_code)]

use chrono::NaiveDate;
use thiserror::Error;

pub mod store;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use store::{RecordStore, StoreError, StoreSource};
#[cfg(feature = "store-sqlite")]
pub use store::{DEFAULT_BUSY_TIMEOUT, SqliteRecordStore};

/// A single priced item, the unit of ingestion and export.
///
/// # Examples
///
/// ```
/// use chrono::NaiveDate;
/// use pricebox_core::Record;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let created_at = NaiveDate::from_ymd_opt(2024, 1, 31).ok_or("invalid date")?;
/// let record = Record::new(1, created_at, "Lamp".into(), "home".into(), 19.5)?;
/// assert_eq!(record.id, 1);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Record {
    /// Caller-supplied identifier, unique within the store.
    pub id: i64,
    /// Calendar date the item was created.
    pub created_at: NaiveDate,
    /// Display name.
    pub name: String,
    /// Category label used for the distinct-category aggregate.
    pub category: String,
    /// Non-negative price.
    pub price: f64,
}

/// Errors returned by [`Record::new`].
#[derive(Debug, Error, PartialEq)]
pub enum RecordError {
    /// The price was below zero.
    #[error("price must not be negative, got {price}")]
    NegativePrice {
        /// Rejected price.
        price: f64,
    },
    /// The price was NaN or infinite.
    #[error("price must be a finite number")]
    NonFinitePrice,
}

impl Record {
    /// Validates and constructs a [`Record`].
    pub fn new(
        id: i64,
        created_at: NaiveDate,
        name: String,
        category: String,
        price: f64,
    ) -> Result<Self, RecordError> {
        validate_price(price)?;
        Ok(Self {
            id,
            created_at,
            name,
            category,
            price,
        })
    }
}

/// Check that `price` is usable as a record price.
///
/// # Examples
///
/// ```
/// use pricebox_core::{RecordError, validate_price};
///
/// assert!(validate_price(0.0).is_ok());
/// assert_eq!(
///     validate_price(-1.0),
///     Err(RecordError::NegativePrice { price: -1.0 })
/// );
/// ```
pub fn validate_price(price: f64) -> Result<(), RecordError> {
    if !price.is_finite() {
        return Err(RecordError::NonFinitePrice);
    }
    if price.is_sign_negative() && price != 0.0 {
        return Err(RecordError::NegativePrice { price });
    }
    Ok(())
}

/// Aggregates reported after an ingestion.
///
/// `total_items` counts rows inserted by the current call only, while the
/// category and price totals cover every row held by the store.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AggregateSnapshot {
    /// Rows newly inserted by the ingestion that produced this snapshot.
    pub total_items: u64,
    /// Distinct categories across the whole store.
    pub total_categories: u64,
    /// Sum of all prices across the whole store.
    pub total_price: f64,
}
