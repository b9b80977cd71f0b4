//! Comma-delimited record parsing and rendering.
//!
//! Rows are positional: identifier, creation date, name, category, price.
//! The first line is a header and is consumed without inspecting its fields.

use std::io::Read;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use csv::{ByteRecord, Position, ReaderBuilder, StringRecord, Trim, Writer};
use pricebox_core::{Record, validate_price};
use thiserror::Error;

use crate::error::FailureKind;

/// Header line written on export.
pub const HEADER: [&str; 5] = ["id", "create_date", "name", "category", "price"];

const FIELD_COUNT: usize = HEADER.len();
const ID_FIELD: usize = 0;
const CREATED_AT_FIELD: usize = 1;
const NAME_FIELD: usize = 2;
const CATEGORY_FIELD: usize = 3;
const PRICE_FIELD: usize = 4;

const DATE_FORMAT: &str = "%Y-%m-%d";
const DATE_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Errors raised while turning delimited text into records.
///
/// Line numbers are 1-based and count the header line.
#[derive(Debug, Error)]
pub enum ParseError {
    /// The input had no first line at all.
    #[error("failed to read header: input is empty")]
    TruncatedInput,
    /// A row carried fewer fields than required.
    #[error("invalid record on line {line}: expected at least 5 fields, found {found}")]
    MalformedRecord {
        /// Line of the offending row.
        line: u64,
        /// Number of fields present.
        found: usize,
    },
    /// The text could not be read as delimited records.
    #[error("unreadable record on line {line}: {source}")]
    UnreadableRecord {
        /// Line at which reading stopped.
        line: u64,
        /// Error reported by the CSV reader.
        #[source]
        source: csv::Error,
    },
    /// The identifier field is not an integer.
    #[error("invalid id on line {line} - {value}")]
    InvalidIdentifier {
        /// Line of the offending row.
        line: u64,
        /// Raw field contents.
        value: String,
    },
    /// The creation date field is not a recognised date or timestamp.
    #[error("invalid create_date on line {line} - {value}")]
    InvalidDate {
        /// Line of the offending row.
        line: u64,
        /// Raw field contents.
        value: String,
    },
    /// The price field is not a non-negative number.
    #[error("invalid price on line {line} - {value}")]
    InvalidPrice {
        /// Line of the offending row.
        line: u64,
        /// Raw field contents.
        value: String,
    },
}

impl ParseError {
    /// Failure classification for the request boundary.
    #[must_use]
    pub const fn kind(&self) -> FailureKind {
        match self {
            Self::TruncatedInput => FailureKind::TruncatedInput,
            Self::MalformedRecord { .. } | Self::UnreadableRecord { .. } => {
                FailureKind::MalformedRecord
            }
            Self::InvalidIdentifier { .. } => FailureKind::InvalidIdentifier,
            Self::InvalidDate { .. } => FailureKind::InvalidDate,
            Self::InvalidPrice { .. } => FailureKind::InvalidPrice,
        }
    }
}

/// Rendering records as delimited text failed.
#[derive(Debug, Error)]
#[error("failed to write csv: {source}")]
pub struct WriteError {
    /// Error reported by the CSV writer.
    #[from]
    source: csv::Error,
}

/// Parse every record from `reader`.
///
/// The whole input is validated before anything is returned: the first bad
/// row aborts the parse and no partial result is produced. A header followed
/// by nothing yields an empty vector.
///
/// # Examples
/// ```
/// use pricebox_data::tabular::parse;
///
/// # fn main() -> Result<(), pricebox_data::tabular::ParseError> {
/// let text = "id,create_date,name,category,price\n1,2024-01-02,Lamp,home,9.5\n";
/// let records = parse(text.as_bytes())?;
/// assert_eq!(records.len(), 1);
/// assert_eq!(records[0].category, "home");
/// # Ok(())
/// # }
/// ```
pub fn parse<R: Read>(reader: R) -> Result<Vec<Record>, ParseError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(reader);

    let mut header = ByteRecord::new();
    let has_header = reader
        .read_byte_record(&mut header)
        .map_err(|source| ParseError::UnreadableRecord { line: 1, source })?;
    if !has_header {
        return Err(ParseError::TruncatedInput);
    }
    // An unterminated quote lets the header run on over the data rows.
    if header.iter().any(|field| field.contains(&b'\n')) {
        return Err(ParseError::MalformedRecord {
            line: header.position().map_or(1, Position::line),
            found: header.len(),
        });
    }

    let mut records = Vec::new();
    for result in reader.records() {
        let row = result.map_err(|source| ParseError::UnreadableRecord {
            line: source.position().map_or(0, Position::line),
            source,
        })?;
        records.push(convert_row(&row)?);
    }
    Ok(records)
}

fn convert_row(row: &StringRecord) -> Result<Record, ParseError> {
    let line = row.position().map_or(0, Position::line);
    if row.len() < FIELD_COUNT {
        return Err(ParseError::MalformedRecord {
            line,
            found: row.len(),
        });
    }
    let field = |index: usize| row.get(index).unwrap_or_default();

    let raw_id = field(ID_FIELD);
    let id = raw_id
        .parse::<i64>()
        .map_err(|_| ParseError::InvalidIdentifier {
            line,
            value: raw_id.to_owned(),
        })?;

    let raw_date = field(CREATED_AT_FIELD);
    let created_at = parse_date(raw_date).ok_or_else(|| ParseError::InvalidDate {
        line,
        value: raw_date.to_owned(),
    })?;

    let raw_price = field(PRICE_FIELD);
    let parsed = raw_price
        .parse::<f64>()
        .ok()
        .filter(|value| validate_price(*value).is_ok())
        .ok_or_else(|| ParseError::InvalidPrice {
            line,
            value: raw_price.to_owned(),
        })?;
    // Negative zero is the only sign-negative price that validates.
    let price = if parsed.is_sign_negative() { 0.0 } else { parsed };

    Ok(Record {
        id,
        created_at,
        name: field(NAME_FIELD).to_owned(),
        category: field(CATEGORY_FIELD).to_owned(),
        price,
    })
}

/// Accepts a plain date, a `date time` pair, or an RFC 3339 timestamp and
/// keeps only the calendar date.
fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw, DATE_FORMAT)
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(raw, DATE_TIME_FORMAT)
                .ok()
                .map(|timestamp| timestamp.date())
        })
        .or_else(|| {
            DateTime::parse_from_rfc3339(raw)
                .ok()
                .map(|timestamp| timestamp.date_naive())
        })
}

/// Render `records` as delimited text under the fixed [`HEADER`].
///
/// Dates are written as `YYYY-MM-DD` and prices with two decimals.
pub fn write_records(records: &[Record]) -> Result<Vec<u8>, WriteError> {
    let mut writer = Writer::from_writer(Vec::new());
    writer.write_record(HEADER)?;
    for record in records {
        let id = record.id.to_string();
        let created_at = record.created_at.format(DATE_FORMAT).to_string();
        let price = format!("{:.2}", record.price);
        writer.write_record([
            id.as_str(),
            created_at.as_str(),
            record.name.as_str(),
            record.category.as_str(),
            price.as_str(),
        ])?;
    }
    writer
        .into_inner()
        .map_err(|err| WriteError::from(csv::Error::from(err.into_error())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};

    const HEADER_LINE: &str = "id,create_date,name,category,price\n";

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
    }

    #[fixture]
    fn sample() -> Vec<Record> {
        vec![
            Record {
                id: 1,
                created_at: date(2024, 1, 5),
                name: "Lamp".into(),
                category: "home".into(),
                price: 9.5,
            },
            Record {
                id: 2,
                created_at: date(2024, 1, 6),
                name: "Desk, oak".into(),
                category: "office".into(),
                price: 120.0,
            },
        ]
    }

    #[rstest]
    fn parses_rows_in_order() {
        let text = format!("{HEADER_LINE}3,2024-02-01,Mug,kitchen,4.20\n1,2024-02-02,Pan,kitchen,15\n");
        let records = parse(text.as_bytes()).expect("parse");
        let ids: Vec<_> = records.iter().map(|record| record.id).collect();
        assert_eq!(ids, vec![3, 1]);
        assert_eq!(records[0].created_at, date(2024, 2, 1));
        assert_eq!(records[0].name, "Mug");
        assert_eq!(records[1].price, 15.0);
    }

    #[rstest]
    #[case("anything at all\n")]
    #[case("a;b;c\n")]
    #[case("\u{feff}unexpected,header\n")]
    fn header_contents_are_not_checked(#[case] header: &str) {
        let text = format!("{header}1,2024-02-01,Mug,kitchen,4.20\n");
        assert_eq!(parse(text.as_bytes()).expect("parse").len(), 1);
    }

    #[rstest]
    fn header_only_yields_no_records() {
        let records = parse(HEADER_LINE.as_bytes()).expect("parse");
        assert!(records.is_empty());
    }

    #[rstest]
    #[case("")]
    #[case("\n\n")]
    fn empty_input_is_truncated(#[case] text: &str) {
        let err = parse(text.as_bytes()).expect_err("no header");
        assert!(matches!(err, ParseError::TruncatedInput));
        assert_eq!(err.kind(), FailureKind::TruncatedInput);
    }

    #[rstest]
    fn short_row_aborts_parse() {
        let text = format!("{HEADER_LINE}1,2024-01-01,Mug,kitchen,4\n2,2024-01-01,Pan\n");
        let err = parse(text.as_bytes()).expect_err("short row");
        assert!(matches!(err, ParseError::MalformedRecord { line: 3, found: 3 }));
        assert_eq!(err.kind(), FailureKind::MalformedRecord);
    }

    #[rstest]
    fn extra_fields_are_ignored() {
        let text = format!("{HEADER_LINE}1,2024-01-01,Mug,kitchen,4,extra,more\n");
        let records = parse(text.as_bytes()).expect("parse");
        assert_eq!(records[0].price, 4.0);
    }

    #[rstest]
    #[case("\"id,create_date,name,category,price\n1,2024-01-01,Lamp,A,10\n2,2024-01-02,Desk,B,20\n")]
    #[case("\"id\",\"name\n1,2024-01-01,Lamp,A,10\n")]
    fn unterminated_quote_in_header_is_malformed(#[case] text: &str) {
        let err = parse(text.as_bytes()).expect_err("header swallows rows");
        assert!(matches!(err, ParseError::MalformedRecord { line: 1, .. }));
        assert_eq!(err.kind(), FailureKind::MalformedRecord);
    }

    #[rstest]
    fn header_after_blank_lines_is_accepted() {
        let text = format!("\n\n{HEADER_LINE}1,2024-01-01,Mug,kitchen,4\n");
        assert_eq!(parse(text.as_bytes()).expect("parse").len(), 1);
    }

    #[rstest]
    #[case("-0")]
    #[case("-0.00")]
    fn negative_zero_price_is_stored_as_zero(#[case] price: &str) {
        let text = format!("{HEADER_LINE}1,2024-01-01,Mug,kitchen,{price}\n");
        let records = parse(text.as_bytes()).expect("parse");
        assert!(records[0].price.is_sign_positive());

        let written = String::from_utf8(write_records(&records).expect("write")).expect("utf-8");
        assert_eq!(written, format!("{HEADER_LINE}1,2024-01-01,Mug,kitchen,0.00\n"));
    }

    #[rstest]
    #[case("abc")]
    #[case("")]
    #[case("-1")]
    #[case("NaN")]
    #[case("inf")]
    fn invalid_price_echoes_raw_value(#[case] price: &str) {
        let text = format!("{HEADER_LINE}1,2024-01-01,Mug,kitchen,{price}\n");
        let err = parse(text.as_bytes()).expect_err("bad price");
        match &err {
            ParseError::InvalidPrice { line, value } => {
                assert_eq!(*line, 2);
                assert_eq!(value, price);
            }
            other => panic!("expected InvalidPrice, got {other:?}"),
        }
        assert!(err.to_string().ends_with(&format!("- {price}")));
        assert_eq!(err.kind(), FailureKind::InvalidPrice);
    }

    #[rstest]
    #[case("x1")]
    #[case("1.5")]
    #[case("")]
    fn invalid_identifier_is_rejected(#[case] id: &str) {
        let text = format!("{HEADER_LINE}{id},2024-01-01,Mug,kitchen,1\n");
        let err = parse(text.as_bytes()).expect_err("bad id");
        assert!(matches!(err, ParseError::InvalidIdentifier { ref value, .. } if value == id));
    }

    #[rstest]
    #[case("2024-01-31", date(2024, 1, 31))]
    #[case("2024-01-31 23:59:59", date(2024, 1, 31))]
    #[case("2024-01-31T10:00:00Z", date(2024, 1, 31))]
    #[case("2024-01-31T10:00:00+03:00", date(2024, 1, 31))]
    fn accepts_dates_and_timestamps(#[case] raw: &str, #[case] expected: NaiveDate) {
        let text = format!("{HEADER_LINE}1,{raw},Mug,kitchen,1\n");
        let records = parse(text.as_bytes()).expect("parse");
        assert_eq!(records[0].created_at, expected);
    }

    #[rstest]
    #[case("31/01/2024")]
    #[case("2024-02-30")]
    #[case("yesterday")]
    fn invalid_date_is_rejected(#[case] raw: &str) {
        let text = format!("{HEADER_LINE}1,{raw},Mug,kitchen,1\n");
        let err = parse(text.as_bytes()).expect_err("bad date");
        assert_eq!(err.kind(), FailureKind::InvalidDate);
    }

    #[rstest]
    fn fields_are_trimmed_and_quotes_respected() {
        let text = format!("{HEADER_LINE} 7 , 2024-01-01 ,\"Desk, oak\", office , 12.5 \n");
        let records = parse(text.as_bytes()).expect("parse");
        assert_eq!(records[0].id, 7);
        assert_eq!(records[0].name, "Desk, oak");
        assert_eq!(records[0].category, "office");
    }

    #[rstest]
    fn invalid_utf8_row_is_malformed() {
        let mut bytes = HEADER_LINE.as_bytes().to_vec();
        bytes.extend_from_slice(b"1,2024-01-01,\xff\xfe,kitchen,1\n");
        let err = parse(bytes.as_slice()).expect_err("invalid utf-8");
        assert!(matches!(err, ParseError::UnreadableRecord { .. }));
        assert_eq!(err.kind(), FailureKind::MalformedRecord);
    }

    #[rstest]
    fn writes_fixed_header_dates_and_two_decimal_prices(sample: Vec<Record>) {
        let bytes = write_records(&sample).expect("write");
        let text = String::from_utf8(bytes).expect("utf-8 output");
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(
            lines,
            vec![
                "id,create_date,name,category,price",
                "1,2024-01-05,Lamp,home,9.50",
                "2,2024-01-06,\"Desk, oak\",office,120.00",
            ]
        );
    }

    #[rstest]
    fn writes_header_for_empty_store() {
        let bytes = write_records(&[]).expect("write");
        assert_eq!(String::from_utf8(bytes).expect("utf-8").trim_end(), HEADER.join(","));
    }

    #[rstest]
    fn written_records_parse_back(sample: Vec<Record>) {
        let bytes = write_records(&sample).expect("write");
        assert_eq!(parse(bytes.as_slice()).expect("parse"), sample);
    }
}
