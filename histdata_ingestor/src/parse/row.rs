use chrono::{NaiveDateTime, Timelike};
use thiserror::Error;

use crate::{
    models::{bar::PriceBar, timeframe::TimeFrame},
    parse::layout::{RowLayout, classify_layout},
};

/// Timestamp encodings seen in HistData exports, tried in order.
pub const TIMESTAMP_FORMATS: [&str; 3] = ["%Y%m%d %H%M%S", "%Y.%m.%d %H:%M", "%Y%m%d%H%M%S"];

const PRICE_COLUMNS: [&str; 5] = ["open", "high", "low", "close", "volume"];

/// Why a row was skipped.
#[derive(Debug, Error, PartialEq)]
pub enum RowError {
    #[error("no timestamp format matches {0:?}")]
    UnparsedTimestamp(String),

    #[error("leading columns are neither a combined nor a split date/time")]
    UnrecognizedLayout,

    #[error("timestamp was recovered from {recovered_from} columns but the layout is {layout:?}")]
    LayoutMismatch {
        layout: RowLayout,
        recovered_from: usize,
    },

    #[error("expected at least {expected} columns, found {found}")]
    MalformedRow { expected: usize, found: usize },

    #[error("column `{column}` is not a finite number: {value:?}")]
    InvalidNumber { column: &'static str, value: String },
}

/// Parses one timestamp string against [`TIMESTAMP_FORMATS`].
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
}

/// Recovers the row timestamp from column 0, or from columns 0 and 1 joined
/// by a space. Returns the timestamp and how many columns it consumed.
fn recover_timestamp<S: AsRef<str>>(columns: &[S]) -> Result<(NaiveDateTime, usize), RowError> {
    let first = columns.first().map(|c| c.as_ref().trim()).unwrap_or_default();
    if let Some(ts) = parse_timestamp(first) {
        return Ok((ts, 1));
    }

    let joined = match columns.get(1) {
        Some(second) => format!("{first} {}", second.as_ref().trim()),
        None => return Err(RowError::UnparsedTimestamp(first.to_string())),
    };
    parse_timestamp(&joined)
        .map(|ts| (ts, 2))
        .ok_or(RowError::UnparsedTimestamp(joined))
}

fn parse_price(column: &'static str, raw: &str) -> Result<f64, RowError> {
    let raw = raw.trim();
    raw.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| RowError::InvalidNumber {
            column,
            value: raw.to_string(),
        })
}

/// Turns the raw columns of one row into a [`PriceBar`].
///
/// The row must carry, after its date/time columns, at least `open`, `high`,
/// `low`, `close` and `volume`. Volume is validated but not kept. Timestamps
/// are truncated to the minute.
pub fn parse_row<S: AsRef<str>>(instrument: &str, columns: &[S]) -> Result<PriceBar, RowError> {
    let (timestamp, consumed) = recover_timestamp(columns)?;

    let layout = classify_layout(columns);
    let offset = layout.ohlc_offset().ok_or(RowError::UnrecognizedLayout)?;
    if offset != consumed {
        return Err(RowError::LayoutMismatch {
            layout,
            recovered_from: consumed,
        });
    }

    let expected = offset + PRICE_COLUMNS.len();
    if columns.len() < expected {
        return Err(RowError::MalformedRow {
            expected,
            found: columns.len(),
        });
    }

    let mut values = [0.0; 5];
    for (i, name) in PRICE_COLUMNS.iter().enumerate() {
        values[i] = parse_price(name, columns[offset + i].as_ref())?;
    }
    let [open, high, low, close, _volume] = values;

    let timestamp = timestamp
        .with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(timestamp);

    Ok(PriceBar {
        instrument: instrument.to_string(),
        timeframe: TimeFrame::one_minute(),
        timestamp,
        open,
        high,
        low,
        close,
    })
}
