//! Leading-column layout of a raw row.
//!
//! HistData exports come in two shapes:
//!
//! | layout | example |
//! |---|---|
//! | combined | `20230103 220000;1.0531;1.0534;1.0530;1.0533;0` |
//! | split | `2023.01.03;22:00;1.0531;1.0534;1.0530;1.0533;0` |
//!
//! The layout decides where the price columns start.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RowLayout {
    /// Column 0 holds date and time.
    CombinedDateTime,
    /// Column 0 holds the date, column 1 the time.
    SplitDateTime,
    Unrecognized,
}

impl RowLayout {
    /// Index of the `open` column, `None` for unrecognized rows.
    pub fn ohlc_offset(self) -> Option<usize> {
        match self {
            RowLayout::CombinedDateTime => Some(1),
            RowLayout::SplitDateTime => Some(2),
            RowLayout::Unrecognized => None,
        }
    }
}

/// Classifies a row by the shape of its first one or two columns.
///
/// Only the shape is checked here; whether the digits form a real date is
/// left to timestamp parsing.
pub fn classify_layout<S: AsRef<str>>(columns: &[S]) -> RowLayout {
    let Some(first) = columns.first().map(|c| c.as_ref().trim()) else {
        return RowLayout::Unrecognized;
    };

    if is_compact_stamp(first) {
        return RowLayout::CombinedDateTime;
    }

    let mut parts = first.split_whitespace();
    if let (Some(date), Some(time), None) = (parts.next(), parts.next(), parts.next()) {
        return if is_date(date) && is_time(time) {
            RowLayout::CombinedDateTime
        } else {
            RowLayout::Unrecognized
        };
    }

    match columns.get(1).map(|c| c.as_ref().trim()) {
        Some(second) if is_date(first) && is_time(second) => RowLayout::SplitDateTime,
        _ => RowLayout::Unrecognized,
    }
}

fn all_digits(s: &str) -> bool {
    s.bytes().all(|b| b.is_ascii_digit())
}

/// `YYYYMMDDHHMMSS`
fn is_compact_stamp(s: &str) -> bool {
    s.len() == 14 && all_digits(s)
}

/// `YYYYMMDD` or `YYYY.MM.DD`
fn is_date(s: &str) -> bool {
    match s.len() {
        8 => all_digits(s),
        10 => s.bytes().enumerate().all(|(i, b)| match i {
            4 | 7 => b == b'.',
            _ => b.is_ascii_digit(),
        }),
        _ => false,
    }
}

/// `HHMMSS` or `HH:MM`
fn is_time(s: &str) -> bool {
    match s.len() {
        6 => all_digits(s),
        5 => s.bytes().enumerate().all(|(i, b)| match i {
            2 => b == b':',
            _ => b.is_ascii_digit(),
        }),
        _ => false,
    }
}
