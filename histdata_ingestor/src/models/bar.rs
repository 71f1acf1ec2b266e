//! Canonical in-memory representation of a one-minute FX price bar.
//!
//! Bars are produced by the row parser and consumed by the batch publisher.

use chrono::NaiveDateTime;

use crate::models::timeframe::TimeFrame;

/// Format of the `timestamp` label attached to every published series.
pub const TIMESTAMP_LABEL_FORMAT: &str = "%Y%m%d%H%M%S";

/// A single OHLC bar for one instrument and one minute.
///
/// HistData timestamps are provider wall clock (EST, no daylight saving), so
/// they are kept naive rather than pinned to UTC.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceBar {
    /// Currency pair, upper-case (e.g. "EURUSD").
    pub instrument: String,

    /// Bar interval; always one minute for HistData ASCII exports.
    pub timeframe: TimeFrame,

    /// Start of the bar, minute resolution.
    pub timestamp: NaiveDateTime,

    /// Opening price.
    pub open: f64,

    /// Highest price during the bar interval.
    pub high: f64,

    /// Lowest price during the bar interval.
    pub low: f64,

    /// Closing price.
    pub close: f64,
}

impl PriceBar {
    /// The bar timestamp rendered as a series label, e.g. `20230103220000`.
    pub fn timestamp_label(&self) -> String {
        self.timestamp.format(TIMESTAMP_LABEL_FORMAT).to_string()
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    #[test]
    fn timestamp_label_is_compact() {
        let bar = PriceBar {
            instrument: "EURUSD".into(),
            timeframe: TimeFrame::one_minute(),
            timestamp: NaiveDate::from_ymd_opt(2023, 1, 3)
                .unwrap()
                .and_hms_opt(22, 0, 0)
                .unwrap(),
            open: 1.0531,
            high: 1.0534,
            low: 1.053,
            close: 1.0533,
        };
        assert_eq!(bar.timestamp_label(), "20230103220000");
    }
}
