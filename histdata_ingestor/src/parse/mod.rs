//! Turning extracted archive text into [`PriceBar`]s.
//!
//! Rows are semicolon-separated without a header. Rows that cannot be parsed
//! are skipped and logged; they never abort the file.

pub mod layout;
pub mod row;

use csv::{ReaderBuilder, StringRecordsIntoIter};
use tracing::warn;

use crate::models::bar::PriceBar;

pub use layout::{RowLayout, classify_layout};
pub use row::{RowError, TIMESTAMP_FORMATS, parse_row, parse_timestamp};

/// Streaming iterator of bars over the rows of one file.
///
/// Skipped rows are counted and can be read back once the iterator has been
/// driven (use `by_ref()` to keep access to it). Skips are identified by their
/// 1-based line in the source text; blank lines are not rows but still count
/// towards line numbers.
pub struct BarReader<'a> {
    instrument: String,
    records: StringRecordsIntoIter<&'a [u8]>,
    rows_seen: usize,
    skipped_lines: Vec<u64>,
}

impl<'a> BarReader<'a> {
    pub fn new(instrument: &str, text: &'a str) -> Self {
        let records = ReaderBuilder::new()
            .delimiter(b';')
            .has_headers(false)
            .flexible(true)
            .from_reader(text.as_bytes())
            .into_records();
        Self {
            instrument: instrument.to_string(),
            records,
            rows_seen: 0,
            skipped_lines: Vec::new(),
        }
    }

    pub fn rows_seen(&self) -> usize {
        self.rows_seen
    }

    pub fn rows_skipped(&self) -> usize {
        self.skipped_lines.len()
    }

    /// Source lines of the skipped rows, in order. `0` marks a row whose
    /// position the reader could not report.
    pub fn skipped_lines(&self) -> &[u64] {
        &self.skipped_lines
    }
}

impl Iterator for BarReader<'_> {
    type Item = PriceBar;

    fn next(&mut self) -> Option<PriceBar> {
        loop {
            let record = self.records.next()?;
            self.rows_seen += 1;

            let record = match record {
                Ok(record) => record,
                Err(e) => {
                    let line = e.position().map_or(0, |p| p.line());
                    self.skipped_lines.push(line);
                    warn!(line, error = %e, "skipping unreadable row");
                    continue;
                }
            };

            let columns: Vec<&str> = record.iter().collect();
            match parse_row(&self.instrument, &columns) {
                Ok(bar) => return Some(bar),
                Err(e) => {
                    let line = record.position().map_or(0, |p| p.line());
                    self.skipped_lines.push(line);
                    warn!(line, raw = %columns.join(";"), reason = %e, "skipping row");
                }
            }
        }
    }
}

/// All bars of a file plus the row tally.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedRows {
    pub bars: Vec<PriceBar>,
    pub rows_seen: usize,
    pub rows_skipped: usize,
    pub skipped_lines: Vec<u64>,
}

/// Parses every row of `text` eagerly.
pub fn parse_rows(instrument: &str, text: &str) -> ParsedRows {
    let mut reader = BarReader::new(instrument, text);
    let bars = reader.by_ref().collect();
    ParsedRows {
        bars,
        rows_seen: reader.rows_seen(),
        rows_skipped: reader.rows_skipped(),
        skipped_lines: reader.skipped_lines().to_vec(),
    }
}
