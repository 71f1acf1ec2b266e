use std::fmt;

use pushgateway_client::GroupKey;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DownloadRequestError {
    #[error("Instrument must be a non-empty alphanumeric pair, got {0:?}")]
    InvalidInstrument(String),

    #[error("Month must be within 1..=12, got {0}")]
    InvalidMonth(u32),

    #[error("Year out of range: {0}")]
    InvalidYear(i32),
}

/// Identifies one monthly archive: instrument, year and month.
///
/// Everything downstream (provider URL, form payload, grouping key) is
/// derived from these three values, so equal requests always publish under
/// the same group.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct DownloadRequest {
    instrument: String,
    year: i32,
    month: u32,
}

impl DownloadRequest {
    pub fn new(instrument: &str, year: i32, month: u32) -> Result<Self, DownloadRequestError> {
        let instrument = instrument.trim();
        if instrument.is_empty() || !instrument.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(DownloadRequestError::InvalidInstrument(instrument.to_string()));
        }
        if !(1..=12).contains(&month) {
            return Err(DownloadRequestError::InvalidMonth(month));
        }
        if !(1970..=9999).contains(&year) {
            return Err(DownloadRequestError::InvalidYear(year));
        }
        Ok(Self {
            instrument: instrument.to_ascii_uppercase(),
            year,
            month,
        })
    }

    /// Upper-case instrument, as used in series labels.
    pub fn instrument(&self) -> &str {
        &self.instrument
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    /// `<INSTRUMENT>_<year>_<MM>`, e.g. `EURUSD_2023_01`.
    pub fn instance_label(&self) -> String {
        format!("{}_{}_{:02}", self.instrument, self.year, self.month)
    }

    pub fn group_key(&self, job: &str) -> GroupKey {
        GroupKey::with_instance(job, self.instance_label())
    }

    /// The request for the following calendar month.
    pub fn next_month(&self) -> Self {
        let (year, month) = if self.month == 12 {
            (self.year + 1, 1)
        } else {
            (self.year, self.month + 1)
        };
        Self {
            instrument: self.instrument.clone(),
            year,
            month,
        }
    }

    /// `count` consecutive monthly requests starting with this one.
    pub fn months(&self, count: usize) -> Vec<Self> {
        std::iter::successors(Some(self.clone()), |r| Some(r.next_month()))
            .take(count)
            .collect()
    }
}

impl fmt::Display for DownloadRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}-{:02}", self.instrument, self.year, self.month)
    }
}
