//! Backfills HistData.com 1-minute FX bars into a Prometheus Pushgateway.
//!
//! One ingestion covers one instrument and month: the archive is downloaded
//! through the provider's download form ([`providers`]), unpacked
//! ([`io::archive`]), parsed row by row ([`parse`]) and pushed in bounded
//! chunks ([`io::publisher`]). [`requests`] strings these together, with
//! caller-side retry for whole months.

#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod errors;
pub mod io;
pub mod models;
pub mod parse;
pub mod providers;
pub mod requests;

pub use errors::IngestError;
