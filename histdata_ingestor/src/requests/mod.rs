//! End-to-end ingestion of monthly archives: download, extract, parse and
//! publish, for one month or a sequence of months.

pub mod batch;
pub mod single;

pub use batch::{RetryPolicy, ingest_batch};
pub use single::{IngestOptions, IngestReport, ingest};
