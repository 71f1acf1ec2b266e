use snafu::Snafu;

use crate::{
    io::{archive::ExtractionError, publisher::PublishError},
    providers::ResolutionError,
};

/// Why one monthly ingestion failed as a whole.
///
/// Row skips and failed chunk pushes are not errors at this level; they are
/// tallied in the ingestion report.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum IngestError {
    #[snafu(display("Failed to download archive: {source}"))]
    Resolve {
        #[snafu(backtrace)]
        source: ResolutionError,
    },

    #[snafu(display("Failed to extract archive: {source}"))]
    Extract {
        #[snafu(backtrace)]
        source: ExtractionError,
    },

    #[snafu(display("Failed to publish bars: {source}"))]
    Publish {
        #[snafu(backtrace)]
        source: PublishError,
    },
}

impl IngestError {
    /// Only download failures caused by the network or a transient server
    /// answer are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            IngestError::Resolve { source } => source.is_retryable(),
            _ => false,
        }
    }
}
