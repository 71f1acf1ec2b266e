//! Provider abstraction for archive-based market data sources.
//!
//! This module defines the [`ArchiveProvider`] trait, the interface for
//! resolving a [`DownloadRequest`] into the raw bytes of a downloadable
//! archive. [`histdata::HistDataProvider`] implements it for HistData.com's
//! form-protected downloads.
//!
//! # Example
//!
//! ```rust
//! use async_trait::async_trait;
//! use histdata_ingestor::models::request_params::DownloadRequest;
//! use histdata_ingestor::providers::{ArchiveProvider, ResolutionError};
//!
//! struct FixtureProvider(Vec<u8>);
//!
//! #[async_trait]
//! impl ArchiveProvider for FixtureProvider {
//!     async fn fetch_archive(
//!         &self,
//!         _request: &DownloadRequest,
//!     ) -> Result<Vec<u8>, ResolutionError> {
//!         Ok(self.0.clone())
//!     }
//! }
//! ```

pub mod histdata;

use async_trait::async_trait;
use reqwest::StatusCode;
use snafu::{Backtrace, Snafu};

use crate::models::request_params::DownloadRequest;

/// Trait for resolving a monthly download request into archive bytes.
///
/// Implementations do not retry; retry policy belongs to the caller
/// (see [`crate::requests::batch`]).
#[async_trait]
pub trait ArchiveProvider: Send + Sync {
    /// Fetches the complete archive for `request`.
    ///
    /// # Returns
    ///
    /// * `Ok(Vec<u8>)` - The raw archive bytes.
    /// * `Err(ResolutionError)` - If any step of the download fails. There is
    ///   no partial success.
    async fn fetch_archive(&self, request: &DownloadRequest) -> Result<Vec<u8>, ResolutionError>;
}

/// Errors that can occur while resolving a download.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ResolutionError {
    /// Network failure (connection refused, timeout, ...).
    #[snafu(display("Request to {url} failed: {source}"))]
    Request {
        url: String,
        source: reqwest::Error,
        backtrace: Backtrace,
    },

    /// The provider answered with a non-success status.
    #[snafu(display("{url} returned HTTP {status}"))]
    HttpStatus {
        url: String,
        status: StatusCode,
        backtrace: Backtrace,
    },

    /// The page did not contain the expected download form.
    #[snafu(display("Download form `{form_id}` not found on {url}"))]
    FormNotFound {
        url: String,
        form_id: String,
        backtrace: Backtrace,
    },

    /// The download form lacks one of the required hidden inputs.
    #[snafu(display("Download form is missing required field `{field}` (found: {found:?})"))]
    MissingField {
        field: String,
        found: Vec<String>,
        backtrace: Backtrace,
    },

    /// The form's action attribute is not a usable URL.
    #[snafu(display("Invalid form action {action:?}: {source}"))]
    InvalidAction {
        action: String,
        source: url::ParseError,
        backtrace: Backtrace,
    },

    /// The form submit returned something other than an archive, usually an
    /// anti-bot challenge page or a rate-limit notice.
    #[snafu(display("Expected a ZIP archive but got content type {content_type:?}"))]
    UnexpectedContentType {
        content_type: String,
        /// Leading characters of a text/HTML body.
        excerpt: Option<String>,
        backtrace: Backtrace,
    },

    /// The configured base URL does not produce a valid page URL.
    #[snafu(display("Invalid provider URL {url:?}: {source}"))]
    InvalidUrl {
        url: String,
        source: url::ParseError,
        backtrace: Backtrace,
    },

    /// A configured header value contains invalid characters.
    #[snafu(display("Invalid header value: {source}"))]
    InvalidHeader {
        source: reqwest::header::InvalidHeaderValue,
        backtrace: Backtrace,
    },

    /// failed to init reqwest client
    #[snafu(display("Failed to build HTTP client: {source}"))]
    ClientBuild {
        source: reqwest::Error,
        backtrace: Backtrace,
    },
}

impl ResolutionError {
    /// Whether trying the same request again may succeed: transport failures,
    /// 5xx and 429 answers.
    pub fn is_retryable(&self) -> bool {
        match self {
            ResolutionError::Request { .. } => true,
            ResolutionError::HttpStatus { status, .. } => {
                status.is_server_error() || *status == StatusCode::TOO_MANY_REQUESTS
            }
            _ => false,
        }
    }
}
