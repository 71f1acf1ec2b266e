use reqwest::StatusCode;
use thiserror::Error;

/// Errors raised while talking to a Pushgateway.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Transport-level failure (connection refused, timeout, TLS, ...).
    #[error("Pushgateway request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The gateway answered with a status the caller treats as failure.
    #[error("Pushgateway returned {status} for {url}: {body}")]
    Status {
        url: String,
        status: StatusCode,
        body: String,
    },

    #[error("Invalid Pushgateway URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The base URL cannot carry path segments (e.g. `mailto:`).
    #[error("Pushgateway URL cannot be a base: {0}")]
    CannotBeABase(String),
}

impl GatewayError {
    /// True when the gateway was never reached.
    pub fn is_transport(&self) -> bool {
        matches!(self, GatewayError::Request(_))
    }
}
