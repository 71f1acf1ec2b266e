use std::time::Duration;

use pushgateway_client::Aggregator;
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use crate::{
    errors::IngestError,
    models::request_params::DownloadRequest,
    providers::ArchiveProvider,
    requests::single::{IngestOptions, IngestReport, ingest},
};

/// Caller-side retry for downloads that failed transiently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetryPolicy {
    /// Attempts after the first one.
    pub max_retries: u32,
    /// Delay before the first retry; doubled for each further retry.
    pub base_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 1000,
        }
    }
}

/// Upper bound for a single backoff sleep.
pub const MAX_RETRY_DELAY: Duration = Duration::from_secs(300);

impl RetryPolicy {
    /// Delay before retry number `retry` (0-based), capped at
    /// [`MAX_RETRY_DELAY`].
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = 1u64.checked_shl(retry).unwrap_or(u64::MAX);
        Duration::from_millis(self.base_delay_ms.saturating_mul(factor)).min(MAX_RETRY_DELAY)
    }
}

/// Ingests `requests` one after another.
///
/// Each request is retried under `policy` while its error is retryable. The
/// result list has one entry per request, in order; a failed month never
/// stops the following ones.
pub async fn ingest_batch<P, A>(
    provider: &P,
    gateway: &A,
    requests: &[DownloadRequest],
    options: &IngestOptions,
    policy: RetryPolicy,
) -> Vec<Result<IngestReport, IngestError>>
where
    P: ArchiveProvider + ?Sized,
    A: Aggregator + ?Sized,
{
    let mut results = Vec::with_capacity(requests.len());
    for request in requests {
        let mut retry = 0;
        let result = loop {
            match ingest(provider, gateway, request, options).await {
                Ok(report) => break Ok(report),
                Err(e) if e.is_retryable() && retry < policy.max_retries => {
                    let delay = policy.delay_for(retry);
                    warn!(
                        %request,
                        error = %e,
                        attempt = retry + 1,
                        delay = ?delay,
                        "retrying after transient failure"
                    );
                    tokio::time::sleep(delay).await;
                    retry += 1;
                }
                Err(e) => {
                    error!(%request, error = %e, "ingestion failed");
                    break Err(e);
                }
            }
        };
        results.push(result);
    }
    results
}
