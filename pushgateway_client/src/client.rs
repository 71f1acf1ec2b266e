//! The aggregator surface used by publishing and cleanup.
//!
//! [`Aggregator`] is the seam between the pipelines and the network: the HTTP
//! implementation is [`PushgatewayClient`], and tests substitute an in-memory
//! gateway (feature `test-util`).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode, header};
use tracing::debug;
use url::Url;

use crate::{errors::GatewayError, grouping::GroupKey};

const TEXT_FORMAT: &str = "text/plain; version=0.0.4; charset=utf-8";
const WIPE_PATH: &str = "api/v1/admin/wipe";
const ERROR_BODY_LIMIT: usize = 500;

/// Read/write surface of a push-based metrics aggregator.
///
/// Status interpretation for `delete` and `admin_wipe` is left to the caller
/// (the reconciler distinguishes 202/404/405); `push` and `fetch_exposition`
/// turn any non-success status into [`GatewayError::Status`].
#[async_trait]
pub trait Aggregator: Send + Sync {
    /// Replaces everything held under `key` with the series in `payload`
    /// (text exposition format).
    async fn push(&self, key: &GroupKey, payload: String) -> Result<(), GatewayError>;

    /// Deletes the group addressed by exactly `key`.
    async fn delete(&self, key: &GroupKey) -> Result<StatusCode, GatewayError>;

    /// Asks the gateway to drop every group at once.
    async fn admin_wipe(&self) -> Result<StatusCode, GatewayError>;

    /// Returns the full text exposition of everything the gateway holds.
    async fn fetch_exposition(&self) -> Result<String, GatewayError>;
}

/// Per-operation request timeouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientTimeouts {
    /// Metrics push; payloads can be several thousand series.
    pub push: Duration,
    /// Wipe, delete and exposition fetch.
    pub admin: Duration,
}

impl Default for ClientTimeouts {
    fn default() -> Self {
        Self {
            push: Duration::from_secs(30),
            admin: Duration::from_secs(10),
        }
    }
}

/// HTTP implementation of [`Aggregator`] for a Prometheus Pushgateway.
#[derive(Debug, Clone)]
pub struct PushgatewayClient {
    client: Client,
    base: Url,
    timeouts: ClientTimeouts,
}

impl PushgatewayClient {
    /// Creates a client for the gateway at `base_url` (e.g. `http://localhost:9091`).
    pub fn new(base_url: &str, timeouts: ClientTimeouts) -> Result<Self, GatewayError> {
        let base = Url::parse(base_url)?;
        if base.cannot_be_a_base() {
            return Err(GatewayError::CannotBeABase(base_url.to_string()));
        }
        let client = Client::builder().build()?;
        Ok(Self {
            client,
            base,
            timeouts,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn endpoint(&self, path: &str) -> Result<Url, GatewayError> {
        let mut base = self.base.clone();
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Ok(base.join(path)?)
    }
}

#[async_trait]
impl Aggregator for PushgatewayClient {
    async fn push(&self, key: &GroupKey, payload: String) -> Result<(), GatewayError> {
        let url = key.url(&self.base)?;
        debug!(%url, bytes = payload.len(), "pushing metrics");

        let response = self
            .client
            .put(url.clone())
            .header(header::CONTENT_TYPE, TEXT_FORMAT)
            .body(payload)
            .timeout(self.timeouts.push)
            .send()
            .await?;

        ensure_success(url, response).await.map(|_| ())
    }

    async fn delete(&self, key: &GroupKey) -> Result<StatusCode, GatewayError> {
        let url = key.url(&self.base)?;
        debug!(%url, "deleting group");

        let response = self
            .client
            .delete(url)
            .timeout(self.timeouts.admin)
            .send()
            .await?;
        Ok(response.status())
    }

    async fn admin_wipe(&self) -> Result<StatusCode, GatewayError> {
        let url = self.endpoint(WIPE_PATH)?;
        debug!(%url, "requesting admin wipe");

        let response = self
            .client
            .put(url)
            .timeout(self.timeouts.admin)
            .send()
            .await?;
        Ok(response.status())
    }

    async fn fetch_exposition(&self) -> Result<String, GatewayError> {
        let url = self.endpoint("metrics")?;
        debug!(%url, "fetching exposition");

        let response = self
            .client
            .get(url.clone())
            .timeout(self.timeouts.admin)
            .send()
            .await?;
        let response = ensure_success(url, response).await?;
        Ok(response.text().await?)
    }
}

async fn ensure_success(
    url: Url,
    response: reqwest::Response,
) -> Result<reqwest::Response, GatewayError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<unreadable body>".to_string());
    Err(GatewayError::Status {
        url: url.to_string(),
        status,
        body: body.chars().take(ERROR_BODY_LIMIT).collect(),
    })
}
