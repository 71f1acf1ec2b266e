//! Runtime configuration.
//!
//! Every value has a default, so an empty (or absent) TOML file is valid.
//! Environment variables override the file:
//!
//! | variable | field |
//! |---|---|
//! | `PUSHGATEWAY_URL` | `pushgateway.url` |
//! | `PUSHGATEWAY_JOB` | `pushgateway.job` |
//! | `PUSH_CHUNK_SIZE` | `pushgateway.chunk_size` |
//! | `HISTDATA_BASE_URL` | `histdata.base_url` |
//!
//! ```toml
//! [pushgateway]
//! url = "http://localhost:9091"
//! job = "histdata_fx_ingestor"
//! chunk_size = 1000
//!
//! [histdata]
//! download_timeout_secs = 120
//!
//! [retry]
//! max_retries = 5
//! base_delay_ms = 2000
//! ```

use std::{num::NonZeroUsize, path::Path, time::Duration};

use pushgateway_client::ClientTimeouts;
use serde::{Deserialize, Serialize};
use shared_utils::{
    config::{ConfigError, load_toml},
    env::{get_env_var_opt, parse_env_var},
};
use tracing::debug;
use url::Url;

use crate::{
    io::publisher::DEFAULT_CHUNK_SIZE,
    providers::histdata::{DEFAULT_BASE_URL, DEFAULT_USER_AGENT, HistDataSettings},
    requests::batch::RetryPolicy,
};

pub const DEFAULT_PUSHGATEWAY_URL: &str = "http://localhost:9091";
pub const DEFAULT_JOB: &str = "histdata_fx_ingestor";

const DEFAULT_CHUNK: NonZeroUsize = match NonZeroUsize::new(DEFAULT_CHUNK_SIZE) {
    Some(n) => n,
    None => panic!("default chunk size must be non-zero"),
};

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IngestorConfig {
    pub pushgateway: PushgatewayConfig,
    pub histdata: HistDataConfig,
    pub retry: RetryPolicy,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PushgatewayConfig {
    pub url: String,
    pub job: String,
    /// Maximum bars per push.
    pub chunk_size: NonZeroUsize,
    pub push_timeout_secs: u64,
    /// Wipe, delete and `/metrics` fetch.
    pub admin_timeout_secs: u64,
}

impl Default for PushgatewayConfig {
    fn default() -> Self {
        let timeouts = ClientTimeouts::default();
        Self {
            url: DEFAULT_PUSHGATEWAY_URL.to_string(),
            job: DEFAULT_JOB.to_string(),
            chunk_size: DEFAULT_CHUNK,
            push_timeout_secs: timeouts.push.as_secs(),
            admin_timeout_secs: timeouts.admin.as_secs(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HistDataConfig {
    pub base_url: String,
    pub user_agent: String,
    pub page_timeout_secs: u64,
    pub download_timeout_secs: u64,
}

impl Default for HistDataConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            page_timeout_secs: 30,
            download_timeout_secs: 60,
        }
    }
}

impl IngestorConfig {
    /// Reads a TOML file; missing keys take their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        load_toml(path)
    }

    /// File (if any), then environment overrides, then validation.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env_overrides()?;
        config.validate()?;
        debug!(?config, "configuration loaded");
        Ok(config)
    }

    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(url) = get_env_var_opt("PUSHGATEWAY_URL") {
            self.pushgateway.url = url;
        }
        if let Some(job) = get_env_var_opt("PUSHGATEWAY_JOB") {
            self.pushgateway.job = job;
        }
        if let Some(size) = parse_env_var::<NonZeroUsize>("PUSH_CHUNK_SIZE")? {
            self.pushgateway.chunk_size = size;
        }
        if let Some(url) = get_env_var_opt("HISTDATA_BASE_URL") {
            self.histdata.base_url = url;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("pushgateway.url", &self.pushgateway.url),
            ("histdata.base_url", &self.histdata.base_url),
        ] {
            let url = Url::parse(value)
                .map_err(|e| ConfigError::Invalid(format!("{name} {value:?}: {e}")))?;
            if url.cannot_be_a_base() {
                return Err(ConfigError::Invalid(format!(
                    "{name} {value:?} cannot carry a path"
                )));
            }
        }
        if self.pushgateway.job.trim().is_empty() {
            return Err(ConfigError::Invalid("pushgateway.job must not be empty".into()));
        }
        for (name, secs) in [
            ("pushgateway.push_timeout_secs", self.pushgateway.push_timeout_secs),
            ("pushgateway.admin_timeout_secs", self.pushgateway.admin_timeout_secs),
            ("histdata.page_timeout_secs", self.histdata.page_timeout_secs),
            ("histdata.download_timeout_secs", self.histdata.download_timeout_secs),
        ] {
            if secs == 0 {
                return Err(ConfigError::Invalid(format!("{name} must be at least 1")));
            }
        }
        Ok(())
    }

    pub fn client_timeouts(&self) -> ClientTimeouts {
        ClientTimeouts {
            push: Duration::from_secs(self.pushgateway.push_timeout_secs),
            admin: Duration::from_secs(self.pushgateway.admin_timeout_secs),
        }
    }

    pub fn histdata_settings(&self) -> HistDataSettings {
        HistDataSettings {
            base_url: self.histdata.base_url.clone(),
            user_agent: self.histdata.user_agent.clone(),
            page_timeout: Duration::from_secs(self.histdata.page_timeout_secs),
            download_timeout: Duration::from_secs(self.histdata.download_timeout_secs),
        }
    }
}
