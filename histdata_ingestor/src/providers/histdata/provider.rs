use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, header};
use snafu::{ResultExt, ensure};
use tracing::{debug, info, warn};
use url::Url;

use crate::{
    models::request_params::DownloadRequest,
    providers::{
        ArchiveProvider, ClientBuildSnafu, HttpStatusSnafu, InvalidHeaderSnafu, InvalidUrlSnafu,
        RequestSnafu, ResolutionError, UnexpectedContentTypeSnafu,
        histdata::form::parse_download_form,
    },
};

pub const DEFAULT_BASE_URL: &str = "https://www.histdata.com/download-free-forex-historical-data/";

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

const ARCHIVE_CONTENT_TYPES: [&str; 3] = [
    "application/zip",
    "application/octet-stream",
    "application/x-zip-compressed",
];
const EXCERPT_LIMIT: usize = 500;

/// Connection settings for [`HistDataProvider`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistDataSettings {
    pub base_url: String,
    pub user_agent: String,
    /// Timeout of the page GET.
    pub page_timeout: Duration,
    /// Timeout of the form POST returning the archive.
    pub download_timeout: Duration,
}

impl Default for HistDataSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            page_timeout: Duration::from_secs(30),
            download_timeout: Duration::from_secs(60),
        }
    }
}

/// Downloads monthly 1-minute ASCII archives from HistData.com.
///
/// The archive sits behind a form carrying a per-session token: the monthly
/// page is fetched first, its `file_down` form is parsed, and the form is
/// posted back with the same cookie session.
pub struct HistDataProvider {
    client: Client,
    base: Url,
    settings: HistDataSettings,
}

impl HistDataProvider {
    pub fn new(settings: HistDataSettings) -> Result<Self, ResolutionError> {
        let mut base = Url::parse(&settings.base_url).context(InvalidUrlSnafu {
            url: settings.base_url.as_str(),
        })?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::USER_AGENT,
            header::HeaderValue::from_str(&settings.user_agent).context(InvalidHeaderSnafu)?,
        );
        headers.insert(
            header::REFERER,
            header::HeaderValue::from_str(base.as_str()).context(InvalidHeaderSnafu)?,
        );

        let client = Client::builder()
            .default_headers(headers)
            .cookie_store(true)
            .build()
            .context(ClientBuildSnafu)?;

        Ok(Self {
            client,
            base,
            settings,
        })
    }

    /// Monthly page URL, e.g.
    /// `<base>?/ascii/1-minute-bar-quotes/eurusd/2023/1`.
    pub fn page_url(&self, request: &DownloadRequest) -> Url {
        let mut url = self.base.clone();
        url.set_query(Some(&format!(
            "/ascii/1-minute-bar-quotes/{}/{}/{}",
            request.instrument().to_ascii_lowercase(),
            request.year(),
            request.month()
        )));
        url
    }

    async fn fetch_page(&self, url: &Url) -> Result<String, ResolutionError> {
        debug!(%url, "fetching download page");
        let response = self
            .client
            .get(url.clone())
            .timeout(self.settings.page_timeout)
            .send()
            .await
            .context(RequestSnafu { url: url.as_str() })?;

        let status = response.status();
        ensure!(status.is_success(), HttpStatusSnafu { url: url.as_str(), status });

        response.text().await.context(RequestSnafu { url: url.as_str() })
    }
}

#[async_trait]
impl ArchiveProvider for HistDataProvider {
    async fn fetch_archive(&self, request: &DownloadRequest) -> Result<Vec<u8>, ResolutionError> {
        let page_url = self.page_url(request);
        let html = self.fetch_page(&page_url).await?;
        let form = parse_download_form(&html, &page_url)?;

        debug!(action = %form.action, "submitting download form");
        let response = self
            .client
            .post(form.action.clone())
            .header(header::REFERER, page_url.as_str())
            .form(&form.fields)
            .timeout(self.settings.download_timeout)
            .send()
            .await
            .context(RequestSnafu {
                url: form.action.as_str(),
            })?;

        let status = response.status();
        ensure!(
            status.is_success(),
            HttpStatusSnafu {
                url: form.action.as_str(),
                status
            }
        );

        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_ascii_lowercase();

        if !ARCHIVE_CONTENT_TYPES.iter().any(|t| content_type.contains(t)) {
            let excerpt = if content_type.starts_with("text/") || content_type.contains("html") {
                let body = response.text().await.unwrap_or_default();
                Some(body.chars().take(EXCERPT_LIMIT).collect::<String>())
            } else {
                None
            };
            warn!(%content_type, %request, "download did not return an archive");
            return UnexpectedContentTypeSnafu {
                content_type,
                excerpt,
            }
            .fail();
        }

        let bytes = response.bytes().await.context(RequestSnafu {
            url: form.action.as_str(),
        })?;
        info!(%request, bytes = bytes.len(), "downloaded archive");
        Ok(bytes.to_vec())
    }
}
