use std::num::NonZeroUsize;

use pushgateway_client::{Aggregator, GroupKey};
use serde::Serialize;
use snafu::ResultExt;
use tracing::{error, info, warn};

use crate::{
    config::IngestorConfig,
    errors::{ExtractSnafu, IngestError, PublishSnafu, ResolveSnafu},
    io::{archive::extract_table, publisher::{PublishReport, publish}},
    models::request_params::DownloadRequest,
    parse::BarReader,
    providers::ArchiveProvider,
};

/// Where and how bars are published.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestOptions {
    pub job: String,
    pub chunk_size: NonZeroUsize,
}

impl From<&IngestorConfig> for IngestOptions {
    fn from(config: &IngestorConfig) -> Self {
        Self {
            job: config.pushgateway.job.clone(),
            chunk_size: config.pushgateway.chunk_size,
        }
    }
}

/// Outcome of one monthly ingestion that got as far as publishing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub request: DownloadRequest,
    pub group: GroupKey,
    /// Name of the archive entry the rows were read from.
    pub entry_name: String,
    pub archive_bytes: usize,
    pub rows_seen: usize,
    pub rows_skipped: usize,
    pub publish: PublishReport,
    /// No chunk reached the aggregator; every push failed in transport.
    pub aggregator_unreachable: bool,
}

/// Downloads, extracts, parses and publishes one month.
///
/// Download and extraction failures abort the month. Skipped rows and failed
/// chunk pushes do not; they are counted in the report.
pub async fn ingest<P, A>(
    provider: &P,
    gateway: &A,
    request: &DownloadRequest,
    options: &IngestOptions,
) -> Result<IngestReport, IngestError>
where
    P: ArchiveProvider + ?Sized,
    A: Aggregator + ?Sized,
{
    info!(%request, "starting ingestion");

    let archive = provider.fetch_archive(request).await.context(ResolveSnafu)?;
    let table = extract_table(&archive).context(ExtractSnafu)?;

    let group = request.group_key(&options.job);
    let mut reader = BarReader::new(request.instrument(), &table.text);
    let published = publish(gateway, reader.by_ref(), &group, options.chunk_size)
        .await
        .context(PublishSnafu)?;

    let aggregator_unreachable = published.is_unreachable();
    if aggregator_unreachable {
        error!(%request, %group, "aggregator unreachable, nothing was published");
    }
    if reader.rows_skipped() > 0 {
        warn!(%request, skipped = reader.rows_skipped(), "some rows could not be parsed");
    }
    info!(
        %request,
        %group,
        rows = reader.rows_seen(),
        bars = published.bars_pushed,
        chunks = published.chunks_pushed,
        "ingestion finished"
    );

    Ok(IngestReport {
        request: request.clone(),
        group,
        entry_name: table.entry_name,
        archive_bytes: archive.len(),
        rows_seen: reader.rows_seen(),
        rows_skipped: reader.rows_skipped(),
        publish: published,
        aggregator_unreachable,
    })
}
