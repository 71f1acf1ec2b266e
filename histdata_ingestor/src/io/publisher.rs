//! Pushing bars to the gateway in bounded chunks.
//!
//! The gateway has no bulk insert, so every bar becomes four gauge series
//! (`fx_ohlc_open|high|low|close`) distinguished by a `timestamp` label. A
//! chunk holds at most `chunk_size` bars and is pushed in one PUT under the
//! request's group key. Because a PUT replaces the whole group, only the last
//! chunk pushed for a key stays visible on the gateway.

use std::num::NonZeroUsize;

use prometheus::{GaugeVec, Opts, Registry, TextEncoder};
use pushgateway_client::{Aggregator, GroupKey};
use serde::Serialize;
use snafu::{Backtrace, ResultExt, Snafu};
use tracing::{debug, error, info};

use crate::models::bar::PriceBar;

pub const DEFAULT_CHUNK_SIZE: usize = 1000;

const SERIES_LABELS: [&str; 3] = ["currency_pair", "timeframe", "timestamp"];

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum PublishError {
    /// Building or encoding a chunk registry failed.
    #[snafu(display("Metric registry error: {source}"))]
    Metrics {
        source: prometheus::Error,
        backtrace: Backtrace,
    },
}

/// One chunk's metric container. Built fresh per chunk and consumed by
/// [`OhlcChunk::into_payload`].
pub struct OhlcChunk {
    registry: Registry,
    open: GaugeVec,
    high: GaugeVec,
    low: GaugeVec,
    close: GaugeVec,
    len: usize,
}

impl OhlcChunk {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();
        let gauge = |name: &str, help: &str| -> Result<GaugeVec, prometheus::Error> {
            let vec = GaugeVec::new(Opts::new(name, help), &SERIES_LABELS)?;
            registry.register(Box::new(vec.clone()))?;
            Ok(vec)
        };

        let open = gauge("fx_ohlc_open", "Open price")?;
        let high = gauge("fx_ohlc_high", "High price")?;
        let low = gauge("fx_ohlc_low", "Low price")?;
        let close = gauge("fx_ohlc_close", "Close price")?;

        Ok(Self {
            registry,
            open,
            high,
            low,
            close,
            len: 0,
        })
    }

    pub fn record(&mut self, bar: &PriceBar) {
        let timeframe = bar.timeframe.to_string();
        let timestamp = bar.timestamp_label();
        let labels = [bar.instrument.as_str(), timeframe.as_str(), timestamp.as_str()];

        self.open.with_label_values(&labels).set(bar.open);
        self.high.with_label_values(&labels).set(bar.high);
        self.low.with_label_values(&labels).set(bar.low);
        self.close.with_label_values(&labels).set(bar.close);
        self.len += 1;
    }

    /// Bars recorded so far.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Encodes the chunk in the text exposition format.
    pub fn into_payload(self) -> Result<String, prometheus::Error> {
        let mut payload = String::new();
        TextEncoder::new().encode_utf8(&self.registry.gather(), &mut payload)?;
        Ok(payload)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChunkFailure {
    /// 0-based position of the chunk in the push sequence.
    pub index: usize,
    pub bars: usize,
    pub error: String,
    /// The gateway was not reached at all.
    pub transport: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PublishReport {
    pub bars_seen: usize,
    pub bars_pushed: usize,
    pub chunks_pushed: usize,
    pub failed_chunks: Vec<ChunkFailure>,
}

impl PublishReport {
    pub fn is_complete(&self) -> bool {
        self.failed_chunks.is_empty()
    }

    /// Every attempted push failed without reaching the gateway.
    pub fn is_unreachable(&self) -> bool {
        self.chunks_pushed == 0
            && !self.failed_chunks.is_empty()
            && self.failed_chunks.iter().all(|f| f.transport)
    }
}

/// Pushes `bars`, in order, in chunks of at most `chunk_size` under `group`.
///
/// A failed push is logged and tallied; the remaining chunks are still
/// pushed. Only a registry failure aborts the run.
pub async fn publish<A, I>(
    gateway: &A,
    bars: I,
    group: &GroupKey,
    chunk_size: NonZeroUsize,
) -> Result<PublishReport, PublishError>
where
    A: Aggregator + ?Sized,
    I: IntoIterator<Item = PriceBar>,
{
    let mut report = PublishReport::default();
    let mut chunk = OhlcChunk::new().context(MetricsSnafu)?;
    let mut index = 0;

    for bar in bars {
        report.bars_seen += 1;
        chunk.record(&bar);
        if chunk.len() >= chunk_size.get() {
            let full = std::mem::replace(&mut chunk, OhlcChunk::new().context(MetricsSnafu)?);
            push_chunk(gateway, group, index, full, &mut report).await?;
            index += 1;
        }
    }
    if !chunk.is_empty() {
        push_chunk(gateway, group, index, chunk, &mut report).await?;
    }

    info!(
        %group,
        bars = report.bars_seen,
        pushed = report.chunks_pushed,
        failed = report.failed_chunks.len(),
        "publish finished"
    );
    Ok(report)
}

async fn push_chunk<A: Aggregator + ?Sized>(
    gateway: &A,
    group: &GroupKey,
    index: usize,
    chunk: OhlcChunk,
    report: &mut PublishReport,
) -> Result<(), PublishError> {
    let bars = chunk.len();
    let payload = chunk.into_payload().context(MetricsSnafu)?;

    match gateway.push(group, payload).await {
        Ok(()) => {
            debug!(%group, chunk = index, bars, "pushed chunk");
            report.chunks_pushed += 1;
            report.bars_pushed += bars;
        }
        Err(e) => {
            error!(%group, chunk = index, bars, error = %e, "failed to push chunk");
            report.failed_chunks.push(ChunkFailure {
                index,
                bars,
                error: e.to_string(),
                transport: e.is_transport(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use chrono::{Duration, NaiveDate};
    use pushgateway_client::{GatewayError, memory::InMemoryGateway};
    use reqwest::StatusCode;

    use super::*;
    use crate::models::timeframe::TimeFrame;

    fn bars(n: usize) -> Vec<PriceBar> {
        let start = NaiveDate::from_ymd_opt(2023, 1, 3)
            .unwrap()
            .and_hms_opt(22, 0, 0)
            .unwrap();
        (0..n)
            .map(|i| PriceBar {
                instrument: "EURUSD".into(),
                timeframe: TimeFrame::one_minute(),
                timestamp: start + Duration::minutes(i as i64),
                open: 1.05,
                high: 1.06,
                low: 1.04,
                close: 1.055 + i as f64 / 10_000.0,
            })
            .collect()
    }

    fn size(n: usize) -> NonZeroUsize {
        NonZeroUsize::new(n).unwrap()
    }

    fn key() -> GroupKey {
        GroupKey::with_instance("histdata_fx_ingestor", "EURUSD_2023_01")
    }

    #[test]
    fn chunk_payload_has_four_series_per_bar() {
        let mut chunk = OhlcChunk::new().unwrap();
        for bar in &bars(2) {
            chunk.record(bar);
        }
        assert_eq!(chunk.len(), 2);

        let payload = chunk.into_payload().unwrap();
        let samples: Vec<_> = pushgateway_client::exposition::parse_exposition(&payload).collect();
        assert_eq!(samples.len(), 8);

        let close = samples
            .iter()
            .find(|s| s.name == "fx_ohlc_close" && s.label("timestamp") == Some("20230103220100"))
            .unwrap();
        assert_eq!(close.label("currency_pair"), Some("EURUSD"));
        assert_eq!(close.label("timeframe"), Some("1m"));
        assert!((close.value - 1.0551).abs() < 1e-12);
    }

    #[tokio::test]
    async fn pushes_ceil_n_over_c_chunks() {
        let gw = InMemoryGateway::new();
        let report = publish(&gw, bars(2500), &key(), size(1000)).await.unwrap();

        assert_eq!(report.chunks_pushed, 3);
        assert_eq!(report.bars_pushed, 2500);
        let sizes: Vec<_> = gw.pushes().into_iter().map(|(_, series)| series).collect();
        assert_eq!(sizes, vec![4000, 4000, 2000]);
    }

    #[tokio::test]
    async fn exact_multiple_has_no_trailing_push() {
        let gw = InMemoryGateway::new();
        let report = publish(&gw, bars(6), &key(), size(3)).await.unwrap();
        assert_eq!(report.chunks_pushed, 2);
        assert!(report.failed_chunks.is_empty());
        assert_eq!(gw.pushes().len(), 2);
    }

    #[tokio::test]
    async fn no_bars_no_push() {
        let gw = InMemoryGateway::new();
        let report = publish(&gw, Vec::new(), &key(), size(10)).await.unwrap();
        assert_eq!(report, PublishReport::default());
        assert!(gw.pushes().is_empty());
    }

    #[tokio::test]
    async fn only_last_chunk_stays_visible() {
        let gw = InMemoryGateway::new();
        publish(&gw, bars(5), &key(), size(2)).await.unwrap();

        let visible: Vec<_> = gw
            .series(&key())
            .into_iter()
            .filter(|s| s.name == "fx_ohlc_open")
            .filter_map(|s| s.label("timestamp").map(str::to_string))
            .collect();
        assert_eq!(visible, vec!["20230103220400"]);
    }

    #[tokio::test]
    async fn rerun_replaces_previous_content() {
        let gw = InMemoryGateway::new();
        publish(&gw, bars(3), &key(), size(10)).await.unwrap();
        publish(&gw, bars(1), &key(), size(10)).await.unwrap();

        let timestamps: Vec<_> = gw
            .series(&key())
            .into_iter()
            .filter_map(|s| s.label("timestamp").map(str::to_string))
            .collect();
        assert!(timestamps.iter().all(|t| t == "20230103220000"));
        assert_eq!(timestamps.len(), 4);
    }

    /// Fails the push with the given 0-based index, delegates the rest.
    struct FailingOnce {
        inner: InMemoryGateway,
        fail_at: usize,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Aggregator for FailingOnce {
        async fn push(&self, key: &GroupKey, payload: String) -> Result<(), GatewayError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == self.fail_at {
                return Err(GatewayError::Status {
                    url: "http://gw/metrics".into(),
                    status: StatusCode::BAD_GATEWAY,
                    body: String::new(),
                });
            }
            self.inner.push(key, payload).await
        }

        async fn delete(&self, key: &GroupKey) -> Result<StatusCode, GatewayError> {
            self.inner.delete(key).await
        }

        async fn admin_wipe(&self) -> Result<StatusCode, GatewayError> {
            self.inner.admin_wipe().await
        }

        async fn fetch_exposition(&self) -> Result<String, GatewayError> {
            self.inner.fetch_exposition().await
        }
    }

    #[tokio::test]
    async fn failed_chunk_does_not_stop_the_rest() {
        let gw = FailingOnce {
            inner: InMemoryGateway::new(),
            fail_at: 1,
            calls: AtomicUsize::new(0),
        };
        let report = publish(&gw, bars(7), &key(), size(3)).await.unwrap();

        assert_eq!(report.bars_seen, 7);
        assert_eq!(report.chunks_pushed, 2);
        assert_eq!(report.bars_pushed, 4);
        assert_eq!(report.failed_chunks.len(), 1);
        assert_eq!(report.failed_chunks[0].index, 1);
        assert_eq!(report.failed_chunks[0].bars, 3);
        assert!(!report.failed_chunks[0].transport);
        assert!(!report.is_unreachable());
        assert_eq!(gw.inner.pushes().len(), 2);
    }
}
