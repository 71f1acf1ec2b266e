use pushgateway_client::{
    Aggregator, ClientTimeouts, GatewayError, GroupKey, PushgatewayClient,
    reconcile::{DeleteOutcome, ReconcileStatus, WipeOutcome, reconcile},
};
use reqwest::StatusCode;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{body_string, header, method, path},
};

const EXPOSITION: &str = r#"# HELP fx_ohlc_open Open price
# TYPE fx_ohlc_open gauge
fx_ohlc_open{currency_pair="EURUSD",instance="EURUSD_2023_01",job="j1",timeframe="1m",timestamp="20230103220000"} 1.0531
fx_ohlc_open{currency_pair="EURUSD",instance="EURUSD_2023_02",job="j1",timeframe="1m",timestamp="20230201000000"} 1.0811
# HELP push_time_seconds Last Unix time when changing this group in the Pushgateway succeeded.
# TYPE push_time_seconds gauge
push_time_seconds{instance="",job="j2"} 1.7e+09
"#;

fn client(server: &MockServer) -> PushgatewayClient {
    PushgatewayClient::new(&server.uri(), ClientTimeouts::default()).unwrap()
}

#[tokio::test]
async fn push_puts_text_payload_to_group_path() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/metrics/job/histdata_fx_ingestor/instance/EURUSD_2023_01"))
        .and(header("content-type", "text/plain; version=0.0.4; charset=utf-8"))
        .and(body_string("fx_ohlc_open 1\n"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let key = GroupKey::with_instance("histdata_fx_ingestor", "EURUSD_2023_01");
    client(&server)
        .push(&key, "fx_ohlc_open 1\n".to_string())
        .await
        .unwrap();
}

#[tokio::test]
async fn push_rejection_is_a_status_error() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(400).set_body_string("text format parsing error"))
        .mount(&server)
        .await;

    let err = client(&server)
        .push(&GroupKey::job("j"), "garbage".to_string())
        .await
        .unwrap_err();

    match err {
        GatewayError::Status { status, body, .. } => {
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert!(body.contains("parsing error"));
        }
        other => panic!("expected status error, got {other:?}"),
    }
}

#[tokio::test]
async fn delete_and_wipe_return_raw_status() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/metrics/job/j1/instance/i1"))
        .respond_with(ResponseTemplate::new(202))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/api/v1/admin/wipe"))
        .respond_with(ResponseTemplate::new(405))
        .mount(&server)
        .await;

    let gw = client(&server);
    assert_eq!(
        gw.delete(&GroupKey::with_instance("j1", "i1")).await.unwrap(),
        StatusCode::ACCEPTED
    );
    assert_eq!(gw.admin_wipe().await.unwrap(), StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn reconcile_discovers_and_deletes_over_http() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/api/v1/admin/wipe"))
        .respond_with(ResponseTemplate::new(405))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/metrics"))
        .respond_with(ResponseTemplate::new(200).set_body_string(EXPOSITION))
        .expect(1)
        .mount(&server)
        .await;
    for instance in ["EURUSD_2023_01", "EURUSD_2023_02"] {
        Mock::given(method("DELETE"))
            .and(path(format!("/metrics/job/j1/instance/{instance}")))
            .respond_with(ResponseTemplate::new(202))
            .expect(1)
            .mount(&server)
            .await;
    }
    Mock::given(method("DELETE"))
        .and(path("/metrics/job/j1"))
        .respond_with(ResponseTemplate::new(202))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/metrics/job/j2"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let report = reconcile(&client(&server)).await;

    assert_eq!(report.wipe, WipeOutcome::Disabled);
    assert_eq!(report.status, ReconcileStatus::Cleared);
    assert_eq!(report.deletions.len(), 3);
    assert_eq!(report.deletions[2].group, GroupKey::job("j2"));
    assert_eq!(report.deletions[2].outcome, DeleteOutcome::AlreadyAbsent);
}

#[tokio::test]
async fn successful_wipe_never_reads_metrics() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/api/v1/admin/wipe"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/metrics"))
        .respond_with(ResponseTemplate::new(200).set_body_string(EXPOSITION))
        .expect(0)
        .mount(&server)
        .await;

    let report = reconcile(&client(&server)).await;
    assert_eq!(report.status, ReconcileStatus::Wiped);
}

#[tokio::test]
async fn metrics_read_failure_after_wipe_answer() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/api/v1/admin/wipe"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/metrics"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let report = reconcile(&client(&server)).await;
    assert_eq!(report.wipe, WipeOutcome::NotImplemented);
    assert_eq!(report.status, ReconcileStatus::DiscoveryFailed);
}

#[tokio::test]
async fn unreachable_gateway_is_reported_not_raised() {
    // Nothing listens on port 1.
    let gw = PushgatewayClient::new("http://127.0.0.1:1", ClientTimeouts::default()).unwrap();

    let report = reconcile(&gw).await;

    assert!(matches!(report.wipe, WipeOutcome::Unreachable(_)));
    assert_eq!(report.status, ReconcileStatus::Unreachable);
    assert!(report.deletions.is_empty());
}
