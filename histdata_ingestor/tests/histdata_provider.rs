mod common;

use common::{
    EURUSD_2023_01_QUERY, USER_AGENT, download_page, mount_month, provider, query_is, zip_of,
};
use histdata_ingestor::{
    models::request_params::DownloadRequest,
    providers::{ArchiveProvider, ResolutionError},
};
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{body_string, header, method, path},
};

fn eurusd_jan_2023() -> DownloadRequest {
    DownloadRequest::new("EURUSD", 2023, 1).unwrap()
}

#[tokio::test]
async fn downloads_archive_through_the_form() {
    let server = MockServer::start().await;
    let page_url = format!("{}/?{EURUSD_2023_01_QUERY}", server.uri());

    Mock::given(method("GET"))
        .and(path("/"))
        .and(query_is(EURUSD_2023_01_QUERY))
        .and(header("user-agent", USER_AGENT))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("set-cookie", "PHPSESSID=abc123; Path=/")
                .set_body_raw(download_page("get.php", "a1b2c3"), "text/html"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let archive = zip_of(&[("DAT_ASCII_EURUSD_M1_202301.csv", "20230102 000000;1;1;1;1;0\n")]);
    Mock::given(method("POST"))
        .and(path("/get.php"))
        .and(header("referer", page_url.as_str()))
        .and(header("cookie", "PHPSESSID=abc123"))
        .and(header("content-type", "application/x-www-form-urlencoded"))
        .and(body_string(
            "tk=a1b2c3&date=2023&datemonth=202301&platform=ASCII&timeframe=M1&fxpair=EURUSD",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_raw(archive.clone(), "application/zip"))
        .expect(1)
        .mount(&server)
        .await;

    let bytes = provider(&server).fetch_archive(&eurusd_jan_2023()).await.unwrap();
    assert_eq!(bytes, archive);
}

#[tokio::test]
async fn octet_stream_is_accepted() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(download_page("", "t"), "text/html"))
        .mount(&server)
        .await;
    // Empty action: the form posts back to the page itself.
    Mock::given(method("POST"))
        .and(path("/"))
        .and(query_is(EURUSD_2023_01_QUERY))
        .respond_with(ResponseTemplate::new(200).set_body_raw(vec![1u8, 2, 3], "application/octet-stream"))
        .expect(1)
        .mount(&server)
        .await;

    let bytes = provider(&server).fetch_archive(&eurusd_jan_2023()).await.unwrap();
    assert_eq!(bytes, vec![1, 2, 3]);
}

#[tokio::test]
async fn page_without_form() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw("<html><body>Checking your browser...</body></html>", "text/html"),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let err = provider(&server).fetch_archive(&eurusd_jan_2023()).await.unwrap_err();
    assert!(matches!(err, ResolutionError::FormNotFound { .. }));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn form_missing_token() {
    let server = MockServer::start().await;
    let page = download_page("get.php", "t").replace(r#"name="tk""#, r#"name="token""#);
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(page, "text/html"))
        .mount(&server)
        .await;

    match provider(&server).fetch_archive(&eurusd_jan_2023()).await.unwrap_err() {
        ResolutionError::MissingField { field, found, .. } => {
            assert_eq!(field, "tk");
            assert!(found.contains(&"token".to_string()));
        }
        other => panic!("expected MissingField, got {other:?}"),
    }
}

#[tokio::test]
async fn html_instead_of_archive_carries_excerpt() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(download_page("get.php", "t"), "text/html"),
        )
        .mount(&server)
        .await;
    let notice = format!("<html>Too many downloads{}</html>", "!".repeat(1000));
    Mock::given(method("POST"))
        .and(path("/get.php"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(notice, "text/html; charset=UTF-8"))
        .mount(&server)
        .await;

    match provider(&server).fetch_archive(&eurusd_jan_2023()).await.unwrap_err() {
        ResolutionError::UnexpectedContentType {
            content_type,
            excerpt,
            ..
        } => {
            assert!(content_type.starts_with("text/html"));
            let excerpt = excerpt.unwrap();
            assert!(excerpt.starts_with("<html>Too many downloads"));
            assert_eq!(excerpt.chars().count(), 500);
        }
        other => panic!("expected UnexpectedContentType, got {other:?}"),
    }
}

#[tokio::test]
async fn server_errors_are_retryable() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let err = provider(&server).fetch_archive(&eurusd_jan_2023()).await.unwrap_err();
    assert!(matches!(err, ResolutionError::HttpStatus { status, .. } if status.as_u16() == 503));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn not_found_is_terminal() {
    let server = MockServer::start().await;
    mount_month(&server, zip_of(&[("a.csv", "")])).await;

    // Only 2023-01 is mounted.
    let err = provider(&server)
        .fetch_archive(&DownloadRequest::new("EURUSD", 2023, 2).unwrap())
        .await
        .unwrap_err();
    assert!(matches!(err, ResolutionError::HttpStatus { status, .. } if status.as_u16() == 404));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn connection_refused_is_a_request_error() {
    let provider = histdata_ingestor::providers::histdata::HistDataProvider::new(
        histdata_ingestor::providers::histdata::HistDataSettings {
            base_url: "http://127.0.0.1:1/".into(),
            ..Default::default()
        },
    )
    .unwrap();

    let err = provider.fetch_archive(&eurusd_jan_2023()).await.unwrap_err();
    assert!(matches!(err, ResolutionError::Request { .. }));
    assert!(err.is_retryable());
}
