#![allow(dead_code)]

use std::io::{Cursor, Write};

use histdata_ingestor::providers::histdata::{HistDataProvider, HistDataSettings};
use wiremock::{
    Mock, MockServer, Request, ResponseTemplate,
    matchers::{method, path},
};
use zip::{ZipWriter, write::SimpleFileOptions};

pub const USER_AGENT: &str = "histdata-ingestor-tests";
pub const EURUSD_2023_01_QUERY: &str = "/ascii/1-minute-bar-quotes/eurusd/2023/1";

pub fn zip_of(entries: &[(&str, &str)]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, content) in entries {
        writer.start_file(*name, SimpleFileOptions::default()).unwrap();
        writer.write_all(content.as_bytes()).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

/// `n` valid one-minute rows starting 2023-01-02 00:00.
pub fn csv_rows(n: usize) -> String {
    (0..n)
        .map(|i| {
            let (h, m) = (i / 60, i % 60);
            format!("20230102 {h:02}{m:02}00;1.0{i:03};1.1;1.0;1.05;0\n")
        })
        .collect()
}

pub fn download_page(action: &str, token: &str) -> String {
    format!(
        r#"<!DOCTYPE html><html><body>
        <a href="/">HistData</a>
        <form id="file_down" name="file_down" action="{action}" method="POST">
          <input type="hidden" name="tk" id="tk" value="{token}" />
          <input type="hidden" name="date" id="date" value="2023" />
          <input type="hidden" name="datemonth" id="datemonth" value="202301" />
          <input type="hidden" name="platform" id="platform" value="ASCII" />
          <input type="hidden" name="timeframe" id="timeframe" value="M1" />
          <input type="hidden" name="fxpair" id="fxpair" value="EURUSD" />
        </form>
        <a id="a_file" href="javascript:return true;" onclick="jQuery('#file_down').submit(); return false;">HISTDATA_COM_ASCII_EURUSD_M1202301.zip</a>
        </body></html>"#
    )
}

pub fn provider(server: &MockServer) -> HistDataProvider {
    HistDataProvider::new(HistDataSettings {
        base_url: format!("{}/", server.uri()),
        user_agent: USER_AGENT.to_string(),
        ..HistDataSettings::default()
    })
    .unwrap()
}

pub fn query_is(expected: &'static str) -> impl Fn(&Request) -> bool + Send + Sync + 'static {
    move |request: &Request| request.url.query() == Some(expected)
}

/// Serves the EURUSD 2023-01 page and its archive.
pub async fn mount_month(server: &MockServer, archive: Vec<u8>) {
    Mock::given(method("GET"))
        .and(path("/"))
        .and(query_is(EURUSD_2023_01_QUERY))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(download_page("get.php", "tok"), "text/html"),
        )
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/get.php"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(archive, "application/zip"))
        .mount(server)
        .await;
}
