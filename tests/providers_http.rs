// tests/providers_http.rs
use std::net::SocketAddr;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use threat_feed_aggregator::enrich::geo_client::{GeoLookup, IpApiClient};
use threat_feed_aggregator::ingest::fetch_isolated;
use threat_feed_aggregator::ingest::providers::feodo::FeodoProvider;
use threat_feed_aggregator::ingest::providers::openphish::OpenPhishProvider;
use threat_feed_aggregator::ingest::providers::otx::OtxProvider;
use threat_feed_aggregator::ingest::types::{FeedSource, IndicatorKind, SourceProvider};

/// One-shot HTTP/1.1 server: answers the first request with `status` and `body`,
/// then hands back the raw request head it received.
async fn serve_once(status: &'static str, body: &'static str) -> (SocketAddr, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        let (mut sock, _) = listener.accept().await.unwrap();
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
            let n = sock.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
        }
        let rsp = format!(
            "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        sock.write_all(rsp.as_bytes()).await.unwrap();
        sock.shutdown().await.ok();
        String::from_utf8_lossy(&buf).into_owned()
    });
    (addr, handle)
}

#[tokio::test]
async fn feodo_non_success_status_is_fetch_failure() {
    let (addr, server) = serve_once("503 Service Unavailable", "{}").await;
    let p = FeodoProvider::from_url(&format!("http://{addr}/ipblocklist.json"));
    let err = p.fetch_latest().await.unwrap_err();
    assert!(format!("{err:#}").contains("503"), "unexpected error: {err:#}");
    let req = server.await.unwrap();
    assert!(req.starts_with("GET /ipblocklist.json "));
}

#[tokio::test]
async fn failed_feed_contributes_nothing() {
    let (addr, server) = serve_once("503 Service Unavailable", "").await;
    let p = FeodoProvider::from_url(&format!("http://{addr}/ipblocklist.json"));
    assert!(fetch_isolated(&p).await.is_empty());
    server.await.unwrap();
}

#[tokio::test]
async fn feodo_ok_body_is_parsed() {
    let (addr, server) = serve_once(
        "200 OK",
        r#"[{"ip_address":"192.0.2.15","malware":"QakBot"},{"ip_address":null}]"#,
    )
    .await;
    let p = FeodoProvider::from_url(&format!("http://{addr}/ipblocklist.json"));
    let out = p.fetch_latest().await.unwrap();
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].value, "192.0.2.15");
    assert_eq!(out[0].description, "Botnet C2 (QakBot)");
    server.await.unwrap();
}

#[tokio::test]
async fn otx_request_carries_limit_and_api_key() {
    let (addr, server) = serve_once(
        "200 OK",
        r#"{"results":[{"name":"Loader wave","indicators":[{"indicator":"bad.example","type":"domain"}]}]}"#,
    )
    .await;
    let p = OtxProvider::from_url(
        &format!("http://{addr}/api/v1/pulses/subscribed"),
        Some("k-123".into()),
        7,
    );
    let out = p.fetch_latest().await.unwrap();
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].kind, IndicatorKind::Domain);
    assert_eq!(out[0].source, FeedSource::AlienVaultOtx);
    assert_eq!(out[0].description, "Loader wave");

    let req = server.await.unwrap().to_ascii_lowercase();
    assert!(req.starts_with("get /api/v1/pulses/subscribed?limit=7 "), "{req}");
    assert!(req.contains("x-otx-api-key: k-123"), "{req}");
}

#[tokio::test]
async fn openphish_plain_text_over_http() {
    let (addr, server) = serve_once(
        "200 OK",
        "https://login.bank.test/verify\n\n  http://evil.test/a  \n",
    )
    .await;
    let p = OpenPhishProvider::from_url(&format!("http://{addr}/feed.txt"));
    let out = p.fetch_latest().await.unwrap();
    let values: Vec<_> = out.iter().map(|i| i.value.as_str()).collect();
    assert_eq!(values, ["https://login.bank.test/verify", "http://evil.test/a"]);
    server.await.unwrap();
}

#[tokio::test]
async fn geo_lookup_success_puts_ip_in_path() {
    let (addr, server) = serve_once(
        "200 OK",
        r#"{"status":"success","country":"Netherlands","city":"Amsterdam","lat":52.37,"lon":4.89}"#,
    )
    .await;
    let client = IpApiClient::new(format!("http://{addr}/json/"));
    let rec = client.lookup("192.0.2.1").await.unwrap();
    assert_eq!(rec.city.as_deref(), Some("Amsterdam"));
    assert_eq!(rec.country.as_deref(), Some("Netherlands"));

    let req = server.await.unwrap();
    assert!(req.starts_with("GET /json/192.0.2.1 "), "{req}");
}

#[tokio::test]
async fn geo_lookup_fail_status_is_error() {
    let (addr, server) = serve_once(
        "200 OK",
        r#"{"status":"fail","message":"private range","query":"10.0.0.1"}"#,
    )
    .await;
    let client = IpApiClient::new(format!("http://{addr}/json"));
    let err = client.lookup("10.0.0.1").await.unwrap_err();
    assert!(err.to_string().contains("private range"));
    server.await.unwrap();
}

#[tokio::test]
async fn geo_lookup_http_error_is_error() {
    let (addr, server) = serve_once("500 Internal Server Error", "").await;
    let client = IpApiClient::new(format!("http://{addr}/json"));
    assert!(client.lookup("192.0.2.1").await.is_err());
    server.await.unwrap();
}
