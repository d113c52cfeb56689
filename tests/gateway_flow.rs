//! End-to-end tests: real gateway, real transport, mock upstreams.

use std::io::Write;

use axum::http::StatusCode;
use bytes::Bytes;
use flate2::write::GzEncoder;
use flate2::Compression;

use urlfetch_gateway::envelope::{Frame, InnerRequest};
use urlfetch_gateway::GatewayConfig;

mod common;
use common::Reply;

fn config() -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.auth.password = "s3cret".into();
    config.retries.backoff_ms = 10;
    config.timeouts.forward_secs = 5;
    config
}

fn envelope(uri: &str, password: Option<&str>) -> InnerRequest {
    let mut inner = InnerRequest::new("POST", uri);
    inner.headers.append("Accept", "*/*");
    if let Some(password) = password {
        inner.headers.append("X-Urlfetch-Password", password);
    }
    inner.body = Bytes::from_static(b"hello upstream");
    inner
}

async fn post(gateway: std::net::SocketAddr, inner: &InnerRequest) -> reqwest::Response {
    common::client()
        .post(format!("http://{}/", gateway))
        .body(Frame::encode(inner).unwrap())
        .send()
        .await
        .expect("gateway unreachable")
}

#[tokio::test]
async fn test_envelope_round_trip() {
    let upstream = common::start_mock_upstream(vec![Reply::Respond(404, "missing")]).await;
    let (gateway, shutdown) = common::start_gateway(config()).await;

    let inner = envelope(&format!("http://{}/thing?q=1", upstream.addr()), Some("s3cret"));
    let res = post(gateway, &inner).await;

    assert_eq!(res.status(), StatusCode::OK, "outer status hides upstream status");
    let body = res.bytes().await.unwrap();
    let text = String::from_utf8_lossy(&body);
    assert!(text.starts_with("HTTP/1.1 404 Not Found\r\n"), "got {text:?}");
    assert!(text.contains("X-Upstream: mock\r\n"));
    assert!(text.ends_with("\r\n\r\nmissing"));

    let received = upstream.received();
    assert_eq!(received.len(), 1);
    assert!(received[0].starts_with("POST /thing?q=1 HTTP/1.1\r\n"));
    assert!(received[0].ends_with("hello upstream"));
    assert!(!received[0].to_ascii_lowercase().contains("x-urlfetch-"));

    shutdown.trigger();
}

#[tokio::test]
async fn test_wrong_password_is_forbidden() {
    let upstream = common::start_mock_upstream(vec![Reply::Respond(200, "ok")]).await;
    let (gateway, shutdown) = common::start_gateway(config()).await;

    for password in [None, Some("nope")] {
        let inner = envelope(&format!("http://{}/", upstream.addr()), password);
        let res = post(gateway, &inner).await;
        assert_eq!(res.status(), StatusCode::FORBIDDEN);
    }
    assert_eq!(upstream.call_count(), 0);

    shutdown.trigger();
}

#[tokio::test]
async fn test_gzip_body_is_forwarded_decoded() {
    let upstream = common::start_mock_upstream(vec![Reply::Respond(200, "ok")]).await;
    let (gateway, shutdown) = common::start_gateway(config()).await;

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(b"plain text payload").unwrap();
    let mut inner = envelope(&format!("http://{}/upload", upstream.addr()), Some("s3cret"));
    inner.headers.append("Content-Encoding", "gzip");
    inner.body = Bytes::from(encoder.finish().unwrap());

    let res = post(gateway, &inner).await;
    assert_eq!(res.status(), StatusCode::OK);

    let received = upstream.received();
    let request = received[0].to_ascii_lowercase();
    assert!(request.contains("content-length: 18\r\n"));
    assert!(!request.contains("content-encoding"));
    assert!(received[0].ends_with("plain text payload"));

    shutdown.trigger();
}

#[tokio::test]
async fn test_hangup_is_retried_once() {
    let upstream = common::start_mock_upstream(vec![Reply::Hangup, Reply::Respond(200, "second try")]).await;
    let (gateway, shutdown) = common::start_gateway(config()).await;

    let inner = envelope(&format!("http://{}/", upstream.addr()), Some("s3cret"));
    let res = post(gateway, &inner).await;

    assert_eq!(res.status(), StatusCode::OK);
    assert!(res.bytes().await.unwrap().ends_with(b"second try"));
    assert_eq!(upstream.call_count(), 2);

    shutdown.trigger();
}

#[tokio::test]
async fn test_refused_upstream_is_bad_gateway() {
    let closed = common::closed_port().await;
    let (gateway, shutdown) = common::start_gateway(config()).await;

    let inner = envelope(&format!("http://{}/", closed), Some("s3cret"));
    let res = post(gateway, &inner).await;

    assert_eq!(res.status(), StatusCode::BAD_GATEWAY);
    assert!(res.text().await.unwrap().starts_with("urlfetch-gateway: "));

    shutdown.trigger();
}

#[tokio::test]
async fn test_malformed_envelope_is_bad_request() {
    let (gateway, shutdown) = common::start_gateway(config()).await;

    let res = common::client()
        .post(format!("http://{}/", gateway))
        .body(vec![0xff, 0xff, 1, 2, 3])
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    shutdown.trigger();
}

#[tokio::test]
async fn test_no_envelope_on_bare_domain_is_bad_request() {
    let (gateway, shutdown) = common::start_gateway(config()).await;

    let res = common::client()
        .get(format!("http://{}/", gateway))
        .header("Host", "example.com")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    shutdown.trigger();
}

#[tokio::test]
async fn test_no_envelope_with_unresolvable_probe_redirects() {
    let mut config = config();
    config.timeouts.forward_secs = 2;
    let (gateway, shutdown) = common::start_gateway(config).await;

    let res = common::client()
        .get(format!("http://{}/index.html", gateway))
        .header("Host", "app.example.invalid")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::MOVED_PERMANENTLY);
    assert_eq!(
        res.headers().get("location").unwrap(),
        "http://www.example.invalid/index.html"
    );

    shutdown.trigger();
}
