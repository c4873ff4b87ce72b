//! Integration tests for the fetcher
//!
//! These tests use wiremock to stand up real HTTP servers and check how each
//! kind of response is classified.

use std::time::Duration;
use sumi_sieve::config::UserAgentConfig;
use sumi_sieve::crawler::{FetchResult, Fetcher, FetcherConfig};
use sumi_sieve::ErrorKind;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_user_agent() -> UserAgentConfig {
    UserAgentConfig {
        crawler_name: "TestBot".to_string(),
        crawler_version: "1.0.0".to_string(),
        contact_url: Some("https://example.com/contact".to_string()),
    }
}

fn fetcher(timeout_ms: u64, max_redirects: usize) -> Fetcher {
    let config = FetcherConfig::new(
        &test_user_agent(),
        Duration::from_millis(timeout_ms),
        max_redirects,
    );
    Fetcher::new(config).expect("Failed to build fetcher")
}

fn kind(result: &FetchResult) -> ErrorKind {
    result.error_kind().expect("Expected a failure")
}

/// Returns a loopback URL on a port nothing is listening on
fn refused_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("Failed to bind");
    let port = listener.local_addr().expect("No local addr").port();
    drop(listener);
    format!("http://127.0.0.1:{}/", port)
}

#[tokio::test]
async fn test_fetch_success() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/page"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw("<html><head><title>Hi</title></head></html>", "text/html"),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let result = fetcher(5_000, 5)
        .fetch(&format!("{}/page", mock_server.uri()))
        .await;

    match result {
        FetchResult::Success {
            final_url,
            status,
            headers,
            body,
        } => {
            assert_eq!(final_url.path(), "/page");
            assert_eq!(status, 200);
            assert_eq!(headers.get("content-type").unwrap(), "text/html");
            assert!(body.starts_with(b"<html>"));
        }
        FetchResult::Failure(e) => panic!("Expected success, got {}", e),
    }
}

#[tokio::test]
async fn test_sends_identifying_user_agent() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(header(
            "user-agent",
            "TestBot/1.0.0 (+https://example.com/contact)",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let result = fetcher(5_000, 5).fetch(&mock_server.uri()).await;
    assert!(result.is_success());
}

#[tokio::test]
async fn test_http_error_status() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&mock_server)
        .await;

    let result = fetcher(5_000, 5)
        .fetch(&format!("{}/missing", mock_server.uri()))
        .await;
    assert_eq!(kind(&result), ErrorKind::HttpError { status: 404 });
}

#[tokio::test]
async fn test_server_error_status() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&mock_server)
        .await;

    let result = fetcher(5_000, 5).fetch(&mock_server.uri()).await;
    assert_eq!(kind(&result), ErrorKind::HttpError { status: 503 });
}

#[tokio::test]
async fn test_follows_redirects() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/old"))
        .respond_with(ResponseTemplate::new(301).insert_header("location", "/new"))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/new"))
        .respond_with(ResponseTemplate::new(200).set_body_string("moved here"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let result = fetcher(5_000, 5)
        .fetch(&format!("{}/old", mock_server.uri()))
        .await;

    match result {
        FetchResult::Success {
            final_url, body, ..
        } => {
            assert_eq!(final_url.path(), "/new");
            assert_eq!(&body[..], b"moved here");
        }
        FetchResult::Failure(e) => panic!("Expected success, got {}", e),
    }
}

#[tokio::test]
async fn test_redirect_loop() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/a"))
        .respond_with(ResponseTemplate::new(302).insert_header("location", "/b"))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/b"))
        .respond_with(ResponseTemplate::new(302).insert_header("location", "/a"))
        .mount(&mock_server)
        .await;

    let result = fetcher(5_000, 5)
        .fetch(&format!("{}/a", mock_server.uri()))
        .await;
    assert_eq!(kind(&result), ErrorKind::RedirectLoopError);
}

#[tokio::test]
async fn test_too_many_redirects() {
    let mock_server = MockServer::start().await;

    for i in 0..10 {
        Mock::given(method("GET"))
            .and(path(format!("/hop{}", i)))
            .respond_with(
                ResponseTemplate::new(302)
                    .insert_header("location", format!("/hop{}", i + 1).as_str()),
            )
            .mount(&mock_server)
            .await;
    }

    let result = fetcher(5_000, 3)
        .fetch(&format!("{}/hop0", mock_server.uri()))
        .await;
    assert_eq!(kind(&result), ErrorKind::RedirectLoopError);

    // Initial request plus three followed hops, then the fourth is refused
    let requests = mock_server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 4);
}

#[tokio::test]
async fn test_redirect_without_location() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(302))
        .mount(&mock_server)
        .await;

    let result = fetcher(5_000, 5).fetch(&mock_server.uri()).await;
    assert_eq!(kind(&result), ErrorKind::HttpError { status: 302 });
}

#[tokio::test]
async fn test_invalid_url_makes_no_request() {
    let fetcher = fetcher(5_000, 5);

    for url in ["", "not a url", "ftp://example.com/file", "mailto:a@b.c"] {
        let result = fetcher.fetch(url).await;
        assert_eq!(kind(&result), ErrorKind::InvalidUrl, "url: {:?}", url);
    }
}

#[tokio::test]
async fn test_connection_refused() {
    let result = fetcher(2_000, 5).fetch(&refused_url()).await;
    assert_eq!(kind(&result), ErrorKind::ConnectionError);
}

#[tokio::test]
async fn test_unresolvable_host() {
    let result = fetcher(2_000, 5)
        .fetch("http://no-such-host.invalid/")
        .await;
    assert_eq!(kind(&result), ErrorKind::DnsError);

    match result {
        FetchResult::Failure(err) => assert!(err.message.contains("no-such-host.invalid")),
        FetchResult::Success { .. } => unreachable!(),
    }
}

#[tokio::test]
async fn test_timeout_is_connection_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
        .mount(&mock_server)
        .await;

    let result = fetcher(200, 5).fetch(&mock_server.uri()).await;
    assert_eq!(kind(&result), ErrorKind::ConnectionError);
}
