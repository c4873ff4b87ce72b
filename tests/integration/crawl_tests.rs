//! Integration tests for the crawler
//!
//! These tests use wiremock to create mock HTTP servers and test
//! the full crawl cycle end-to-end.

use futures::StreamExt;
use std::collections::HashSet;
use std::time::Duration;
use sumi_sieve::config::{CrawlerConfig, UserAgentConfig};
use sumi_sieve::output::{CrawlRecord, CrawlStats, StopReason};
use sumi_sieve::{ConfigError, Crawler, ErrorKind, SieveError};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test configuration with short delays
fn create_test_config(max_depth: u32) -> CrawlerConfig {
    CrawlerConfig {
        max_depth,
        max_concurrent_workers: 4,
        max_concurrent_per_host: 2,
        min_host_delay_ms: 10, // Very short for testing
        request_timeout_ms: 2_000,
        retry_base_delay_ms: 5,
        ..CrawlerConfig::default()
    }
}

fn test_user_agent() -> UserAgentConfig {
    UserAgentConfig {
        crawler_name: "TestBot".to_string(),
        crawler_version: "1.0.0".to_string(),
        contact_url: None,
    }
}

fn html_page(title: &str, body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(
        format!(
            "<html><head><title>{}</title></head><body>{}</body></html>",
            title, body
        ),
        "text/html",
    )
}

async fn mount_page(server: &MockServer, page_path: &str, template: ResponseTemplate, times: u64) {
    Mock::given(method("GET"))
        .and(path(page_path))
        .respond_with(template)
        .expect(times)
        .mount(server)
        .await;
}

/// Runs a crawl to completion, collecting every record
async fn run_crawl(config: CrawlerConfig, seeds: &[String]) -> (Vec<CrawlRecord>, CrawlStats) {
    let crawler = Crawler::new(config, test_user_agent()).expect("Failed to create crawler");
    let mut session = crawler.crawl(seeds).expect("Failed to start crawl");

    let mut records = Vec::new();
    while let Some(record) = session.next().await {
        records.push(record);
    }

    let stats = session.finish().await.expect("Crawl driver failed");
    (records, stats)
}

fn find<'a>(records: &'a [CrawlRecord], page_path: &str) -> &'a CrawlRecord {
    records
        .iter()
        .find(|r| r.url.path() == page_path)
        .unwrap_or_else(|| panic!("No record for {}", page_path))
}

#[tokio::test]
async fn test_depth_one_crawl_visits_each_page_once() {
    let mock_server = MockServer::start().await;

    mount_page(
        &mock_server,
        "/a",
        html_page("A", r#"<a href="/b">B</a> <a href="c">C</a> <a href="/b#again">B again</a>"#),
        1,
    )
    .await;
    mount_page(
        &mock_server,
        "/b",
        html_page("B", r#"<a href="/a">Back</a> <a href="/d">Too deep</a>"#),
        1,
    )
    .await;
    mount_page(&mock_server, "/c", html_page("C", "Leaf"), 1).await;
    mount_page(&mock_server, "/d", html_page("D", "Never"), 0).await;

    let seeds = vec![format!("{}/a", mock_server.uri())];
    let (records, stats) = run_crawl(create_test_config(1), &seeds).await;

    assert_eq!(records.len(), 3);
    let paths: HashSet<&str> = records.iter().map(|r| r.url.path()).collect();
    assert_eq!(paths, HashSet::from(["/a", "/b", "/c"]));

    let a = find(&records, "/a");
    assert_eq!(a.depth, 0);
    assert_eq!(a.page().unwrap().title, "A");
    assert_eq!(find(&records, "/b").depth, 1);
    assert_eq!(find(&records, "/c").depth, 1);
    assert_eq!(find(&records, "/c").page().unwrap().summary(), "C\n\nLeaf");

    assert_eq!(stats.pages_succeeded, 3);
    assert_eq!(stats.pages_failed, 0);
    assert_eq!(stats.links_enqueued, 2);
    assert_eq!(stats.stop_reason, StopReason::Exhausted);
}

#[tokio::test]
async fn test_depth_zero_fetches_only_seeds() {
    let mock_server = MockServer::start().await;

    mount_page(&mock_server, "/", html_page("Home", r#"<a href="/next">Next</a>"#), 1).await;
    mount_page(&mock_server, "/next", html_page("Next", ""), 0).await;

    let seeds = vec![mock_server.uri()];
    let (records, stats) = run_crawl(create_test_config(0), &seeds).await;

    assert_eq!(records.len(), 1);
    assert_eq!(records[0].page().unwrap().links, vec!["/next".to_string()]);
    assert_eq!(stats.links_discovered, 1);
    assert_eq!(stats.links_enqueued, 0);
}

#[tokio::test]
async fn test_http_404_is_not_retried() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&mock_server)
        .await;

    let seeds = vec![format!("{}/missing", mock_server.uri())];
    let config = CrawlerConfig {
        max_retries: 3,
        ..create_test_config(0)
    };
    let (records, stats) = run_crawl(config, &seeds).await;

    assert_eq!(records.len(), 1);
    assert_eq!(records[0].attempts, 1);
    assert_eq!(
        records[0].error().unwrap().kind,
        ErrorKind::HttpError { status: 404 }
    );
    assert_eq!(stats.retries, 0);
    assert_eq!(stats.failures_by_kind.get("http-error"), Some(&1));
}

#[tokio::test]
async fn test_connection_error_is_retried() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("Failed to bind");
    let port = listener.local_addr().expect("No local addr").port();
    drop(listener);

    let seeds = vec![format!("http://127.0.0.1:{}/", port)];
    let config = CrawlerConfig {
        max_retries: 2,
        ..create_test_config(0)
    };
    let (records, stats) = run_crawl(config, &seeds).await;

    assert_eq!(records.len(), 1);
    assert_eq!(records[0].attempts, 3);
    assert_eq!(
        records[0].error().unwrap().kind,
        ErrorKind::ConnectionError
    );
    assert_eq!(stats.retries, 2);
}

#[tokio::test]
async fn test_dns_error_is_not_retried() {
    let seeds = vec!["http://no-such-host.invalid/".to_string()];
    let config = CrawlerConfig {
        max_retries: 2,
        ..create_test_config(0)
    };
    let (records, stats) = run_crawl(config, &seeds).await;

    assert_eq!(records.len(), 1);
    assert_eq!(records[0].attempts, 1);
    assert_eq!(records[0].error().unwrap().kind, ErrorKind::DnsError);
    assert_eq!(stats.retries, 0);
    assert_eq!(stats.failures_by_kind.get("dns-error"), Some(&1));
}

#[tokio::test]
async fn test_content_cap() {
    let mock_server = MockServer::start().await;
    let long_text = "lorem ipsum dolor sit amet ".repeat(20);

    mount_page(&mock_server, "/", html_page("Long page", &long_text), 1).await;

    let seeds = vec![mock_server.uri()];
    let config = CrawlerConfig {
        content_char_cap: 50,
        ..create_test_config(0)
    };
    let (records, _) = run_crawl(config, &seeds).await;

    let page = records[0].page().unwrap();
    assert_eq!(page.char_len(), 50);
    assert_eq!(page.summary().chars().count(), 50);
    assert!(page.summary().starts_with("Long page\n\nlorem ipsum"));
}

#[tokio::test]
async fn test_redirect_target_is_marked_seen() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/old"))
        .respond_with(ResponseTemplate::new(301).insert_header("location", "/new"))
        .expect(1)
        .mount(&mock_server)
        .await;
    mount_page(
        &mock_server,
        "/new",
        html_page("New", r#"<a href="/new">Self</a> <a href="/other">Other</a>"#),
        1,
    )
    .await;
    mount_page(&mock_server, "/other", html_page("Other", ""), 1).await;

    let seeds = vec![format!("{}/old", mock_server.uri())];
    let (records, _) = run_crawl(create_test_config(1), &seeds).await;

    assert_eq!(records.len(), 2);
    let old = find(&records, "/old");
    assert_eq!(old.page().unwrap().title, "New");
    assert_eq!(find(&records, "/other").depth, 1);
}

#[tokio::test]
async fn test_cross_host_redirect_is_followed_once() {
    let origin = MockServer::start().await;
    let target = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/moved"))
        .respond_with(
            ResponseTemplate::new(302)
                .insert_header("location", format!("{}/landing", target.uri()).as_str()),
        )
        .expect(1)
        .mount(&origin)
        .await;
    mount_page(
        &target,
        "/landing",
        html_page("Landing", &format!(r#"<a href="{}/landing">Self</a>"#, target.uri())),
        1,
    )
    .await;

    let seeds = vec![format!("{}/moved", origin.uri())];
    let (records, stats) = run_crawl(create_test_config(1), &seeds).await;

    assert_eq!(records.len(), 1);
    assert_eq!(records[0].url.path(), "/moved");
    assert_eq!(records[0].page().unwrap().title, "Landing");
    assert_eq!(stats.links_enqueued, 0);
}

#[tokio::test]
async fn test_page_budget() {
    let mock_server = MockServer::start().await;

    let links: String = (0..5)
        .map(|i| format!(r#"<a href="/p{}">{}</a>"#, i, i))
        .collect();
    mount_page(&mock_server, "/", html_page("Hub", &links), 1).await;
    Mock::given(method("GET"))
        .respond_with(html_page("Leaf", "leaf"))
        .mount(&mock_server)
        .await;

    let seeds = vec![mock_server.uri()];
    let config = CrawlerConfig {
        max_concurrent_workers: 1,
        max_pages: Some(3),
        ..create_test_config(1)
    };
    let (records, stats) = run_crawl(config, &seeds).await;

    assert_eq!(records.len(), 3);
    assert_eq!(stats.pages_started, 3);
    assert_eq!(stats.stop_reason, StopReason::PageBudget);
}

#[tokio::test]
async fn test_time_budget_of_zero_starts_nothing() {
    let mock_server = MockServer::start().await;
    mount_page(&mock_server, "/", html_page("Home", ""), 0).await;

    let seeds = vec![mock_server.uri()];
    let config = CrawlerConfig {
        max_duration_secs: Some(0),
        ..create_test_config(1)
    };
    let (records, stats) = run_crawl(config, &seeds).await;

    assert!(records.is_empty());
    assert_eq!(stats.stop_reason, StopReason::TimeBudget);
}

#[tokio::test]
async fn test_cancel_aborts_in_flight_fetches() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(html_page("Slow", "").set_delay(Duration::from_secs(10)))
        .mount(&mock_server)
        .await;

    let crawler = Crawler::new(create_test_config(0), test_user_agent()).unwrap();
    let mut session = crawler
        .crawl([format!("{}/slow", mock_server.uri())])
        .unwrap();

    let token = crawler.cancel_token();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        token.cancel();
    });

    let next = tokio::time::timeout(Duration::from_secs(2), session.next())
        .await
        .expect("Cancellation did not stop the crawl");
    assert!(next.is_none());

    let stats = session.finish().await.unwrap();
    assert_eq!(stats.stop_reason, StopReason::Cancelled);
    assert_eq!(stats.pages_started, 1);
    assert_eq!(stats.pages_completed(), 0);
}

#[tokio::test]
async fn test_invalid_seeds_are_skipped() {
    let mock_server = MockServer::start().await;
    mount_page(&mock_server, "/", html_page("Home", ""), 1).await;

    let seeds = vec![
        "not a url".to_string(),
        "ftp://example.com/".to_string(),
        mock_server.uri(),
    ];
    let (records, _) = run_crawl(create_test_config(0), &seeds).await;
    assert_eq!(records.len(), 1);
}

#[tokio::test]
async fn test_no_valid_seeds_is_fatal() {
    let crawler = Crawler::new(create_test_config(1), test_user_agent()).unwrap();
    let result = crawler.crawl(["javascript:void(0)", ""]);
    assert!(matches!(
        result,
        Err(SieveError::Config(ConfigError::NoValidSeeds))
    ));
}
