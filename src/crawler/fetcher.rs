//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building HTTP clients with the crawler's user agent string
//! - GET requests with a per-request timeout
//! - Manual redirect handling with a hop limit and loop detection
//! - Error classification
//!
//! Retries are not performed here; the coordinator decides what to retry.

use crate::config::UserAgentConfig;
use crate::url::normalize_url;
use crate::{CrawlError, ErrorKind};
use bytes::Bytes;
use hyper::client::connect::dns::Name;
use reqwest::dns::{Addrs, Resolve, Resolving};
use reqwest::header::{HeaderMap, LOCATION};
use reqwest::{redirect::Policy, Client, StatusCode};
use std::collections::HashSet;
use std::error::Error as StdError;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Result of a fetch operation
#[derive(Debug)]
pub enum FetchResult {
    /// Successfully fetched the page
    Success {
        /// Final URL after redirects
        final_url: Url,
        /// HTTP status code
        status: u16,
        /// Response headers of the final hop
        headers: HeaderMap,
        /// Raw page body
        body: Bytes,
    },

    /// The fetch failed; `kind` says how
    Failure(CrawlError),
}

impl FetchResult {
    fn failure(kind: ErrorKind, message: impl Into<String>) -> Self {
        FetchResult::Failure(CrawlError::new(kind, message))
    }

    pub fn is_success(&self) -> bool {
        matches!(self, FetchResult::Success { .. })
    }

    /// Returns the error classification, if this is a failure
    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            FetchResult::Success { .. } => None,
            FetchResult::Failure(err) => Some(err.kind),
        }
    }
}

/// Fetcher settings, fixed at construction
#[derive(Debug, Clone)]
pub struct FetcherConfig {
    /// Value of the `User-Agent` header sent with every request
    pub user_agent: String,
    /// Timeout for each request hop
    pub timeout: Duration,
    /// Maximum number of redirect hops followed
    pub max_redirects: usize,
}

impl FetcherConfig {
    pub fn new(user_agent: &UserAgentConfig, timeout: Duration, max_redirects: usize) -> Self {
        Self {
            user_agent: user_agent.header_value(),
            timeout,
            max_redirects,
        }
    }
}

/// Raised by [`ClassifyingResolver`] when a host name does not resolve
///
/// It travels through reqwest's error source chain, so the fetcher can tell a
/// DNS failure from any other connect failure by type.
#[derive(Debug)]
struct DnsFailure {
    host: String,
    source: std::io::Error,
}

impl std::fmt::Display for DnsFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "could not resolve host {}: {}", self.host, self.source)
    }
}

impl StdError for DnsFailure {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        Some(&self.source)
    }
}

/// System resolver that reports failures as [`DnsFailure`]
struct ClassifyingResolver;

impl Resolve for ClassifyingResolver {
    fn resolve(&self, name: Name) -> Resolving {
        let host = name.as_str().to_string();
        Box::pin(async move {
            let lookup = tokio::net::lookup_host((host.clone(), 0)).await;
            match lookup {
                Ok(addrs) => {
                    let addrs: Vec<SocketAddr> = addrs.collect();
                    if addrs.is_empty() {
                        let source = std::io::Error::new(
                            std::io::ErrorKind::NotFound,
                            "no addresses returned",
                        );
                        return Err(Box::new(DnsFailure { host, source })
                            as Box<dyn StdError + Send + Sync>);
                    }
                    Ok(Box::new(addrs.into_iter()) as Addrs)
                }
                Err(source) => {
                    Err(Box::new(DnsFailure { host, source }) as Box<dyn StdError + Send + Sync>)
                }
            }
        })
    }
}

/// Builds an HTTP client with proper configuration
///
/// Redirects are disabled on the client; [`Fetcher::fetch`] follows them itself
/// so it can enforce the hop limit and detect loops.
///
/// # Example
///
/// ```no_run
/// use std::time::Duration;
/// use sumi_sieve::config::UserAgentConfig;
/// use sumi_sieve::crawler::{build_http_client, FetcherConfig};
///
/// let config = FetcherConfig::new(&UserAgentConfig::default(), Duration::from_secs(10), 5);
/// let client = build_http_client(&config).unwrap();
/// ```
pub fn build_http_client(config: &FetcherConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.user_agent.clone())
        .timeout(config.timeout)
        .connect_timeout(config.timeout)
        .redirect(Policy::none())
        .dns_resolver(Arc::new(ClassifyingResolver))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Issues GET requests and classifies their outcome
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    max_redirects: usize,
}

impl Fetcher {
    pub fn new(config: FetcherConfig) -> Result<Self, reqwest::Error> {
        let client = build_http_client(&config)?;
        Ok(Self {
            client,
            max_redirects: config.max_redirects,
        })
    }

    /// Fetches a URL, following redirects manually
    ///
    /// # Request Flow
    ///
    /// 1. Validate scheme and host; no network call for an invalid URL
    /// 2. Send GET
    /// 3. On 3xx with `Location`, resolve it and repeat (at most
    ///    `max_redirects` hops, never revisiting a URL in the chain)
    /// 4. Classify the final response
    ///
    /// Hops may leave the original host. The caller's throttle permit covers
    /// only the host it acquired, so redirect targets on other hosts are not
    /// throttled separately.
    ///
    /// # Classification
    ///
    /// | Condition | Result |
    /// |-----------|--------|
    /// | Missing scheme/host, non-HTTP scheme | InvalidUrl |
    /// | Host does not resolve | DnsError |
    /// | Connection refused, timeout | ConnectionError |
    /// | Final status not 2xx, 3xx without Location | HttpError{status} |
    /// | Redirect loop or chain too long | RedirectLoopError |
    /// | Anything else (body read, protocol) | TransportError |
    pub async fn fetch(&self, url: &str) -> FetchResult {
        let mut current = match normalize_url(url) {
            Ok(u) => u,
            Err(e) => return FetchResult::failure(ErrorKind::InvalidUrl, e.to_string()),
        };

        let mut visited = HashSet::new();
        visited.insert(current.as_str().to_string());
        let mut hops = 0;

        loop {
            let response = match self.client.get(current.clone()).send().await {
                Ok(r) => r,
                Err(e) => return FetchResult::Failure(classify_reqwest_error(&e)),
            };

            let status = response.status();

            if status.is_redirection() {
                let next = match redirect_target(&current, response.headers()) {
                    Some(next) => next,
                    None => {
                        return FetchResult::failure(
                            ErrorKind::HttpError {
                                status: status.as_u16(),
                            },
                            format!("HTTP {} without a usable Location header", status.as_u16()),
                        )
                    }
                };

                if hops >= self.max_redirects {
                    return FetchResult::failure(
                        ErrorKind::RedirectLoopError,
                        format!("Exceeded {} redirects starting at {}", self.max_redirects, url),
                    );
                }

                if !visited.insert(next.as_str().to_string()) {
                    return FetchResult::failure(
                        ErrorKind::RedirectLoopError,
                        format!("Redirect loop detected at {}", next),
                    );
                }

                tracing::debug!("Redirect {} -> {}", current, next);
                hops += 1;
                current = next;
                continue;
            }

            if !status.is_success() {
                return FetchResult::failure(
                    ErrorKind::HttpError {
                        status: status.as_u16(),
                    },
                    format!("HTTP {}", status_label(status)),
                );
            }

            let headers = response.headers().clone();
            return match response.bytes().await {
                Ok(body) => FetchResult::Success {
                    final_url: current,
                    status: status.as_u16(),
                    headers,
                    body,
                },
                Err(e) => FetchResult::Failure(classify_reqwest_error(&e)),
            };
        }
    }
}

/// Resolves the `Location` header of a redirect against the current URL
fn redirect_target(current: &Url, headers: &HeaderMap) -> Option<Url> {
    let location = headers.get(LOCATION)?.to_str().ok()?;
    let joined = current.join(location.trim()).ok()?;
    normalize_url(joined.as_str()).ok()
}

fn status_label(status: StatusCode) -> String {
    match status.canonical_reason() {
        Some(reason) => format!("{} {}", status.as_u16(), reason),
        None => status.as_u16().to_string(),
    }
}

/// Maps a reqwest error onto the crawl error taxonomy
fn classify_reqwest_error(err: &reqwest::Error) -> CrawlError {
    if let Some(dns) = find_source::<DnsFailure>(err) {
        return CrawlError::new(ErrorKind::DnsError, dns.to_string());
    }

    if err.is_timeout() {
        return CrawlError::new(ErrorKind::ConnectionError, "Request timeout");
    }

    if err.is_connect() {
        return CrawlError::new(
            ErrorKind::ConnectionError,
            format!("Connection failed: {}", error_chain(err)),
        );
    }

    CrawlError::new(ErrorKind::TransportError, error_chain(err))
}

/// Walks an error's source chain looking for a specific error type
fn find_source<'a, T: StdError + 'static>(err: &'a (dyn StdError + 'static)) -> Option<&'a T> {
    let mut current: Option<&(dyn StdError + 'static)> = Some(err);
    while let Some(e) = current {
        if let Some(found) = e.downcast_ref::<T>() {
            return Some(found);
        }
        current = e.source();
    }
    None
}

fn error_chain(err: &(dyn StdError + 'static)) -> String {
    let mut message = err.to_string();
    let mut current = err.source();
    while let Some(e) = current {
        message.push_str(": ");
        message.push_str(&e.to_string());
        current = e.source();
    }
    message
}
