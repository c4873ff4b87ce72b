use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure for Sumi-Sieve
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(rename = "user-agent", default)]
    pub user_agent: UserAgentConfig,
    /// Seed URLs; replaced entirely by seeds given on the command line
    #[serde(default)]
    pub seeds: Vec<String>,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct CrawlerConfig {
    /// Maximum link depth to follow from the seed URLs (seeds are depth 0)
    pub max_depth: u32,

    /// Maximum number of pages processed at once across all hosts
    pub max_concurrent_workers: usize,

    /// Maximum number of simultaneous requests to a single host
    pub max_concurrent_per_host: usize,

    /// Minimum time between the end of one request and the start of the next
    /// to the same host (milliseconds)
    pub min_host_delay_ms: u64,

    /// Timeout applied to each request (milliseconds)
    pub request_timeout_ms: u64,

    /// Maximum number of redirect hops followed for one URL
    pub max_redirects: usize,

    /// Character ceiling for `title + "\n\n" + text`
    pub content_char_cap: usize,

    /// Retries for transient failures before they become terminal
    pub max_retries: u32,

    /// Base delay for exponential retry backoff (milliseconds)
    pub retry_base_delay_ms: u64,

    /// Stop dequeuing after this many pages have been started
    pub max_pages: Option<usize>,

    /// Stop dequeuing after this many seconds
    pub max_duration_secs: Option<u64>,

    /// Forget per-host politeness state after this long without requests
    pub host_idle_eviction_secs: u64,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            max_depth: 1,
            max_concurrent_workers: 8,
            max_concurrent_per_host: 2,
            min_host_delay_ms: 500,
            request_timeout_ms: 10_000,
            max_redirects: 5,
            content_char_cap: 2_000,
            max_retries: 2,
            retry_base_delay_ms: 250,
            max_pages: None,
            max_duration_secs: None,
            host_idle_eviction_secs: 300,
        }
    }
}

impl CrawlerConfig {
    pub fn min_host_delay(&self) -> Duration {
        Duration::from_millis(self.min_host_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }

    pub fn max_duration(&self) -> Option<Duration> {
        self.max_duration_secs.map(Duration::from_secs)
    }

    pub fn host_idle_eviction(&self) -> Duration {
        Duration::from_secs(self.host_idle_eviction_secs)
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct UserAgentConfig {
    /// Name of the crawler
    pub crawler_name: String,

    /// Version of the crawler
    pub crawler_version: String,

    /// URL with information about the crawler
    pub contact_url: Option<String>,
}

impl Default for UserAgentConfig {
    fn default() -> Self {
        Self {
            crawler_name: "SumiSieve".to_string(),
            crawler_version: env!("CARGO_PKG_VERSION").to_string(),
            contact_url: None,
        }
    }
}

impl UserAgentConfig {
    /// Formats the user agent header value
    ///
    /// Format: `CrawlerName/Version (+ContactURL)`, the parenthesised part is
    /// omitted when no contact URL is configured.
    pub fn header_value(&self) -> String {
        match &self.contact_url {
            Some(contact) => format!(
                "{}/{} (+{})",
                self.crawler_name, self.crawler_version, contact
            ),
            None => format!("{}/{}", self.crawler_name, self.crawler_version),
        }
    }
}
