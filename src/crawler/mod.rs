//! Crawler module for web page fetching and processing
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching with manual redirects and error classification
//! - HTML content and link extraction
//! - Per-host politeness throttling
//! - The deduplicated crawl frontier
//! - Overall crawl coordination

mod coordinator;
mod extractor;
mod fetcher;
mod frontier;
mod throttle;

pub use coordinator::{CrawlSession, Crawler};
pub use extractor::{extract, Extractor, PageContent, DEFAULT_CHAR_CAP, NO_TITLE};
pub use fetcher::{build_http_client, FetchResult, Fetcher, FetcherConfig};
pub use frontier::{CrawlTask, Frontier};
pub use throttle::{HostPermit, HostThrottle, ThrottleConfig};
