//! Crawl output records
//!
//! One record is produced per visited URL, carrying either the extracted page
//! content or the structured error that ended the task.

use crate::crawler::PageContent;
use crate::CrawlError;
use chrono::{DateTime, Utc};
use url::Url;

/// What came of visiting one URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CrawlOutcome {
    /// Page fetched and extracted
    Page(PageContent),
    /// Task ended with a terminal classification
    Failed(CrawlError),
}

/// Output record for one visited URL
#[derive(Debug, Clone)]
pub struct CrawlRecord {
    /// The URL as dequeued from the frontier
    pub url: Url,

    /// Distance from the seeds
    pub depth: u32,

    /// Number of fetch attempts made
    pub attempts: u32,

    /// When the task finished
    pub fetched_at: DateTime<Utc>,

    pub outcome: CrawlOutcome,
}

impl CrawlRecord {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, CrawlOutcome::Page(_))
    }

    pub fn page(&self) -> Option<&PageContent> {
        match &self.outcome {
            CrawlOutcome::Page(page) => Some(page),
            CrawlOutcome::Failed(_) => None,
        }
    }

    pub fn error(&self) -> Option<&CrawlError> {
        match &self.outcome {
            CrawlOutcome::Page(_) => None,
            CrawlOutcome::Failed(err) => Some(err),
        }
    }
}

/// Formats a record for terminal output
///
/// # Arguments
///
/// * `record` - The record to format
/// * `show_links` - Whether to list the raw links found on the page
pub fn format_record(record: &CrawlRecord, show_links: bool) -> String {
    let mut out = format!("=== {} (depth {}) ===\n", record.url, record.depth);

    match &record.outcome {
        CrawlOutcome::Page(page) => {
            out.push_str(&page.summary());
            out.push('\n');

            if show_links && !page.links.is_empty() {
                out.push_str(&format!("\nLinks ({}):\n", page.links.len()));
                for link in &page.links {
                    out.push_str(&format!("  - {}\n", link));
                }
            }
        }
        CrawlOutcome::Failed(err) => {
            out.push_str(&format!(
                "Error after {} attempt(s): {}\n",
                record.attempts, err
            ));
        }
    }

    out
}
