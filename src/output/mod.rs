//! Output module for crawl results
//!
//! This module handles:
//! - The per-URL records a crawl session yields
//! - Plain-text formatting of records for the CLI
//! - Recording and printing crawl statistics

mod record;
pub mod stats;

pub use record::{format_record, CrawlOutcome, CrawlRecord};
pub use stats::{print_statistics, CrawlStats, StopReason};
