//! Crawl statistics
//!
//! Counters accumulated by the coordinator while a session runs, and a
//! formatted printout for the CLI.

use crate::output::{CrawlOutcome, CrawlRecord};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

/// Why a crawl session stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StopReason {
    /// Frontier drained and nothing in flight
    #[default]
    Exhausted,
    /// `max_pages` reached
    PageBudget,
    /// `max_duration_secs` elapsed
    TimeBudget,
    /// Session was cancelled
    Cancelled,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Exhausted => "frontier exhausted",
            Self::PageBudget => "page budget reached",
            Self::TimeBudget => "time budget reached",
            Self::Cancelled => "cancelled",
        };
        write!(f, "{}", label)
    }
}

/// Crawl statistics summary
#[derive(Debug, Clone)]
pub struct CrawlStats {
    pub started_at: DateTime<Utc>,

    pub elapsed: Duration,

    /// Tasks dequeued from the frontier
    pub pages_started: u64,

    /// Records emitted with page content
    pub pages_succeeded: u64,

    /// Records emitted with a terminal error
    pub pages_failed: u64,

    /// Successful pages whose extraction fell back to empty content
    pub pages_degraded: u64,

    /// Failed records by error kind label
    pub failures_by_kind: HashMap<&'static str, u64>,

    /// Fetch attempts beyond the first
    pub retries: u64,

    /// Raw links found on successful pages
    pub links_discovered: u64,

    /// Links that were new and within depth, and so entered the frontier
    pub links_enqueued: u64,

    pub stop_reason: StopReason,
}

impl CrawlStats {
    pub fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            elapsed: Duration::ZERO,
            pages_started: 0,
            pages_succeeded: 0,
            pages_failed: 0,
            pages_degraded: 0,
            failures_by_kind: HashMap::new(),
            retries: 0,
            links_discovered: 0,
            links_enqueued: 0,
            stop_reason: StopReason::default(),
        }
    }

    /// Folds one emitted record into the counters
    pub fn record(&mut self, record: &CrawlRecord) {
        self.retries += u64::from(record.attempts.saturating_sub(1));

        match &record.outcome {
            CrawlOutcome::Page(page) => {
                self.pages_succeeded += 1;
                self.links_discovered += page.links.len() as u64;
                if page.degraded {
                    self.pages_degraded += 1;
                }
            }
            CrawlOutcome::Failed(err) => {
                self.pages_failed += 1;
                *self.failures_by_kind.entry(err.kind.label()).or_insert(0) += 1;
            }
        }
    }

    /// Pages that produced a record
    pub fn pages_completed(&self) -> u64 {
        self.pages_succeeded + self.pages_failed
    }

    /// Percentage of completed pages that succeeded
    pub fn success_rate(&self) -> f64 {
        let completed = self.pages_completed();
        if completed == 0 {
            0.0
        } else {
            (self.pages_succeeded as f64 / completed as f64) * 100.0
        }
    }
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &CrawlStats) {
    println!("=== Crawl Statistics ===\n");

    println!("Overview:");
    println!("  Started: {}", stats.started_at.to_rfc3339());
    println!("  Elapsed: {:.1}s", stats.elapsed.as_secs_f64());
    println!("  Stopped: {}", stats.stop_reason);
    println!("  Pages started: {}", stats.pages_started);
    println!("  Pages succeeded: {}", stats.pages_succeeded);
    println!("  Pages failed: {}", stats.pages_failed);
    println!("  Degraded extractions: {}", stats.pages_degraded);
    println!("  Retries: {}", stats.retries);
    println!("  Links found: {}", stats.links_discovered);
    println!("  Links enqueued: {}", stats.links_enqueued);
    println!();

    let mut error_counts: Vec<_> = stats
        .failures_by_kind
        .iter()
        .filter(|(_, count)| **count > 0)
        .collect();
    if !error_counts.is_empty() {
        println!("Error Summary:");
        error_counts.sort_by(|a, b| b.1.cmp(a.1).then(a.0.cmp(b.0)));
        for (kind, count) in error_counts {
            println!("  {}: {}", kind, count);
        }
        println!();
    }

    println!(
        "Success Rate: {:.1}% ({} / {} pages)",
        stats.success_rate(),
        stats.pages_succeeded,
        stats.pages_completed()
    );
}
