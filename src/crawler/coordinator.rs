//! Crawler coordinator - main crawl orchestration logic
//!
//! This module contains the crawl loop that ties the other components together:
//! - Seeding the frontier
//! - Keeping at most `max_concurrent_workers` tasks in flight
//! - Running each task through throttle, fetcher and extractor
//! - Retrying transient failures with exponential backoff
//! - Enforcing page and time budgets and cancellation
//! - Streaming records to the caller as they are produced

use crate::config::{CrawlerConfig, UserAgentConfig};
use crate::crawler::{CrawlTask, Extractor, FetchResult, Fetcher, FetcherConfig, Frontier};
use crate::crawler::{HostThrottle, ThrottleConfig};
use crate::output::{CrawlOutcome, CrawlRecord, CrawlStats, StopReason};
use crate::state::{TaskLifecycle, TaskState};
use crate::url::{host_key, resolve_link};
use crate::{ConfigError, CrawlError, ErrorKind, SieveError};
use chrono::Utc;
use futures::{Stream, StreamExt};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;

/// Components shared by the driver and every worker task
#[derive(Debug)]
struct Shared {
    config: CrawlerConfig,
    fetcher: Fetcher,
    extractor: Extractor,
    throttle: HostThrottle,
}

/// Entry point for running crawls
///
/// A `Crawler` owns the HTTP client and the per-host throttle, so sessions
/// started from the same crawler share politeness state.
///
/// # Example
///
/// ```no_run
/// use futures::StreamExt;
/// use sumi_sieve::config::{CrawlerConfig, UserAgentConfig};
/// use sumi_sieve::Crawler;
///
/// # async fn run() -> sumi_sieve::Result<()> {
/// let crawler = Crawler::new(CrawlerConfig::default(), UserAgentConfig::default())?;
/// let mut session = crawler.crawl(["https://example.com/"])?;
/// while let Some(record) = session.next().await {
///     println!("{} (depth {})", record.url, record.depth);
/// }
/// let stats = session.finish().await?;
/// println!("{} pages", stats.pages_succeeded);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Crawler {
    shared: Arc<Shared>,
    cancel: CancellationToken,
}

impl Crawler {
    /// Creates a crawler from its configuration
    ///
    /// # Returns
    ///
    /// * `Ok(Crawler)` - Ready to start sessions
    /// * `Err(SieveError)` - The HTTP client could not be built
    pub fn new(config: CrawlerConfig, user_agent: UserAgentConfig) -> Result<Self, SieveError> {
        let fetcher = Fetcher::new(FetcherConfig::new(
            &user_agent,
            config.request_timeout(),
            config.max_redirects,
        ))?;

        let throttle = HostThrottle::new(ThrottleConfig {
            max_concurrent_per_host: config.max_concurrent_per_host,
            min_delay: config.min_host_delay(),
            idle_eviction: config.host_idle_eviction(),
        });

        let extractor = Extractor::new(config.content_char_cap);

        Ok(Self {
            shared: Arc::new(Shared {
                config,
                fetcher,
                extractor,
                throttle,
            }),
            cancel: CancellationToken::new(),
        })
    }

    pub fn config(&self) -> &CrawlerConfig {
        &self.shared.config
    }

    /// Token that cancels every session started from this crawler
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Starts a crawl from the given seeds
    ///
    /// Seeds that fail to normalize are logged and skipped. Must be called
    /// from within a Tokio runtime.
    ///
    /// # Returns
    ///
    /// * `Ok(CrawlSession)` - The crawl is running; poll it for records
    /// * `Err(SieveError::Config(ConfigError::NoValidSeeds))` - Nothing to crawl
    pub fn crawl<I, S>(&self, seeds: I) -> Result<CrawlSession, SieveError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let frontier = Arc::new(Frontier::new(self.shared.config.max_depth));

        let mut seeded = 0;
        for seed in seeds {
            let seed = seed.as_ref();
            match CrawlTask::seed(seed) {
                Ok(task) => {
                    if frontier.enqueue(task) {
                        seeded += 1;
                    }
                }
                Err(e) => tracing::warn!("Skipping invalid seed {}: {}", seed, e),
            }
        }

        if seeded == 0 {
            return Err(ConfigError::NoValidSeeds.into());
        }

        tracing::info!(
            "Starting crawl with {} seeds (max depth {}, {} workers)",
            seeded,
            self.shared.config.max_depth,
            self.shared.config.max_concurrent_workers
        );

        let cancel = self.cancel.child_token();
        let capacity = self.shared.config.max_concurrent_workers.max(1) * 2;
        let (tx, rx) = mpsc::channel(capacity);

        let driver = Driver {
            shared: Arc::clone(&self.shared),
            frontier,
            cancel: cancel.clone(),
            records: tx,
        };
        let handle = tokio::spawn(driver.run());

        Ok(CrawlSession {
            records: ReceiverStream::new(rx),
            cancel,
            driver: handle,
        })
    }
}

/// A running crawl
///
/// Yields one [`CrawlRecord`] per visited URL, in completion order. The stream
/// ends when the crawl stops for any reason.
#[derive(Debug)]
pub struct CrawlSession {
    records: ReceiverStream<CrawlRecord>,
    cancel: CancellationToken,
    driver: JoinHandle<CrawlStats>,
}

impl CrawlSession {
    /// Stops the crawl
    ///
    /// In-flight fetches are aborted and produce no record.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Waits for the crawl to stop and returns its statistics
    ///
    /// Records not yet consumed are discarded.
    pub async fn finish(mut self) -> Result<CrawlStats, SieveError> {
        while self.records.next().await.is_some() {}
        Ok(self.driver.await?)
    }
}

impl Stream for CrawlSession {
    type Item = CrawlRecord;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.records).poll_next(cx)
    }
}

/// What a worker hands back to the driver
#[derive(Debug)]
struct TaskReport {
    record: CrawlRecord,
    links_enqueued: u64,
}

/// Owns the worker set for one session
struct Driver {
    shared: Arc<Shared>,
    frontier: Arc<Frontier>,
    cancel: CancellationToken,
    records: mpsc::Sender<CrawlRecord>,
}

impl Driver {
    /// Runs the crawl loop until the frontier drains, a budget runs out, or
    /// the session is cancelled
    async fn run(self) -> CrawlStats {
        let started = Instant::now();
        let mut stats = CrawlStats::new(Utc::now());
        let config = &self.shared.config;
        let max_workers = config.max_concurrent_workers.max(1);
        let deadline = config.max_duration().map(|d| started + d);

        let mut workers: JoinSet<Result<Option<TaskReport>, SieveError>> = JoinSet::new();
        let mut budget_hit: Option<StopReason> = None;

        loop {
            if self.cancel.is_cancelled() {
                stats.stop_reason = StopReason::Cancelled;
                break;
            }

            // Top up in-flight tasks
            while budget_hit.is_none() && workers.len() < max_workers {
                if let Some(limit) = config.max_pages {
                    if stats.pages_started >= limit as u64 {
                        tracing::info!("Page budget of {} reached", limit);
                        budget_hit = Some(StopReason::PageBudget);
                        break;
                    }
                }
                if deadline.is_some_and(|d| Instant::now() >= d) {
                    tracing::info!("Time budget reached after {:?}", started.elapsed());
                    budget_hit = Some(StopReason::TimeBudget);
                    break;
                }

                let Some(task) = self.frontier.dequeue() else {
                    break;
                };

                tracing::debug!("Dequeued {} (depth {})", task.url(), task.depth());
                stats.pages_started += 1;
                workers.spawn(run_task(
                    Arc::clone(&self.shared),
                    Arc::clone(&self.frontier),
                    task,
                    self.cancel.clone(),
                ));
            }

            if workers.is_empty() {
                stats.stop_reason = budget_hit.unwrap_or(StopReason::Exhausted);
                break;
            }

            // Reap one completed task
            let joined = tokio::select! {
                _ = self.cancel.cancelled() => continue,
                joined = workers.join_next() => joined,
            };

            let report = match joined {
                Some(Ok(Ok(Some(report)))) => report,
                Some(Ok(Ok(None))) => continue,
                Some(Ok(Err(e))) => {
                    tracing::error!("Crawl task aborted: {}", e);
                    continue;
                }
                Some(Err(e)) => {
                    if !e.is_cancelled() {
                        tracing::error!("Crawl task panicked: {}", e);
                    }
                    continue;
                }
                None => continue,
            };

            stats.record(&report.record);
            stats.links_enqueued += report.links_enqueued;

            if stats.pages_completed() % 10 == 0 {
                tracing::info!(
                    "Progress: {} pages done, {} in frontier, {} in flight",
                    stats.pages_completed(),
                    self.frontier.len(),
                    workers.len()
                );
            }

            let sent = tokio::select! {
                _ = self.cancel.cancelled() => continue,
                sent = self.records.send(report.record) => sent,
            };
            if sent.is_err() {
                tracing::debug!("Record receiver dropped, stopping crawl");
                self.cancel.cancel();
            }
        }

        if !workers.is_empty() {
            tracing::debug!("Aborting {} in-flight tasks", workers.len());
            workers.shutdown().await;
        }

        self.frontier.clear();
        stats.elapsed = started.elapsed();

        tracing::info!(
            "Crawl finished ({}): {} succeeded, {} failed in {:?}",
            stats.stop_reason,
            stats.pages_succeeded,
            stats.pages_failed,
            stats.elapsed
        );

        stats
    }
}

/// Processes one task from permit to record
///
/// Returns `Ok(None)` when the session was cancelled before the task finished.
async fn run_task(
    shared: Arc<Shared>,
    frontier: Arc<Frontier>,
    task: CrawlTask,
    cancel: CancellationToken,
) -> Result<Option<TaskReport>, SieveError> {
    let mut lifecycle = TaskLifecycle::new();

    let Some(host) = host_key(task.url()) else {
        lifecycle.transition(TaskState::Failed)?;
        let err = CrawlError::new(ErrorKind::InvalidUrl, "URL has no host");
        return Ok(Some(failed(&task, &lifecycle, err)));
    };

    loop {
        lifecycle.transition(TaskState::Fetching)?;

        let permit = tokio::select! {
            _ = cancel.cancelled() => return Ok(None),
            permit = shared.throttle.acquire(&host) => permit,
        };

        tracing::debug!(
            "Fetching {} (attempt {})",
            task.url(),
            lifecycle.attempts()
        );
        let result = tokio::select! {
            _ = cancel.cancelled() => return Ok(None),
            result = shared.fetcher.fetch(task.url().as_str()) => result,
        };

        match result {
            FetchResult::Success {
                final_url, body, ..
            } => {
                lifecycle.transition(TaskState::Extracting)?;

                // Redirect hops ran under this host's permit; marking the
                // target seen keeps it from being fetched a second time.
                if final_url != *task.url() {
                    frontier.mark_seen(&final_url);
                }

                let page = shared.extractor.extract(&body);
                if page.degraded {
                    tracing::warn!("{}: {}", task.url(), ErrorKind::ParseDegraded);
                }

                let links_enqueued = enqueue_links(&frontier, &task, &page.links);
                lifecycle.transition(TaskState::Succeeded)?;
                shared.throttle.release(permit);

                return Ok(Some(TaskReport {
                    record: CrawlRecord {
                        url: task.url().clone(),
                        depth: task.depth(),
                        attempts: lifecycle.attempts(),
                        fetched_at: Utc::now(),
                        outcome: CrawlOutcome::Page(page),
                    },
                    links_enqueued,
                }));
            }

            FetchResult::Failure(err) => {
                shared.throttle.release(permit);

                if err.kind.is_transient() && lifecycle.attempts() <= shared.config.max_retries {
                    lifecycle.transition(TaskState::Queued)?;
                    let backoff = backoff_delay(
                        shared.config.retry_base_delay(),
                        lifecycle.attempts() - 1,
                    );
                    tracing::debug!(
                        "Retrying {} in {:?} after {}",
                        task.url(),
                        backoff,
                        err
                    );

                    tokio::select! {
                        _ = cancel.cancelled() => return Ok(None),
                        _ = tokio::time::sleep(backoff) => {}
                    }
                    continue;
                }

                lifecycle.transition(TaskState::Failed)?;
                tracing::warn!(
                    "Failed {} after {} attempt(s): {}",
                    task.url(),
                    lifecycle.attempts(),
                    err
                );
                return Ok(Some(failed(&task, &lifecycle, err)));
            }
        }
    }
}

fn failed(task: &CrawlTask, lifecycle: &TaskLifecycle, err: CrawlError) -> TaskReport {
    TaskReport {
        record: CrawlRecord {
            url: task.url().clone(),
            depth: task.depth(),
            attempts: lifecycle.attempts(),
            fetched_at: Utc::now(),
            outcome: CrawlOutcome::Failed(err),
        },
        links_enqueued: 0,
    }
}

/// Resolves raw hrefs against the task URL and queues the new ones
///
/// Returns the number of links that entered the frontier.
fn enqueue_links(frontier: &Frontier, task: &CrawlTask, links: &[String]) -> u64 {
    if task.depth() >= frontier.max_depth() {
        return 0;
    }

    let mut added = 0;
    for href in links {
        match resolve_link(href, task.url()) {
            Some(url) => {
                if frontier.enqueue(task.child(url)) {
                    added += 1;
                }
            }
            None => tracing::trace!("Ignoring link {:?} on {}", href, task.url()),
        }
    }

    added
}

/// Delay before retry number `retry` (0-based): `base * 2^retry`
fn backoff_delay(base: Duration, retry: u32) -> Duration {
    base.checked_mul(1u32 << retry.min(16))
        .unwrap_or(Duration::MAX)
}
