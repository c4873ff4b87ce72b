//! Crawl frontier: the queue of URLs still to visit plus the set already seen
//!
//! The frontier is breadth-first: tasks come out in the order they went in, so
//! every page at depth `d` is dequeued before any page discovered from it.

use crate::url::normalize_url;
use crate::UrlError;
use std::collections::{HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use url::Url;

/// A URL waiting to be crawled, with its distance from the seeds
///
/// Tasks are immutable once created; the URL is always normalized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlTask {
    url: Url,
    depth: u32,
}

impl CrawlTask {
    /// Creates a task from an already normalized URL
    pub fn new(url: Url, depth: u32) -> Self {
        Self { url, depth }
    }

    /// Creates a depth-0 task from a seed string
    pub fn seed(url: &str) -> Result<Self, UrlError> {
        Ok(Self::new(normalize_url(url)?, 0))
    }

    /// Creates the task for a link discovered on this task's page
    pub fn child(&self, url: Url) -> Self {
        Self::new(url, self.depth + 1)
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }
}

#[derive(Debug, Default)]
struct FrontierInner {
    queue: VecDeque<CrawlTask>,
    seen: HashSet<String>,
}

/// Deduplicated FIFO queue of crawl tasks
///
/// All mutation goes through one internal mutex; no lock is held across an
/// await point.
#[derive(Debug)]
pub struct Frontier {
    inner: Mutex<FrontierInner>,
    max_depth: u32,
}

impl Frontier {
    pub fn new(max_depth: u32) -> Self {
        Self {
            inner: Mutex::new(FrontierInner::default()),
            max_depth,
        }
    }

    fn lock(&self) -> MutexGuard<'_, FrontierInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn max_depth(&self) -> u32 {
        self.max_depth
    }

    /// Adds a task unless its URL was already seen or it is too deep
    ///
    /// # Returns
    ///
    /// * `true` - The task was queued and its URL marked seen
    /// * `false` - Nothing changed
    pub fn enqueue(&self, task: CrawlTask) -> bool {
        if task.depth > self.max_depth {
            tracing::trace!("Skipping {} - depth {} exceeds max", task.url, task.depth);
            return false;
        }

        let mut inner = self.lock();
        if !inner.seen.insert(task.url.as_str().to_string()) {
            return false;
        }

        inner.queue.push_back(task);
        true
    }

    /// Removes and returns the oldest queued task
    pub fn dequeue(&self) -> Option<CrawlTask> {
        self.lock().queue.pop_front()
    }

    /// Marks a URL as seen without queueing it
    ///
    /// Idempotent; returns true only the first time a URL is marked.
    pub fn mark_seen(&self, url: &Url) -> bool {
        self.lock().seen.insert(url.as_str().to_string())
    }

    pub fn is_seen(&self, url: &Url) -> bool {
        self.lock().seen.contains(url.as_str())
    }

    /// Number of tasks waiting in the queue
    pub fn len(&self) -> usize {
        self.lock().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().queue.is_empty()
    }

    /// Number of URLs ever enqueued or marked seen
    pub fn seen_len(&self) -> usize {
        self.lock().seen.len()
    }

    /// Drops all queued tasks and forgets every seen URL
    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.queue.clear();
        inner.seen.clear();
    }
}
