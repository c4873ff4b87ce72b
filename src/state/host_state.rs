use std::time::{Duration, Instant};

/// Tracks the politeness state of one host during crawling
///
/// Owned by the host throttle and only mutated under its per-host lock.
#[derive(Debug, Clone)]
pub struct HostState {
    /// When the most recent request to this host finished
    pub last_request_end: Option<Instant>,

    /// Number of requests currently in flight
    pub in_flight: usize,

    /// Last time a request started or finished on this host
    pub last_active: Instant,

    /// Total requests started against this host
    pub request_count: u64,
}

impl HostState {
    pub fn new(now: Instant) -> Self {
        Self {
            last_request_end: None,
            in_flight: 0,
            last_active: now,
            request_count: 0,
        }
    }

    /// Calculates the time until the next request may start
    ///
    /// Returns None if a request can start now. The delay is measured from the
    /// end of the previous request.
    pub fn time_until_next_request(&self, min_delay: Duration, now: Instant) -> Option<Duration> {
        let last = self.last_request_end?;
        let elapsed = now.saturating_duration_since(last);
        if elapsed < min_delay {
            Some(min_delay - elapsed)
        } else {
            None
        }
    }

    /// Records that a request started
    pub fn record_start(&mut self, now: Instant) {
        self.in_flight += 1;
        self.request_count += 1;
        self.last_active = now;
    }

    /// Records that a request finished
    pub fn record_end(&mut self, now: Instant) {
        self.in_flight = self.in_flight.saturating_sub(1);
        self.last_request_end = Some(now);
        self.last_active = now;
    }

    /// Returns true if nothing is in flight and the host has been quiet
    /// for longer than `window`
    pub fn is_idle(&self, window: Duration, now: Instant) -> bool {
        self.in_flight == 0 && now.saturating_duration_since(self.last_active) > window
    }
}
