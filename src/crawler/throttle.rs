//! Per-host politeness throttle
//!
//! This module handles:
//! - Limiting simultaneous requests to one host via a per-host semaphore
//! - Enforcing a minimum delay between the end of one request and the start
//!   of the next to the same host
//! - Evicting bookkeeping for hosts that have gone quiet
//!
//! The host map is locked only long enough to find or create an entry; all
//! waiting happens on per-host primitives, so hosts never block each other.

use crate::state::HostState;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Politeness primitives for one host
#[derive(Debug)]
struct HostSlot {
    /// Bounds in-flight requests to this host
    semaphore: Arc<Semaphore>,

    /// Admits request starts one at a time, in arrival order
    gate: tokio::sync::Mutex<()>,

    state: Mutex<HostState>,
}

impl HostSlot {
    fn new(max_concurrent: usize, now: Instant) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(max_concurrent)),
            gate: tokio::sync::Mutex::new(()),
            state: Mutex::new(HostState::new(now)),
        }
    }

    fn state(&self) -> MutexGuard<'_, HostState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// The right to perform one request against a host
///
/// Dropping the permit releases it and records the end of the request.
#[derive(Debug)]
pub struct HostPermit {
    host: String,
    slot: Arc<HostSlot>,
    _permit: OwnedSemaphorePermit,
}

impl HostPermit {
    pub fn host(&self) -> &str {
        &self.host
    }
}

impl Drop for HostPermit {
    fn drop(&mut self) {
        // Runs before the semaphore permit field is dropped, so the next
        // waiter always sees this request's end time.
        self.slot.state().record_end(Instant::now());
    }
}

/// Settings for [`HostThrottle`]
#[derive(Debug, Clone, Copy)]
pub struct ThrottleConfig {
    pub max_concurrent_per_host: usize,
    pub min_delay: Duration,
    pub idle_eviction: Duration,
}

/// Per-host concurrency and delay limiter
#[derive(Debug)]
pub struct HostThrottle {
    hosts: Mutex<HashMap<String, Arc<HostSlot>>>,
    config: ThrottleConfig,
    last_sweep: Mutex<Instant>,
}

impl HostThrottle {
    pub fn new(config: ThrottleConfig) -> Self {
        Self {
            hosts: Mutex::new(HashMap::new()),
            config: ThrottleConfig {
                max_concurrent_per_host: config.max_concurrent_per_host.max(1),
                ..config
            },
            last_sweep: Mutex::new(Instant::now()),
        }
    }

    fn hosts(&self) -> MutexGuard<'_, HashMap<String, Arc<HostSlot>>> {
        self.hosts.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Waits until a request to `host` may start and returns its permit
    ///
    /// Never fails; only delays. The wait covers both a free concurrency slot
    /// and the minimum delay since the previous request to the host ended.
    pub async fn acquire(&self, host: &str) -> HostPermit {
        self.maybe_sweep();
        let slot = self.slot_for(host);

        let permit = Arc::clone(&slot.semaphore)
            .acquire_owned()
            .await
            .expect("host semaphores are never closed");

        let gate = slot.gate.lock().await;
        loop {
            let wait = {
                let mut state = slot.state();
                let now = Instant::now();
                match state.time_until_next_request(self.config.min_delay, now) {
                    Some(wait) => wait,
                    None => {
                        state.record_start(now);
                        break;
                    }
                }
            };

            tracing::trace!("Host {} cooling down for {:?}", host, wait);
            tokio::time::sleep(wait).await;
        }
        drop(gate);

        HostPermit {
            host: host.to_string(),
            slot,
            _permit: permit,
        }
    }

    /// Releases a permit; equivalent to dropping it
    pub fn release(&self, permit: HostPermit) {
        drop(permit);
    }

    fn slot_for(&self, host: &str) -> Arc<HostSlot> {
        let mut hosts = self.hosts();
        let slot = hosts.entry(host.to_string()).or_insert_with(|| {
            Arc::new(HostSlot::new(
                self.config.max_concurrent_per_host,
                Instant::now(),
            ))
        });
        Arc::clone(slot)
    }

    fn maybe_sweep(&self) {
        let due = {
            let mut last = self.last_sweep.lock().unwrap_or_else(PoisonError::into_inner);
            if last.elapsed() >= self.config.idle_eviction {
                *last = Instant::now();
                true
            } else {
                false
            }
        };

        if due {
            let evicted = self.evict_idle();
            if evicted > 0 {
                tracing::debug!("Evicted {} idle hosts", evicted);
            }
        }
    }

    /// Forgets hosts idle longer than the eviction window
    ///
    /// A host is only evicted when no permit or waiter references it.
    /// Returns the number of hosts removed.
    pub fn evict_idle(&self) -> usize {
        let now = Instant::now();
        let window = self.config.idle_eviction;
        let mut hosts = self.hosts();
        let before = hosts.len();

        hosts.retain(|_, slot| Arc::strong_count(slot) > 1 || !slot.state().is_idle(window, now));

        before - hosts.len()
    }

    /// Number of hosts with live bookkeeping
    pub fn tracked_hosts(&self) -> usize {
        self.hosts().len()
    }

    /// Number of requests currently in flight to `host`
    pub fn in_flight(&self, host: &str) -> usize {
        self.hosts()
            .get(host)
            .map(|slot| slot.state().in_flight)
            .unwrap_or(0)
    }
}
