//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `TaskState`: Lifecycle of one crawl task (queued, fetching, extracting, done)
//! - `TaskLifecycle`: Enforces legal transitions between task states
//! - `HostState`: Per-host bookkeeping used by the host throttle

mod host_state;
mod task_state;

// Re-export main types
pub use host_state::HostState;
pub use task_state::{TaskLifecycle, TaskState};
