/// Task state definitions for tracking crawl progress
///
/// Every dequeued task walks `Queued -> Fetching -> Extracting -> Succeeded`,
/// or ends in `Failed`. A transient fetch failure sends it back to `Queued`
/// for another attempt.
use crate::SieveError;
use std::fmt;

/// Represents the current state of a task in the crawl process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskState {
    // ===== Active States =====
    /// Task is waiting for a host permit
    Queued,

    /// Request is in flight
    Fetching,

    /// Body received, content and links being extracted
    Extracting,

    // ===== Terminal States =====
    /// Page content was extracted and emitted
    Succeeded,

    /// Task ended with a terminal error classification
    Failed,
}

impl TaskState {
    /// Returns true if this is a terminal state (no further processing needed)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }

    /// Returns true if this is an active state (task may still be processed)
    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }

    /// Returns true if moving from `self` to `next` is a legal transition
    pub fn can_transition_to(&self, next: TaskState) -> bool {
        matches!(
            (self, next),
            (Self::Queued, Self::Fetching)
                | (Self::Queued, Self::Failed)
                | (Self::Fetching, Self::Extracting)
                | (Self::Fetching, Self::Queued)
                | (Self::Fetching, Self::Failed)
                | (Self::Extracting, Self::Succeeded)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Fetching => "fetching",
            Self::Extracting => "extracting",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Tracks one task through its states and counts fetch attempts
#[derive(Debug, Clone)]
pub struct TaskLifecycle {
    state: TaskState,
    attempts: u32,
}

impl TaskLifecycle {
    pub fn new() -> Self {
        Self {
            state: TaskState::Queued,
            attempts: 0,
        }
    }

    pub fn state(&self) -> TaskState {
        self.state
    }

    /// Number of times the task entered `Fetching`
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Moves to `next`, rejecting illegal transitions
    pub fn transition(&mut self, next: TaskState) -> Result<(), SieveError> {
        if !self.state.can_transition_to(next) {
            return Err(SieveError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }

        if next == TaskState::Fetching {
            self.attempts += 1;
        }

        tracing::trace!("Task state {} -> {}", self.state, next);
        self.state = next;
        Ok(())
    }
}

impl Default for TaskLifecycle {
    fn default() -> Self {
        Self::new()
    }
}
