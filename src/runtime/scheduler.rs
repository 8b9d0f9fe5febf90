//! Trailing-edge debounce for refresh flushes.
//!
//! Several modules of one HMR batch validate one after the other. Each
//! accepted validation pushes the single pending deadline forward, so the
//! batch produces one flush after the last acceptance.

use std::time::Duration;

use tokio::time::Instant;

/// Roughly one animation frame.
pub const DEFAULT_FLUSH_DELAY: Duration = Duration::from_millis(16);

/// Single-slot pending flush.
#[derive(Debug, Clone)]
pub struct UpdateDebouncer {
    delay: Duration,
    deadline: Option<Instant>,
}

impl UpdateDebouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            deadline: None,
        }
    }

    /// Set the deadline to `now + delay`. Returns `true` if a pending
    /// deadline was replaced.
    pub fn schedule(&mut self, now: Instant) -> bool {
        self.deadline.replace(now + self.delay).is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Clear the slot if its deadline is at or before `now`.
    pub fn take_due(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if deadline <= now => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }

    /// Clear the slot regardless of its deadline.
    pub fn take(&mut self) -> bool {
        self.deadline.take().is_some()
    }
}

impl Default for UpdateDebouncer {
    fn default() -> Self {
        Self::new(DEFAULT_FLUSH_DELAY)
    }
}
