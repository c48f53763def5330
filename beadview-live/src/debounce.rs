//! Trailing-edge debouncer driven by the scheduler loop.

use std::time::Duration;

use tokio::time::Instant;

/// Collapses a burst of signals into one fire, `quiet` after the last signal.
///
/// The debouncer owns no timer. The scheduler polls [`Debouncer::deadline`]
/// in its select loop and calls [`Debouncer::fire_if_due`] when it elapses.
#[derive(Debug, Clone)]
pub struct Debouncer {
    quiet: Duration,
    deadline: Option<Instant>,
}

impl Debouncer {
    pub fn new(quiet: Duration) -> Self {
        Self {
            quiet,
            deadline: None,
        }
    }

    pub fn quiet(&self) -> Duration {
        self.quiet
    }

    /// Arm, or push an armed deadline out to `now + quiet`.
    pub fn signal(&mut self, now: Instant) {
        self.deadline = Some(now + self.quiet);
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Disarm and return true when the deadline has passed.
    pub fn fire_if_due(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}
