//! Debounce timers with explicit time.
//!
//! Callers pass `now` into every call, so tests drive the clock themselves
//! instead of sleeping. Each `request` cancels the pending deadline and
//! reschedules: bursts collapse into a single firing one window after the
//! last request.

use std::time::{Duration, Instant};
use tracing::trace;

#[derive(Debug, Clone)]
pub struct Debouncer {
    name: &'static str,
    window: Duration,
    deadline: Option<Instant>,
}

impl Debouncer {
    pub fn new(name: &'static str, window: Duration) -> Self {
        Self {
            name,
            window,
            deadline: None,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn request(&mut self, now: Instant) {
        let superseded = self.deadline.is_some();
        self.deadline = Some(now + self.window);
        trace!(target: "scheduler", name = self.name, superseded, "debounce request");
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// True exactly once per burst, on the first poll at or after the deadline.
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                trace!(target: "scheduler", name = self.name, "debounce fired");
                true
            }
            _ => false,
        }
    }
}
