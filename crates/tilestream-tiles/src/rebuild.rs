use std::cell::Cell;
use std::time::Duration;

/// A cancellable deferred trigger. Each [`Debouncer::schedule`] replaces the pending deadline, so a burst of requests
/// collapses into a single firing `delay` after the last one.
///
/// The debouncer never runs anything itself. The owner polls [`Debouncer::take_due`] once per event loop turn.
pub struct Debouncer {
    delay: Duration,
    deadline: Cell<Option<Duration>>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            deadline: Cell::new(None),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn schedule(&self, now: Duration) {
        self.deadline.set(Some(now + self.delay));
    }

    /// Returns `true` if a firing was pending.
    pub fn cancel(&self) -> bool {
        self.deadline.take().is_some()
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.get().is_some()
    }

    /// If the deadline has passed, clears it and returns `true`.
    pub fn take_due(&self, now: Duration) -> bool {
        match self.deadline.get() {
            Some(deadline) if now >= deadline => {
                self.deadline.set(None);
                true
            }
            _ => false,
        }
    }
}
