//! Absolute-deadline scheduling for the poll loop.
//!
//! Cycles sleep until `start + interval` instead of sleeping a relative
//! interval after the work is done, so variable read durations do not
//! accumulate drift.

use std::thread;
use std::time::{Duration, Instant};

/// Sleeps until `deadline`, returning immediately if it already passed.
pub fn sleep_until(deadline: Instant) {
    let remaining = deadline.saturating_duration_since(Instant::now());
    if !remaining.is_zero() {
        thread::sleep(remaining);
    }
}

/// A rearmable absolute deadline.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    at: Instant,
}

impl Deadline {
    /// Deadline at `interval` past `start`.
    pub fn from_start(start: Instant, interval: Duration) -> Self {
        Self {
            at: start + interval,
        }
    }

    /// Deadline at `interval` past now.
    pub fn after(interval: Duration) -> Self {
        Self::from_start(Instant::now(), interval)
    }

    /// Blocks the calling thread until the deadline passes.
    pub fn sleep(&self) {
        sleep_until(self.at);
    }

    /// Returns true once the deadline has passed, rearming it to `interval`
    /// past the current time. Intended for periodic housekeeping checks.
    pub fn check_and_rearm(&mut self, interval: Duration) -> bool {
        let now = Instant::now();
        if now < self.at {
            return false;
        }
        self.at = now + interval;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sleep_until_past_deadline_returns_immediately() {
        let deadline = Instant::now();
        let before = Instant::now();
        sleep_until(deadline);
        assert!(before.elapsed() < Duration::from_millis(100));
    }

    #[test]
    fn deadline_sleeps_roughly_the_interval() {
        let started = Instant::now();
        Deadline::from_start(started, Duration::from_millis(30)).sleep();
        assert!(started.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn check_and_rearm() {
        let mut deadline = Deadline::after(Duration::from_secs(3600));
        assert!(!deadline.check_and_rearm(Duration::from_secs(3600)));

        let mut deadline = Deadline::after(Duration::ZERO);
        assert!(deadline.check_and_rearm(Duration::from_secs(3600)));
        // Rearmed one hour ahead, not due again.
        assert!(!deadline.check_and_rearm(Duration::from_secs(3600)));
    }
}
