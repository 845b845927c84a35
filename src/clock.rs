//! A single process clock, threaded into every subsystem that needs "now".
//!
//! Business logic never reads the OS clock directly (spec §9 "Time
//! discipline"): it asks a `Clock` instead, so tests can drive time forward
//! deterministically.

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

/// Seconds since the Unix epoch.
pub type Timestamp = i64;

/// Something that can report the current time.
pub trait Clock: std::fmt::Debug {
    fn now(&self) -> Timestamp;
}

/// Production clock, backed by the OS.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        chrono::Utc::now().timestamp()
    }
}

/// Test clock: starts at a fixed instant and only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    pub fn new(start: Timestamp) -> Self {
        Self {
            now: AtomicI64::new(start),
        }
    }

    pub fn advance(&self, seconds: i64) {
        self.now.fetch_add(seconds, Ordering::Relaxed);
    }

    pub fn set(&self, value: Timestamp) {
        self.now.store(value, Ordering::Relaxed);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        self.now.load(Ordering::Relaxed)
    }
}

/// Shared handle to a clock, cheap to clone and pass around subsystems.
pub type SharedClock = Arc<dyn Clock + Send + Sync>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_advances() {
        let clock = ManualClock::new(1_000);
        assert_eq!(clock.now(), 1_000);
        clock.advance(60);
        assert_eq!(clock.now(), 1_060);
        clock.set(42);
        assert_eq!(clock.now(), 42);
    }

    #[test]
    fn system_clock_is_plausible() {
        let clock = SystemClock;
        assert!(clock.now() > 1_600_000_000);
    }
}
