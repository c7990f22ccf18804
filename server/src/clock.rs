//! World time sources.
//!
//! All scheduling decisions are expressed in [`Millis`]: milliseconds on a
//! monotonic clock whose origin is the moment the clock was created. Callers
//! never advance time themselves; only a [`Clock`] implementation does.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::Instant;

/// Absolute world time in milliseconds.
pub type Millis = u64;

/// Monotonic source of the current world time.
pub trait Clock: Send + Sync {
    fn now(&self) -> Millis;
}

/// Converts a delay into whole milliseconds, saturating on overflow.
pub fn to_millis(duration: Duration) -> Millis {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Production clock backed by the tokio timer, so paused-time tests and the
/// dispatch loop's sleeps agree on what "now" is.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> Millis {
        to_millis(self.origin.elapsed())
    }
}

/// Hand-driven clock for deterministic simulation and tests.
///
/// Time only moves forward: `set` with an earlier value is ignored.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    pub fn new(start: Millis) -> Self {
        Self {
            now: AtomicU64::new(start),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.now.fetch_add(to_millis(by), Ordering::SeqCst);
    }

    pub fn set(&self, to: Millis) {
        self.now.fetch_max(to, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Millis {
        self.now.load(Ordering::SeqCst)
    }
}
