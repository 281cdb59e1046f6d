//! Wall-clock abstraction for flight-plan scheduling.
//!
//! The storage core only needs the current unixtime (to purge overdue
//! flight-plan entries); the tick counter, delays and the rest of the OS
//! layer live outside this crate. The trait abstracts over:
//! - `SystemClock` for hosted targets
//! - `MockClock` for deterministic tests

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Source of the current UTC time as seconds since the Unix epoch.
pub trait Clock: Clone + Send + Sync {
    /// Returns the current unixtime in seconds.
    fn now_unix(&self) -> i64;
}

/// Wall clock backed by the host's system time.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_unix(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0)
    }
}

/// Mock clock with controllable time for testing.
///
/// Clones share the same underlying instant, so a handle kept by a test
/// can steer the time seen by the repository.
///
/// # Example
///
/// ```
/// use nanosat_store::core::{Clock, MockClock};
///
/// let clock = MockClock::new(1000);
/// assert_eq!(clock.now_unix(), 1000);
///
/// clock.advance(60);
/// assert_eq!(clock.now_unix(), 1060);
/// ```
#[derive(Clone, Debug, Default)]
pub struct MockClock {
    current: Arc<AtomicI64>,
}

impl MockClock {
    /// Creates a mock clock starting at the given unixtime.
    pub fn new(unixtime: i64) -> Self {
        Self {
            current: Arc::new(AtomicI64::new(unixtime)),
        }
    }

    /// Sets the current time to an absolute value.
    pub fn set(&self, unixtime: i64) {
        self.current.store(unixtime, Ordering::Relaxed);
    }

    /// Advances the current time by the specified amount of seconds.
    pub fn advance(&self, seconds: i64) {
        self.current.fetch_add(seconds, Ordering::Relaxed);
    }
}

impl Clock for MockClock {
    fn now_unix(&self) -> i64 {
        self.current.load(Ordering::Relaxed)
    }
}
