//! Monotonic time for the pool.
//!
//! Idle sessions are stamped when they come back and reclaimed once
//! [`PoolConfig::idle_timeout`](crate::PoolConfig::idle_timeout) has passed
//! on the pool's [`Clock`].
//!
//! ```
//! use std::time::Duration;
//! use mailwire_core::time::{Clock, MockClock};
//!
//! let clock = MockClock::new();
//! let parked = clock.now();
//! clock.advance(Duration::from_secs(90));
//! assert!(clock.has_elapsed(parked, Duration::from_secs(60)));
//! ```

use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Where the pool reads "now" from.
pub trait Clock: Send + Sync {
    /// Current instant.
    fn now(&self) -> Instant;

    /// Time since `earlier`, zero if `earlier` is in the future.
    fn elapsed(&self, earlier: Instant) -> Duration {
        self.now().saturating_duration_since(earlier)
    }

    /// Whether at least `span` has passed since `earlier`.
    fn has_elapsed(&self, earlier: Instant, span: Duration) -> bool {
        self.elapsed(earlier) >= span
    }
}

/// Tokio's clock. Honors `start_paused` and `tokio::time::advance`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        tokio::time::Instant::now().into_std()
    }
}

/// Hand-driven clock for tests.
#[derive(Debug)]
pub struct MockClock {
    start: Instant,
    current: Mutex<Instant>,
}

impl MockClock {
    /// Frozen at the moment of creation.
    #[must_use]
    pub fn new() -> Self {
        let start = Instant::now();
        Self {
            start,
            current: Mutex::new(start),
        }
    }

    /// Steps forward by `step`.
    pub fn advance(&self, step: Duration) {
        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        *current += step;
    }

    /// Total distance advanced since creation.
    #[must_use]
    pub fn offset(&self) -> Duration {
        self.now() - self.start
    }
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MockClock {
    fn now(&self) -> Instant {
        *self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
