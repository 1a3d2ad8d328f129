// SPDX-License-Identifier: MIT

//! Clock abstraction for testable time handling.
//!
//! The pump and its retry policies sleep and measure idle duration; tests
//! need to fast-forward through those waits without actually sleeping.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// A clock that provides the current time.
pub trait Clock: Clone + Send + Sync + 'static {
    fn now(&self) -> Instant;
    fn epoch_ms(&self) -> u64;

    /// Sleep for `dur`. Real clocks delegate to `tokio::time::sleep`; fake
    /// clocks advance themselves and return immediately.
    fn sleep(&self, dur: Duration) -> futures_sleep::BoxSleep;
}

/// Real system clock, backed by `tokio::time::sleep`.
#[derive(Clone, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn epoch_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64
    }

    fn sleep(&self, dur: Duration) -> futures_sleep::BoxSleep {
        Box::pin(tokio::time::sleep(dur))
    }
}

/// Fake clock for testing with controllable time. Sleeps resolve immediately
/// and simply advance the recorded instant, so retry/backoff tests run fast.
#[derive(Clone)]
pub struct FakeClock {
    current: Arc<Mutex<Instant>>,
    epoch_ms: Arc<Mutex<u64>>,
}

impl FakeClock {
    pub fn new() -> Self {
        Self {
            current: Arc::new(Mutex::new(Instant::now())),
            epoch_ms: Arc::new(Mutex::new(1_000_000)),
        }
    }

    pub fn advance(&self, duration: Duration) {
        *self.current.lock() += duration;
        *self.epoch_ms.lock() += duration.as_millis() as u64;
    }

    pub fn set_epoch_ms(&self, ms: u64) {
        *self.epoch_ms.lock() = ms;
    }
}

impl Default for FakeClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for FakeClock {
    fn now(&self) -> Instant {
        *self.current.lock()
    }

    fn epoch_ms(&self) -> u64 {
        *self.epoch_ms.lock()
    }

    fn sleep(&self, dur: Duration) -> futures_sleep::BoxSleep {
        self.advance(dur);
        Box::pin(std::future::ready(()))
    }
}

/// Tiny module so `Clock::sleep`'s boxed-future type has a home without
/// pulling in a whole async-trait for a one-method trait.
pub mod futures_sleep {
    use std::future::Future;
    use std::pin::Pin;

    pub type BoxSleep = Pin<Box<dyn Future<Output = ()> + Send>>;
}

#[cfg(test)]
#[path = "clock_tests.rs"]
mod tests;
