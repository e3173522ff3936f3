// src/utils/time.rs
//! Wall-clock access behind a trait so drivers can be tested with fixed time

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Time provider trait for dependency injection and testing
pub trait TimeProvider: Send + Sync {
    fn now_nanos(&self) -> u64;

    /// Seconds since the Unix epoch, the unit used for sample timestamps
    fn now_secs(&self) -> f64 {
        self.now_nanos() as f64 / 1e9
    }
}

/// System time provider using the actual system clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemTimeProvider;

impl TimeProvider for SystemTimeProvider {
    fn now_nanos(&self) -> u64 {
        current_timestamp_nanos()
    }
}

/// Mock time provider for deterministic testing
#[derive(Debug)]
pub struct MockTimeProvider {
    current_time: AtomicU64,
}

impl MockTimeProvider {
    pub fn new(initial_time_nanos: u64) -> Self {
        Self {
            current_time: AtomicU64::new(initial_time_nanos),
        }
    }

    /// Provider frozen at `secs` seconds after the epoch
    pub fn at_secs(secs: f64) -> Self {
        Self::new((secs * 1e9) as u64)
    }

    pub fn advance_by(&self, nanos: u64) {
        self.current_time.fetch_add(nanos, Ordering::Relaxed);
    }

    pub fn set_time(&self, nanos: u64) {
        self.current_time.store(nanos, Ordering::Relaxed);
    }
}

impl TimeProvider for MockTimeProvider {
    fn now_nanos(&self) -> u64 {
        self.current_time.load(Ordering::Relaxed)
    }
}

/// Shared handle used by drivers
pub type SharedClock = Arc<dyn TimeProvider>;

/// Clock backed by the system time
pub fn system_clock() -> SharedClock {
    Arc::new(SystemTimeProvider)
}

pub fn current_timestamp_nanos() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u64
}

/// Seconds since the Unix epoch as `f64`
pub fn current_timestamp_secs() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}
