// src/acquisition/start_signal.rs
//! Set-once start barrier shared by `start_stream` and the acquisition thread

use parking_lot::{Condvar, Mutex};
use std::time::Duration;

/// Terminal value of a start signal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// The first sample was decoded
    Started,
    /// The startup window elapsed without a valid frame
    NoData,
}

/// Transitions once from unset to a terminal [`StartOutcome`]. A new signal
/// is created for every stream start.
#[derive(Debug, Default)]
pub struct StartSignal {
    outcome: Mutex<Option<StartOutcome>>,
    ready: Condvar,
}

impl StartSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `outcome` if the signal is still unset and wake the waiter.
    /// Returns `false` if a value was already stored.
    pub fn set(&self, outcome: StartOutcome) -> bool {
        let mut current = self.outcome.lock();
        if current.is_some() {
            return false;
        }
        *current = Some(outcome);
        self.ready.notify_all();
        true
    }

    pub fn get(&self) -> Option<StartOutcome> {
        *self.outcome.lock()
    }

    /// Block until the signal is set or `timeout` elapses
    pub fn wait_timeout(&self, timeout: Duration) -> Option<StartOutcome> {
        let mut current = self.outcome.lock();
        if current.is_none() {
            self.ready.wait_while_for(&mut current, |outcome| outcome.is_none(), timeout);
        }
        *current
    }
}
