//! Common utility functions: clocks and wire-format field readers

pub mod conversion;
pub mod time;

pub use time::{
    current_timestamp_nanos, current_timestamp_secs, system_clock, MockTimeProvider, SharedClock,
    SystemTimeProvider, TimeProvider,
};
