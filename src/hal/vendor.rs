// src/hal/vendor.rs
//! Boundary to the vendor library that owns the Ganglion BLE link
//!
//! The library is process-global on the vendor side, which is why the
//! Ganglion model is registered as exclusive. Any implementation of
//! [`GanglionLibrary`] can back the driver: a dynamic-library binding, or
//! the in-process simulator used by the tests.

use crate::config::constants::ganglion::FRAME_SIZE;
use crate::error::BoardError;
use std::time::Duration;
use thiserror::Error;

/// One raw frame handed over by the vendor library
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GanglionFrame {
    pub data: [u8; FRAME_SIZE],
    /// Host timestamp assigned by the library, seconds since the epoch
    pub timestamp: f64,
}

/// Failures reported by the vendor library
#[derive(Debug, Error)]
pub enum VendorError {
    #[error("library not initialized")]
    NotInitialized,

    #[error("device not found{}", .0.as_deref().map(|m| format!(" at {}", m)).unwrap_or_default())]
    DeviceNotFound(Option<String>),

    #[error("library call {call} failed with code {code}")]
    CallFailed { call: &'static str, code: i32 },
}

impl VendorError {
    /// Map a failed library call onto the board taxonomy
    pub fn into_board_error(self, operation: &'static str) -> BoardError {
        BoardError::transport(operation, std::io::Error::other(self))
    }
}

/// Calls exported by the vendor library
pub trait GanglionLibrary: Send {
    /// Bind to the dongle on `serial_port`. `timeout` bounds discovery.
    fn initialize(&mut self, serial_port: &str, timeout: Duration) -> Result<(), VendorError>;

    /// Connect to a device, by MAC address when one is given
    fn open(&mut self, mac_address: Option<&str>) -> Result<(), VendorError>;

    fn start_stream(&mut self, command: &str) -> Result<(), VendorError>;

    fn stop_stream(&mut self, command: &str) -> Result<(), VendorError>;

    fn config_board(&mut self, command: &str) -> Result<(), VendorError>;

    /// Next queued frame, or `None` when the queue is empty
    fn get_data(&mut self) -> Option<GanglionFrame>;

    fn close(&mut self) -> Result<(), VendorError>;

    /// Free library-wide resources
    fn release(&mut self) -> Result<(), VendorError>;
}
