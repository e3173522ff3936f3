// src/config/mod.rs
//! Board configuration: connection parameters, stream settings and logging

pub mod constants;
pub mod loader;

pub use constants::*;
pub use loader::ConfigLoader;

use crate::hal::types::{BoardKind, IpProtocol};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Complete configuration for one board session
#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
pub struct BoardConfig {
    #[serde(default)]
    pub board: BoardSettings,
    #[serde(default)]
    pub stream: StreamSettings,
    #[serde(default)]
    pub logging: LogSettings,
}

/// Which board to drive and how to reach it
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct BoardSettings {
    #[serde(default = "defaults::kind")]
    pub kind: BoardKind,

    /// Serial device (Cyton) or BLE dongle port (Ganglion)
    #[serde(default)]
    pub serial_port: Option<String>,

    #[serde(default = "defaults::baud_rate")]
    pub baud_rate: u32,

    /// XR boards fall back to the board's access-point address
    #[serde(default)]
    pub ip_address: Option<String>,

    #[serde(default)]
    pub ip_port: Option<u16>,

    #[serde(default)]
    pub ip_protocol: IpProtocol,

    #[serde(default)]
    pub mac_address: Option<String>,

    /// Discovery and startup timeout in seconds; 0 picks the model default
    #[serde(default)]
    pub timeout_s: u64,
}

/// Settings used by `start_stream`
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct StreamSettings {
    #[serde(default = "defaults::buffer_capacity")]
    pub buffer_capacity: usize,

    /// Sink descriptor such as `file://session.csv:w`
    #[serde(default)]
    pub sink: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct LogSettings {
    /// `trace`, `debug`, `info`, `warn`, `error`, `off`, or an `EnvFilter`
    /// directive
    #[serde(default = "defaults::log_level")]
    pub level: String,

    /// Write logs to this file instead of stderr
    #[serde(default)]
    pub file: Option<PathBuf>,
}

mod defaults {
    use crate::config::constants::*;
    use crate::hal::types::BoardKind;

    pub fn kind() -> BoardKind { BoardKind::AuraXr }
    pub fn baud_rate() -> u32 { serial::DEFAULT_BAUD_RATE }
    pub fn buffer_capacity() -> usize { buffer::DEFAULT_BUFFER_CAPACITY }
    pub fn log_level() -> String { "info".to_string() }
}

impl Default for BoardSettings {
    fn default() -> Self {
        Self {
            kind: defaults::kind(),
            serial_port: None,
            baud_rate: defaults::baud_rate(),
            ip_address: None,
            ip_port: None,
            ip_protocol: IpProtocol::default(),
            mac_address: None,
            timeout_s: 0,
        }
    }
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            buffer_capacity: defaults::buffer_capacity(),
            sink: None,
        }
    }
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: defaults::log_level(),
            file: None,
        }
    }
}

impl BoardConfig {
    /// Settings for `kind` with every other field defaulted
    pub fn for_board(kind: BoardKind) -> Self {
        let mut config = Self::default();
        config.board.kind = kind;
        config
    }

    /// Check ranges that do not depend on the device
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        let capacity = self.stream.buffer_capacity;
        if capacity == 0 || capacity > buffer::MAX_CAPTURE_SAMPLES {
            errors.push(format!(
                "stream.buffer_capacity must be in 1..={}, got {}",
                buffer::MAX_CAPTURE_SAMPLES,
                capacity
            ));
        }

        if self.board.timeout_s > ganglion::MAX_TIMEOUT_SECS {
            errors.push(format!(
                "board.timeout_s must be at most {}, got {}",
                ganglion::MAX_TIMEOUT_SECS,
                self.board.timeout_s
            ));
        }

        if self.board.baud_rate == 0 {
            errors.push("board.baud_rate must be positive".to_string());
        }

        if let Err(e) = crate::logging::parse_filter(&self.logging.level) {
            errors.push(format!("logging.level: {}", e));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
