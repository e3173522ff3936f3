// src/hal/types.rs
//! Core types shared by drivers, decoders and the session controller

use serde::{Deserialize, Serialize};
use std::fmt;

/// One timestamped vector of decoded channel values
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    /// Seconds since the Unix epoch, device or host clock
    pub timestamp: f64,
    pub channels: Vec<f64>,
}

impl Sample {
    pub fn new(channels: Vec<f64>, timestamp: f64) -> Self {
        Self { timestamp, channels }
    }

    /// A sample with every channel set to zero
    pub fn zeroed(channel_count: usize, timestamp: f64) -> Self {
        Self {
            timestamp,
            channels: vec![0.0; channel_count],
        }
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }
}

/// Supported board models
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoardKind {
    /// 8-channel serial board
    Cyton,
    /// 4-channel BLE board driven through the vendor library
    Ganglion,
    /// UDP board, 250 Hz default
    #[serde(rename = "aura_xr")]
    AuraXr,
    /// UDP board, 500 Hz default
    #[serde(rename = "nova_xr")]
    NovaXr,
}

impl BoardKind {
    /// Static description of the model
    pub fn descriptor(self) -> BoardDescriptor {
        let (name, channel_count, sampling_rate_hz) = match self {
            BoardKind::Cyton => ("Cyton", 22, 250),
            BoardKind::Ganglion => ("Ganglion", 13, 200),
            BoardKind::AuraXr => ("AuraXR", 22, 250),
            BoardKind::NovaXr => ("NovaXR", 22, 500),
        };
        BoardDescriptor {
            name: name.to_string(),
            kind: self,
            channel_count,
            sampling_rate_hz,
            timestamp_row: channel_count,
        }
    }

    pub fn channel_count(self) -> usize {
        self.descriptor().channel_count
    }

    /// Models that allow at most one live instance per registry
    pub fn is_exclusive(self) -> bool {
        matches!(self, BoardKind::Ganglion)
    }
}

impl fmt::Display for BoardKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BoardKind::Cyton => "cyton",
            BoardKind::Ganglion => "ganglion",
            BoardKind::AuraXr => "aura_xr",
            BoardKind::NovaXr => "nova_xr",
        };
        f.write_str(name)
    }
}

/// Board model description, serializable for callers that inspect boards
/// without opening them
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardDescriptor {
    pub name: String,
    pub kind: BoardKind,
    /// Channels per sample, excluding the timestamp
    pub channel_count: usize,
    pub sampling_rate_hz: u32,
    /// Row of the retrieval table that holds timestamps
    pub timestamp_row: usize,
}

impl BoardDescriptor {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Transport protocol requested for network boards
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IpProtocol {
    #[default]
    Udp,
    Tcp,
}

/// Session lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BoardState {
    Unprepared,
    Prepared,
    Streaming,
    Released,
}

impl BoardState {
    pub fn is_prepared(self) -> bool {
        matches!(self, BoardState::Prepared | BoardState::Streaming)
    }
}

/// Device answer to a configuration command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigAck {
    /// `'A'`, or a command that expects no answer
    Accepted,
    /// `'I'`
    Invalid,
    /// Any other answer byte, treated as success
    Warning(u8),
}

impl ConfigAck {
    /// Interpret the first byte of a device response
    pub fn from_response_byte(byte: u8) -> Self {
        match byte {
            b'A' => ConfigAck::Accepted,
            b'I' => ConfigAck::Invalid,
            other => ConfigAck::Warning(other),
        }
    }

    pub fn is_success(self) -> bool {
        !matches!(self, ConfigAck::Invalid)
    }
}
