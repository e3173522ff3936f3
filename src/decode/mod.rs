// src/decode/mod.rs
//! Wire decoders: pure byte-to-sample transformations, no I/O

pub mod delta;
pub mod fixed_point;
pub mod serial_packet;

pub use delta::GanglionDecoder;
pub use fixed_point::{FixedPointDecoder, TemperatureEncoding};
pub use serial_packet::PacketAssembler;

use thiserror::Error;

/// Reasons a frame is dropped. Never surfaced to callers; the acquisition
/// loop logs them and moves on.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("frame too short: expected {expected} bytes, got {actual}")]
    Length { expected: usize, actual: usize },

    #[error("unknown frame tag {0}")]
    UnknownTag(u8),

    #[error("unparsable impedance value {0:?}")]
    Impedance(String),

    #[error("bad start byte 0x{0:02X}")]
    StartByte(u8),

    #[error("bad stop byte 0x{0:02X}")]
    StopByte(u8),

    #[error("delta {value} does not fit a {bits}-bit field")]
    Unrepresentable { value: i32, bits: usize },
}
