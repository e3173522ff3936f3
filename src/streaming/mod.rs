// src/streaming/mod.rs
//! Streaming sinks: push-only consumers of decoded samples
//!
//! A sink is resolved once per `start_stream` from a descriptor such as
//! `file://session.csv:w` or `streaming_board://225.1.1.1:6677`, moved into
//! the acquisition thread and dropped when that thread exits.

pub mod descriptor;
pub mod file;
pub mod multicast;

pub use descriptor::SinkDescriptor;
pub use file::{FileMode, FileSink};
pub use multicast::MulticastSink;

use crate::error::{BoardError, BoardResult};
use std::io;
use tracing::debug;

/// Push interface for mirrored samples
pub trait StreamSink: Send {
    /// Mirror one sample. The channel count is `channels.len()`.
    fn push(&mut self, channels: &[f64], timestamp: f64) -> io::Result<()>;
}

/// Sink that discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl StreamSink for NullSink {
    fn push(&mut self, _channels: &[f64], _timestamp: f64) -> io::Result<()> {
        Ok(())
    }
}

/// Resolve a descriptor into a sink. `None` and empty strings give a
/// [`NullSink`].
pub fn resolve_sink(descriptor: Option<&str>) -> BoardResult<Box<dyn StreamSink>> {
    let text = match descriptor.map(str::trim) {
        None | Some("") => {
            debug!("using null sink");
            return Ok(Box::new(NullSink));
        }
        Some(text) => text,
    };

    let parsed = SinkDescriptor::parse(text)?;
    match parsed.kind.as_str() {
        "file" => {
            let mode = FileMode::from_modifier(&parsed.modifiers)?;
            Ok(Box::new(FileSink::create(&parsed.destination, mode)?))
        }
        "streaming_board" => {
            let port: u16 = parsed.modifiers.parse().map_err(|_| {
                BoardError::invalid(format!("invalid sink port {:?}", parsed.modifiers))
            })?;
            Ok(Box::new(MulticastSink::connect(&parsed.destination, port)?))
        }
        other => Err(BoardError::invalid(format!("unsupported sink kind {:?}", other))),
    }
}
