// src/hal/traits.rs
//! Core HAL traits: byte transports and per-model board drivers

use crate::error::{BoardError, BoardResult};
use crate::hal::types::{BoardKind, ConfigAck, Sample};
use std::time::Duration;
use tracing::debug;

/// Byte-oriented link to a device (serial port, UDP socket, in-memory pipe)
pub trait Transport: Send {
    /// Open or connect the link
    fn open(&mut self) -> BoardResult<()>;

    /// Read at most `buf.len()` bytes. Returns `Ok(0)` when the read timeout
    /// elapses without data.
    fn read(&mut self, buf: &mut [u8]) -> BoardResult<usize>;

    /// Write `data`, returning the number of bytes accepted by the link
    fn write(&mut self, data: &[u8]) -> BoardResult<usize>;

    /// Bound every subsequent `read` call
    fn set_read_timeout(&mut self, timeout: Duration) -> BoardResult<()>;

    fn close(&mut self) -> BoardResult<()>;

    fn is_open(&self) -> bool;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn open(&mut self) -> BoardResult<()> {
        (**self).open()
    }

    fn read(&mut self, buf: &mut [u8]) -> BoardResult<usize> {
        (**self).read(buf)
    }

    fn write(&mut self, data: &[u8]) -> BoardResult<usize> {
        (**self).write(data)
    }

    fn set_read_timeout(&mut self, timeout: Duration) -> BoardResult<()> {
        (**self).set_read_timeout(timeout)
    }

    fn close(&mut self) -> BoardResult<()> {
        (**self).close()
    }

    fn is_open(&self) -> bool {
        (**self).is_open()
    }
}

/// Send a text command and require the whole command to reach the device.
/// Any I/O error or short write is a [`BoardError::WriteFailure`].
pub fn write_command<T: Transport + ?Sized>(transport: &mut T, command: &str) -> BoardResult<()> {
    debug!(command, "sending command to board");
    let bytes = command.as_bytes();
    match transport.write(bytes) {
        Ok(written) if written == bytes.len() => Ok(()),
        Ok(written) => Err(BoardError::short_write(command, bytes.len(), written)),
        Err(err) => Err(BoardError::WriteFailure(format!(
            "command {:?}: {}",
            command, err
        ))),
    }
}

/// Outcome of one acquisition step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStatus {
    /// At least one sample was appended to the output
    Decoded,
    /// A frame arrived but failed validation and was dropped
    Malformed,
    /// Nothing arrived before the read timeout
    Idle,
}

/// How `config_board` interacts with an active stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigPolicy {
    /// Stop the worker, configure, restart with the same buffer and sink
    PauseStream,
    /// Hand the command to the running worker, which writes it between frames
    Inline,
}

/// Per-model strategy driven by the generic session controller.
///
/// A driver owns its transport and its decoder continuation state. While a
/// stream is running the driver is moved into the acquisition thread, so
/// none of these methods need interior locking.
pub trait BoardDriver: Send + 'static {
    fn kind(&self) -> BoardKind;

    fn channel_count(&self) -> usize {
        self.kind().channel_count()
    }

    fn config_policy(&self) -> ConfigPolicy;

    /// How long `start_stream` waits for the first decoded sample
    fn startup_timeout(&self) -> Duration;

    /// Validate parameters, open the transport and run the model handshake
    fn open(&mut self) -> BoardResult<()>;

    /// Send the begin-streaming command
    fn send_start(&mut self) -> BoardResult<()>;

    /// Pull one frame from the transport and append decoded samples to `out`
    fn read_frame(&mut self, out: &mut Vec<Sample>) -> BoardResult<FrameStatus>;

    /// Send the stop command and drain any in-flight frames
    fn send_stop(&mut self) -> BoardResult<()>;

    /// Apply a configuration command. `streaming` is true when called from
    /// the acquisition thread between frames.
    fn configure(&mut self, command: &str, streaming: bool) -> BoardResult<ConfigAck>;

    /// Close the transport and release any vendor handle
    fn close(&mut self) -> BoardResult<()>;
}
