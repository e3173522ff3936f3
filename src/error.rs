// src/error.rs
//! Error taxonomy shared by every board, transport and sink
//!
//! Every lifecycle operation on a [`crate::board::Board`] returns a
//! [`BoardResult`]. Frame-level corruption never reaches this type: decoders
//! drop bad frames locally and the acquisition loop keeps running.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Discriminant of a [`BoardError`], stable across releases and serializable
/// for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Bad buffer size, missing connection parameter, malformed descriptor
    InvalidArgument,
    /// Operation attempted before prepare/start
    NotReady,
    /// Duplicate start
    AlreadyRunning,
    /// Stop without start
    NotRunning,
    /// Open, connect or handshake I/O error
    TransportFailure,
    /// Command send did not complete or was rejected
    WriteFailure,
    /// No valid data inside the startup window
    SynchronizationTimeout,
    /// Board-model exclusivity violated
    ResourceExhausted,
    /// Configuration file or environment could not be loaded
    Config,
}

/// Unified error type for board sessions
#[derive(Debug, Error)]
pub enum BoardError {
    /// Caller supplied an argument outside its valid range
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Operation requires a prepared session or an allocated buffer
    #[error("board not ready: {0}")]
    NotReady(String),

    /// `start_stream` called while already streaming
    #[error("stream is already running")]
    AlreadyRunning,

    /// `stop_stream` called while not streaming
    #[error("stream thread is not running")]
    NotRunning,

    /// Transport open, read or handshake failed
    #[error("transport failure during {operation}: {source}")]
    TransportFailure {
        /// What the transport was doing when it failed
        operation: &'static str,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// A device command was not fully transferred or was refused
    #[error("failed to write to board: {0}")]
    WriteFailure(String),

    /// The acquisition thread saw no valid frame inside the startup window
    #[error("no data received within {0:?}")]
    SynchronizationTimeout(Duration),

    /// A single-instance board model is already live in this registry
    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),

    /// Configuration could not be loaded or validated
    #[error("configuration error: {0}")]
    Config(String),
}

impl BoardError {
    /// Error kind without the payload
    pub fn kind(&self) -> ErrorKind {
        match self {
            BoardError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            BoardError::NotReady(_) => ErrorKind::NotReady,
            BoardError::AlreadyRunning => ErrorKind::AlreadyRunning,
            BoardError::NotRunning => ErrorKind::NotRunning,
            BoardError::TransportFailure { .. } => ErrorKind::TransportFailure,
            BoardError::WriteFailure(_) => ErrorKind::WriteFailure,
            BoardError::SynchronizationTimeout(_) => ErrorKind::SynchronizationTimeout,
            BoardError::ResourceExhausted(_) => ErrorKind::ResourceExhausted,
            BoardError::Config(_) => ErrorKind::Config,
        }
    }

    /// Shorthand for [`BoardError::InvalidArgument`]
    pub fn invalid(reason: impl Into<String>) -> Self {
        BoardError::InvalidArgument(reason.into())
    }

    /// Shorthand for [`BoardError::NotReady`]
    pub fn not_ready(reason: impl Into<String>) -> Self {
        BoardError::NotReady(reason.into())
    }

    /// Wrap an I/O error raised by a transport
    pub fn transport(operation: &'static str, source: std::io::Error) -> Self {
        BoardError::TransportFailure { operation, source }
    }

    /// Short send: `written` of `expected` bytes reached the device
    pub fn short_write(command: &str, expected: usize, written: usize) -> Self {
        BoardError::WriteFailure(format!(
            "command {:?}: wrote {} of {} bytes",
            command, written, expected
        ))
    }
}

impl From<serialport::Error> for BoardError {
    fn from(err: serialport::Error) -> Self {
        BoardError::transport("serial open", err.into())
    }
}

/// Result type alias for board operations
pub type BoardResult<T> = Result<T, BoardError>;

/// Attach an operation name to I/O results coming out of a transport
pub trait IoResultExt<T> {
    /// Convert into a [`BoardError::TransportFailure`] tagged with `operation`
    fn transport_err(self, operation: &'static str) -> BoardResult<T>;
}

impl<T> IoResultExt<T> for std::io::Result<T> {
    fn transport_err(self, operation: &'static str) -> BoardResult<T> {
        self.map_err(|err| BoardError::transport(operation, err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_matches_variant() {
        assert_eq!(BoardError::AlreadyRunning.kind(), ErrorKind::AlreadyRunning);
        assert_eq!(BoardError::NotRunning.kind(), ErrorKind::NotRunning);
        assert_eq!(BoardError::invalid("x").kind(), ErrorKind::InvalidArgument);
        assert_eq!(
            BoardError::SynchronizationTimeout(Duration::from_secs(5)).kind(),
            ErrorKind::SynchronizationTimeout
        );
    }

    #[test]
    fn test_short_write_display() {
        let err = BoardError::short_write("~6", 2, 1);
        let display = err.to_string();
        assert!(display.contains("\"~6\""));
        assert!(display.contains("1 of 2"));
        assert_eq!(err.kind(), ErrorKind::WriteFailure);
    }

    #[test]
    fn test_io_result_ext_keeps_source() {
        use std::error::Error;

        let result: std::io::Result<()> = Err(std::io::Error::new(
            std::io::ErrorKind::ConnectionRefused,
            "refused",
        ));
        let err = result.transport_err("udp connect").unwrap_err();

        assert_eq!(err.kind(), ErrorKind::TransportFailure);
        assert!(err.to_string().contains("udp connect"));
        assert!(err.source().is_some());
    }

    #[test]
    fn test_error_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<BoardError>();
    }
}
