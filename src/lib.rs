//! biosig-hal: uniform sessions over biosignal acquisition boards
//!
//! Every supported board (Cyton over serial, Ganglion through a vendor
//! library, AuraXR and NovaXR over UDP) goes through the same lifecycle:
//!
//! ```text
//! prepare_session -> start_stream -> [config_board] -> stop_stream -> release_session
//! ```
//!
//! While streaming, a background thread decodes frames into a bounded
//! sample buffer and optionally mirrors them to a file or UDP sink. Data is
//! retrieved as a channel-major [`ndarray::Array2`] whose last row holds
//! timestamps.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use biosig_hal::board::{BoardFactory, InstanceRegistry};
//! use biosig_hal::config::BoardConfig;
//! use biosig_hal::hal::BoardKind;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut config = BoardConfig::for_board(BoardKind::NovaXr);
//!     config.board.ip_address = Some("192.168.4.1".into());
//!
//!     let registry = InstanceRegistry::new();
//!     let board = BoardFactory::create(&config, &registry)?;
//!     board.prepare_session()?;
//!     board.start_stream(45_000, Some("file://session.csv:w"))?;
//!     std::thread::sleep(std::time::Duration::from_secs(2));
//!     board.stop_stream()?;
//!
//!     let data = board.get_board_data(usize::MAX)?;
//!     println!("{} channels x {} samples", data.nrows() - 1, data.ncols());
//!     board.release_session()?;
//!     Ok(())
//! }
//! ```

#![warn(clippy::all)]
#![allow(clippy::module_inception)]

pub mod acquisition;
pub mod board;
pub mod config;
pub mod decode;
pub mod error;
pub mod hal;
pub mod logging;
pub mod streaming;
pub mod utils;

pub use acquisition::SampleBuffer;
pub use board::{Board, BoardFactory, InstanceRegistry};
pub use config::{BoardConfig, ConfigLoader};
pub use error::{BoardError, BoardResult, ErrorKind};
pub use hal::{BoardDescriptor, BoardKind, BoardState, ConfigAck, Sample};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Get library information
pub fn version_info() -> VersionInfo {
    VersionInfo {
        name: NAME.to_string(),
        version: VERSION.to_string(),
        boards: [BoardKind::Cyton, BoardKind::Ganglion, BoardKind::AuraXr, BoardKind::NovaXr]
            .into_iter()
            .map(BoardKind::descriptor)
            .collect(),
    }
}

/// Library version information
#[derive(Debug, Clone, serde::Serialize)]
pub struct VersionInfo {
    pub name: String,
    pub version: String,
    /// Every board model this build can drive
    pub boards: Vec<BoardDescriptor>,
}
