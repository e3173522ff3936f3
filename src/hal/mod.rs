// src/hal/mod.rs
//! Hardware abstraction layer: driver and transport traits, shared types,
//! the vendor-library boundary and device emulators

pub mod simulator;
pub mod traits;
pub mod transport;
pub mod types;
pub mod vendor;

pub use traits::*;
pub use types::*;
pub use vendor::{GanglionFrame, GanglionLibrary, VendorError};
