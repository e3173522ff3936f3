// src/board/mod.rs
//! Board models and the session controller that drives them

pub mod cyton;
pub mod factory;
pub mod ganglion;
pub mod registry;
pub mod session;
pub mod xr;

pub use cyton::CytonBoard;
pub use factory::BoardFactory;
pub use ganglion::GanglionBoard;
pub use registry::{InstanceRegistry, RegistryToken};
pub use session::Board;
pub use xr::{XrBoard, XrFlavor};
