// src/hal/transport/mod.rs
//! Byte transports: serial ports, UDP sockets and an in-memory pipe

pub mod loopback;
pub mod serial;
pub mod udp;

pub use loopback::{LoopbackDevice, LoopbackTransport};
pub use serial::SerialTransport;
pub use udp::UdpTransport;
