// src/acquisition/mod.rs
//! Sample acquisition: the bounded buffer, the start barrier, the background
//! worker and the channel-major reshape used by the data accessors

pub mod reshape;
pub mod ring_buffer;
pub mod start_signal;
pub mod worker;

pub use reshape::{reshape, reshape_flat};
pub use ring_buffer::SampleBuffer;
pub use start_signal::{StartOutcome, StartSignal};
pub use worker::{AcquisitionHandle, WorkerParts};
