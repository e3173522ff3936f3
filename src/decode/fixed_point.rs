// src/decode/fixed_point.rs
//! Scaled fixed-point package decoding for the UDP XR boards
//!
//! A transaction carries [`PACKAGES_PER_TRANSACTION`] packages of
//! [`PACKAGE_SIZE`] bytes each. Every package becomes one 22-channel sample:
//!
//! | bytes    | field                          | channel |
//! |----------|--------------------------------|---------|
//! | 0        | package index                  | 0       |
//! | 1..5     | EDA, `f32` LE                  | 19      |
//! | 5..53    | 16 x 24-bit BE signed counts   | 1..=16  |
//! | 53       | battery level                  | 21      |
//! | 54..56   | temperature x 100, LE          | 20      |
//! | 56..60   | PPG red, `i32` LE              | 17      |
//! | 60..64   | PPG infrared, `i32` LE         | 18      |
//! | 64..72   | device clock, `f64` LE, usec   | -       |

use crate::config::constants::scale::{XR_EEG_MAIN_BOARD, XR_EEG_SISTER_BOARD, XR_EMG};
pub use crate::config::constants::xr::{PACKAGES_PER_TRANSACTION, PACKAGE_SIZE, TRANSACTION_SIZE};
use crate::hal::types::Sample;
use crate::utils::conversion::{f32_le, f64_le, i16_le, i32_le, int24_be, u16_le};

/// Channels per decoded sample
pub const CHANNEL_COUNT: usize = 22;

const COUNTS_OFFSET: usize = 5;
const COUNT_CHANNELS: usize = 16;

/// Encoding of the temperature field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemperatureEncoding {
    /// AuraXR firmware
    Unsigned,
    /// NovaXR firmware
    Signed,
}

/// Stateless decoder; the only per-session input is the stream start time
#[derive(Debug, Clone, Copy)]
pub struct FixedPointDecoder {
    temperature: TemperatureEncoding,
}

/// Scale applied to the 24-bit count stored in `channel`
pub fn channel_scale(channel: usize) -> f64 {
    match channel {
        1..=8 => XR_EEG_MAIN_BOARD,
        10 | 15 => XR_EEG_SISTER_BOARD,
        _ => XR_EMG,
    }
}

impl FixedPointDecoder {
    pub fn new(temperature: TemperatureEncoding) -> Self {
        Self { temperature }
    }

    /// Decode one package. `start_time` is the wall-clock second at which
    /// the begin command was sent. Returns `None` if `package` is short.
    pub fn decode_package(&self, package: &[u8], start_time: f64) -> Option<Sample> {
        if package.len() < PACKAGE_SIZE {
            return None;
        }

        let mut channels = vec![0.0; CHANNEL_COUNT];
        channels[0] = f64::from(package[0]);
        for i in 0..COUNT_CHANNELS {
            let at = COUNTS_OFFSET + 3 * i;
            let channel = i + 1;
            channels[channel] = channel_scale(channel) * f64::from(int24_be(&package[at..at + 3]));
        }
        channels[17] = f64::from(i32_le(&package[56..60]));
        channels[18] = f64::from(i32_le(&package[60..64]));
        channels[19] = f64::from(f32_le(&package[1..5]));
        channels[20] = match self.temperature {
            TemperatureEncoding::Unsigned => f64::from(u16_le(&package[54..56])),
            TemperatureEncoding::Signed => f64::from(i16_le(&package[54..56])),
        } / 100.0;
        channels[21] = f64::from(package[53]);

        let device_secs = f64_le(&package[64..72]) / 1e6;
        Some(Sample::new(channels, device_secs + start_time))
    }

    /// Decode every whole package in `bytes`, appending to `out`.
    /// Returns the number of samples appended.
    pub fn decode_transaction(&self, bytes: &[u8], start_time: f64, out: &mut Vec<Sample>) -> usize {
        let before = out.len();
        out.extend(
            bytes
                .chunks_exact(PACKAGE_SIZE)
                .filter_map(|package| self.decode_package(package, start_time)),
        );
        out.len() - before
    }
}

/// Raw package contents, used by the XR emulator and tests to build frames
#[derive(Debug, Clone, PartialEq)]
pub struct PackageFields {
    pub index: u8,
    pub eda: f32,
    pub counts: [i32; COUNT_CHANNELS],
    pub battery: u8,
    /// Temperature in hundredths of a degree
    pub temperature_centi: i16,
    pub ppg_red: i32,
    pub ppg_ir: i32,
    pub device_time_us: f64,
}

impl PackageFields {
    /// Serialize into the on-wire package layout
    pub fn encode(&self) -> [u8; PACKAGE_SIZE] {
        let mut package = [0u8; PACKAGE_SIZE];
        package[0] = self.index;
        package[1..5].copy_from_slice(&self.eda.to_le_bytes());
        for (i, count) in self.counts.iter().enumerate() {
            let at = COUNTS_OFFSET + 3 * i;
            package[at..at + 3].copy_from_slice(&crate::utils::conversion::int24_to_be_bytes(*count));
        }
        package[53] = self.battery;
        package[54..56].copy_from_slice(&self.temperature_centi.to_le_bytes());
        package[56..60].copy_from_slice(&self.ppg_red.to_le_bytes());
        package[60..64].copy_from_slice(&self.ppg_ir.to_le_bytes());
        package[64..72].copy_from_slice(&self.device_time_us.to_le_bytes());
        package
    }
}
