// src/decode/serial_packet.rs
//! 33-byte serial packets of the Cyton board
//!
//! `0xA0`, sample index, 8 x 24-bit EEG counts, 6 aux bytes, stop byte
//! `0xC0..=0xCF`. The stop byte tells how to read the aux bytes: `0xC0`
//! carries three accelerometer axes, `0xC1` three analog reads.

use crate::config::constants::scale::{CYTON_ACCEL, CYTON_EEG};
use crate::config::constants::serial::{
    PACKET_SIZE, START_BYTE, STOP_BYTE_ACCEL, STOP_BYTE_ANALOG, STOP_BYTE_MAX, STOP_BYTE_MIN,
};
use crate::decode::DecodeError;
use crate::hal::types::Sample;
use crate::utils::conversion::{i16_be, int24_be};

/// Channels per decoded sample
pub const CHANNEL_COUNT: usize = 22;

const EEG_OFFSET: usize = 2;
const EEG_CHANNELS: usize = 8;
const AUX_OFFSET: usize = 26;
const ACCEL_CHANNEL: usize = 9;
const AUX_RAW_CHANNEL: usize = 12;
const STOP_BYTE_CHANNEL: usize = 18;
const ANALOG_CHANNEL: usize = 19;

/// Decode one packet that starts with [`START_BYTE`]
pub fn decode_packet(packet: &[u8], timestamp: f64) -> Result<Sample, DecodeError> {
    if packet.len() < PACKET_SIZE {
        return Err(DecodeError::Length {
            expected: PACKET_SIZE,
            actual: packet.len(),
        });
    }
    if packet[0] != START_BYTE {
        return Err(DecodeError::StartByte(packet[0]));
    }
    let stop = packet[PACKET_SIZE - 1];
    if !(STOP_BYTE_MIN..=STOP_BYTE_MAX).contains(&stop) {
        return Err(DecodeError::StopByte(stop));
    }

    let mut sample = Sample::zeroed(CHANNEL_COUNT, timestamp);
    let channels = &mut sample.channels;
    channels[0] = f64::from(packet[1]);
    for i in 0..EEG_CHANNELS {
        let at = EEG_OFFSET + 3 * i;
        channels[1 + i] = CYTON_EEG * f64::from(int24_be(&packet[at..at + 3]));
    }

    let aux = &packet[AUX_OFFSET..AUX_OFFSET + 6];
    for (i, byte) in aux.iter().enumerate() {
        channels[AUX_RAW_CHANNEL + i] = f64::from(*byte);
    }
    channels[STOP_BYTE_CHANNEL] = f64::from(stop);
    match stop {
        STOP_BYTE_ACCEL => {
            for axis in 0..3 {
                channels[ACCEL_CHANNEL + axis] = CYTON_ACCEL * f64::from(i16_be(&aux[2 * axis..]));
            }
        }
        STOP_BYTE_ANALOG => {
            for pin in 0..3 {
                channels[ANALOG_CHANNEL + pin] = f64::from(i16_be(&aux[2 * pin..]));
            }
        }
        _ => {}
    }
    Ok(sample)
}

/// Reassembles packets from an unaligned serial byte stream
#[derive(Debug, Default)]
pub struct PacketAssembler {
    pending: Vec<u8>,
}

impl PacketAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extend(&mut self, bytes: &[u8]) {
        self.pending.extend_from_slice(bytes);
    }

    /// Next candidate packet aligned on a start byte. Bytes before the start
    /// byte are discarded. A candidate with a bad stop byte is still
    /// returned; call [`PacketAssembler::resync`] after rejecting it.
    pub fn next_packet(&mut self) -> Option<[u8; PACKET_SIZE]> {
        match self.pending.iter().position(|&b| b == START_BYTE) {
            Some(start) => {
                self.pending.drain(..start);
            }
            None => {
                self.pending.clear();
                return None;
            }
        }
        if self.pending.len() < PACKET_SIZE {
            return None;
        }
        let mut packet = [0u8; PACKET_SIZE];
        packet.copy_from_slice(&self.pending[..PACKET_SIZE]);
        self.pending.drain(..PACKET_SIZE);
        Some(packet)
    }

    /// Put back everything after the start byte of a rejected packet so a
    /// start byte hidden inside it can be found
    pub fn resync(&mut self, rejected: &[u8; PACKET_SIZE]) {
        let mut rest = rejected[1..].to_vec();
        rest.extend_from_slice(&self.pending);
        self.pending = rest;
    }

    pub fn buffered(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::utils::conversion::int24_to_be_bytes;

    pub(crate) fn packet(index: u8, eeg: [i32; 8], aux: [u8; 6], stop: u8) -> [u8; PACKET_SIZE] {
        let mut p = [0u8; PACKET_SIZE];
        p[0] = START_BYTE;
        p[1] = index;
        for (i, count) in eeg.iter().enumerate() {
            let at = EEG_OFFSET + 3 * i;
            p[at..at + 3].copy_from_slice(&int24_to_be_bytes(*count));
        }
        p[AUX_OFFSET..AUX_OFFSET + 6].copy_from_slice(&aux);
        p[PACKET_SIZE - 1] = stop;
        p
    }

    #[test]
    fn test_decode_accel_packet() {
        let aux = [0x00, 0x10, 0xFF, 0xF0, 0x00, 0x00];
        let p = packet(7, [1, -1, 2, -2, 3, -3, 4, -4], aux, STOP_BYTE_ACCEL);
        let sample = decode_packet(&p, 12.0).unwrap();

        assert_eq!(sample.channels.len(), CHANNEL_COUNT);
        assert_eq!(sample.channels[0], 7.0);
        assert_eq!(sample.channels[1], CYTON_EEG);
        assert_eq!(sample.channels[8], -4.0 * CYTON_EEG);
        assert_eq!(sample.channels[9], 16.0 * CYTON_ACCEL);
        assert_eq!(sample.channels[10], -16.0 * CYTON_ACCEL);
        assert_eq!(sample.channels[18], f64::from(STOP_BYTE_ACCEL));
        assert_eq!(sample.channels[19], 0.0);
        assert_eq!(sample.timestamp, 12.0);
    }

    #[test]
    fn test_decode_analog_packet() {
        let aux = [0x01, 0x00, 0x00, 0x02, 0x00, 0x03];
        let sample = decode_packet(&packet(0, [0; 8], aux, STOP_BYTE_ANALOG), 0.0).unwrap();
        assert_eq!(&sample.channels[19..22], &[256.0, 2.0, 3.0]);
        assert_eq!(&sample.channels[9..12], &[0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_bad_sentinels() {
        let mut p = packet(0, [0; 8], [0; 6], 0xC0);
        p[PACKET_SIZE - 1] = 0x42;
        assert_eq!(decode_packet(&p, 0.0).unwrap_err(), DecodeError::StopByte(0x42));
        p[0] = 0x00;
        assert_eq!(decode_packet(&p, 0.0).unwrap_err(), DecodeError::StartByte(0x00));
    }

    #[test]
    fn test_assembler_skips_noise_and_splits() {
        let first = packet(1, [0; 8], [0; 6], 0xC0);
        let second = packet(2, [0; 8], [0; 6], 0xC1);
        let mut stream = vec![0x11, 0x22];
        stream.extend_from_slice(&first);
        stream.extend_from_slice(&second[..10]);

        let mut assembler = PacketAssembler::new();
        assembler.extend(&stream);
        assert_eq!(assembler.next_packet(), Some(first));
        assert_eq!(assembler.next_packet(), None);

        assembler.extend(&second[10..]);
        assert_eq!(assembler.next_packet(), Some(second));
        assert_eq!(assembler.buffered(), 0);
    }

    #[test]
    fn test_assembler_resync_after_bad_packet() {
        let good = packet(9, [0; 8], [0; 6], 0xC0);
        // truncated packet followed by a good one
        let mut stream = vec![START_BYTE, 0x01, 0x02];
        stream.extend_from_slice(&good);

        let mut assembler = PacketAssembler::new();
        assembler.extend(&stream);
        let candidate = assembler.next_packet().unwrap();
        assert!(decode_packet(&candidate, 0.0).is_err());

        assembler.resync(&candidate);
        assert_eq!(assembler.next_packet(), Some(good));
    }
}
