// src/decode/delta.rs
//! Delta / bit-packed frame decoding for the Ganglion board
//!
//! Every 20-byte frame starts with a tag byte:
//!
//! * `0`: four absolute 24-bit counts at bytes 1, 4, 7 and 10
//! * `1..=100`: eight 18-bit deltas, byte 19 carries one accelerometer axis
//! * `101..=200`: eight 19-bit deltas
//! * `201..=205`: ASCII impedance value terminated by `'Z'`
//!
//! Delta fields are packed most significant bit first, starting right after
//! the tag byte. A field whose lowest bit is set is negative: the firmware
//! sign-extends from bit 0 rather than from the top bit. The first four
//! deltas reconstruct the older sample of the frame from the newer half of
//! the previous state, the last four reconstruct the newer sample from the
//! older one.

use crate::config::constants::ganglion::FRAME_SIZE;
use crate::config::constants::scale::{GANGLION_ACCEL, GANGLION_EEG};
use crate::decode::DecodeError;
use crate::hal::types::Sample;
use crate::utils::conversion::{int24_be, int24_to_be_bytes, read_bits_msb, write_bits_msb};
use tracing::warn;

/// Channels per decoded sample
pub const CHANNEL_COUNT: usize = 13;

const EEG: std::ops::Range<usize> = 1..5;
const ACCEL_X: usize = 5;
const IMPEDANCE: std::ops::Range<usize> = 8..13;
const DELTA_START_BIT: usize = 8;
const IMPEDANCE_TERMINATOR: u8 = b'Z';

/// Frame families selected by the tag byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    Absolute,
    Delta18,
    Delta19,
    Impedance,
}

impl FrameKind {
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(FrameKind::Absolute),
            1..=100 => Some(FrameKind::Delta18),
            101..=200 => Some(FrameKind::Delta19),
            201..=205 => Some(FrameKind::Impedance),
            _ => None,
        }
    }

    fn bits_per_delta(self) -> Option<usize> {
        match self {
            FrameKind::Delta18 => Some(18),
            FrameKind::Delta19 => Some(19),
            _ => None,
        }
    }
}

/// Interpret an unsigned `width`-bit field with the Ganglion sign convention
pub fn field_to_i32(raw: u32, width: usize) -> i32 {
    let mask = (1u32 << width) - 1;
    let raw = raw & mask;
    if raw & 1 == 1 {
        (raw | !mask) as i32
    } else {
        raw as i32
    }
}

/// Decoder with the continuation state carried between frames
#[derive(Debug, Clone)]
pub struct GanglionDecoder {
    /// `[older sample; newer sample]` in raw counts
    last: [i32; 8],
    accel: [f64; 3],
    impedance: [f64; 5],
}

impl Default for GanglionDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl GanglionDecoder {
    pub fn new() -> Self {
        Self {
            last: [0; 8],
            accel: [0.0; 3],
            impedance: [0.0; 5],
        }
    }

    /// Newest absolute counts, as used to reconstruct the next frame
    pub fn last_counts(&self) -> [i32; 4] {
        [self.last[4], self.last[5], self.last[6], self.last[7]]
    }

    /// Decode one frame, appending samples stamped with `timestamp` to `out`.
    /// On error nothing is appended and the continuation state is untouched.
    pub fn decode(
        &mut self,
        frame: &[u8],
        timestamp: f64,
        out: &mut Vec<Sample>,
    ) -> Result<usize, DecodeError> {
        if frame.len() < FRAME_SIZE {
            return Err(DecodeError::Length {
                expected: FRAME_SIZE,
                actual: frame.len(),
            });
        }
        let tag = frame[0];
        let kind = match FrameKind::from_tag(tag) {
            Some(kind) => kind,
            None => {
                warn!(tag, frame = ?&frame[..FRAME_SIZE], "dropping ganglion frame with unknown tag");
                return Err(DecodeError::UnknownTag(tag));
            }
        };

        match kind {
            FrameKind::Absolute => {
                self.last.copy_within(4..8, 0);
                for i in 0..4 {
                    let at = 1 + 3 * i;
                    self.last[4 + i] = int24_be(&frame[at..at + 3]);
                }
                out.push(self.eeg_sample(0, 4, timestamp));
                Ok(1)
            }
            FrameKind::Impedance => {
                let value = parse_impedance(&frame[1..FRAME_SIZE])?;
                match tag % 10 {
                    slot @ 1..=5 => self.impedance[usize::from(slot) - 1] = f64::from(value),
                    _ => {}
                }
                let mut sample = Sample::zeroed(CHANNEL_COUNT, timestamp);
                sample.channels[0] = f64::from(tag);
                sample.channels[IMPEDANCE].copy_from_slice(&self.impedance);
                out.push(sample);
                Ok(1)
            }
            FrameKind::Delta18 | FrameKind::Delta19 => {
                if kind == FrameKind::Delta18 {
                    self.update_accel(tag, frame[19] as i8);
                }
                let bits = kind.bits_per_delta().unwrap_or(18);
                let mut delta = [0i32; 8];
                for (k, d) in delta.iter_mut().enumerate() {
                    let raw = read_bits_msb(frame, DELTA_START_BIT + k * bits, bits);
                    *d = field_to_i32(raw, bits);
                }

                for i in 0..4 {
                    self.last[i] = self.last[i + 4].wrapping_sub(delta[i]);
                }
                for i in 4..8 {
                    self.last[i] = self.last[i - 4].wrapping_sub(delta[i]);
                }

                out.push(self.eeg_sample(tag, 0, timestamp));
                out.push(self.eeg_sample(tag, 4, timestamp));
                Ok(2)
            }
        }
    }

    // accelerometer axes are swapped and z is inverted on this board
    fn update_accel(&mut self, tag: u8, value: i8) {
        let scaled = GANGLION_ACCEL * f64::from(value);
        match tag % 10 {
            0 => self.accel[2] = -scaled,
            1 => self.accel[1] = scaled,
            2 => self.accel[0] = scaled,
            _ => {}
        }
    }

    fn eeg_sample(&self, tag: u8, half: usize, timestamp: f64) -> Sample {
        let mut sample = Sample::zeroed(CHANNEL_COUNT, timestamp);
        sample.channels[0] = f64::from(tag);
        for (i, channel) in EEG.enumerate() {
            sample.channels[channel] = GANGLION_EEG * f64::from(self.last[half + i]);
        }
        sample.channels[ACCEL_X..ACCEL_X + 3].copy_from_slice(&self.accel);
        sample
    }
}

// ASCII digits up to the terminator, at most five characters
fn parse_impedance(payload: &[u8]) -> Result<i32, DecodeError> {
    let end = payload
        .iter()
        .take(5)
        .position(|&b| b == IMPEDANCE_TERMINATOR)
        .unwrap_or(5.min(payload.len()));
    let text = String::from_utf8_lossy(&payload[..end]).into_owned();
    parse_leading_int(&text).ok_or(DecodeError::Impedance(text))
}

// optional whitespace, optional sign, then at least one digit; trailing
// characters are ignored
fn parse_leading_int(text: &str) -> Option<i32> {
    let trimmed = text.trim_start();
    let (negative, rest) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };
    let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    let value: i32 = digits.parse().ok()?;
    Some(if negative { -value } else { value })
}

/// Build a tag-0 frame carrying four absolute 24-bit counts
pub fn encode_absolute_frame(counts: [i32; 4]) -> [u8; FRAME_SIZE] {
    let mut frame = [0u8; FRAME_SIZE];
    for (i, count) in counts.iter().enumerate() {
        let at = 1 + 3 * i;
        frame[at..at + 3].copy_from_slice(&int24_to_be_bytes(*count));
    }
    frame
}

/// Build a delta frame that moves a decoder whose newest counts are
/// `previous` through `first` and then `second`.
///
/// `tag` selects the field width. For 18-bit tags `accel` fills byte 19.
/// Fails when a delta cannot be expressed in the field width under the
/// low-bit sign convention.
pub fn encode_delta_frame(
    tag: u8,
    previous: [i32; 4],
    first: [i32; 4],
    second: [i32; 4],
    accel: i8,
) -> Result<[u8; FRAME_SIZE], DecodeError> {
    let kind = FrameKind::from_tag(tag).ok_or(DecodeError::UnknownTag(tag))?;
    let bits = kind.bits_per_delta().ok_or(DecodeError::UnknownTag(tag))?;

    let mut deltas = [0i32; 8];
    for i in 0..4 {
        deltas[i] = previous[i].wrapping_sub(first[i]);
        deltas[i + 4] = first[i].wrapping_sub(second[i]);
    }

    let mut frame = [0u8; FRAME_SIZE];
    frame[0] = tag;
    let mask = (1u32 << bits) - 1;
    for (k, delta) in deltas.iter().enumerate() {
        let raw = (*delta as u32) & mask;
        if field_to_i32(raw, bits) != *delta {
            return Err(DecodeError::Unrepresentable { value: *delta, bits });
        }
        write_bits_msb(&mut frame, DELTA_START_BIT + k * bits, bits, raw);
    }
    if kind == FrameKind::Delta18 {
        frame[19] = accel as u8;
    }
    Ok(frame)
}

/// Build an impedance frame for `tag` in `201..=205`
pub fn encode_impedance_frame(tag: u8, value: u32) -> [u8; FRAME_SIZE] {
    let mut frame = [0u8; FRAME_SIZE];
    frame[0] = tag;
    let text = format!("{}", value.min(9999));
    let len = text.len();
    frame[1..1 + len].copy_from_slice(text.as_bytes());
    frame[1 + len] = IMPEDANCE_TERMINATOR;
    frame
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_sign_convention() {
        assert_eq!(field_to_i32(0b10, 18), 2);
        assert_eq!(field_to_i32(0x3FFFF, 18), -1);
        assert_eq!(field_to_i32(0x3FFFD, 18), -3);
        assert_eq!(field_to_i32(0, 19), 0);
    }

    #[test]
    fn test_absolute_frame_exact_values() {
        let counts = [131_071, -131_072, 0, 42];
        let mut decoder = GanglionDecoder::new();
        let mut out = Vec::new();

        let n = decoder.decode(&encode_absolute_frame(counts), 1.5, &mut out).unwrap();
        assert_eq!(n, 1);
        let sample = &out[0];
        assert_eq!(sample.channels.len(), CHANNEL_COUNT);
        assert_eq!(sample.channels[0], 0.0);
        for i in 0..4 {
            assert_eq!(sample.channels[1 + i], GANGLION_EEG * f64::from(counts[i]));
        }
        assert_eq!(sample.timestamp, 1.5);
        assert_eq!(decoder.last_counts(), counts);
    }

    #[test]
    fn test_delta_frames_reconstruct_absolute_values() {
        // every step is a non-negative even or a negative odd delta
        let start = [1000, -2000, 3000, 0];
        let first = [998, -1997, 2996, 1];
        let second = [1003, -2003, 2996, 8];
        let third = [993, -1994, 2994, 8];
        let fourth = [994, -1993, 2986, -4];

        let mut decoder = GanglionDecoder::new();
        let mut out = Vec::new();
        decoder.decode(&encode_absolute_frame(start), 0.0, &mut out).unwrap();

        let f1 = encode_delta_frame(1, start, first, second, 0).unwrap();
        let f2 = encode_delta_frame(101, second, third, fourth, 0).unwrap();
        assert_eq!(decoder.decode(&f1, 1.0, &mut out).unwrap(), 2);
        assert_eq!(decoder.decode(&f2, 2.0, &mut out).unwrap(), 2);

        let expected = [start, first, second, third, fourth];
        assert_eq!(out.len(), expected.len());
        for (sample, counts) in out.iter().zip(expected.iter()) {
            for i in 0..4 {
                assert_eq!(sample.channels[1 + i], GANGLION_EEG * f64::from(counts[i]));
            }
        }
        assert_eq!(out[1].timestamp, out[2].timestamp);
        assert_eq!(out[1].channels[0], 1.0);
        assert_eq!(out[4].channels[0], 101.0);
        assert_eq!(decoder.last_counts(), fourth);
    }

    #[test]
    fn test_unrepresentable_delta_is_rejected() {
        // +1 has its low bit set, which the firmware reads as negative
        let err = encode_delta_frame(1, [0; 4], [-1, 0, 0, 0], [-1, 0, 0, 0], 0).unwrap_err();
        assert_eq!(err, DecodeError::Unrepresentable { value: 1, bits: 18 });
    }

    #[test]
    fn test_accel_axis_selection() {
        let mut decoder = GanglionDecoder::new();
        let mut out = Vec::new();
        decoder
            .decode(&encode_delta_frame(10, [0; 4], [0; 4], [0; 4], 10).unwrap(), 0.0, &mut out)
            .unwrap();
        decoder
            .decode(&encode_delta_frame(11, [0; 4], [0; 4], [0; 4], -5).unwrap(), 0.0, &mut out)
            .unwrap();
        decoder
            .decode(&encode_delta_frame(12, [0; 4], [0; 4], [0; 4], 3).unwrap(), 0.0, &mut out)
            .unwrap();

        let last = out.last().unwrap();
        assert!((last.channels[5] - 3.0 * GANGLION_ACCEL).abs() < 1e-12);
        assert!((last.channels[6] + 5.0 * GANGLION_ACCEL).abs() < 1e-12);
        assert!((last.channels[7] + 10.0 * GANGLION_ACCEL).abs() < 1e-12);
    }

    #[test]
    fn test_impedance_frame_is_partial_sample() {
        let mut decoder = GanglionDecoder::new();
        let mut out = Vec::new();
        decoder.decode(&encode_absolute_frame([5, 5, 5, 5]), 0.0, &mut out).unwrap();
        decoder.decode(&encode_impedance_frame(203, 812), 1.0, &mut out).unwrap();
        decoder.decode(&encode_impedance_frame(205, 7), 2.0, &mut out).unwrap();

        let sample = &out[2];
        assert_eq!(sample.channels[0], 205.0);
        assert!(sample.channels[1..8].iter().all(|&v| v == 0.0));
        assert_eq!(&sample.channels[8..13], &[0.0, 0.0, 812.0, 0.0, 7.0]);
        assert_eq!(decoder.last_counts(), [5, 5, 5, 5]);
    }

    #[test]
    fn test_bad_impedance_text_is_dropped() {
        let mut frame = [0u8; FRAME_SIZE];
        frame[0] = 201;
        frame[1..4].copy_from_slice(b"abZ");

        let mut decoder = GanglionDecoder::new();
        let mut out = Vec::new();
        let err = decoder.decode(&frame, 0.0, &mut out).unwrap_err();
        assert_eq!(err, DecodeError::Impedance("ab".to_string()));
        assert!(out.is_empty());
    }

    #[test]
    fn test_unknown_tag_keeps_state() {
        let mut decoder = GanglionDecoder::new();
        let mut out = Vec::new();
        decoder.decode(&encode_absolute_frame([1, 2, 3, 4]), 0.0, &mut out).unwrap();

        let mut frame = [0xFFu8; FRAME_SIZE];
        frame[0] = 230;
        assert_eq!(decoder.decode(&frame, 0.0, &mut out), Err(DecodeError::UnknownTag(230)));
        assert_eq!(out.len(), 1);
        assert_eq!(decoder.last_counts(), [1, 2, 3, 4]);
    }

    #[test]
    fn test_short_frame() {
        let mut decoder = GanglionDecoder::new();
        let err = decoder.decode(&[0u8; 5], 0.0, &mut Vec::new()).unwrap_err();
        assert_eq!(err, DecodeError::Length { expected: FRAME_SIZE, actual: 5 });
    }

    #[test]
    fn test_parse_leading_int() {
        assert_eq!(parse_leading_int("123"), Some(123));
        assert_eq!(parse_leading_int(" -7x"), Some(-7));
        assert_eq!(parse_leading_int(""), None);
        assert_eq!(parse_leading_int("Z"), None);
    }
}
