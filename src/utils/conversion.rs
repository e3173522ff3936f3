// src/utils/conversion.rs
//! Fixed-width field readers for board wire formats
//!
//! Callers check frame lengths before calling these helpers; the readers
//! index directly into the slice.

/// 24-bit big-endian two's complement integer, sign-extended to 32 bits
pub fn int24_be(bytes: &[u8]) -> i32 {
    let raw = (u32::from(bytes[0]) << 16) | (u32::from(bytes[1]) << 8) | u32::from(bytes[2]);
    ((raw << 8) as i32) >> 8
}

/// Inverse of [`int24_be`]; values are truncated to 24 bits
pub fn int24_to_be_bytes(value: i32) -> [u8; 3] {
    let bytes = value.to_be_bytes();
    [bytes[1], bytes[2], bytes[3]]
}

pub fn i16_be(bytes: &[u8]) -> i16 {
    i16::from_be_bytes([bytes[0], bytes[1]])
}

pub fn u16_le(bytes: &[u8]) -> u16 {
    u16::from_le_bytes([bytes[0], bytes[1]])
}

pub fn i16_le(bytes: &[u8]) -> i16 {
    i16::from_le_bytes([bytes[0], bytes[1]])
}

pub fn i32_le(bytes: &[u8]) -> i32 {
    i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

pub fn f32_le(bytes: &[u8]) -> f32 {
    f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

pub fn f64_le(bytes: &[u8]) -> f64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&bytes[..8]);
    f64::from_le_bytes(raw)
}

/// Read `width` bits (at most 32) starting `bit_offset` bits into `bytes`,
/// most significant bit first
pub fn read_bits_msb(bytes: &[u8], bit_offset: usize, width: usize) -> u32 {
    let mut value = 0u32;
    for bit in bit_offset..bit_offset + width {
        let byte = bytes[bit / 8];
        let set = (byte >> (7 - bit % 8)) & 1;
        value = (value << 1) | u32::from(set);
    }
    value
}

/// Write the low `width` bits of `value` starting `bit_offset` bits into
/// `bytes`, most significant bit first
pub fn write_bits_msb(bytes: &mut [u8], bit_offset: usize, width: usize, value: u32) {
    for i in 0..width {
        let bit = bit_offset + i;
        let set = (value >> (width - 1 - i)) & 1;
        let mask = 1u8 << (7 - bit % 8);
        if set == 1 {
            bytes[bit / 8] |= mask;
        } else {
            bytes[bit / 8] &= !mask;
        }
    }
}
