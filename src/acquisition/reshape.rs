// src/acquisition/reshape.rs
//! Sample-major to channel-major conversion for the retrieval API

use crate::error::{BoardError, BoardResult};
use crate::hal::types::Sample;
use ndarray::Array2;

/// Build a `(channel_count + 1) x samples.len()` table. Row `c` holds channel
/// `c` across samples, oldest first; the last row holds timestamps. Samples
/// shorter than `channel_count` are zero-padded.
pub fn reshape(samples: &[Sample], channel_count: usize) -> Array2<f64> {
    Array2::from_shape_fn((channel_count + 1, samples.len()), |(row, col)| {
        let sample = &samples[col];
        if row == channel_count {
            sample.timestamp
        } else {
            sample.channels.get(row).copied().unwrap_or(0.0)
        }
    })
}

/// Same layout as [`reshape`], from a flat sample-major value slice and a
/// parallel timestamp slice
pub fn reshape_flat(values: &[f64], timestamps: &[f64], channel_count: usize) -> BoardResult<Array2<f64>> {
    let count = timestamps.len();
    if values.len() != count * channel_count {
        return Err(BoardError::invalid(format!(
            "{} values do not match {} samples of {} channels",
            values.len(),
            count,
            channel_count
        )));
    }
    Ok(Array2::from_shape_fn((channel_count + 1, count), |(row, col)| {
        if row == channel_count {
            timestamps[col]
        } else {
            values[col * channel_count + row]
        }
    }))
}
