//! Conversion between decoder timestamps and linear PCM sample offsets.
//!
//! Timestamps are in stream time-base units; sample offsets are in 16-bit
//! sample units (two bytes each, channels interleaved, so one second of
//! stereo audio spans `sample_rate * 2` samples). Only the time-base
//! denominator participates in the scaling.

use crate::shared::constants::{FRAME_BYTES, FRAME_SAMPLES};

/// Linear scaling from a timestamp to a sample offset.
pub fn sample_offset_from_timestamp(pts: f64, time_base_den: u32, sample_rate: u32) -> f64 {
    pts / f64::from(time_base_den) * f64::from(sample_rate) * FRAME_SAMPLES as f64
}

/// Mathematical inverse of [`sample_offset_from_timestamp`].
pub fn timestamp_from_sample_offset(offset: f64, time_base_den: u32, sample_rate: u32) -> f64 {
    offset / f64::from(sample_rate) / FRAME_SAMPLES as f64 * f64::from(time_base_den)
}

/// Integer-timestamp variant, rounded up to the nearest multiple of the
/// stereo frame byte width so derived offsets stay frame-aligned.
pub fn aligned_sample_offset_from_timestamp(pts: i64, time_base_den: u32, sample_rate: u32) -> i64 {
    let mut offset = sample_offset_from_timestamp(pts as f64, time_base_den, sample_rate).round() as i64;
    let rem = offset % FRAME_BYTES as i64;
    if rem != 0 {
        offset += FRAME_BYTES as i64 - rem;
    }
    offset
}

/// Integer inverse of [`aligned_sample_offset_from_timestamp`]; the result is
/// rounded to an even timestamp.
pub fn timestamp_from_aligned_sample_offset(offset: i64, time_base_den: u32, sample_rate: u32) -> i64 {
    let ts = timestamp_from_sample_offset(offset as f64, time_base_den, sample_rate).round() as i64;
    ts + ts % 2
}
