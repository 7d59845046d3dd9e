//! PCM formats, frame arithmetic, and pure sample conversions.
//!
//! A *frame* is one sample per channel; all buffer sizing in the crate is
//! derived from [`Format::frame_size`]. Conversions between sample formats
//! go through the signed 16-bit midpoint that the mixer accumulates in.

use serde::{Deserialize, Serialize};

/// Encoding of a single PCM sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SampleFormat {
    /// Unsigned 8-bit, midpoint 128
    U8,
    /// Signed 16-bit
    S16,
    /// Signed 32-bit
    S32,
    /// 32-bit float, fullscale ±1.0
    F32,
}

impl SampleFormat {
    /// Size in bytes of one sample.
    pub const fn sample_size(self) -> usize {
        match self {
            SampleFormat::U8 => 1,
            SampleFormat::S16 => 2,
            SampleFormat::S32 | SampleFormat::F32 => 4,
        }
    }
}

/// Format of interleaved PCM data: sample encoding, channel count, frame rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Format {
    /// Per-sample encoding
    pub sample_format: SampleFormat,
    /// Number of interleaved channels (1 or 2)
    pub channels: u32,
    /// Frames per second (usually 44100 or 48000)
    pub frame_rate: u32,
}

impl Format {
    /// Creates a format, validating the channel count and frame rate.
    pub fn new(sample_format: SampleFormat, channels: u32, frame_rate: u32) -> crate::Result<Self> {
        if !(1..=2).contains(&channels) || frame_rate == 0 {
            return Err(crate::AudioError::InvalidParameter);
        }
        Ok(Format {
            sample_format,
            channels,
            frame_rate,
        })
    }

    /// Signed 16-bit stereo at the given rate, the common device format.
    pub const fn stereo_s16(frame_rate: u32) -> Self {
        Format {
            sample_format: SampleFormat::S16,
            channels: 2,
            frame_rate,
        }
    }

    /// Signed 16-bit mono at the given rate.
    pub const fn mono_s16(frame_rate: u32) -> Self {
        Format {
            sample_format: SampleFormat::S16,
            channels: 1,
            frame_rate,
        }
    }

    /// Size in bytes of one frame (one sample per channel).
    pub const fn frame_size(&self) -> usize {
        self.sample_format.sample_size() * self.channels as usize
    }

    /// Playback duration of `frames` frames, in seconds.
    pub fn to_seconds(&self, frames: u64) -> f32 {
        frames as f32 / self.frame_rate as f32
    }

    /// Number of frames played back in `seconds` seconds.
    pub fn to_frames(&self, seconds: f32) -> u64 {
        (seconds * self.frame_rate as f32) as u64
    }
}

/// Widens an unsigned 8-bit sample to signed 16-bit.
#[inline]
pub fn s16_from_u8(x: u8) -> i16 {
    ((x as i16) - 128) << 8
}

/// Narrows a signed 16-bit sample to unsigned 8-bit.
#[inline]
pub fn u8_from_s16(x: i16) -> u8 {
    ((x >> 8) + 128) as u8
}

/// Widens a signed 16-bit sample to signed 32-bit.
#[inline]
pub fn s32_from_s16(x: i16) -> i32 {
    (x as i32) << 16
}

/// Narrows a signed 32-bit sample to signed 16-bit.
#[inline]
pub fn s16_from_s32(x: i32) -> i16 {
    (x >> 16) as i16
}

/// Converts a signed 16-bit sample to float fullscale ±1.0.
#[inline]
pub fn f32_from_s16(x: i16) -> f32 {
    x as f32 / 32768.0
}

/// Converts a float sample to signed 16-bit, clamping to fullscale.
#[inline]
pub fn s16_from_f32(x: f32) -> i16 {
    (x * 32768.0).clamp(-32768.0, 32767.0) as i16
}

/// Reads the sample at `index` (in samples, not frames) out of an interleaved
/// byte buffer and converts it to the signed 16-bit midpoint scale.
#[inline]
pub(crate) fn sample_as_s16(buf: &[u8], fmt: SampleFormat, index: usize) -> i16 {
    match fmt {
        SampleFormat::U8 => s16_from_u8(buf[index]),
        SampleFormat::S16 => i16::from_ne_bytes([buf[index * 2], buf[index * 2 + 1]]),
        SampleFormat::S32 => {
            let v = i32::from_ne_bytes([
                buf[index * 4],
                buf[index * 4 + 1],
                buf[index * 4 + 2],
                buf[index * 4 + 3],
            ]);
            s16_from_s32(v)
        }
        SampleFormat::F32 => {
            let v = f32::from_ne_bytes([
                buf[index * 4],
                buf[index * 4 + 1],
                buf[index * 4 + 2],
                buf[index * 4 + 3],
            ]);
            s16_from_f32(v.clamp(-1.0, 1.0))
        }
    }
}
