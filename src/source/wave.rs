//! Tone generator sample source.

use std::f64::consts::TAU;

use parking_lot::Mutex;

use crate::data_source::AccessFlags;
use crate::format::{s16_from_f32, Format, SampleFormat};
use crate::sample_source::{OnSeek, SampleSource, TellInfo};
use crate::{AudioError, Result};

/// Endless sine tone in signed 16-bit, handy as a synth voice and as a
/// deterministic source in tests.
///
/// Seekable: the phase is a pure function of the frame index.
pub struct SineSource {
    format: Format,
    frequency: f32,
    amplitude: f32,
    pos: Mutex<u64>,
}

impl SineSource {
    /// Creates a tone at `frequency` Hz with `amplitude` in `[0, 1]`,
    /// rendered at `frame_rate` over `channels` channels.
    pub fn new(frequency: f32, amplitude: f32, channels: u32, frame_rate: u32) -> Result<Self> {
        if frequency <= 0.0 || !(0.0..=1.0).contains(&amplitude) {
            return Err(AudioError::InvalidParameter);
        }
        Ok(SineSource {
            format: Format::new(SampleFormat::S16, channels, frame_rate)?,
            frequency,
            amplitude,
            pos: Mutex::new(0),
        })
    }

    fn sample_at(&self, frame: u64) -> i16 {
        let t = frame as f64 / self.format.frame_rate as f64;
        let v = (t * self.frequency as f64 * TAU).sin() as f32 * self.amplitude;
        s16_from_f32(v)
    }
}

impl SampleSource for SineSource {
    fn format(&self) -> Format {
        self.format
    }

    fn read(&self, dst: &mut [u8], num_frames: usize, _on_seek: Option<&OnSeek<'_>>) -> Result<usize> {
        let mut pos = self.pos.lock();
        let channels = self.format.channels as usize;
        for i in 0..num_frames {
            let sample = self.sample_at(*pos + i as u64).to_ne_bytes();
            for c in 0..channels {
                let at = (i * channels + c) * 2;
                dst[at..at + 2].copy_from_slice(&sample);
            }
        }
        *pos += num_frames as u64;
        Ok(num_frames)
    }

    fn end(&self) -> bool {
        false
    }

    fn seek(&self, frame: u64) -> Result<()> {
        *self.pos.lock() = frame;
        Ok(())
    }

    fn tell(&self) -> Result<TellInfo> {
        Ok(TellInfo {
            current: *self.pos.lock(),
            total: None,
        })
    }

    fn flags(&self) -> AccessFlags {
        AccessFlags::SEEKABLE | AccessFlags::THREADSAFE
    }
}
