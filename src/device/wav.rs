//! Device that renders mixed output into a WAV file.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use crate::device::Device;
use crate::format::{Format, SampleFormat};
use crate::{AudioError, Result};

/// Writes every queued buffer into a WAV file, finalized on close.
///
/// `check` always reports one free buffer: a file accepts audio as fast as
/// the mixer can produce it, which makes this sink double as an offline
/// renderer.
pub struct WavFileDevice {
    format: Format,
    num_buffers: u32,
    num_frames: u32,
    writer: Option<hound::WavWriter<BufWriter<File>>>,
}

impl WavFileDevice {
    /// Creates the output file and writes the WAV header.
    pub fn create<P: AsRef<Path>>(path: P, format: Format, num_frames: u32) -> Result<Self> {
        let (bits_per_sample, sample_format) = match format.sample_format {
            SampleFormat::U8 => (8, hound::SampleFormat::Int),
            SampleFormat::S16 => (16, hound::SampleFormat::Int),
            SampleFormat::S32 => (32, hound::SampleFormat::Int),
            SampleFormat::F32 => (32, hound::SampleFormat::Float),
        };
        let spec = hound::WavSpec {
            channels: format.channels as u16,
            sample_rate: format.frame_rate,
            bits_per_sample,
            sample_format,
        };
        let writer = hound::WavWriter::create(path, spec)
            .map_err(|e| AudioError::Backend(format!("failed to create WAV file: {e}")))?;
        Ok(WavFileDevice {
            format,
            num_buffers: 2,
            num_frames,
            writer: Some(writer),
        })
    }
}

impl Device for WavFileDevice {
    fn format(&self) -> Format {
        self.format
    }

    fn num_buffers(&self) -> u32 {
        self.num_buffers
    }

    fn num_frames(&self) -> u32 {
        self.num_frames
    }

    fn check(&mut self) -> u32 {
        1
    }

    fn queue(&mut self, buffer: &[u8]) -> Result<()> {
        let writer = self
            .writer
            .as_mut()
            .ok_or(AudioError::Unsupported)?;
        let write_err =
            |e: hound::Error| AudioError::Backend(format!("failed to write sample: {e}"));
        match self.format.sample_format {
            SampleFormat::U8 => {
                // hound's API is signed; it re-biases 8-bit samples itself.
                for &b in buffer {
                    writer
                        .write_sample((b as i16 - 128) as i8)
                        .map_err(write_err)?;
                }
            }
            SampleFormat::S16 => {
                for c in buffer.chunks_exact(2) {
                    writer
                        .write_sample(i16::from_ne_bytes([c[0], c[1]]))
                        .map_err(write_err)?;
                }
            }
            SampleFormat::S32 => {
                for c in buffer.chunks_exact(4) {
                    writer
                        .write_sample(i32::from_ne_bytes([c[0], c[1], c[2], c[3]]))
                        .map_err(write_err)?;
                }
            }
            SampleFormat::F32 => {
                for c in buffer.chunks_exact(4) {
                    writer
                        .write_sample(f32::from_ne_bytes([c[0], c[1], c[2], c[3]]))
                        .map_err(write_err)?;
                }
            }
        }
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if let Some(writer) = self.writer.take() {
            writer
                .finalize()
                .map_err(|e| AudioError::Backend(format!("failed to finalize WAV file: {e}")))?;
        }
        Ok(())
    }
}

impl Drop for WavFileDevice {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            log::warn!("WAV device close failed: {e}");
        }
    }
}
