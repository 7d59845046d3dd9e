//! Realtime output through rodio.
//!
//! Queued buffers are converted to f32 and pushed into a lock-free ring; a
//! rodio source drains the ring on the audio callback side, playing silence
//! on underrun so the stream never stalls. The rodio output stream is not
//! `Send`, so a dedicated thread owns it for the device's lifetime.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use parking_lot::Mutex;
use rodio::{OutputStream, Sink, Source};

use crate::device::Device;
use crate::format::{f32_from_s16, s16_from_s32, s16_from_u8, Format, SampleFormat};
use crate::ring_buffer::{ring_buffer, RingConsumer, RingProducer};
use crate::{AudioError, Result};

/// Rodio source that reads f32 samples out of the shared ring.
struct RingSource {
    consumer: Arc<Mutex<RingConsumer>>,
    sample_rate: u32,
    channels: u16,
    finished: Arc<AtomicBool>,
    /// Batch buffer so the audio callback takes the lock once per chunk
    batch: Vec<u8>,
    batch_pos: usize,
}

impl RingSource {
    const BATCH_BYTES: usize = 4096 * 4;

    fn new(
        consumer: Arc<Mutex<RingConsumer>>,
        sample_rate: u32,
        channels: u16,
        finished: Arc<AtomicBool>,
    ) -> Self {
        RingSource {
            consumer,
            sample_rate,
            channels,
            finished,
            batch: vec![0u8; Self::BATCH_BYTES],
            batch_pos: Self::BATCH_BYTES,
        }
    }
}

impl Iterator for RingSource {
    type Item = f32;

    fn next(&mut self) -> Option<f32> {
        if self.finished.load(Ordering::Relaxed) {
            return None;
        }

        if self.batch_pos >= self.batch.len() {
            self.batch.resize(Self::BATCH_BYTES, 0);
            let mut consumer = self.consumer.lock();
            let take = consumer.bytes_available().min(self.batch.len());
            let take = take - take % 4;
            if take > 0 {
                consumer.read(&mut self.batch[..take]).ok();
                self.batch.truncate(take);
            } else {
                // Underrun: keep the stream alive with silence.
                self.batch.fill(0);
            }
            self.batch_pos = 0;
        }

        let at = self.batch_pos;
        self.batch_pos += 4;
        Some(f32::from_ne_bytes([
            self.batch[at],
            self.batch[at + 1],
            self.batch[at + 2],
            self.batch[at + 3],
        ]))
    }
}

impl Source for RingSource {
    fn current_frame_len(&self) -> Option<usize> {
        None
    }

    fn channels(&self) -> u16 {
        self.channels
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn total_duration(&self) -> Option<Duration> {
        None
    }
}

/// Realtime sink playing mixed windows through the default OS output.
pub struct RodioDevice {
    format: Format,
    num_buffers: u32,
    num_frames: u32,
    producer: RingProducer,
    finished: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl RodioDevice {
    /// Opens the default output device and starts the playback stream.
    ///
    /// The ring holds `num_buffers` windows of `num_frames` frames;
    /// `check` reports how many whole windows currently fit.
    pub fn open(format: Format, num_buffers: u32, num_frames: u32) -> Result<Self> {
        let window_bytes = num_frames as usize * format.channels as usize * 4;
        let (producer, consumer) = ring_buffer(window_bytes * num_buffers.max(2) as usize)?;
        let consumer = Arc::new(Mutex::new(consumer));
        let finished = Arc::new(AtomicBool::new(false));

        // The output stream is not Send; a dedicated thread owns it and
        // reports back whether it opened.
        let (ready_tx, ready_rx) = mpsc::channel::<std::result::Result<(), String>>();
        let source = RingSource::new(
            consumer,
            format.frame_rate,
            format.channels as u16,
            Arc::clone(&finished),
        );
        let stop = Arc::clone(&finished);
        let worker = std::thread::spawn(move || {
            let (stream, stream_handle) = match OutputStream::try_default() {
                Ok(pair) => pair,
                Err(e) => {
                    let _ = ready_tx.send(Err(format!("failed to create audio stream: {e}")));
                    return;
                }
            };
            let sink = match Sink::try_new(&stream_handle) {
                Ok(sink) => sink,
                Err(e) => {
                    let _ = ready_tx.send(Err(format!("failed to create audio sink: {e}")));
                    return;
                }
            };
            sink.append(source);
            let _ = ready_tx.send(Ok(()));

            while !stop.load(Ordering::Relaxed) {
                std::thread::sleep(Duration::from_millis(50));
            }
            sink.stop();
            drop(stream);
        });

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(RodioDevice {
                format,
                num_buffers,
                num_frames,
                producer,
                finished,
                worker: Some(worker),
            }),
            Ok(Err(msg)) => {
                let _ = worker.join();
                Err(AudioError::Backend(msg))
            }
            Err(_) => {
                let _ = worker.join();
                Err(AudioError::Backend("audio worker died during open".into()))
            }
        }
    }

    fn window_bytes(&self) -> usize {
        self.num_frames as usize * self.format.channels as usize * 4
    }
}

impl Device for RodioDevice {
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
        (self.producer.bytes_free() / self.window_bytes()) as u32
    }

    fn queue(&mut self, buffer: &[u8]) -> Result<()> {
        // Convert the mixer's output format to the f32 the stream plays.
        let samples = buffer.len() / self.format.sample_format.sample_size();
        let mut converted = Vec::with_capacity(samples * 4);
        match self.format.sample_format {
            SampleFormat::U8 => {
                for &b in buffer {
                    converted.extend_from_slice(&f32_from_s16(s16_from_u8(b)).to_ne_bytes());
                }
            }
            SampleFormat::S16 => {
                for c in buffer.chunks_exact(2) {
                    let v = i16::from_ne_bytes([c[0], c[1]]);
                    converted.extend_from_slice(&f32_from_s16(v).to_ne_bytes());
                }
            }
            SampleFormat::S32 => {
                for c in buffer.chunks_exact(4) {
                    let v = i32::from_ne_bytes([c[0], c[1], c[2], c[3]]);
                    converted.extend_from_slice(&f32_from_s16(s16_from_s32(v)).to_ne_bytes());
                }
            }
            SampleFormat::F32 => converted.extend_from_slice(buffer),
        }

        self.producer.write(&converted).map_err(|_| {
            log::warn!("realtime ring full; window dropped");
            AudioError::Underrun
        })
    }

    fn close(&mut self) -> Result<()> {
        self.finished.store(true, Ordering::Relaxed);
        if let Some(worker) = self.worker.take() {
            worker
                .join()
                .map_err(|_| AudioError::Backend("audio worker panicked".into()))?;
        }
        Ok(())
    }
}

impl Drop for RodioDevice {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            log::warn!("rodio device close failed: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn try_device() -> Option<RodioDevice> {
        match RodioDevice::open(Format::stereo_s16(48_000), 4, 512) {
            Ok(dev) => Some(dev),
            Err(e) => {
                eprintln!("Skipping rodio device test (audio backend unavailable): {e}");
                None
            }
        }
    }

    #[test]
    fn open_check_queue() {
        let Some(mut dev) = try_device() else {
            return;
        };
        assert!(dev.check() >= 1);
        let window = vec![0u8; 512 * 4];
        dev.queue(&window).unwrap();
        dev.close().unwrap();
    }

    #[test]
    fn ring_source_plays_silence_on_underrun() {
        let (_p, consumer) = ring_buffer(1024).unwrap();
        let mut source = RingSource::new(
            Arc::new(Mutex::new(consumer)),
            48_000,
            2,
            Arc::new(AtomicBool::new(false)),
        );
        assert_eq!(source.next(), Some(0.0));
    }

    #[test]
    fn ring_source_stops_when_finished() {
        let (_p, consumer) = ring_buffer(1024).unwrap();
        let finished = Arc::new(AtomicBool::new(false));
        let mut source = RingSource::new(
            Arc::new(Mutex::new(consumer)),
            48_000,
            2,
            Arc::clone(&finished),
        );
        assert!(source.next().is_some());
        finished.store(true, Ordering::Relaxed);
        assert_eq!(source.next(), None);
    }
}
