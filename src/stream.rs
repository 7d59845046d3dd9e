//! Background-buffered streams and their manager.
//!
//! A [`BufferedStream`] decouples decoding from mixing: a stream thread calls
//! [`BufferedStream::produce`] to keep the ring topped up from the inner
//! sample source, while the mix thread drains it through
//! [`BufferedStream::read`]. Seeks are requested asynchronously and applied
//! by the producer; seeks that happen *inside* the inner source (loop jumps)
//! are recorded as tell-jumps so the reader-visible position stays honest
//! while the jumped-over bytes are still in flight in the ring.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::data_source::AccessFlags;
use crate::format::Format;
use crate::ring_buffer::{ring_buffer, RingConsumer, RingProducer};
use crate::sample_source::{SampleSource, TellInfo};
use crate::{AudioError, Result};

/// A seek that occurred inside the stream but has not yet been observed by
/// the reader.
#[derive(Debug, Clone, Copy)]
struct TellJump {
    /// Frames of buffered data ahead of this jump
    pos: u64,
    /// Position change once the reader crosses it
    delta: i64,
}

/// Position bookkeeping, guarded by one mutex: the logical read position,
/// any pending seek request, and the in-flight jump ledger.
struct SeekState {
    tell: u64,
    seek_request: Option<u64>,
    jumps: VecDeque<TellJump>,
}

/// A sample stream buffered through a lock-free ring by a background filler.
pub struct BufferedStream {
    inner: Arc<dyn SampleSource>,
    format: Format,
    frame_size: usize,
    buffer_size: usize,
    flags: AccessFlags,
    producer: Mutex<RingProducer>,
    consumer: Mutex<RingConsumer>,
    /// Serializes readers, and excludes them while a seek flushes the ring
    read_mutex: Mutex<()>,
    seek_state: Mutex<SeekState>,
    /// Next frame the producer will pull from the inner source
    next_frame: AtomicU64,
    end_seen: AtomicBool,
}

impl BufferedStream {
    /// Creates a stream over `inner` buffered by `buffer_size` bytes
    /// (rounded up to a power of two) and registers it with `manager` for
    /// background filling.
    ///
    /// The inner source must be threadsafe: the filler and the reader touch
    /// it from different threads.
    pub fn new(
        manager: &StreamManager,
        inner: Arc<dyn SampleSource>,
        buffer_size: usize,
    ) -> Result<Arc<Self>> {
        let flags = inner.flags();
        if !flags.contains(AccessFlags::THREADSAFE) {
            return Err(AudioError::InvalidParameter);
        }
        let format = inner.format();
        let frame_size = format.frame_size();
        if buffer_size == 0 || buffer_size % frame_size != 0 {
            return Err(AudioError::InvalidParameter);
        }
        let (producer, consumer) = ring_buffer(buffer_size)?;
        let buffer_size = producer.capacity();

        let stream = Arc::new(BufferedStream {
            inner,
            format,
            frame_size,
            buffer_size,
            flags,
            producer: Mutex::new(producer),
            consumer: Mutex::new(consumer),
            read_mutex: Mutex::new(()),
            seek_state: Mutex::new(SeekState {
                tell: 0,
                seek_request: None,
                jumps: VecDeque::new(),
            }),
            next_frame: AtomicU64::new(0),
            end_seen: AtomicBool::new(false),
        });
        manager.add(&stream);
        Ok(stream)
    }

    /// The stream's PCM format (that of the inner source).
    pub fn format(&self) -> Format {
        self.format
    }

    /// Capability flags forwarded from the inner source.
    pub fn flags(&self) -> AccessFlags {
        self.flags
    }

    /// Fills the ring from the inner source. Called by the stream thread.
    ///
    /// A pending seek is applied first: the ring and jump ledger are flushed
    /// under the read mutex so a concurrent reader never sees stale frames.
    pub fn produce(&self) -> Result<()> {
        if self.seek_state.lock().seek_request.is_some() {
            let _readers_out = self.read_mutex.lock();
            let mut seek = self.seek_state.lock();
            // Re-check now that we hold both locks.
            if let Some(frame) = seek.seek_request.take() {
                seek.tell = frame;
                seek.jumps.clear();
                self.next_frame.store(frame, Ordering::Relaxed);
                self.end_seen.store(false, Ordering::Relaxed);
                let mut consumer = self.consumer.lock();
                let stale = consumer.bytes_available();
                consumer.skip(stale)?;
                drop(consumer);
                self.inner.seek(frame)?;
            }
        }

        loop {
            let mut producer = self.producer.lock();
            let free_frames = producer.bytes_free() / self.frame_size;
            if free_frames == 0 {
                break;
            }
            let requested = free_frames;
            let mut inner_err = None;
            let produced_bytes = producer.produce_with(requested * self.frame_size, |a, b| {
                match self.fill_regions(a, b) {
                    Ok(n) => n,
                    Err(e) => {
                        inner_err = Some(e);
                        0
                    }
                }
            })?;
            drop(producer);
            if let Some(e) = inner_err {
                return Err(e);
            }

            let produced_frames = produced_bytes / self.frame_size;
            self.next_frame
                .fetch_add(produced_frames as u64, Ordering::Relaxed);
            if produced_frames < requested && self.inner.end() {
                self.end_seen.store(true, Ordering::Relaxed);
                break;
            }
        }
        Ok(())
    }

    /// Reads the inner source into the two free regions, recording any
    /// internal seeks as tell-jumps. Returns bytes written.
    ///
    /// `frames_into_fill` positions a jump relative to the bytes already
    /// published in the ring plus the frames written earlier in this same
    /// fill, which are not yet visible through the counters.
    fn fill_regions(&self, a: &mut [u8], b: &mut [u8]) -> Result<usize> {
        let record_jump = |frames_into_fill: u64, delta: i64| {
            let _readers_out = self.read_mutex.lock();
            let mut seek = self.seek_state.lock();
            let buffered_frames = (self.consumer.lock().bytes_available() / self.frame_size) as u64;
            seek.jumps.push_back(TellJump {
                pos: buffered_frames + frames_into_fill,
                delta,
            });
        };

        let frames_a = a.len() / self.frame_size;
        let on_seek_a = |rel: u64, delta: i64| record_jump(rel, delta);
        let mut written = self
            .inner
            .read(a, frames_a, Some(&on_seek_a))?;
        if written == frames_a && !b.is_empty() {
            let base = written as u64;
            let on_seek_b = |rel: u64, delta: i64| record_jump(base + rel, delta);
            let frames_b = b.len() / self.frame_size;
            written += self
                .inner
                .read(b, frames_b, Some(&on_seek_b))?;
        }
        Ok(written * self.frame_size)
    }

    /// Copies up to `num_frames` buffered frames into `dst`, returning the
    /// number of frames read, and advances the reported position across any
    /// tell-jumps the read crossed.
    pub fn read(&self, dst: &mut [u8], num_frames: usize) -> usize {
        let _reading = self.read_mutex.lock();

        let mut consumer = self.consumer.lock();
        let avail_bytes = consumer.bytes_available();
        let want_bytes = (num_frames * self.frame_size).min(avail_bytes);
        let want_bytes = want_bytes - want_bytes % self.frame_size;
        let copied = consumer
            .consume_with(want_bytes, |a, b| {
                dst[..a.len()].copy_from_slice(a);
                dst[a.len()..a.len() + b.len()].copy_from_slice(b);
                a.len() + b.len()
            })
            .unwrap_or(0);
        drop(consumer);

        let frames_read = (copied / self.frame_size) as u64;
        let mut seek = self.seek_state.lock();
        seek.tell += frames_read;
        let mut delta = 0i64;
        seek.jumps.retain_mut(|jump| {
            if jump.pos <= frames_read {
                delta += jump.delta;
                false
            } else {
                jump.pos -= frames_read;
                true
            }
        });
        seek.tell = (seek.tell as i64 + delta) as u64;

        frames_read as usize
    }

    /// Whether `num_frames` can be read without under-running: either the
    /// stream has ended, or the ring holds enough data and is at least half
    /// full.
    pub fn ready(&self, num_frames: usize) -> bool {
        let avail = self.consumer.lock().bytes_available();
        self.end_seen.load(Ordering::Relaxed)
            || (avail >= num_frames * self.frame_size && avail > self.buffer_size / 2)
    }

    /// Whether the stream has ended and every buffered frame was drained.
    pub fn end(&self) -> bool {
        self.end_seen.load(Ordering::Relaxed) && self.consumer.lock().bytes_available() == 0
    }

    /// Requests a seek. Applied on the next produce cycle; `tell` reports the
    /// target immediately.
    pub fn seek(&self, frame: u64) -> Result<()> {
        self.seek_state.lock().seek_request = Some(frame);
        Ok(())
    }

    /// Reports the current position (the pending seek target if one is
    /// queued) and the total forwarded from the inner source.
    pub fn tell(&self) -> Result<TellInfo> {
        let total = self.inner.tell()?.total;
        let seek = self.seek_state.lock();
        Ok(TellInfo {
            current: seek.seek_request.unwrap_or(seek.tell),
            total,
        })
    }
}

/// Registry of live buffered streams, pumped by the stream thread.
///
/// Streams are held weakly: dropping the last strong reference to a stream
/// (its sample-source facade) retires it from the manager on the next
/// [`StreamManager::buffer`] pass.
pub struct StreamManager {
    streams: Mutex<Vec<Weak<BufferedStream>>>,
}

impl Default for StreamManager {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamManager {
    /// Creates an empty manager.
    pub fn new() -> Self {
        StreamManager {
            streams: Mutex::new(Vec::new()),
        }
    }

    fn add(&self, stream: &Arc<BufferedStream>) {
        self.streams.lock().push(Arc::downgrade(stream));
    }

    /// Runs one fill pass over every live stream, pruning dead ones.
    ///
    /// Production happens outside the list mutex so registering a new stream
    /// never blocks behind decoder I/O.
    pub fn buffer(&self) {
        let links: Vec<Weak<BufferedStream>> = self.streams.lock().clone();
        let mut any_dead = false;
        for link in &links {
            match link.upgrade() {
                Some(stream) => {
                    if let Err(e) = stream.produce() {
                        log::warn!("stream fill failed: {e}");
                    }
                }
                None => any_dead = true,
            }
        }
        if any_dead {
            self.streams.lock().retain(|w| w.strong_count() > 0);
        }
    }

    /// Number of live streams currently registered.
    pub fn len(&self) -> usize {
        self.streams
            .lock()
            .iter()
            .filter(|w| w.strong_count() > 0)
            .count()
    }

    /// Whether no live streams are registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
