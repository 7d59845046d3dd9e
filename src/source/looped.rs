//! Loop wrapper: re-reads a window of another source indefinitely.

use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use crate::data_source::AccessFlags;
use crate::format::Format;
use crate::sample_source::{OnSeek, SampleSource, TellInfo};
use crate::{AudioError, Result};

/// Wraps a seekable sample source and seeks it back to `target` whenever a
/// read would cross `trigger`.
///
/// The trigger and target are re-read on every pass, so loop points can be
/// retargeted while playing. Each jump bumps [`LoopSource::loop_count`] and is
/// reported through the read's on-seek callback so buffered consumers keep an
/// honest `tell`.
pub struct LoopSource {
    inner: Arc<dyn SampleSource>,
    format: Format,
    frame_size: usize,
    /// Loop when a read would cross this frame; negative means end of stream
    trigger: AtomicI64,
    /// Seek here on loop
    target: AtomicU64,
    enabled: AtomicBool,
    count: AtomicU32,
}

impl LoopSource {
    /// Wraps `inner`, looping its whole length. Fails unless `inner` is
    /// seekable.
    pub fn new(inner: Arc<dyn SampleSource>) -> Result<Self> {
        if !inner.flags().contains(AccessFlags::SEEKABLE) {
            return Err(AudioError::Unsupported);
        }
        let format = inner.format();
        Ok(LoopSource {
            inner,
            format,
            frame_size: format.frame_size(),
            trigger: AtomicI64::new(-1),
            target: AtomicU64::new(0),
            enabled: AtomicBool::new(true),
            count: AtomicU32::new(0),
        })
    }

    /// Sets the loop window: jump to `target` when a read would cross
    /// `trigger` (negative `trigger` means the end of the stream). Resets the
    /// loop counter.
    pub fn set_points(&self, trigger: i64, target: u64) {
        self.target.store(target, Ordering::Relaxed);
        self.trigger.store(trigger, Ordering::Relaxed);
        self.count.store(0, Ordering::Relaxed);
    }

    /// Enables looping over the whole stream.
    pub fn enable(&self) {
        self.set_points(-1, 0);
        self.enabled.store(true, Ordering::Relaxed);
    }

    /// Disables looping; reads pass straight through.
    pub fn disable(&self) {
        self.set_points(-1, 0);
        self.enabled.store(false, Ordering::Relaxed);
    }

    /// Number of times the source has jumped since the points were last set.
    pub fn loop_count(&self) -> u32 {
        self.count.load(Ordering::Relaxed)
    }

    fn resolve_trigger(&self) -> Result<Option<u64>> {
        let raw = self.trigger.load(Ordering::Relaxed);
        if raw >= 0 {
            return Ok(Some(raw as u64));
        }
        Ok(self.inner.tell()?.total)
    }
}

impl SampleSource for LoopSource {
    fn format(&self) -> Format {
        self.format
    }

    fn read(&self, dst: &mut [u8], num_frames: usize, on_seek: Option<&OnSeek<'_>>) -> Result<usize> {
        if !self.enabled.load(Ordering::Relaxed) {
            return self.inner.read(dst, num_frames, None);
        }

        let mut pos = self.inner.tell()?.current;
        let trigger = match self.resolve_trigger()? {
            Some(t) => t,
            None => return Ok(0),
        };
        let target = self.target.load(Ordering::Relaxed);

        if pos > trigger {
            return self.inner.read(dst, num_frames, None);
        }

        let mut remaining = num_frames;
        let mut total_read = 0u64;
        while remaining > 0 {
            let avail = (trigger - pos) as usize;
            let do_seek = avail < remaining;
            let to_read = if do_seek { avail } else { remaining };
            let num_read = self.inner.read(
                &mut dst[total_read as usize * self.frame_size..],
                to_read,
                None,
            )?;
            total_read += num_read as u64;
            remaining -= num_read;
            if do_seek && to_read == num_read {
                self.inner.seek(target)?;
                self.count.fetch_add(1, Ordering::Relaxed);
                if let Some(cb) = on_seek {
                    cb(total_read, target as i64 - trigger as i64);
                }
            } else if num_read == 0 {
                break;
            }
            pos = self.inner.tell()?.current;
        }
        Ok(total_read as usize)
    }

    fn end(&self) -> bool {
        self.inner.end()
    }

    fn ready(&self, num_frames: usize) -> bool {
        self.inner.ready(num_frames)
    }

    fn seek(&self, frame: u64) -> Result<()> {
        self.inner.seek(frame)
    }

    fn tell(&self) -> Result<TellInfo> {
        self.inner.tell()
    }

    fn flags(&self) -> AccessFlags {
        self.inner.flags()
    }
}
