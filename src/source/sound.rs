//! Sample source over a resident PCM blob.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::data_source::AccessFlags;
use crate::format::Format;
use crate::memory::Sound;
use crate::sample_source::{OnSeek, SampleSource, TellInfo};
use crate::{AudioError, Result};

/// Random-access playback cursor over a [`Sound`].
///
/// Cheap to create; many cursors may play the same sound concurrently.
pub struct SoundSource {
    sound: Arc<Sound>,
    frame_size: usize,
    pos: Mutex<u64>,
}

impl SoundSource {
    /// Creates a cursor at frame 0 of `sound`.
    pub fn new(sound: Arc<Sound>) -> Self {
        let frame_size = sound.format().frame_size();
        SoundSource {
            sound,
            frame_size,
            pos: Mutex::new(0),
        }
    }
}

impl SampleSource for SoundSource {
    fn format(&self) -> Format {
        self.sound.format()
    }

    fn read(&self, dst: &mut [u8], num_frames: usize, _on_seek: Option<&OnSeek<'_>>) -> Result<usize> {
        let mut pos = self.pos.lock();
        let avail = (self.sound.num_frames() - *pos) as usize;
        let n = avail.min(num_frames);
        let start = *pos as usize * self.frame_size;
        dst[..n * self.frame_size]
            .copy_from_slice(&self.sound.data()[start..start + n * self.frame_size]);
        *pos += n as u64;
        Ok(n)
    }

    fn end(&self) -> bool {
        *self.pos.lock() >= self.sound.num_frames()
    }

    fn seek(&self, frame: u64) -> Result<()> {
        if frame > self.sound.num_frames() {
            return Err(AudioError::InvalidParameter);
        }
        *self.pos.lock() = frame;
        Ok(())
    }

    fn tell(&self) -> Result<TellInfo> {
        Ok(TellInfo {
            current: *self.pos.lock(),
            total: Some(self.sound.num_frames()),
        })
    }

    fn flags(&self) -> AccessFlags {
        AccessFlags::SEEKABLE | AccessFlags::THREADSAFE
    }
}
