//! Sample source facade over a background-buffered stream.

use std::sync::Arc;

use crate::data_source::AccessFlags;
use crate::format::Format;
use crate::sample_source::{OnSeek, SampleSource, TellInfo};
use crate::stream::{BufferedStream, StreamManager};
use crate::{AudioError, Result};

/// Presents a [`BufferedStream`] through the sample-source interface so a
/// mixer handle can play it like any other source.
///
/// Dropping the facade drops the stream, which retires it from its manager.
pub struct StreamSource {
    stream: Arc<BufferedStream>,
}

impl StreamSource {
    /// Buffers `inner` through `manager` with room for `buffer_frames`
    /// frames.
    pub fn new(
        manager: &StreamManager,
        inner: Arc<dyn SampleSource>,
        buffer_frames: usize,
    ) -> Result<Self> {
        let frame_size = inner.format().frame_size();
        let stream = BufferedStream::new(manager, inner, buffer_frames * frame_size)?;
        Ok(StreamSource { stream })
    }

    /// The underlying buffered stream.
    pub fn stream(&self) -> &Arc<BufferedStream> {
        &self.stream
    }
}

impl SampleSource for StreamSource {
    fn format(&self) -> Format {
        self.stream.format()
    }

    fn read(&self, dst: &mut [u8], num_frames: usize, _on_seek: Option<&OnSeek<'_>>) -> Result<usize> {
        Ok(self.stream.read(dst, num_frames))
    }

    fn end(&self) -> bool {
        self.stream.end()
    }

    fn ready(&self, num_frames: usize) -> bool {
        self.stream.ready(num_frames)
    }

    fn seek(&self, frame: u64) -> Result<()> {
        if !self.stream.flags().contains(AccessFlags::SEEKABLE) {
            return Err(AudioError::Unsupported);
        }
        self.stream.seek(frame)
    }

    fn tell(&self) -> Result<TellInfo> {
        self.stream.tell()
    }

    fn flags(&self) -> AccessFlags {
        self.stream.flags()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{SharedMemory, Sound};
    use crate::source::sound::SoundSource;

    #[test]
    fn facade_forwards_stream_semantics() {
        let fmt = Format::mono_s16(48_000);
        let pcm: Vec<u8> = (0..200i16).flat_map(|v| v.to_ne_bytes()).collect();
        let sound = Arc::new(Sound::new(SharedMemory::new(pcm), fmt).unwrap());
        let inner = Arc::new(SoundSource::new(sound));

        let mgr = StreamManager::new();
        let src = StreamSource::new(&mgr, inner, 64).unwrap();
        assert!(src.flags().contains(AccessFlags::SEEKABLE));
        assert!(!src.ready(1));

        mgr.buffer();
        assert!(src.ready(32));

        let mut buf = vec![0u8; 32 * 2];
        assert_eq!(src.read(&mut buf, 32, None).unwrap(), 32);
        assert_eq!(src.tell().unwrap().current, 32);
        assert_eq!(src.tell().unwrap().total, Some(200));

        src.seek(100).unwrap();
        assert_eq!(src.tell().unwrap().current, 100);
        mgr.buffer();
        src.read(&mut buf, 4, None).unwrap();
        assert_eq!(i16::from_ne_bytes([buf[0], buf[1]]), 100);
    }
}
