//! Shared immutable blobs: raw bytes and resident PCM sounds.

use std::path::Path;

use crate::data_source::{AccessFlags, DataSource, FileDataSource, SeekOrigin};
use crate::format::Format;
use crate::sample_source::SampleSource;
use crate::source::wav::WavSource;
use crate::{AudioError, Result};

/// Chunk size for slurping unseekable data sources.
const SLURP_CHUNK: usize = 4096;

/// An owned, contiguous byte blob, immutable after construction.
///
/// Shared between clients via `Arc<SharedMemory>`.
#[derive(Debug)]
pub struct SharedMemory {
    data: Box<[u8]>,
}

impl SharedMemory {
    /// Takes ownership of `data` as an immutable blob.
    pub fn new(data: impl Into<Box<[u8]>>) -> Self {
        SharedMemory { data: data.into() }
    }

    /// Reads the remainder of a data source into a blob.
    ///
    /// Seekable sources are sized up front via seek-to-end; unseekable ones
    /// are read in chunks until exhausted.
    pub fn from_data_source(src: &dyn DataSource) -> Result<Self> {
        if src.flags().contains(AccessFlags::SEEKABLE) {
            let start = src.tell();
            src.seek(0, SeekOrigin::End)?;
            let end = src.tell();
            if start > end {
                return Err(AudioError::Internal);
            }
            src.seek(start as i64, SeekOrigin::Set)?;
            let len = (end - start) as usize;
            let mut data = vec![0u8; len];
            let mut filled = 0;
            while filled < len {
                let n = src.read(&mut data[filled..])?;
                if n == 0 {
                    return Err(AudioError::Io(std::io::Error::new(
                        std::io::ErrorKind::UnexpectedEof,
                        "data source ended before its reported length",
                    )));
                }
                filled += n;
            }
            Ok(SharedMemory::new(data))
        } else {
            let mut data = Vec::new();
            loop {
                let old_len = data.len();
                data.resize(old_len + SLURP_CHUNK, 0);
                let n = src.read(&mut data[old_len..])?;
                data.truncate(old_len + n);
                if n < SLURP_CHUNK {
                    break;
                }
            }
            Ok(SharedMemory::new(data))
        }
    }

    /// Reads a whole file into a blob.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(SharedMemory::new(std::fs::read(path)?))
    }

    /// The blob's bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Size in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the blob is empty.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// A resident PCM blob with its format; playback's cheapest source material.
#[derive(Debug)]
pub struct Sound {
    memory: SharedMemory,
    format: Format,
    num_frames: u64,
}

impl Sound {
    /// Wraps a PCM blob. The blob length must be a whole number of frames.
    pub fn new(memory: SharedMemory, format: Format) -> Result<Self> {
        let frame_size = format.frame_size();
        if memory.len() % frame_size != 0 {
            return Err(AudioError::InvalidParameter);
        }
        let num_frames = (memory.len() / frame_size) as u64;
        Ok(Sound {
            memory,
            format,
            num_frames,
        })
    }

    /// Renders a sample source to completion into a resident blob.
    ///
    /// When the source reports its total length the blob is sized exactly;
    /// otherwise it grows by two seconds of frames at a time until the source
    /// ends. Endless sources are the caller's problem.
    pub fn from_sample_source(src: &dyn SampleSource) -> Result<Self> {
        let format = src.format();
        let frame_size = format.frame_size();

        let total = src.tell().ok().and_then(|t| t.total);
        let mut data;
        match total {
            Some(total_frames) => {
                data = vec![0u8; total_frames as usize * frame_size];
                let mut filled_frames = 0usize;
                while filled_frames < total_frames as usize {
                    let n = src.read(
                        &mut data[filled_frames * frame_size..],
                        total_frames as usize - filled_frames,
                        None,
                    )?;
                    if n == 0 {
                        break;
                    }
                    filled_frames += n;
                }
                data.truncate(filled_frames * frame_size);
            }
            None => {
                let chunk_frames = format.frame_rate as usize * 2;
                data = Vec::new();
                while !src.end() {
                    let old_len = data.len();
                    data.resize(old_len + chunk_frames * frame_size, 0);
                    let n = src.read(&mut data[old_len..], chunk_frames, None)?;
                    data.truncate(old_len + n * frame_size);
                    if n == 0 && !src.end() {
                        break;
                    }
                }
            }
        }

        Sound::new(SharedMemory::new(data), format)
    }

    /// Loads a WAV file into a resident sound.
    pub fn from_wav_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = std::sync::Arc::new(FileDataSource::open(path)?);
        let decoder = WavSource::new(data)?;
        Sound::from_sample_source(&decoder)
    }

    /// The raw interleaved PCM bytes.
    pub fn data(&self) -> &[u8] {
        self.memory.data()
    }

    /// Size in bytes.
    pub fn size(&self) -> usize {
        self.memory.len()
    }

    /// Number of whole frames in the blob.
    pub fn num_frames(&self) -> u64 {
        self.num_frames
    }

    /// The blob's PCM format.
    pub fn format(&self) -> Format {
        self.format
    }
}
