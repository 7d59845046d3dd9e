//! Byte source abstraction feeding container decoders.
//!
//! A [`DataSource`] is a shared, possibly seekable byte stream. Decoders hold
//! them through `Arc<dyn DataSource>`; implementations declaring
//! [`AccessFlags::THREADSAFE`] lock internally so a background stream filler
//! and an application thread may touch the same source.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::memory::SharedMemory;
use crate::{AudioError, Result};

bitflags::bitflags! {
    /// Capability flags shared by data and sample sources.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct AccessFlags: u32 {
        /// The source supports seeking (files yes, network streams no)
        const SEEKABLE = 0x1;
        /// The source allows concurrent access, locking internally
        const THREADSAFE = 0x2;
    }
}

/// Reference point for [`DataSource::seek`] offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekOrigin {
    /// From the start of the stream
    Set,
    /// Relative to the current position
    Current,
    /// Relative to the end of the stream (offsets are usually negative)
    End,
}

/// A polymorphic byte stream.
///
/// Short reads are allowed at end of stream; `read` returning 0 with
/// [`DataSource::eof`] true is the end marker. Seeking is permitted only when
/// [`AccessFlags::SEEKABLE`] is set.
pub trait DataSource: Send + Sync {
    /// Reads up to `dst.len()` bytes, returning the number actually read.
    fn read(&self, dst: &mut [u8]) -> Result<usize>;

    /// Repositions the stream. Default: unsupported.
    fn seek(&self, _offset: i64, _origin: SeekOrigin) -> Result<()> {
        Err(AudioError::Unsupported)
    }

    /// Current byte position.
    fn tell(&self) -> u64;

    /// Whether the stream has reached its end.
    fn eof(&self) -> bool;

    /// Capability flags of this source.
    fn flags(&self) -> AccessFlags;
}

/// File-backed data source.
///
/// Seekable and threadsafe; the underlying file handle is serialized by an
/// internal mutex.
pub struct FileDataSource {
    file: Mutex<File>,
    at_eof: AtomicBool,
}

impl FileDataSource {
    /// Opens `path` for reading.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(FileDataSource {
            file: Mutex::new(File::open(path)?),
            at_eof: AtomicBool::new(false),
        })
    }
}

impl DataSource for FileDataSource {
    fn read(&self, dst: &mut [u8]) -> Result<usize> {
        let mut file = self.file.lock();
        let mut total = 0;
        while total < dst.len() {
            let n = file.read(&mut dst[total..])?;
            if n == 0 {
                self.at_eof.store(true, Ordering::Relaxed);
                break;
            }
            total += n;
        }
        Ok(total)
    }

    fn seek(&self, offset: i64, origin: SeekOrigin) -> Result<()> {
        let pos = match origin {
            SeekOrigin::Set => SeekFrom::Start(offset.max(0) as u64),
            SeekOrigin::Current => SeekFrom::Current(offset),
            SeekOrigin::End => SeekFrom::End(offset),
        };
        self.file.lock().seek(pos)?;
        self.at_eof.store(false, Ordering::Relaxed);
        Ok(())
    }

    fn tell(&self) -> u64 {
        self.file
            .lock()
            .stream_position()
            .unwrap_or_default()
    }

    fn eof(&self) -> bool {
        self.at_eof.load(Ordering::Relaxed)
    }

    fn flags(&self) -> AccessFlags {
        AccessFlags::SEEKABLE | AccessFlags::THREADSAFE
    }
}

/// Data source over a shared in-memory blob, with its own cursor.
pub struct MemoryDataSource {
    memory: Arc<SharedMemory>,
    pos: Mutex<usize>,
}

impl MemoryDataSource {
    /// Creates a cursor over `memory` starting at offset 0.
    pub fn new(memory: Arc<SharedMemory>) -> Self {
        MemoryDataSource {
            memory,
            pos: Mutex::new(0),
        }
    }
}

impl DataSource for MemoryDataSource {
    fn read(&self, dst: &mut [u8]) -> Result<usize> {
        let mut pos = self.pos.lock();
        let data = self.memory.data();
        let n = dst.len().min(data.len() - *pos);
        dst[..n].copy_from_slice(&data[*pos..*pos + n]);
        *pos += n;
        Ok(n)
    }

    fn seek(&self, offset: i64, origin: SeekOrigin) -> Result<()> {
        let len = self.memory.len() as i64;
        let mut pos = self.pos.lock();
        let target = match origin {
            SeekOrigin::Set => offset,
            SeekOrigin::Current => *pos as i64 + offset,
            SeekOrigin::End => len + offset,
        };
        if !(0..=len).contains(&target) {
            return Err(AudioError::InvalidParameter);
        }
        *pos = target as usize;
        Ok(())
    }

    fn tell(&self) -> u64 {
        *self.pos.lock() as u64
    }

    fn eof(&self) -> bool {
        *self.pos.lock() >= self.memory.len()
    }

    fn flags(&self) -> AccessFlags {
        AccessFlags::SEEKABLE | AccessFlags::THREADSAFE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn memory_source(data: &[u8]) -> MemoryDataSource {
        MemoryDataSource::new(Arc::new(SharedMemory::new(data.to_vec())))
    }

    #[test]
    fn memory_read_and_tell() {
        let src = memory_source(&[10, 20, 30, 40, 50]);
        let mut buf = [0u8; 2];
        assert_eq!(src.read(&mut buf).unwrap(), 2);
        assert_eq!(buf, [10, 20]);
        assert_eq!(src.tell(), 2);
        assert!(!src.eof());
    }

    #[test]
    fn memory_short_read_at_eof() {
        let src = memory_source(&[1, 2, 3]);
        let mut buf = [0u8; 8];
        assert_eq!(src.read(&mut buf).unwrap(), 3);
        assert!(src.eof());
        assert_eq!(src.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn memory_seek_origins() {
        let src = memory_source(&[0, 1, 2, 3, 4, 5, 6, 7]);
        src.seek(6, SeekOrigin::Set).unwrap();
        assert_eq!(src.tell(), 6);
        src.seek(-4, SeekOrigin::Current).unwrap();
        assert_eq!(src.tell(), 2);
        src.seek(-1, SeekOrigin::End).unwrap();
        assert_eq!(src.tell(), 7);
    }

    #[test]
    fn memory_seek_out_of_bounds_fails() {
        let src = memory_source(&[1, 2, 3]);
        assert!(src.seek(4, SeekOrigin::Set).is_err());
        assert!(src.seek(-1, SeekOrigin::Set).is_err());
        assert_eq!(src.tell(), 0);
    }

    #[test]
    fn file_source_reads_and_seeks() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(&[9, 8, 7, 6, 5]).unwrap();
        tmp.flush().unwrap();

        let src = FileDataSource::open(tmp.path()).unwrap();
        assert!(src.flags().contains(AccessFlags::SEEKABLE));

        let mut buf = [0u8; 3];
        assert_eq!(src.read(&mut buf).unwrap(), 3);
        assert_eq!(buf, [9, 8, 7]);
        assert_eq!(src.tell(), 3);

        src.seek(0, SeekOrigin::Set).unwrap();
        assert_eq!(src.tell(), 0);

        let mut rest = [0u8; 16];
        assert_eq!(src.read(&mut rest).unwrap(), 5);
        assert!(src.eof());
    }
}
