//! WAV container decoder over a data source.
//!
//! Walks the RIFF chunk list once at construction: validates the `RIFF` and
//! `WAVE` magics, decodes the `fmt ` subchunk, skips unknown chunks, and
//! records the `data` subchunk's offset and size. Reads then stream raw PCM
//! straight out of the data source.

use std::sync::Arc;

use nom::bytes::complete::tag;
use nom::number::complete::{le_u16, le_u32};
use nom::IResult;
use parking_lot::Mutex;

use crate::data_source::{AccessFlags, DataSource, SeekOrigin};
use crate::format::{Format, SampleFormat};
use crate::sample_source::{OnSeek, SampleSource, TellInfo};
use crate::{AudioError, Result};

const PCM_TAG: u16 = 1;
const IEEE_FLOAT_TAG: u16 = 3;

#[derive(Debug, Clone, Copy)]
struct WavHeader {
    fmt_tag: u16,
    channels: u16,
    sample_rate: u32,
    bits_per_sample: u16,
    data_offset: u64,
    data_size: u64,
}

fn parse_riff_prelude(input: &[u8]) -> IResult<&[u8], u32> {
    let (input, _) = tag(&b"RIFF"[..])(input)?;
    let (input, file_size) = le_u32(input)?;
    let (input, _) = tag(&b"WAVE"[..])(input)?;
    Ok((input, file_size))
}

fn parse_chunk_header(input: &[u8]) -> IResult<&[u8], ([u8; 4], u32)> {
    let (input, id) = nom::bytes::complete::take(4usize)(input)?;
    let (input, size) = le_u32(input)?;
    Ok((input, ([id[0], id[1], id[2], id[3]], size)))
}

struct FmtChunk {
    fmt_tag: u16,
    channels: u16,
    sample_rate: u32,
    bits_per_sample: u16,
}

fn parse_fmt_chunk(input: &[u8]) -> IResult<&[u8], FmtChunk> {
    let (input, fmt_tag) = le_u16(input)?;
    let (input, channels) = le_u16(input)?;
    let (input, sample_rate) = le_u32(input)?;
    let (input, _bytes_per_sec) = le_u32(input)?;
    let (input, _block_align) = le_u16(input)?;
    let (input, bits_per_sample) = le_u16(input)?;
    Ok((
        input,
        FmtChunk {
            fmt_tag,
            channels,
            sample_rate,
            bits_per_sample,
        },
    ))
}

fn malformed(what: &str) -> AudioError {
    AudioError::Format(format!("WAV: {what}"))
}

fn read_exact(src: &dyn DataSource, buf: &mut [u8]) -> Result<()> {
    if src.read(buf)? != buf.len() {
        return Err(malformed("truncated header"));
    }
    Ok(())
}

/// Skips `count` bytes, seeking when possible and reading otherwise.
fn advance(src: &dyn DataSource, mut count: u64) -> Result<()> {
    if src.flags().contains(AccessFlags::SEEKABLE) {
        return src.seek(count as i64, SeekOrigin::Current);
    }
    let mut scratch = [0u8; 256];
    while count > 0 {
        let step = (count as usize).min(scratch.len());
        let n = src.read(&mut scratch[..step])?;
        if n == 0 {
            return Err(malformed("truncated chunk"));
        }
        count -= n as u64;
    }
    Ok(())
}

fn load_header(src: &dyn DataSource) -> Result<WavHeader> {
    let mut prelude = [0u8; 12];
    read_exact(src, &mut prelude)?;
    parse_riff_prelude(&prelude).map_err(|_| malformed("missing RIFF/WAVE magic"))?;
    let mut offset = 12u64;

    let mut fmt: Option<FmtChunk> = None;
    let mut data: Option<(u64, u64)> = None;
    while fmt.is_none() || data.is_none() {
        let mut header = [0u8; 8];
        read_exact(src, &mut header)?;
        let (_, (id, chunk_size)) =
            parse_chunk_header(&header).map_err(|_| malformed("bad chunk header"))?;
        offset += 8;

        match &id {
            b"fmt " if fmt.is_none() => {
                if chunk_size < 16 {
                    return Err(malformed("fmt chunk too small"));
                }
                let mut body = [0u8; 16];
                read_exact(src, &mut body)?;
                let (_, parsed) =
                    parse_fmt_chunk(&body).map_err(|_| malformed("bad fmt chunk"))?;
                fmt = Some(parsed);
                advance(src, chunk_size as u64 - 16)?;
            }
            b"data" if data.is_none() => {
                data = Some((offset, chunk_size as u64));
                // Reads start here; no need to advance past the payload.
            }
            _ => advance(src, chunk_size as u64)?,
        }
        offset += chunk_size as u64;
    }

    let fmt = fmt.ok_or(AudioError::Internal)?;
    let (data_offset, data_size) = data.ok_or(AudioError::Internal)?;
    if fmt.channels == 0 || fmt.channels > 2 {
        return Err(malformed("unsupported channel count"));
    }
    match (fmt.fmt_tag, fmt.bits_per_sample) {
        (PCM_TAG, 8) | (PCM_TAG, 16) | (PCM_TAG, 32) | (IEEE_FLOAT_TAG, 32) => {}
        _ => return Err(malformed("unsupported sample encoding")),
    }

    Ok(WavHeader {
        fmt_tag: fmt.fmt_tag,
        channels: fmt.channels,
        sample_rate: fmt.sample_rate,
        bits_per_sample: fmt.bits_per_sample,
        data_offset,
        data_size: data_size - data_size % (fmt.channels as u64 * fmt.bits_per_sample as u64 / 8),
    })
}

/// Sample source decoding PCM frames out of a WAV container.
///
/// Seek capability propagates from the underlying data source. The cursor is
/// locked internally, so the source is threadsafe and may feed a buffered
/// stream.
pub struct WavSource {
    data: Arc<dyn DataSource>,
    header: WavHeader,
    format: Format,
    frame_size: usize,
    total_frames: u64,
    pos: Mutex<u64>,
    flags: AccessFlags,
}

impl WavSource {
    /// Validates the container header and positions the source at frame 0.
    ///
    /// The data source must be positioned at the start of the container.
    pub fn new(data: Arc<dyn DataSource>) -> Result<Self> {
        let header = load_header(data.as_ref())?;
        let sample_format = match (header.fmt_tag, header.bits_per_sample) {
            (PCM_TAG, 8) => SampleFormat::U8,
            (PCM_TAG, 16) => SampleFormat::S16,
            (PCM_TAG, 32) => SampleFormat::S32,
            (IEEE_FLOAT_TAG, 32) => SampleFormat::F32,
            _ => return Err(malformed("unsupported sample encoding")),
        };
        let format = Format::new(sample_format, header.channels as u32, header.sample_rate)?;
        let frame_size = format.frame_size();
        let flags = AccessFlags::THREADSAFE | (data.flags() & AccessFlags::SEEKABLE);
        Ok(WavSource {
            header,
            format,
            frame_size,
            total_frames: header.data_size / frame_size as u64,
            pos: Mutex::new(0),
            flags,
            data,
        })
    }
}

impl SampleSource for WavSource {
    fn format(&self) -> Format {
        self.format
    }

    fn read(&self, dst: &mut [u8], num_frames: usize, _on_seek: Option<&OnSeek<'_>>) -> Result<usize> {
        let mut pos = self.pos.lock();
        let frames = num_frames.min((self.total_frames - *pos) as usize);
        let bytes_read = self.data.read(&mut dst[..frames * self.frame_size])?;
        let frames_read = bytes_read / self.frame_size;
        *pos += frames_read as u64;
        Ok(frames_read)
    }

    fn end(&self) -> bool {
        *self.pos.lock() >= self.total_frames
    }

    fn seek(&self, frame: u64) -> Result<()> {
        if !self.flags.contains(AccessFlags::SEEKABLE) {
            return Err(AudioError::Unsupported);
        }
        if frame > self.total_frames {
            return Err(AudioError::InvalidParameter);
        }
        let mut pos = self.pos.lock();
        self.data.seek(
            (self.header.data_offset + frame * self.frame_size as u64) as i64,
            SeekOrigin::Set,
        )?;
        *pos = frame;
        Ok(())
    }

    fn tell(&self) -> Result<TellInfo> {
        Ok(TellInfo {
            current: *self.pos.lock(),
            total: Some(self.total_frames),
        })
    }

    fn flags(&self) -> AccessFlags {
        self.flags
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_source::MemoryDataSource;
    use crate::memory::SharedMemory;

    /// Builds a minimal WAV container: RIFF prelude, fmt chunk, an ignorable
    /// chunk, then the data chunk.
    fn wav_bytes(channels: u16, sample_rate: u32, bits: u16, pcm: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(b"RIFF");
        let riff_size = 4 + 24 + 12 + 8 + pcm.len() as u32;
        out.extend_from_slice(&riff_size.to_le_bytes());
        out.extend_from_slice(b"WAVE");

        out.extend_from_slice(b"fmt ");
        out.extend_from_slice(&16u32.to_le_bytes());
        out.extend_from_slice(&PCM_TAG.to_le_bytes());
        out.extend_from_slice(&channels.to_le_bytes());
        out.extend_from_slice(&sample_rate.to_le_bytes());
        let bytes_per_sec = sample_rate * channels as u32 * bits as u32 / 8;
        out.extend_from_slice(&bytes_per_sec.to_le_bytes());
        out.extend_from_slice(&(channels * bits / 8).to_le_bytes());
        out.extend_from_slice(&bits.to_le_bytes());

        // Chunk the reader should skip.
        out.extend_from_slice(b"LIST");
        out.extend_from_slice(&4u32.to_le_bytes());
        out.extend_from_slice(b"info");

        out.extend_from_slice(b"data");
        out.extend_from_slice(&(pcm.len() as u32).to_le_bytes());
        out.extend_from_slice(pcm);
        out
    }

    fn source_over(bytes: Vec<u8>) -> Arc<dyn DataSource> {
        Arc::new(MemoryDataSource::new(Arc::new(SharedMemory::new(bytes))))
    }

    #[test]
    fn decodes_header_and_pcm() {
        let pcm: Vec<u8> = (0..100i16).flat_map(|v| v.to_le_bytes()).collect();
        let wav = WavSource::new(source_over(wav_bytes(1, 44_100, 16, &pcm))).unwrap();

        assert_eq!(wav.format().sample_format, SampleFormat::S16);
        assert_eq!(wav.format().channels, 1);
        assert_eq!(wav.format().frame_rate, 44_100);
        assert_eq!(wav.tell().unwrap().total, Some(100));

        let mut buf = vec![0u8; 10 * 2];
        assert_eq!(wav.read(&mut buf, 10, None).unwrap(), 10);
        assert_eq!(i16::from_le_bytes([buf[0], buf[1]]), 0);
        assert_eq!(i16::from_le_bytes([buf[18], buf[19]]), 9);
    }

    #[test]
    fn seek_lands_on_frames() {
        let pcm: Vec<u8> = (0..200i16).flat_map(|v| v.to_le_bytes()).collect();
        let wav = WavSource::new(source_over(wav_bytes(1, 48_000, 16, &pcm))).unwrap();

        wav.seek(150).unwrap();
        assert_eq!(wav.tell().unwrap().current, 150);
        let mut buf = [0u8; 2];
        wav.read(&mut buf, 1, None).unwrap();
        assert_eq!(i16::from_le_bytes(buf), 150);
    }

    #[test]
    fn seek_to_total_is_end() {
        let pcm = vec![0u8; 50 * 2];
        let wav = WavSource::new(source_over(wav_bytes(1, 48_000, 16, &pcm))).unwrap();
        wav.seek(50).unwrap();
        assert!(wav.end());
        let mut buf = [0u8; 2];
        assert_eq!(wav.read(&mut buf, 1, None).unwrap(), 0);
    }

    #[test]
    fn rejects_bad_magic() {
        let mut bytes = wav_bytes(1, 48_000, 16, &[0u8; 4]);
        bytes[0] = b'X';
        let err = match WavSource::new(source_over(bytes)) {
            Err(e) => e,
            Ok(_) => panic!("expected WavSource::new to fail"),
        };
        assert_eq!(err.category(), crate::ErrorCategory::Format);
    }

    #[test]
    fn rejects_non_pcm_tag() {
        let mut bytes = wav_bytes(2, 48_000, 16, &[0u8; 8]);
        // Overwrite the fmt tag with an unknown codec id.
        let fmt_tag_at = 20;
        bytes[fmt_tag_at..fmt_tag_at + 2].copy_from_slice(&0x55u16.to_le_bytes());
        assert!(WavSource::new(source_over(bytes)).is_err());
    }

    #[test]
    fn stereo_frames_count_correctly() {
        let pcm = vec![0u8; 400]; // 100 stereo s16 frames
        let wav = WavSource::new(source_over(wav_bytes(2, 44_100, 16, &pcm))).unwrap();
        assert_eq!(wav.tell().unwrap().total, Some(100));
        assert_eq!(wav.format().frame_size(), 4);
    }
}
