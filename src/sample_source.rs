//! PCM frame producer abstraction.
//!
//! A [`SampleSource`] yields interleaved PCM frames in a fixed [`Format`].
//! Implementations range from container decoders over a
//! [`DataSource`](crate::DataSource), to resident-PCM sounds, loop wrappers,
//! and background-buffered streams.

use crate::data_source::AccessFlags;
use crate::format::Format;
use crate::{AudioError, Result};

/// Callback invoked when a read seeks the source internally.
///
/// Arguments are `(frames_emitted_so_far_in_this_read, position_delta)`.
/// This is how seeks deep inside a pipeline (a loop wrapper jumping back, for
/// instance) are reported upward so that downstream `tell` values stay
/// consistent with what was actually emitted.
pub type OnSeek<'a> = dyn Fn(u64, i64) + 'a;

/// Position report from [`SampleSource::tell`], in frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TellInfo {
    /// Current frame position
    pub current: u64,
    /// Total frame count, when the source knows it
    pub total: Option<u64>,
}

/// A polymorphic producer of interleaved PCM frames.
pub trait SampleSource: Send + Sync {
    /// The fixed format of the frames this source produces.
    fn format(&self) -> Format;

    /// Reads up to `num_frames` frames into `dst`, returning the number of
    /// frames written. `dst` must hold `num_frames * frame_size` bytes.
    /// Short reads are allowed at end of stream.
    fn read(&self, dst: &mut [u8], num_frames: usize, on_seek: Option<&OnSeek<'_>>) -> Result<usize>;

    /// Whether the source has no more frames to produce.
    fn end(&self) -> bool;

    /// Whether a read of `num_frames` can be satisfied without blocking or
    /// under-running. Defaults to `true` for sources that never block.
    fn ready(&self, _num_frames: usize) -> bool {
        true
    }

    /// Repositions the source to `frame`. Default: unsupported.
    fn seek(&self, _frame: u64) -> Result<()> {
        Err(AudioError::Unsupported)
    }

    /// Reports the current position and total length. Default: unsupported.
    fn tell(&self) -> Result<TellInfo> {
        Err(AudioError::Unsupported)
    }

    /// Capability flags of this source.
    fn flags(&self) -> AccessFlags;
}
