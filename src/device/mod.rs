//! Audio sink back-ends.
//!
//! A [`Device`] presents mixed buffers to some output: the OS audio stack,
//! a file, or nothing at all. The mixer never talks to a device directly;
//! the [`Manager`](crate::Manager) polls `check` for free presentation
//! buffers and `queue`s one mixed window per free slot.

mod dummy;
#[cfg(feature = "streaming")]
mod rodio;
mod wav;

pub use dummy::DummyDevice;
#[cfg(feature = "streaming")]
pub use self::rodio::RodioDevice;
pub use wav::WavFileDevice;

use crate::format::Format;
use crate::Result;

/// A pluggable audio sink.
///
/// Construction stands in for `open`; `close` flushes and releases whatever
/// the backend holds and is also invoked from `Drop`.
pub trait Device: Send {
    /// The format buffers must be queued in.
    fn format(&self) -> Format;

    /// Number of presentation buffers the device cycles through.
    fn num_buffers(&self) -> u32;

    /// Frames per presentation buffer.
    fn num_frames(&self) -> u32;

    /// Number of presentation buffers currently free for queueing.
    fn check(&mut self) -> u32;

    /// Presents one buffer of `num_frames` frames in the device format.
    fn queue(&mut self, buffer: &[u8]) -> Result<()>;

    /// Flushes and shuts the sink down.
    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}
