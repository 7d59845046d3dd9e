//! Device that discards everything; for tests and headless runs.

use crate::device::Device;
use crate::format::Format;
use crate::Result;

/// Accepts and discards every queued buffer, always reporting one free slot.
pub struct DummyDevice {
    format: Format,
    num_buffers: u32,
    num_frames: u32,
    queued: u64,
}

impl DummyDevice {
    /// Creates a dummy sink with the given geometry.
    pub fn new(format: Format, num_buffers: u32, num_frames: u32) -> Self {
        DummyDevice {
            format,
            num_buffers,
            num_frames,
            queued: 0,
        }
    }

    /// Total buffers queued so far.
    pub fn buffers_queued(&self) -> u64 {
        self.queued
    }
}

impl Device for DummyDevice {
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
        1
    }

    fn queue(&mut self, _buffer: &[u8]) -> Result<()> {
        self.queued += 1;
        Ok(())
    }
}
