//! Realtime polyphonic audio mixer
//!
//! `polymix` composes decoded PCM audio from many logical sources into one
//! interleaved buffer that is continuously presented to an audio sink, while
//! staying responsive to dynamic control (gain, pan, pitch, seek, pause,
//! stop). It is aimed at game engines and interactive clients that need many
//! concurrent, independently-controlled voices with bounded latency and
//! predictable memory behavior.
//!
//! # Features
//! - Byte and PCM-frame source abstractions with pluggable implementations
//! - Background-buffered streams decoupling decoding from mixing
//! - Per-voice and per-group gain/pan/pitch with last-writer-wins arbitration
//! - Linear resampling between source and mixer frame rates
//! - Lock-free single-producer/single-consumer ring buffering
//! - WAV container decoding and a WAV file sink
//!
//! # Crate feature flags
//! - `streaming` (opt-in): Real-time audio output (enables optional `rodio` dep)
//!
//! # Quick start
//! ```no_run
//! use polymix::{DummyDevice, Format, Manager, ManagerConfig, Sound};
//! use std::sync::Arc;
//!
//! let device = DummyDevice::new(Format::stereo_s16(48_000), 4, 512);
//! let mut manager = Manager::new(Box::new(device), ManagerConfig::default()).unwrap();
//! let sound = Arc::new(Sound::from_wav_file("bang.wav").unwrap());
//! let handle = manager.handle_from_sound(&sound).unwrap();
//! handle.play().unwrap();
//! loop {
//!     manager.update().unwrap();
//!     std::thread::sleep(std::time::Duration::from_millis(5));
//! }
//! ```

#![warn(missing_docs)]

pub mod data_source;
pub mod device;
pub mod format;
pub mod manager;
pub mod memory;
pub mod mixer;
pub mod resample;
pub mod ring_buffer;
pub mod sample_source;
pub mod source;
pub mod stream;

/// Error type for mixer and source operations.
///
/// Variants group into coarse categories (see [`AudioError::category`]) so
/// callers that do not care about the precise failure can classify with a
/// single comparison.
#[derive(Debug, thiserror::Error)]
pub enum AudioError {
    /// Unspecified error
    #[error("unspecified error")]
    Generic,

    /// The library reached an inconsistent internal state
    #[error("internal inconsistency")]
    Internal,

    /// A parameter was out of range or otherwise invalid
    #[error("invalid parameter")]
    InvalidParameter,

    /// The operation is not supported on this object (e.g. seeking an
    /// unseekable source)
    #[error("operation not supported on this object")]
    Unsupported,

    /// IO error from the filesystem or a device
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An allocation or capacity limit was exceeded
    #[error("allocation failed or capacity exceeded: {0}")]
    Memory(String),

    /// Error reported by an audio backend library
    #[error("audio backend error: {0}")]
    Backend(String),

    /// A buffer under- or overrun in the output path
    #[error("buffer under/overrun")]
    Underrun,

    /// Malformed container or sample data
    #[error("malformed data: {0}")]
    Format(String),
}

/// Coarse error classification, ordered by severity of API misuse.
///
/// The ordering mirrors the error taxonomy: `Generic < Format < System <
/// Misuse`, so `err.category() >= ErrorCategory::System` asks "was this the
/// environment's fault or mine?".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorCategory {
    /// Unclassified failures
    Generic,
    /// Malformed external data
    Format,
    /// Failures caused by the OS, allocator, or backend libraries
    System,
    /// API misuse by the caller
    Misuse,
}

impl AudioError {
    /// Returns the coarse category this error belongs to.
    pub fn category(&self) -> ErrorCategory {
        match self {
            AudioError::Generic | AudioError::Internal => ErrorCategory::Generic,
            AudioError::Format(_) => ErrorCategory::Format,
            AudioError::Io(_)
            | AudioError::Memory(_)
            | AudioError::Backend(_)
            | AudioError::Underrun => ErrorCategory::System,
            AudioError::InvalidParameter | AudioError::Unsupported => ErrorCategory::Misuse,
        }
    }
}

/// Result type for mixer and source operations
pub type Result<T> = std::result::Result<T, AudioError>;

// Public API exports
pub use data_source::{AccessFlags, DataSource, FileDataSource, MemoryDataSource, SeekOrigin};
pub use device::{Device, DummyDevice, WavFileDevice};
#[cfg(feature = "streaming")]
pub use device::RodioDevice;
pub use format::{Format, SampleFormat};
pub use manager::{Manager, ManagerConfig, ThreadPolicy};
pub use memory::{SharedMemory, Sound};
pub use mixer::{Handle, HandleGroup, HandleParam, HandleState, Mixer};
pub use resample::Resampler;
pub use ring_buffer::{ring_buffer, RingConsumer, RingProducer};
pub use sample_source::{OnSeek, SampleSource, TellInfo};
pub use source::looped::LoopSource;
pub use source::sound::SoundSource;
pub use source::stream::StreamSource;
pub use source::wav::WavSource;
pub use source::wave::SineSource;
pub use stream::{BufferedStream, StreamManager};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_categories_order() {
        assert!(ErrorCategory::Misuse > ErrorCategory::System);
        assert!(ErrorCategory::System > ErrorCategory::Format);
        assert!(ErrorCategory::Format > ErrorCategory::Generic);
    }

    #[test]
    fn error_classification() {
        assert_eq!(
            AudioError::InvalidParameter.category(),
            ErrorCategory::Misuse
        );
        assert_eq!(AudioError::Unsupported.category(), ErrorCategory::Misuse);
        assert_eq!(AudioError::Underrun.category(), ErrorCategory::System);
        assert_eq!(
            AudioError::Format("truncated header".into()).category(),
            ErrorCategory::Format
        );
        assert!(AudioError::Generic.category() < ErrorCategory::Format);
    }
}
