//! Top-level manager: binds a mixer and stream manager to a device.
//!
//! The manager owns the polling loop that keeps the device fed: ask the
//! device how many presentation buffers are free, mix one window per free
//! buffer, queue it. Under the single-threaded policy all of that happens
//! inline in [`Manager::update`]; under the multi-threaded policy two
//! background workers run the mix and stream-fill loops and `update` only
//! dispatches callbacks on the calling thread.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::data_source::{AccessFlags, DataSource, SeekOrigin};
use crate::device::Device;
use crate::memory::Sound;
use crate::mixer::{Handle, Mixer};
use crate::sample_source::SampleSource;
use crate::source::looped::LoopSource;
use crate::source::sound::SoundSource;
use crate::source::stream::StreamSource;
use crate::source::wav::WavSource;
use crate::stream::StreamManager;
use crate::{AudioError, Result};

/// Frames buffered per stream created by the convenience constructors.
const DEFAULT_STREAM_BUFFER_FRAMES: usize = 131_072;

/// Cadence of the background mix loop.
const MIX_INTERVAL: Duration = Duration::from_millis(5);
/// Cadence of the background stream-fill loop.
const STREAM_INTERVAL: Duration = Duration::from_millis(50);

/// How the manager schedules mixing and stream filling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ThreadPolicy {
    /// Everything runs inline in [`Manager::update`]
    #[default]
    Single,
    /// Background workers mix and fill streams; `update` only dispatches
    Multi,
}

/// Manager construction options.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ManagerConfig {
    /// Scheduling policy
    pub policy: ThreadPolicy,
}

/// Owns the mixer, the stream manager, and the device, and runs the loop
/// binding them together.
pub struct Manager {
    policy: ThreadPolicy,
    mixer: Arc<Mixer>,
    streams: Arc<StreamManager>,
    /// Present under the single-threaded policy; moved into the mix worker
    /// under the multi-threaded policy.
    device: Option<Box<dyn Device>>,
    mix_scratch: Vec<u8>,
    kill: Arc<AtomicBool>,
    mix_thread: Option<JoinHandle<()>>,
    stream_thread: Option<JoinHandle<()>>,
}

impl Manager {
    /// Builds a manager around an opened device.
    ///
    /// The device geometry must be sane: at least 2 presentation buffers and
    /// at least 128 frames per buffer.
    pub fn new(device: Box<dyn Device>, config: ManagerConfig) -> Result<Self> {
        if device.num_buffers() < 2 || device.num_frames() < 128 {
            return Err(AudioError::InvalidParameter);
        }
        let format = device.format();
        let num_frames = device.num_frames();
        let mixer = Mixer::new(format, num_frames)?;
        let streams = Arc::new(StreamManager::new());
        let window_bytes = num_frames as usize * format.frame_size();

        let mut manager = Manager {
            policy: config.policy,
            mixer,
            streams,
            device: None,
            mix_scratch: vec![0u8; window_bytes],
            kill: Arc::new(AtomicBool::new(false)),
            mix_thread: None,
            stream_thread: None,
        };

        match config.policy {
            ThreadPolicy::Single => {
                manager.device = Some(device);
            }
            ThreadPolicy::Multi => {
                manager.spawn_workers(device, window_bytes);
            }
        }
        Ok(manager)
    }

    fn spawn_workers(&mut self, mut device: Box<dyn Device>, window_bytes: usize) {
        let mixer = Arc::clone(&self.mixer);
        let kill = Arc::clone(&self.kill);
        self.mix_thread = Some(std::thread::spawn(move || {
            let mut buffer = vec![0u8; window_bytes];
            while !kill.load(Ordering::Relaxed) {
                let mut to_queue = device.check();
                while to_queue > 0 {
                    if let Err(e) = mixer.mix(&mut buffer) {
                        log::warn!("mix failed: {e}");
                        break;
                    }
                    if let Err(e) = device.queue(&buffer) {
                        log::warn!("device queue failed: {e}");
                        break;
                    }
                    to_queue -= 1;
                }
                std::thread::sleep(MIX_INTERVAL);
            }
            if let Err(e) = device.close() {
                log::warn!("device close failed: {e}");
            }
        }));

        let streams = Arc::clone(&self.streams);
        let kill = Arc::clone(&self.kill);
        self.stream_thread = Some(std::thread::spawn(move || {
            while !kill.load(Ordering::Relaxed) {
                streams.buffer();
                std::thread::sleep(STREAM_INTERVAL);
            }
        }));
    }

    /// Runs one update tick.
    ///
    /// Single-threaded policy: mixes and queues one window per free device
    /// buffer, fills streams, then dispatches. Multi-threaded policy: only
    /// dispatches; the workers do the rest.
    pub fn update(&mut self) -> Result<()> {
        if self.policy == ThreadPolicy::Single {
            let device = self.device.as_mut().ok_or(AudioError::Internal)?;
            let mut to_queue = device.check();
            while to_queue > 0 {
                self.mixer.mix(&mut self.mix_scratch)?;
                match device.queue(&self.mix_scratch) {
                    Ok(()) => {}
                    Err(AudioError::Underrun) => {
                        log::warn!("device overrun; window dropped");
                    }
                    Err(e) => return Err(e),
                }
                to_queue -= 1;
            }
            self.streams.buffer();
        }
        self.mixer.dispatch();
        Ok(())
    }

    /// The mixer voices are created against.
    pub fn mixer(&self) -> &Arc<Mixer> {
        &self.mixer
    }

    /// The stream manager feeding buffered sources.
    pub fn stream_manager(&self) -> &Arc<StreamManager> {
        &self.streams
    }

    /// Creates a voice playing a resident sound.
    pub fn handle_from_sound(&self, sound: &Arc<Sound>) -> Result<Arc<Handle>> {
        let source = Arc::new(SoundSource::new(Arc::clone(sound)));
        Ok(self.mixer.create_handle(source))
    }

    /// Creates a looping voice playing a resident sound, returning the loop
    /// control alongside the handle.
    pub fn looped_handle_from_sound(
        &self,
        sound: &Arc<Sound>,
    ) -> Result<(Arc<Handle>, Arc<LoopSource>)> {
        let source = Arc::new(SoundSource::new(Arc::clone(sound)));
        let looped = Arc::new(LoopSource::new(source)?);
        let handle = self
            .mixer
            .create_handle(Arc::clone(&looped) as Arc<dyn SampleSource>);
        Ok((handle, looped))
    }

    /// Creates a voice streaming a container through a background-buffered
    /// stream. The container type is sniffed from the data.
    pub fn buffered_handle_from_data(&self, data: Arc<dyn DataSource>) -> Result<Arc<Handle>> {
        let decoder = open_container(data)?;
        let stream = StreamSource::new(&self.streams, decoder, DEFAULT_STREAM_BUFFER_FRAMES)?;
        Ok(self.mixer.create_handle(Arc::new(stream)))
    }

    /// Creates a voice streaming a container file.
    pub fn buffered_handle_from_file<P: AsRef<std::path::Path>>(
        &self,
        path: P,
    ) -> Result<Arc<Handle>> {
        let data = Arc::new(crate::data_source::FileDataSource::open(path)?);
        self.buffered_handle_from_data(data)
    }
}

impl Drop for Manager {
    fn drop(&mut self) {
        self.kill.store(true, Ordering::Relaxed);
        if let Some(t) = self.stream_thread.take() {
            let _ = t.join();
        }
        if let Some(t) = self.mix_thread.take() {
            let _ = t.join();
        }
        if let Some(mut device) = self.device.take() {
            if let Err(e) = device.close() {
                log::warn!("device close failed: {e}");
            }
        }
    }
}

/// Opens a decoder over `data` by sniffing the container magic.
///
/// Only WAV is built in; other containers come in through sample-source
/// plug-ins.
pub fn open_container(data: Arc<dyn DataSource>) -> Result<Arc<dyn SampleSource>> {
    if !data.flags().contains(AccessFlags::SEEKABLE) {
        return Err(AudioError::Unsupported);
    }
    let mut magic = [0u8; 4];
    if data.read(&mut magic)? != 4 {
        return Err(AudioError::Format("container too short".into()));
    }
    data.seek(-4, SeekOrigin::Current)?;
    match &magic {
        b"RIFF" => Ok(Arc::new(WavSource::new(data)?)),
        _ => Err(AudioError::Format("unrecognized container".into())),
    }
}
