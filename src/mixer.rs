//! Mixing engine: per-voice handles, handle groups, and the mixer core.
//!
//! A [`Handle`] is a controllable voice wrapping a sample source. Handles
//! belong to a [`HandleGroup`]; gain, pan, and pitch live on *both* the
//! handle and its group, each value stamped from one process-wide sequence,
//! and the stamp decides which side is in effect. That makes a group-wide
//! fade one write instead of one per voice.
//!
//! The mixer accumulates every voice into signed 32-bit, ramping gain and
//! pan across each window to suppress zipper noise, then converts into the
//! output format clamped to 16-bit fullscale.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::format::{
    f32_from_s16, s16_from_s32, s16_from_u8, s32_from_s16, u8_from_s16, Format, SampleFormat,
};
use crate::resample::Resampler;
use crate::sample_source::{SampleSource, TellInfo};
use crate::{AudioError, Result};

/// Process-wide stamp sequence arbitrating handle vs group parameters.
/// Starts at 1 so the first mutation outranks the pristine zero stamps.
static STAMP_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_stamp() -> u64 {
    STAMP_SEQUENCE.fetch_add(1, Ordering::Relaxed)
}

/// Mixing parameters settable per handle or per group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleParam {
    /// Playback rate multiplier, `> 0`
    Pitch,
    /// Linear volume, `>= 0`
    Gain,
    /// Stereo position in `[-1, +1]`, `0` is center
    Pan,
}

/// Voice lifecycle. States only move forward, except `Playing` and `Stopped`
/// which alternate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum HandleState {
    /// Created, not yet started
    Initial,
    /// Feeding the mixer
    Playing,
    /// Paused; resumable
    Stopped,
    /// Source exhausted; observed by the mixer
    Finished,
    /// Marked for teardown on the dispatch pass
    Destroyed,
}

const P_PITCH: usize = 0;
const P_GAIN: usize = 1;
const P_PAN: usize = 2;

/// One side's parameter block with per-parameter stamps.
#[derive(Debug, Clone, Copy)]
struct Jukebox {
    pitch: f32,
    gain: f32,
    last_gain: f32,
    pan: f32,
    last_pan: f32,
    stamps: [u64; 3],
}

impl Jukebox {
    fn new() -> Self {
        Jukebox {
            pitch: 1.0,
            gain: 1.0,
            last_gain: 1.0,
            pan: 0.0,
            last_pan: 0.0,
            stamps: [0; 3],
        }
    }

    fn set(&mut self, param: HandleParam, value: f32) {
        match param {
            HandleParam::Pitch => self.pitch = value,
            HandleParam::Gain => self.gain = value,
            HandleParam::Pan => self.pan = value,
        }
        self.stamps[param_index(param)] = next_stamp();
    }

    fn get(&self, param: HandleParam) -> f32 {
        match param {
            HandleParam::Pitch => self.pitch,
            HandleParam::Gain => self.gain,
            HandleParam::Pan => self.pan,
        }
    }
}

fn param_index(param: HandleParam) -> usize {
    match param {
        HandleParam::Pitch => P_PITCH,
        HandleParam::Gain => P_GAIN,
        HandleParam::Pan => P_PAN,
    }
}

fn validate_param(param: HandleParam, value: f32) -> Result<()> {
    let ok = match param {
        HandleParam::Pitch => value > 0.0 && value.is_finite(),
        HandleParam::Gain => value >= 0.0 && value.is_finite(),
        HandleParam::Pan => (-1.0..=1.0).contains(&value),
    };
    if ok {
        Ok(())
    } else {
        Err(AudioError::InvalidParameter)
    }
}

/// Snapshot consumed by one mix window.
#[derive(Debug, Clone, Copy)]
struct MixParams {
    pitch: f32,
    gain: f32,
    last_gain: f32,
    pan: f32,
    last_pan: f32,
}

/// Resolves each parameter to the side with the newer stamp, snapshots it
/// along with the previous window's value, and writes the ramp origin back
/// to the winning side.
fn snapshot_both(h: &mut Jukebox, g: &mut Jukebox) -> MixParams {
    let pitch = if h.stamps[P_PITCH] > g.stamps[P_PITCH] {
        h.pitch
    } else {
        g.pitch
    };
    let gain_side: &mut Jukebox = if h.stamps[P_GAIN] > g.stamps[P_GAIN] {
        &mut *h
    } else {
        &mut *g
    };
    let (gain, last_gain) = (gain_side.gain, gain_side.last_gain);
    gain_side.last_gain = gain;

    let pan_side: &mut Jukebox = if h.stamps[P_PAN] > g.stamps[P_PAN] {
        &mut *h
    } else {
        &mut *g
    };
    let (pan, last_pan) = (pan_side.pan, pan_side.last_pan);
    pan_side.last_pan = pan;

    MixParams {
        pitch,
        gain,
        last_gain,
        pan,
        last_pan,
    }
}

fn snapshot_solo(h: &mut Jukebox) -> MixParams {
    let params = MixParams {
        pitch: h.pitch,
        gain: h.gain,
        last_gain: h.last_gain,
        pan: h.pan,
        last_pan: h.last_pan,
    };
    h.last_gain = h.gain;
    h.last_pan = h.pan;
    params
}

struct HandleInner {
    state: HandleState,
    jukebox: Jukebox,
    group: Weak<HandleGroup>,
}

/// Callback invoked once on the dispatch pass after a handle finishes.
pub type FinishCallback = Box<dyn FnOnce(&Arc<Handle>) + Send>;

/// A controllable voice attached to a mixer.
///
/// Created via [`Mixer::create_handle`]; torn down cooperatively: `destroy`
/// only marks the state, and the dispatch pass frees the voice once the mix
/// pass has let go of it, so the mix thread never holds a dangling voice.
pub struct Handle {
    source: Arc<dyn SampleSource>,
    format: Format,
    inner: Mutex<HandleInner>,
    resampler: Option<Mutex<Resampler>>,
    callback: Mutex<Option<FinishCallback>>,
    mix_linked: AtomicBool,
}

impl Handle {
    /// Starts or resumes playback. Fails once the voice has finished.
    pub fn play(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.state >= HandleState::Finished {
            return Err(AudioError::Unsupported);
        }
        inner.state = HandleState::Playing;
        Ok(())
    }

    /// Pauses playback, keeping the position. Fails once the voice has
    /// finished.
    pub fn stop(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.state >= HandleState::Finished {
            return Err(AudioError::Unsupported);
        }
        inner.state = HandleState::Stopped;
        Ok(())
    }

    /// Whether the voice is currently feeding the mixer.
    pub fn playing(&self) -> bool {
        self.inner.lock().state == HandleState::Playing
    }

    /// Whether the voice is paused.
    pub fn stopped(&self) -> bool {
        self.inner.lock().state == HandleState::Stopped
    }

    /// Whether the voice has finished (or been destroyed).
    pub fn finished(&self) -> bool {
        self.inner.lock().state >= HandleState::Finished
    }

    /// Whether the voice is marked for teardown.
    pub fn destroyed(&self) -> bool {
        self.inner.lock().state >= HandleState::Destroyed
    }

    /// Current lifecycle state.
    pub fn state(&self) -> HandleState {
        self.inner.lock().state
    }

    /// Marks the voice for teardown. Actual cleanup happens on the dispatch
    /// pass once the mix pass has unlinked it.
    pub fn destroy(&self) -> Result<()> {
        self.inner.lock().state = HandleState::Destroyed;
        Ok(())
    }

    /// Sets a voice parameter, outranking the group's value for it.
    pub fn set_param(&self, param: HandleParam, value: f32) -> Result<()> {
        validate_param(param, value)?;
        self.inner.lock().jukebox.set(param, value);
        Ok(())
    }

    /// Reads the effective value of a parameter (voice or group, whichever
    /// was written last).
    pub fn param(&self, param: HandleParam) -> f32 {
        let inner = self.inner.lock();
        match inner.group.upgrade() {
            Some(group) => {
                let gjb = group.jukebox.lock();
                let idx = param_index(param);
                if inner.jukebox.stamps[idx] > gjb.stamps[idx] {
                    inner.jukebox.get(param)
                } else {
                    gjb.get(param)
                }
            }
            None => inner.jukebox.get(param),
        }
    }

    /// Seeks the underlying source to `frame`.
    pub fn seek(&self, frame: u64) -> Result<()> {
        self.source.seek(frame)
    }

    /// Reports the source's position and total, in frames.
    pub fn tell(&self) -> Result<TellInfo> {
        self.source.tell()
    }

    /// Whether the source can satisfy a read of `num_frames`.
    pub fn ready(&self, num_frames: usize) -> bool {
        self.source.ready(num_frames)
    }

    /// The source's PCM format.
    pub fn format(&self) -> Format {
        self.format
    }

    /// Registers a callback run once on the dispatch pass after the voice
    /// finishes. Replaces any previously registered callback.
    pub fn set_finish_callback(&self, callback: FinishCallback) {
        *self.callback.lock() = Some(callback);
    }

    fn resolved_pitch(&self) -> f32 {
        let inner = self.inner.lock();
        match inner.group.upgrade() {
            Some(group) => {
                let gjb = group.jukebox.lock();
                if inner.jukebox.stamps[P_PITCH] > gjb.stamps[P_PITCH] {
                    inner.jukebox.pitch
                } else {
                    gjb.pitch
                }
            }
            None => inner.jukebox.pitch,
        }
    }

    fn snapshot_params(&self) -> MixParams {
        let mut inner = self.inner.lock();
        match inner.group.upgrade() {
            Some(group) => {
                let mut gjb = group.jukebox.lock();
                snapshot_both(&mut inner.jukebox, &mut gjb)
            }
            None => snapshot_solo(&mut inner.jukebox),
        }
    }
}

/// A set of handles sharing group-level parameters.
///
/// Every mixer owns a default group; voices land there on creation and can
/// be migrated with [`HandleGroup::add`].
pub struct HandleGroup {
    mixer: Weak<Mixer>,
    weak_self: Weak<HandleGroup>,
    handles: Mutex<Vec<Arc<Handle>>>,
    jukebox: Mutex<Jukebox>,
}

impl HandleGroup {
    fn new(mixer: Weak<Mixer>, weak_self: Weak<HandleGroup>) -> Self {
        HandleGroup {
            mixer,
            weak_self,
            handles: Mutex::new(Vec::new()),
            jukebox: Mutex::new(Jukebox::new()),
        }
    }

    /// Sets a group parameter, outranking each member's own value for it.
    pub fn set_param(&self, param: HandleParam, value: f32) -> Result<()> {
        validate_param(param, value)?;
        self.jukebox.lock().set(param, value);
        Ok(())
    }

    /// Reads the group's own value for a parameter.
    pub fn param(&self, param: HandleParam) -> f32 {
        self.jukebox.lock().get(param)
    }

    /// Moves `handle` into this group.
    pub fn add(&self, handle: &Arc<Handle>) {
        let old = {
            let mut inner = handle.inner.lock();
            let old = inner.group.upgrade();
            if let Some(old) = &old {
                if std::ptr::eq(Arc::as_ptr(old), self) {
                    return;
                }
            }
            inner.group = self.weak_self.clone();
            old
        };
        if let Some(old) = old {
            old.handles.lock().retain(|h| !Arc::ptr_eq(h, handle));
        }
        self.handles.lock().push(Arc::clone(handle));
    }

    /// Splices every handle of this group into `target`.
    pub fn transfer(&self, target: &Arc<HandleGroup>) {
        let drained: Vec<Arc<Handle>> = std::mem::take(&mut *self.handles.lock());
        for handle in &drained {
            handle.inner.lock().group = Arc::downgrade(target);
        }
        target.handles.lock().extend(drained);
    }

    /// Moves every handle back to the mixer's default group.
    pub fn disown(&self) {
        if let Some(mixer) = self.mixer.upgrade() {
            self.transfer(&mixer.default_group);
        }
    }

    /// Destroys every handle in the group and empties it.
    pub fn destroy(&self) {
        let drained: Vec<Arc<Handle>> = std::mem::take(&mut *self.handles.lock());
        for handle in drained {
            let _ = handle.destroy();
        }
    }

    /// Number of handles currently in the group.
    pub fn len(&self) -> usize {
        self.handles.lock().len()
    }

    /// Whether the group has no handles.
    pub fn is_empty(&self) -> bool {
        self.handles.lock().is_empty()
    }
}

/// The mixing engine: composes every playing voice into one interleaved
/// output buffer per window.
pub struct Mixer {
    format: Format,
    num_frames: u32,
    default_group: Arc<HandleGroup>,
    mix_list: Mutex<Vec<Arc<Handle>>>,
    dispatch_list: Mutex<Vec<Arc<Handle>>>,
    /// S32 accumulators, `num_frames * channels`, normalized to s16 magnitude
    mix_buffer: Mutex<Vec<i32>>,
    suspended: AtomicBool,
}

impl Mixer {
    /// Creates a mixer producing `num_frames`-frame windows in `format`.
    ///
    /// The window size is fixed for the mixer's lifetime. Only stereo output
    /// is supported; mono *sources* are replicated into both channels.
    pub fn new(format: Format, num_frames: u32) -> Result<Arc<Self>> {
        if format.channels != 2 {
            return Err(AudioError::Unsupported);
        }
        if num_frames == 0 {
            return Err(AudioError::InvalidParameter);
        }
        Ok(Arc::new_cyclic(|weak: &Weak<Mixer>| Mixer {
            format,
            num_frames,
            default_group: Arc::new_cyclic(|group_weak| {
                HandleGroup::new(weak.clone(), group_weak.clone())
            }),
            mix_list: Mutex::new(Vec::new()),
            dispatch_list: Mutex::new(Vec::new()),
            mix_buffer: Mutex::new(vec![0i32; num_frames as usize * format.channels as usize]),
            suspended: AtomicBool::new(false),
        }))
    }

    /// The mixer's output format.
    pub fn format(&self) -> Format {
        self.format
    }

    /// Frames produced per mix window.
    pub fn num_frames(&self) -> u32 {
        self.num_frames
    }

    /// The group voices are created into.
    pub fn default_group(&self) -> &Arc<HandleGroup> {
        &self.default_group
    }

    /// Creates an empty group on this mixer.
    pub fn create_group(&self) -> Arc<HandleGroup> {
        let mixer = self.default_group.mixer.clone();
        Arc::new_cyclic(|group_weak| HandleGroup::new(mixer, group_weak.clone()))
    }

    /// Creates a voice over `source`, linked into the default group and the
    /// mix and dispatch lists. A resampler is attached when the source's
    /// frame rate differs from the mixer's.
    pub fn create_handle(&self, source: Arc<dyn SampleSource>) -> Arc<Handle> {
        let format = source.format();
        let resampler = if format.frame_rate != self.format.frame_rate {
            Some(Mutex::new(Resampler::new(
                self.format.frame_rate,
                format.frame_rate,
                format.channels,
            )))
        } else {
            None
        };

        let handle = Arc::new(Handle {
            source,
            format,
            inner: Mutex::new(HandleInner {
                state: HandleState::Initial,
                jukebox: Jukebox::new(),
                group: Arc::downgrade(&self.default_group),
            }),
            resampler,
            callback: Mutex::new(None),
            mix_linked: AtomicBool::new(true),
        });

        self.default_group.handles.lock().push(Arc::clone(&handle));
        self.mix_list.lock().push(Arc::clone(&handle));
        self.dispatch_list.lock().push(Arc::clone(&handle));
        handle
    }

    /// Suspends mixing: subsequent windows are pure silence and consume no
    /// source data. Fails if already suspended.
    pub fn suspend(&self) -> Result<()> {
        if self.suspended.swap(true, Ordering::AcqRel) {
            Err(AudioError::Unsupported)
        } else {
            Ok(())
        }
    }

    /// Resumes mixing. Fails if not suspended.
    pub fn unsuspend(&self) -> Result<()> {
        if self.suspended.swap(false, Ordering::AcqRel) {
            Ok(())
        } else {
            Err(AudioError::Unsupported)
        }
    }

    /// Mixes one window into `out`, which must hold exactly
    /// `num_frames * frame_size` bytes. Finished voices are unlinked from
    /// the mix list afterwards.
    pub fn mix(&self, out: &mut [u8]) -> Result<()> {
        let frame_size = self.format.frame_size();
        if out.len() != self.num_frames as usize * frame_size {
            return Err(AudioError::InvalidParameter);
        }
        out.fill(0);
        if self.suspended.load(Ordering::Acquire) {
            return Ok(());
        }

        let mut acc = self.mix_buffer.lock();
        acc.fill(0);

        let handles: Vec<Arc<Handle>> = self.mix_list.lock().clone();
        for handle in &handles {
            self.mix_handle(handle, &mut acc);
        }

        self.mix_list.lock().retain(|handle| {
            let finished = handle.inner.lock().state >= HandleState::Finished;
            if finished {
                handle.mix_linked.store(false, Ordering::Release);
            }
            !finished
        });

        self.write_out(&acc, out);
        Ok(())
    }

    /// Converts the S32 accumulator into the output format, clamped to
    /// 16-bit fullscale.
    fn write_out(&self, acc: &[i32], out: &mut [u8]) {
        match self.format.sample_format {
            SampleFormat::U8 => {
                for (i, &v) in acc.iter().enumerate() {
                    out[i] = u8_from_s16(v.clamp(-32768, 32767) as i16);
                }
            }
            SampleFormat::S16 => {
                for (i, &v) in acc.iter().enumerate() {
                    let s = (v.clamp(-32768, 32767) as i16).to_ne_bytes();
                    out[i * 2..i * 2 + 2].copy_from_slice(&s);
                }
            }
            SampleFormat::S32 => {
                for (i, &v) in acc.iter().enumerate() {
                    let s = s32_from_s16(v.clamp(-32768, 32767) as i16).to_ne_bytes();
                    out[i * 4..i * 4 + 4].copy_from_slice(&s);
                }
            }
            SampleFormat::F32 => {
                for (i, &v) in acc.iter().enumerate() {
                    let s = f32_from_s16(v.clamp(-32768, 32767) as i16).to_ne_bytes();
                    out[i * 4..i * 4 + 4].copy_from_slice(&s);
                }
            }
        }
    }

    fn mix_handle(&self, handle: &Arc<Handle>, acc: &mut [i32]) {
        let source = &handle.source;
        if source.end() {
            let mut inner = handle.inner.lock();
            if inner.state < HandleState::Finished {
                inner.state = HandleState::Finished;
            }
            return;
        }
        if handle.inner.lock().state != HandleState::Playing {
            return;
        }

        let num_frames = self.num_frames as usize;
        let old_pitch = handle.resolved_pitch();
        let mut needed = frames_needed(num_frames, old_pitch);
        let mut requested = match &handle.resampler {
            Some(rs) => rs.lock().howmany(needed),
            None => needed,
        };
        if !source.ready(requested) {
            log::trace!("source not ready to play {requested} frames; window skipped");
            return;
        }

        let params = handle.snapshot_params();

        // The readiness test above used a pitch read without the snapshot
        // lock; if it changed in between, re-test with the fresh value.
        if params.pitch != old_pitch {
            needed = frames_needed(num_frames, params.pitch);
            requested = match &handle.resampler {
                Some(rs) => rs.lock().howmany(needed),
                None => needed,
            };
            if !source.ready(requested) {
                log::trace!("source not ready to play {requested} frames; window skipped");
                return;
            }
        }

        let src_fmt = handle.format;
        let src_channels = src_fmt.channels as usize;
        let src_frame_size = src_fmt.frame_size();

        let gain = Ramp {
            from: params.last_gain,
            to: params.gain,
        };
        let pan = Ramp {
            from: map_pan(params.last_pan),
            to: map_pan(params.pan),
        };

        if let Some(resampler) = &handle.resampler {
            let mut raw = vec![0u8; requested * src_frame_size];
            let num_read = match source.read(&mut raw, requested, None) {
                Ok(n) => n,
                Err(e) => {
                    log::warn!("voice read failed, window skipped: {e}");
                    return;
                }
            };
            if num_read != requested && requested > 0 {
                needed = (needed as f32 * num_read as f32 / requested as f32) as usize;
            }
            let mut widened = vec![0i16; num_read * src_channels];
            for (i, slot) in widened.iter_mut().enumerate() {
                *slot = crate::format::sample_as_s16(&raw, src_fmt.sample_format, i);
            }
            let mut resampled = vec![0i16; needed * src_channels];
            resampler
                .lock()
                .resample(&mut resampled, needed, &widened, num_read);
            mix_frames(
                acc,
                num_frames,
                needed,
                src_channels,
                params.pitch,
                gain,
                pan,
                |j, mul| (resampled[j] as f32 * mul) as i32,
            );
        } else {
            let mut raw = vec![0u8; needed * src_frame_size];
            let num_read = match source.read(&mut raw, needed, None) {
                Ok(n) => n,
                Err(e) => {
                    log::warn!("voice read failed, window skipped: {e}");
                    return;
                }
            };
            mix_sample_bytes(
                acc,
                num_frames,
                num_read,
                &raw,
                src_fmt.sample_format,
                src_channels,
                params.pitch,
                gain,
                pan,
            );
        }
    }

    /// Runs deferred teardown and finish callbacks. Must be called from the
    /// thread that owns handle lifecycles (the application thread).
    pub fn dispatch(&self) {
        let handles: Vec<Arc<Handle>> = self.dispatch_list.lock().clone();
        for handle in handles {
            let state = handle.inner.lock().state;
            if state == HandleState::Destroyed {
                // Wait until the mix pass has let go before freeing.
                if !handle.mix_linked.load(Ordering::Acquire) {
                    self.dispatch_list
                        .lock()
                        .retain(|h| !Arc::ptr_eq(h, &handle));
                    cleanup_handle(&handle);
                }
            } else if state == HandleState::Finished {
                if let Some(callback) = handle.callback.lock().take() {
                    callback(&handle);
                }
            }
        }
    }
}

fn cleanup_handle(handle: &Arc<Handle>) {
    let group = handle.inner.lock().group.upgrade();
    if let Some(group) = group {
        group.handles.lock().retain(|h| !Arc::ptr_eq(h, handle));
    }
}

/// Number of pre-resample frames needed to fill `num_frames` output frames
/// at `pitch`.
fn frames_needed(num_frames: usize, pitch: f32) -> usize {
    let mut needed = (num_frames as f32 / pitch) as usize;
    if (needed as f32) * pitch < num_frames as f32 {
        needed += 1;
    }
    needed
}

/// Maps pan from `[-1, 1]` to the `[0, 1]` space the mix loop ramps in.
fn map_pan(pan: f32) -> f32 {
    ((pan + 1.0) / 2.0).clamp(0.0, 1.0)
}

#[derive(Debug, Clone, Copy)]
struct Ramp {
    from: f32,
    to: f32,
}

/// Core mix loop: steps through the source at `pitch`, ramps gain and pan
/// linearly across the window, and accumulates into the stereo S32 buffer.
/// `fetch(sample_index, multiplier)` converts and scales one source sample.
#[allow(clippy::too_many_arguments)]
fn mix_frames<F: Fn(usize, f32) -> i32>(
    acc: &mut [i32],
    dst_frames: usize,
    src_frames: usize,
    src_channels: usize,
    pitch: f32,
    gain: Ramp,
    pan: Ramp,
    fetch: F,
) {
    let sample_scale = 1.0 / pitch;
    let denom = dst_frames.saturating_sub(1).max(1) as f32;
    let d_gain = (gain.to - gain.from) / denom;
    let d_pan = (pan.to - pan.from) / denom;
    let total_samples = src_frames * src_channels;
    let frame_mask = if src_channels == 1 {
        usize::MAX
    } else {
        usize::MAX & !1
    };

    let mut fj = 0.0f32;
    let mut j = 0usize;
    for i in 0..dst_frames {
        if j + (src_channels - 1) >= total_samples {
            break;
        }
        let cur_gain = gain.from + d_gain * i as f32;
        let cur_pan = pan.from + d_pan * i as f32;
        let lmul = cur_gain * if cur_pan < 0.5 { 1.0 } else { (1.0 - cur_pan) * 2.0 };
        let rmul = cur_gain * if cur_pan > 0.5 { 1.0 } else { cur_pan * 2.0 };

        acc[i * 2] += fetch(j, lmul);
        acc[i * 2 + 1] += fetch(j + (src_channels > 1) as usize, rmul);

        fj += sample_scale * src_channels as f32;
        j = (fj as usize) & frame_mask;
    }
}

/// Dispatches the mix loop over a raw byte buffer with the format-specific
/// sample conversion inlined per branch.
#[allow(clippy::too_many_arguments)]
fn mix_sample_bytes(
    acc: &mut [i32],
    dst_frames: usize,
    src_frames: usize,
    raw: &[u8],
    sample_format: SampleFormat,
    src_channels: usize,
    pitch: f32,
    gain: Ramp,
    pan: Ramp,
) {
    match sample_format {
        SampleFormat::U8 => mix_frames(
            acc,
            dst_frames,
            src_frames,
            src_channels,
            pitch,
            gain,
            pan,
            |j, mul| (s16_from_u8(raw[j]) as f32 * mul) as i32,
        ),
        SampleFormat::S16 => mix_frames(
            acc,
            dst_frames,
            src_frames,
            src_channels,
            pitch,
            gain,
            pan,
            |j, mul| {
                let v = i16::from_ne_bytes([raw[j * 2], raw[j * 2 + 1]]);
                (v as f32 * mul) as i32
            },
        ),
        SampleFormat::S32 => mix_frames(
            acc,
            dst_frames,
            src_frames,
            src_channels,
            pitch,
            gain,
            pan,
            |j, mul| {
                let v = i32::from_ne_bytes([
                    raw[j * 4],
                    raw[j * 4 + 1],
                    raw[j * 4 + 2],
                    raw[j * 4 + 3],
                ]);
                s16_from_s32((v as f32 * mul) as i32) as i32
            },
        ),
        SampleFormat::F32 => mix_frames(
            acc,
            dst_frames,
            src_frames,
            src_channels,
            pitch,
            gain,
            pan,
            |j, mul| {
                let v = f32::from_ne_bytes([
                    raw[j * 4],
                    raw[j * 4 + 1],
                    raw[j * 4 + 2],
                    raw[j * 4 + 3],
                ]);
                crate::format::s16_from_f32((v * mul).clamp(-1.0, 1.0)) as i32
            },
        ),
    }
}
