//! End-to-end mixing scenarios against the full handle/mixer pipeline.

use std::sync::Arc;

use polymix::{
    Format, HandleParam, LoopSource, Mixer, SampleSource, SharedMemory, Sound, SoundSource,
    StreamManager, StreamSource,
};

fn constant_sound(value: i16, frames: usize, rate: u32) -> Arc<Sound> {
    let fmt = Format::mono_s16(rate);
    let pcm: Vec<u8> = std::iter::repeat(value)
        .take(frames)
        .flat_map(|v| v.to_ne_bytes())
        .collect();
    Arc::new(Sound::new(SharedMemory::new(pcm), fmt).unwrap())
}

fn counting_sound(frames: i16, rate: u32) -> Arc<Sound> {
    let fmt = Format::mono_s16(rate);
    let pcm: Vec<u8> = (0..frames).flat_map(|v| v.to_ne_bytes()).collect();
    Arc::new(Sound::new(SharedMemory::new(pcm), fmt).unwrap())
}

fn mix_window(mixer: &Arc<Mixer>) -> Vec<i16> {
    let mut out = vec![0u8; mixer.num_frames() as usize * mixer.format().frame_size()];
    mixer.mix(&mut out).unwrap();
    out.chunks(2)
        .map(|c| i16::from_ne_bytes([c[0], c[1]]))
        .collect()
}

#[test]
fn silent_mix_produces_zero_output() {
    let mixer = Mixer::new(Format::stereo_s16(48_000), 2_048).unwrap();
    let handle = mixer.create_handle(Arc::new(SoundSource::new(constant_sound(
        0, 48_000, 48_000,
    ))));
    handle.set_param(HandleParam::Gain, 1.0).unwrap();
    handle.set_param(HandleParam::Pan, 0.0).unwrap();
    handle.play().unwrap();

    let out = mix_window(&mixer);
    assert_eq!(out.len(), 2 * 2_048);
    assert!(out.iter().all(|&v| v == 0));
}

#[test]
fn gain_ramp_is_linear_across_the_window() {
    let mixer = Mixer::new(Format::stereo_s16(48_000), 2_048).unwrap();
    let handle = mixer.create_handle(Arc::new(SoundSource::new(constant_sound(
        10_000, 48_000, 48_000,
    ))));
    handle.play().unwrap();

    // Settle last_gain at 0, then ramp up to 1 over one window.
    handle.set_param(HandleParam::Gain, 0.0).unwrap();
    mix_window(&mixer);
    handle.set_param(HandleParam::Gain, 1.0).unwrap();
    let out = mix_window(&mixer);

    let left: Vec<i16> = out.iter().step_by(2).copied().collect();
    assert_eq!(left[0], 0);
    assert!((left[2_047] - 10_000).abs() <= 1, "last = {}", left[2_047]);
    assert!(left.windows(2).all(|w| w[0] <= w[1]), "ramp not monotonic");
    // Right channel ramps identically for a centered mono voice.
    let right: Vec<i16> = out.iter().skip(1).step_by(2).copied().collect();
    assert_eq!(left, right);
}

#[test]
fn hard_pan_right_silences_left() {
    let mixer = Mixer::new(Format::stereo_s16(48_000), 1_024).unwrap();
    let handle = mixer.create_handle(Arc::new(SoundSource::new(constant_sound(
        20_000, 48_000, 48_000,
    ))));
    handle.set_param(HandleParam::Gain, 1.0).unwrap();
    handle.set_param(HandleParam::Pan, 1.0).unwrap();
    handle.play().unwrap();

    // First window ramps from the centered default; second is settled.
    mix_window(&mixer);
    let out = mix_window(&mixer);

    let left: Vec<i16> = out.iter().step_by(2).copied().collect();
    let right: Vec<i16> = out.iter().skip(1).step_by(2).copied().collect();
    assert!(left.iter().all(|&v| v == 0), "left not silent: {:?}", &left[..4]);
    assert!(right.iter().all(|&v| v == 20_000));
}

#[test]
fn loop_through_stream_through_mixer_repeats_content() {
    // Loop(0..100) -> buffered stream -> handle -> mixer.
    let inner = Arc::new(SoundSource::new(counting_sound(400, 48_000)));
    let looped = Arc::new(LoopSource::new(inner).unwrap());
    looped.set_points(100, 0);

    let streams = StreamManager::new();
    let stream =
        StreamSource::new(&streams, Arc::clone(&looped) as Arc<dyn SampleSource>, 1_024).unwrap();

    let mixer = Mixer::new(Format::stereo_s16(48_000), 512).unwrap();
    let handle = mixer.create_handle(Arc::new(stream));
    handle.play().unwrap();

    streams.buffer();
    let out = mix_window(&mixer);
    let left: Vec<i16> = out.iter().step_by(2).copied().collect();
    for (i, &v) in left.iter().enumerate() {
        assert_eq!(v as usize, i % 100, "frame {i}");
    }
    assert!(looped.loop_count() >= 5);
}

#[test]
fn suspended_mixer_is_all_zero_bits_regardless_of_input() {
    let mixer = Mixer::new(
        Format {
            sample_format: polymix::SampleFormat::F32,
            channels: 2,
            frame_rate: 48_000,
        },
        512,
    )
    .unwrap();
    let handle = mixer.create_handle(Arc::new(SoundSource::new(constant_sound(
        30_000, 48_000, 48_000,
    ))));
    handle.play().unwrap();
    mixer.suspend().unwrap();

    let mut out = vec![0xFFu8; 512 * mixer.format().frame_size()];
    mixer.mix(&mut out).unwrap();
    assert!(out.iter().all(|&b| b == 0));
    // Nothing was consumed while suspended.
    assert_eq!(handle.tell().unwrap().current, 0);
}

#[test]
fn group_fade_governs_all_voices_in_one_write() {
    let mixer = Mixer::new(Format::stereo_s16(48_000), 256).unwrap();
    let a = mixer.create_handle(Arc::new(SoundSource::new(constant_sound(
        8_000, 48_000, 48_000,
    ))));
    let b = mixer.create_handle(Arc::new(SoundSource::new(constant_sound(
        4_000, 48_000, 48_000,
    ))));
    a.play().unwrap();
    b.play().unwrap();

    let group = mixer.create_group();
    group.add(&a);
    group.add(&b);
    group.set_param(HandleParam::Gain, 0.5).unwrap();

    mix_window(&mixer); // ramp toward the group gain
    let out = mix_window(&mixer);
    assert!(out.iter().all(|&v| v == 6_000), "got {:?}", &out[..4]);
}
