//! Offline render through the WAV sink, read back through the WAV decoder.

use std::sync::Arc;

use polymix::{
    FileDataSource, Format, Manager, ManagerConfig, SampleFormat, SharedMemory, Sound,
    WavFileDevice, WavSource,
};

fn constant_sound(value: i16, frames: usize, rate: u32) -> Arc<Sound> {
    let fmt = Format::mono_s16(rate);
    let pcm: Vec<u8> = std::iter::repeat(value)
        .take(frames)
        .flat_map(|v| v.to_ne_bytes())
        .collect();
    Arc::new(Sound::new(SharedMemory::new(pcm), fmt).unwrap())
}

#[test]
fn rendered_wav_preserves_format_and_content() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("render.wav");
    let format = Format::stereo_s16(44_100);

    let windows_played;
    {
        let device = WavFileDevice::create(&path, format, 512)?;
        let mut manager = Manager::new(Box::new(device), ManagerConfig::default())?;
        // 10240 frames: exactly 20 windows of source data.
        let handle = manager.handle_from_sound(&constant_sound(7_000, 10_240, 44_100))?;
        handle.play()?;

        let mut updates = 0;
        while !handle.finished() && updates < 64 {
            manager.update()?;
            updates += 1;
        }
        assert!(handle.finished());
        windows_played = updates;
        // Dropping the manager closes and finalizes the device.
    }

    let data = Arc::new(FileDataSource::open(&path)?);
    let wav = WavSource::new(data)?;
    assert_eq!(wav.format().sample_format, SampleFormat::S16);
    assert_eq!(wav.format().channels, 2);
    assert_eq!(wav.format().frame_rate, 44_100);

    use polymix::SampleSource;
    let total = wav.tell()?.total.unwrap();
    assert_eq!(total, windows_played as u64 * 512);

    // The first 10240 frames carry the voice on both channels; the tail is
    // the silence mixed after it finished.
    let mut pcm = vec![0u8; total as usize * 4];
    let mut got = 0;
    while got < total as usize {
        let n = wav.read(&mut pcm[got * 4..], total as usize - got, None)?;
        assert!(n > 0);
        got += n;
    }
    let samples: Vec<i16> = pcm
        .chunks(2)
        .map(|c| i16::from_le_bytes([c[0], c[1]]))
        .collect();
    assert!(samples[..10_240 * 2].iter().all(|&v| v == 7_000));
    assert!(samples[10_240 * 2..].iter().all(|&v| v == 0));
    Ok(())
}

#[test]
fn float_render_round_trips_through_the_container() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("float.wav");
    let format = Format {
        sample_format: SampleFormat::F32,
        channels: 2,
        frame_rate: 48_000,
    };

    {
        let device = WavFileDevice::create(&path, format, 256).unwrap();
        let mut manager = Manager::new(Box::new(device), ManagerConfig::default()).unwrap();
        let handle = manager
            .handle_from_sound(&constant_sound(16_384, 1_024, 48_000))
            .unwrap();
        handle.play().unwrap();
        while !handle.finished() {
            manager.update().unwrap();
        }
    }

    let data = Arc::new(FileDataSource::open(&path).unwrap());
    let wav = WavSource::new(data).unwrap();
    assert_eq!(wav.format().sample_format, SampleFormat::F32);

    use polymix::SampleSource;
    let mut pcm = vec![0u8; 8 * 8];
    wav.read(&mut pcm, 8, None).unwrap();
    for c in pcm.chunks(4) {
        let v = f32::from_le_bytes([c[0], c[1], c[2], c[3]]);
        assert!((v - 0.5).abs() < 1e-3, "sample {v}");
    }
}
