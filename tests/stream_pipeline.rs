//! Ring-buffer and buffered-stream behavior under realistic traffic.

use std::sync::Arc;

use polymix::{
    ring_buffer, BufferedStream, Format, SampleFormat, SharedMemory, Sound, SoundSource,
    StreamManager,
};

#[test]
fn spsc_byte_stream_survives_a_million_operations() {
    // Producer writes 7-byte chunks, consumer reads 13-byte chunks, over a
    // 64-byte ring; the concatenated streams must match byte for byte.
    let (mut producer, mut consumer) = ring_buffer(64).unwrap();
    const TOTAL: usize = 7 * 13 * 11_000; // just over a million bytes

    let write_side = std::thread::spawn(move || {
        let mut value = 0u8;
        let mut written = 0;
        while written < TOTAL {
            let chunk: Vec<u8> = (0..7).map(|i| value.wrapping_mul(31).wrapping_add(i)).collect();
            if producer.write(&chunk).is_ok() {
                value = value.wrapping_add(1);
                written += 7;
            } else {
                std::thread::yield_now();
            }
        }
    });

    let read_side = std::thread::spawn(move || {
        let mut expect_value = 0u8;
        let mut offset_in_chunk = 0u8;
        let mut read = 0;
        let mut buf = [0u8; 13];
        while read < TOTAL {
            if consumer.read(&mut buf).is_err() {
                std::thread::yield_now();
                continue;
            }
            for &byte in &buf {
                assert_eq!(
                    byte,
                    expect_value.wrapping_mul(31).wrapping_add(offset_in_chunk),
                    "at byte {read}"
                );
                offset_in_chunk += 1;
                if offset_in_chunk == 7 {
                    offset_in_chunk = 0;
                    expect_value = expect_value.wrapping_add(1);
                }
            }
            read += 13;
        }
    });

    write_side.join().unwrap();
    read_side.join().unwrap();
}

fn counting_stream(frames: u32, buffer_frames: usize) -> (StreamManager, Arc<BufferedStream>) {
    let fmt = Format {
        sample_format: SampleFormat::S32,
        channels: 1,
        frame_rate: 48_000,
    };
    let pcm: Vec<u8> = (0..frames as i32).flat_map(|v| v.to_ne_bytes()).collect();
    let sound = Arc::new(Sound::new(SharedMemory::new(pcm), fmt).unwrap());
    let src = Arc::new(SoundSource::new(sound));
    let mgr = StreamManager::new();
    let stream = BufferedStream::new(&mgr, src, buffer_frames * 4).unwrap();
    (mgr, stream)
}

fn read_frames(stream: &BufferedStream, n: usize) -> Vec<i32> {
    let mut buf = vec![0u8; n * 4];
    let got = stream.read(&mut buf, n);
    buf[..got * 4]
        .chunks(4)
        .map(|c| i32::from_ne_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

#[test]
fn seek_during_streaming_lands_exactly() {
    // 100k-frame source behind an 8192-frame ring; read to 10k, then seek.
    let (_mgr, stream) = counting_stream(100_000, 8_192);

    let mut pos = 0;
    while pos < 10_000 {
        stream.produce().unwrap();
        pos += read_frames(&stream, 10_000 - pos).len();
    }
    assert_eq!(stream.tell().unwrap().current, 10_000);

    stream.seek(50_000).unwrap();
    // The target is reported before any produce or read happens.
    assert_eq!(stream.tell().unwrap().current, 50_000);

    stream.produce().unwrap();
    let frames = read_frames(&stream, 64);
    assert_eq!(frames[0], 50_000);
    assert_eq!(frames[63], 50_063);
    assert_eq!(stream.tell().unwrap().current, 50_064);
}

#[test]
fn concurrent_fill_and_drain_preserve_order() {
    let _ = env_logger::builder().is_test(true).try_init();
    let (mgr, stream) = counting_stream(200_000, 1_024);
    let mgr = Arc::new(mgr);

    let filler_mgr = Arc::clone(&mgr);
    let stream_for_filler = Arc::clone(&stream);
    let filler = std::thread::spawn(move || {
        while !stream_for_filler.end() {
            filler_mgr.buffer();
            std::thread::yield_now();
        }
    });

    let mut next = 0i32;
    while !stream.end() {
        for v in read_frames(&stream, 777) {
            assert_eq!(v, next);
            next += 1;
        }
    }
    assert_eq!(next, 200_000);
    filler.join().unwrap();
}

#[test]
fn tell_total_is_forwarded_from_the_inner_source() {
    let (_mgr, stream) = counting_stream(5_000, 512);
    assert_eq!(stream.tell().unwrap().total, Some(5_000));
}
