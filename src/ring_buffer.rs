//! Lock-free ring buffer for concurrent stream filling and draining.
//!
//! A byte-oriented single-producer/single-consumer ring that decouples the
//! thread decoding a stream from the thread mixing it. Positions are
//! monotonic counters; the capacity is a power of two so the wrap offset is a
//! bitmask. The producer only ever stores `next_free`, the consumer only ever
//! stores `next_avail`, and either side may load both, so no lock is needed.
//!
//! [`ring_buffer`] returns the two halves as separate handles; holding a
//! handle *is* the exclusive claim to that side of the buffer.

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::{AudioError, Result};

/// Largest accepted capacity (512 MB), to catch runaway sizing upstream.
const MAX_CAPACITY: usize = 512 * 1024 * 1024;

struct Inner {
    buffer: Box<[UnsafeCell<u8>]>,
    capacity: usize,
    /// Wrap mask: `pos & mask == pos % capacity`
    mask: usize,
    /// Total bytes ever produced (producer-written)
    next_free: AtomicUsize,
    /// Total bytes ever consumed (consumer-written)
    next_avail: AtomicUsize,
}

// SAFETY: the producer half writes only to slots in `[next_avail,
// next_free + n)` before publishing them with a Release store of
// `next_free`; the consumer half reads only slots behind the Acquire-loaded
// `next_free` and then retires them with a Release store of `next_avail`.
// Each counter has exactly one writer because the handles are not Clone, so
// the two sides never touch the same slot concurrently.
unsafe impl Send for Inner {}
unsafe impl Sync for Inner {}

impl Inner {
    fn bytes_available(&self) -> usize {
        self.next_free.load(Ordering::Acquire) - self.next_avail.load(Ordering::Acquire)
    }

    fn bytes_free(&self) -> usize {
        self.capacity - self.bytes_available()
    }

    /// Two wrapping regions of `len` bytes starting at monotonic position
    /// `pos`. The second region is empty unless the span wraps.
    fn regions(&self, pos: usize, len: usize) -> (*mut u8, usize, *mut u8, usize) {
        let start = pos & self.mask;
        let first = len.min(self.capacity - start);
        let base = self.buffer.as_ptr() as *mut u8;
        (unsafe { base.add(start) }, first, base, len - first)
    }
}

/// Creates a ring buffer and splits it into its producer and consumer
/// halves. The capacity is rounded up to the next power of two.
pub fn ring_buffer(requested_capacity: usize) -> Result<(RingProducer, RingConsumer)> {
    if requested_capacity == 0 {
        return Err(AudioError::InvalidParameter);
    }
    let capacity = requested_capacity.next_power_of_two();
    if capacity > MAX_CAPACITY {
        return Err(AudioError::Memory(format!(
            "ring capacity {capacity} exceeds maximum safe size {MAX_CAPACITY}"
        )));
    }

    let inner = Arc::new(Inner {
        buffer: (0..capacity).map(|_| UnsafeCell::new(0)).collect(),
        capacity,
        mask: capacity - 1,
        next_free: AtomicUsize::new(0),
        next_avail: AtomicUsize::new(0),
    });

    Ok((
        RingProducer {
            inner: Arc::clone(&inner),
        },
        RingConsumer { inner },
    ))
}

/// Write half of a ring buffer. Not `Clone`: exactly one producer exists.
pub struct RingProducer {
    inner: Arc<Inner>,
}

impl RingProducer {
    /// Capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    /// Bytes currently buffered and readable by the consumer.
    pub fn bytes_available(&self) -> usize {
        self.inner.bytes_available()
    }

    /// Bytes of free space available for writing.
    pub fn bytes_free(&self) -> usize {
        self.inner.bytes_free()
    }

    /// Hands `num_bytes` of free space to `fill` as up to two contiguous
    /// slices and advances the write position by the number of bytes `fill`
    /// reports written (which must be a prefix: the first slice fills before
    /// the second).
    ///
    /// Fails without touching the buffer if less than `num_bytes` is free.
    pub fn produce_with<F>(&mut self, num_bytes: usize, fill: F) -> Result<usize>
    where
        F: FnOnce(&mut [u8], &mut [u8]) -> usize,
    {
        if num_bytes > self.inner.bytes_free() {
            return Err(AudioError::InvalidParameter);
        }
        let pos = self.inner.next_free.load(Ordering::Relaxed);
        let (p1, n1, p2, n2) = self.inner.regions(pos, num_bytes);
        // SAFETY: these slots are free space; the consumer will not read them
        // until the Release store below publishes them.
        let written = unsafe {
            fill(
                std::slice::from_raw_parts_mut(p1, n1),
                std::slice::from_raw_parts_mut(p2, n2),
            )
        };
        debug_assert!(written <= num_bytes);
        self.inner
            .next_free
            .store(pos + written, Ordering::Release);
        Ok(written)
    }

    /// Copies `data` into the ring. Fails without mutating positions if the
    /// free space is insufficient.
    pub fn write(&mut self, data: &[u8]) -> Result<()> {
        self.produce_with(data.len(), |a, b| {
            let split = a.len();
            a.copy_from_slice(&data[..split]);
            b.copy_from_slice(&data[split..]);
            data.len()
        })
        .map(|_| ())
    }
}

/// Read half of a ring buffer. Not `Clone`: exactly one consumer exists.
pub struct RingConsumer {
    inner: Arc<Inner>,
}

impl RingConsumer {
    /// Capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    /// Bytes currently buffered and readable.
    pub fn bytes_available(&self) -> usize {
        self.inner.bytes_available()
    }

    /// Bytes of free space available to the producer.
    pub fn bytes_free(&self) -> usize {
        self.inner.bytes_free()
    }

    /// Hands `num_bytes` of buffered data to `drain` as up to two contiguous
    /// slices and retires the number of bytes `drain` reports consumed.
    ///
    /// Fails without touching the buffer if less than `num_bytes` is
    /// available.
    pub fn consume_with<F>(&mut self, num_bytes: usize, drain: F) -> Result<usize>
    where
        F: FnOnce(&[u8], &[u8]) -> usize,
    {
        if num_bytes > self.inner.bytes_available() {
            return Err(AudioError::InvalidParameter);
        }
        let pos = self.inner.next_avail.load(Ordering::Relaxed);
        let (p1, n1, p2, n2) = self.inner.regions(pos, num_bytes);
        // SAFETY: these slots were published by the producer's Release store
        // of next_free, which the bytes_available() Acquire load observed.
        let consumed = unsafe {
            drain(
                std::slice::from_raw_parts(p1, n1),
                std::slice::from_raw_parts(p2, n2),
            )
        };
        debug_assert!(consumed <= num_bytes);
        self.inner
            .next_avail
            .store(pos + consumed, Ordering::Release);
        Ok(consumed)
    }

    /// Copies exactly `dst.len()` bytes out of the ring. Fails without
    /// mutating positions if the buffered data is insufficient.
    pub fn read(&mut self, dst: &mut [u8]) -> Result<()> {
        self.consume_with(dst.len(), |a, b| {
            dst[..a.len()].copy_from_slice(a);
            dst[a.len()..].copy_from_slice(b);
            a.len() + b.len()
        })
        .map(|_| ())
    }

    /// Retires `num_bytes` without copying them out.
    pub fn skip(&mut self, num_bytes: usize) -> Result<()> {
        self.consume_with(num_bytes, |a, b| a.len() + b.len())
            .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creation_rounds_to_power_of_two() {
        let (p, c) = ring_buffer(1000).unwrap();
        assert_eq!(p.capacity(), 1024);
        assert_eq!(c.capacity(), 1024);
        assert_eq!(c.bytes_available(), 0);
        assert_eq!(p.bytes_free(), 1024);
    }

    #[test]
    fn zero_capacity_fails() {
        assert!(ring_buffer(0).is_err());
    }

    #[test]
    fn oversized_capacity_fails() {
        assert!(matches!(
            ring_buffer(MAX_CAPACITY + 1),
            Err(AudioError::Memory(_))
        ));
    }

    #[test]
    fn write_then_read() {
        let (mut p, mut c) = ring_buffer(16).unwrap();
        p.write(&[1, 2, 3, 4]).unwrap();
        assert_eq!(c.bytes_available(), 4);
        let mut out = [0u8; 4];
        c.read(&mut out).unwrap();
        assert_eq!(out, [1, 2, 3, 4]);
        assert_eq!(c.bytes_available(), 0);
    }

    #[test]
    fn available_plus_free_is_capacity() {
        let (mut p, mut c) = ring_buffer(64).unwrap();
        for step in 1..=20usize {
            p.write(&vec![step as u8; step % 7 + 1]).unwrap();
            assert_eq!(p.bytes_available() + p.bytes_free(), 64);
            let mut out = vec![0u8; (step % 5 + 1).min(c.bytes_available())];
            c.read(&mut out).unwrap();
            assert_eq!(c.bytes_available() + c.bytes_free(), 64);
        }
    }

    #[test]
    fn overfull_write_fails_without_mutating() {
        let (mut p, mut c) = ring_buffer(16).unwrap();
        p.write(&[0xAA; 10]).unwrap();
        assert!(p.write(&[0xBB; 7]).is_err());
        assert_eq!(c.bytes_available(), 10);
        let mut out = [0u8; 10];
        c.read(&mut out).unwrap();
        assert_eq!(out, [0xAA; 10]);
    }

    #[test]
    fn short_read_fails_without_mutating() {
        let (mut p, mut c) = ring_buffer(16).unwrap();
        p.write(&[1, 2, 3]).unwrap();
        let mut out = [0u8; 8];
        assert!(c.read(&mut out).is_err());
        assert_eq!(c.bytes_available(), 3);
    }

    #[test]
    fn wrap_around_preserves_bytes() {
        // Fill to capacity-1, drain most, then write across the wrap point.
        let (mut p, mut c) = ring_buffer(64).unwrap();
        let first: Vec<u8> = (0..63).collect();
        p.write(&first).unwrap();
        let mut drained = vec![0u8; 62];
        c.read(&mut drained).unwrap();
        assert_eq!(&drained[..], &first[..62]);

        p.write(&[100, 101, 102]).unwrap();
        let mut tail = [0u8; 4];
        c.read(&mut tail).unwrap();
        assert_eq!(tail, [62, 100, 101, 102]);
    }

    #[test]
    fn produce_with_partial_fill_advances_by_written() {
        let (mut p, mut c) = ring_buffer(16).unwrap();
        let written = p
            .produce_with(8, |a, _b| {
                a[..3].copy_from_slice(&[7, 8, 9]);
                3
            })
            .unwrap();
        assert_eq!(written, 3);
        assert_eq!(c.bytes_available(), 3);
        let mut out = [0u8; 3];
        c.read(&mut out).unwrap();
        assert_eq!(out, [7, 8, 9]);
    }

    #[test]
    fn skip_discards_bytes() {
        let (mut p, mut c) = ring_buffer(16).unwrap();
        p.write(&[1, 2, 3, 4, 5]).unwrap();
        c.skip(4).unwrap();
        let mut out = [0u8; 1];
        c.read(&mut out).unwrap();
        assert_eq!(out, [5]);
    }

    #[test]
    fn spsc_threads_preserve_stream() {
        // Producer writes 7-byte chunks, consumer reads 13-byte chunks,
        // across a small capacity to force constant wrapping.
        let (mut p, mut c) = ring_buffer(64).unwrap();
        const TOTAL: usize = 7 * 13 * 1000;

        let producer = std::thread::spawn(move || {
            let mut sent = 0u8;
            let mut written = 0usize;
            while written < TOTAL {
                let chunk: Vec<u8> = (0..7).map(|i| sent.wrapping_add(i)).collect();
                if p.write(&chunk).is_ok() {
                    sent = sent.wrapping_add(7);
                    written += 7;
                } else {
                    std::thread::yield_now();
                }
            }
        });

        let consumer = std::thread::spawn(move || {
            let mut expect = 0u8;
            let mut read = 0usize;
            let mut buf = [0u8; 13];
            while read < TOTAL {
                if c.read(&mut buf).is_ok() {
                    for &b in &buf {
                        assert_eq!(b, expect);
                        expect = expect.wrapping_add(1);
                    }
                    read += 13;
                } else {
                    std::thread::yield_now();
                }
            }
        });

        producer.join().unwrap();
        consumer.join().unwrap();
    }
}
