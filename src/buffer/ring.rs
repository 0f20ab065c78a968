//! Bounded single-producer/single-consumer byte ring with overwrite-oldest
//! policy (spec §4.2, C2).
//!
//! The producer half (`Producer::push`) is wait-free: it never blocks, never
//! allocates, and never touches the consumer's wake path beyond a single
//! `notify_one()` call. When the ring is full it overwrites the oldest bytes
//! and counts them, rather than rejecting the write — this is the one
//! property neither `rtrb` (used elsewhere in the pack for the same "no
//! allocation in the audio callback" role) nor the `ringbuffer` crate
//! provide, so the cursor arithmetic here is hand-rolled.

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;

struct Shared {
    data: Box<[UnsafeCell<u8>]>,
    capacity: usize,
    /// Total bytes written, monotonically increasing. `head % capacity` is
    /// the next write position; `head - tail` (saturated to capacity) is
    /// the current fill.
    head: AtomicUsize,
    /// Total bytes consumed, monotonically increasing.
    tail: AtomicUsize,
    closed: AtomicBool,
    notify: Notify,

    bytes_written: AtomicU64,
    bytes_overwritten: AtomicU64,
}

// SAFETY: `data` is only ever written by the single producer and read by
// the single consumer, each restricted to the byte range the cursors hand
// it; the cursors themselves are atomics with Release/Acquire ordering.
unsafe impl Sync for Shared {}

/// Creates a ring buffer of the given capacity, returning the producer and
/// consumer halves. Capacity must be non-zero.
pub fn ring_buffer(capacity: usize) -> (Producer, Consumer) {
    assert!(capacity > 0, "ring buffer capacity must be non-zero");
    let data: Box<[UnsafeCell<u8>]> = (0..capacity).map(|_| UnsafeCell::new(0)).collect();
    let shared = Arc::new(Shared {
        data,
        capacity,
        head: AtomicUsize::new(0),
        tail: AtomicUsize::new(0),
        closed: AtomicBool::new(false),
        notify: Notify::new(),
        bytes_written: AtomicU64::new(0),
        bytes_overwritten: AtomicU64::new(0),
    });
    (
        Producer {
            shared: shared.clone(),
        },
        Consumer { shared },
    )
}

/// Producer half. Owned by the real-time capture callback. Never blocks.
pub struct Producer {
    shared: Arc<Shared>,
}

/// Consumer half. Owned by the async consumer task.
pub struct Consumer {
    shared: Arc<Shared>,
}

/// Point-in-time counters (spec §4.2 Observability, §8 P2).
#[derive(Debug, Clone, Copy, Default)]
pub struct RingStats {
    pub bytes_written: u64,
    pub bytes_overwritten: u64,
    pub current_fill_bytes: usize,
}

impl Producer {
    /// Writes `bytes` into the ring, overwriting the oldest bytes if the
    /// ring is full. Returns the number of bytes overwritten (0 if none).
    /// Never blocks and never allocates.
    pub fn push(&self, bytes: &[u8]) -> usize {
        let capacity = self.shared.capacity;
        if bytes.is_empty() {
            return 0;
        }

        let mut head = self.shared.head.load(Ordering::Relaxed);
        let tail = self.shared.tail.load(Ordering::Acquire);

        // If the incoming slice alone exceeds capacity, only its tail end
        // survives — the rest would be overwritten before ever being read.
        let to_write = bytes.len().min(capacity);
        let skip = bytes.len() - to_write;
        let bytes = &bytes[skip..];

        for &byte in bytes {
            let idx = head % capacity;
            // SAFETY: idx is in-bounds; the producer is the sole writer of
            // this cell and the consumer only reads cells behind `tail`,
            // which this loop may advance past but only after writing.
            unsafe {
                *self.shared.data[idx].get() = byte;
            }
            head += 1;
        }

        let filled_after_raw = head - tail;
        let overwritten = filled_after_raw.saturating_sub(capacity);

        self.shared.head.store(head, Ordering::Release);
        if overwritten > 0 {
            // Advance tail past the bytes we just clobbered so the consumer
            // never reads stale/overwritten data as if it were valid.
            let new_tail = head.saturating_sub(capacity);
            self.shared.tail.fetch_max(new_tail, Ordering::AcqRel);
            self.shared
                .bytes_overwritten
                .fetch_add(overwritten as u64, Ordering::Relaxed);
        }

        self.shared
            .bytes_written
            .fetch_add(bytes.len() as u64, Ordering::Relaxed);
        self.shared.notify.notify_one();

        overwritten + skip
    }

    /// Writes mono i16 samples as little-endian bytes, without allocating
    /// an intermediate `Vec<u8>` on the hot path (I1). Otherwise identical
    /// to [`Producer::push`].
    pub fn push_samples(&self, samples: &[i16]) -> usize {
        let capacity = self.shared.capacity;
        if samples.is_empty() {
            return 0;
        }

        let mut head = self.shared.head.load(Ordering::Relaxed);
        let tail = self.shared.tail.load(Ordering::Acquire);

        let total_bytes = samples.len() * 2;
        let to_write_bytes = total_bytes.min(capacity);
        let skip_samples = samples.len() - to_write_bytes / 2;
        let samples = &samples[skip_samples..];

        for &sample in samples {
            for byte in sample.to_le_bytes() {
                let idx = head % capacity;
                // SAFETY: see `push` — same single-writer invariant.
                unsafe {
                    *self.shared.data[idx].get() = byte;
                }
                head += 1;
            }
        }

        let written = samples.len() * 2;
        let filled_after_raw = head - tail;
        let overwritten = filled_after_raw.saturating_sub(capacity);

        self.shared.head.store(head, Ordering::Release);
        if overwritten > 0 {
            let new_tail = head.saturating_sub(capacity);
            self.shared.tail.fetch_max(new_tail, Ordering::AcqRel);
            self.shared
                .bytes_overwritten
                .fetch_add(overwritten as u64, Ordering::Relaxed);
        }

        self.shared
            .bytes_written
            .fetch_add(written as u64, Ordering::Relaxed);
        self.shared.notify.notify_one();

        overwritten + (skip_samples * 2)
    }

    /// Snapshot of producer-visible counters.
    pub fn stats(&self) -> RingStats {
        self.shared.stats()
    }
}

fn head_minus_tail(head: usize, tail: usize, capacity: usize) -> usize {
    head.saturating_sub(tail).min(capacity)
}

impl Shared {
    fn stats(&self) -> RingStats {
        let head = self.head.load(Ordering::Acquire);
        let tail = self.tail.load(Ordering::Acquire);
        RingStats {
            bytes_written: self.bytes_written.load(Ordering::Relaxed),
            bytes_overwritten: self.bytes_overwritten.load(Ordering::Relaxed),
            current_fill_bytes: head_minus_tail(head, tail, self.capacity),
        }
    }
}

impl Consumer {
    /// Returns up to `n` bytes, awaiting until at least one byte is
    /// available or the ring is closed. Returns an empty `Vec` only when
    /// closed and fully drained.
    pub async fn pop_up_to(&self, n: usize) -> Vec<u8> {
        loop {
            if let Some(out) = self.try_pop_up_to(n) {
                return out;
            }
            if self.shared.closed.load(Ordering::Acquire) {
                // One more drain attempt in case bytes landed between the
                // check above and here; then signal end-of-stream.
                if let Some(out) = self.try_pop_up_to(n) {
                    return out;
                }
                return Vec::new();
            }
            self.shared.notify.notified().await;
        }
    }

    fn try_pop_up_to(&self, n: usize) -> Option<Vec<u8>> {
        let tail = self.shared.tail.load(Ordering::Relaxed);
        let head = self.shared.head.load(Ordering::Acquire);
        let available = head.saturating_sub(tail);
        if available == 0 {
            return None;
        }
        let to_read = available.min(n);
        let capacity = self.shared.capacity;
        let mut out = Vec::with_capacity(to_read);
        for i in 0..to_read {
            let idx = (tail + i) % capacity;
            // SAFETY: idx is within [tail, head) modulo capacity, which the
            // producer will not overwrite again until tail advances past it.
            out.push(unsafe { *self.shared.data[idx].get() });
        }
        self.shared
            .tail
            .store(tail + to_read, Ordering::Release);
        Some(out)
    }

    /// Wakes any waiter; subsequent `pop_up_to` calls drain remaining
    /// bytes then return empty, signaling end-of-stream.
    pub fn close(&self) {
        self.shared.closed.store(true, Ordering::Release);
        self.shared.notify.notify_waiters();
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::Acquire)
    }

    pub fn stats(&self) -> RingStats {
        self.shared.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_and_pop_preserve_order() {
        let (producer, consumer) = ring_buffer(16);
        producer.push(b"hello");
        let got = futures_test_block_on(consumer.pop_up_to(5));
        assert_eq!(got, b"hello");
    }

    #[test]
    fn overwrite_at_capacity_counts_exactly() {
        let (producer, _consumer) = ring_buffer(8);
        let overwritten = producer.push(b"12345678");
        assert_eq!(overwritten, 0);
        // Ring is now exactly full; next push of N bytes overwrites N bytes.
        let overwritten = producer.push(b"abcd");
        assert_eq!(overwritten, 4);
        assert_eq!(producer.stats().bytes_overwritten, 4);
    }

    #[test]
    fn consumer_blocks_until_data_then_returns() {
        let (producer, consumer) = ring_buffer(16);
        producer.push(b"ab");
        let got = futures_test_block_on(consumer.pop_up_to(100));
        assert_eq!(got, b"ab");
    }

    #[test]
    fn close_drains_then_signals_end_of_stream() {
        let (producer, consumer) = ring_buffer(16);
        producer.push(b"xy");
        consumer.close();
        let first = futures_test_block_on(consumer.pop_up_to(100));
        assert_eq!(first, b"xy");
        let second = futures_test_block_on(consumer.pop_up_to(100));
        assert!(second.is_empty());
    }

    #[test]
    fn fill_percentage_reflects_state() {
        let (producer, consumer) = ring_buffer(100);
        producer.push(&[0u8; 40]);
        assert_eq!(consumer.stats().current_fill_bytes, 40);
        let _ = futures_test_block_on(consumer.pop_up_to(10));
        assert_eq!(consumer.stats().current_fill_bytes, 30);
    }

    /// Minimal single-threaded executor for async unit tests without
    /// pulling in `#[tokio::test]` for a module with no real concurrency.
    fn futures_test_block_on<F: std::future::Future>(fut: F) -> F::Output {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap()
            .block_on(fut)
    }
}
