//! Fixed-capacity single-producer single-consumer byte ring.
//!
//! The receive interrupt is the producer; the read path (task side, or the
//! interrupt itself when it drains into a pending request) is the consumer.
//! The occupied-slot counter is the single source of truth for empty and
//! full, so all `N` slots are usable.
//!
//! # Safety Contract
//!
//! - Only ONE context may call [`push()`](RingBuffer::push) at a time.
//! - Only ONE context may call [`pop()`](RingBuffer::pop) or
//!   [`peek()`](RingBuffer::peek) at a time.
//! - [`reset()`](RingBuffer::reset) must not race either side.
//!
//! The driver upholds this by only consuming inside critical sections.

use core::cell::UnsafeCell;
use core::sync::atomic::{AtomicUsize, Ordering};

/// Consumer-side view of a byte queue, used by the drain strategies so they do
/// not depend on the ring's capacity parameter.
pub trait ByteQueue: Sync {
    /// Consumer side.
    fn pop(&self) -> Option<u8>;
    /// Number of occupied slots.
    fn count(&self) -> usize;
}

/// Circular byte buffer with `N` slots.
pub struct RingBuffer<const N: usize> {
    storage: UnsafeCell<[u8; N]>,
    /// Next slot to write (only modified by the producer).
    head: AtomicUsize,
    /// Next slot to read (only modified by the consumer).
    tail: AtomicUsize,
    /// Occupied slots, `0 ..= N`.
    count: AtomicUsize,
}

// SAFETY: bytes are plain data. Each slot is written only by the producer
// while unoccupied and read only by the consumer while occupied; the
// Release/Acquire pair on `count` orders the slot access against the hand-over.
unsafe impl<const N: usize> Sync for RingBuffer<N> {}

impl<const N: usize> RingBuffer<N> {
    /// Create an empty ring.
    ///
    /// # Panics
    ///
    /// Compile-time assertion: `N` must be at least 1.
    pub const fn new() -> Self {
        assert!(N >= 1, "ring buffer needs at least one slot");

        RingBuffer {
            storage: UnsafeCell::new([0; N]),
            head: AtomicUsize::new(0),
            tail: AtomicUsize::new(0),
            count: AtomicUsize::new(0),
        }
    }

    /// Store a byte (producer side).
    ///
    /// Returns `Err(byte)` if the ring is full; the buffered content is left
    /// untouched.
    pub fn push(&self, byte: u8) -> Result<(), u8> {
        if self.count.load(Ordering::Acquire) == N {
            return Err(byte);
        }

        let head = self.head.load(Ordering::Relaxed);
        // SAFETY: sole producer, and `count < N` means slot `head` is free.
        unsafe {
            self.storage.get().cast::<u8>().add(head).write(byte);
        }
        self.head.store((head + 1) % N, Ordering::Relaxed);

        // Publish the slot to the consumer.
        self.count.fetch_add(1, Ordering::Release);
        Ok(())
    }

    /// Remove the oldest byte (consumer side).
    pub fn pop(&self) -> Option<u8> {
        if self.count.load(Ordering::Acquire) == 0 {
            return None;
        }

        let tail = self.tail.load(Ordering::Relaxed);
        // SAFETY: sole consumer, and `count > 0` means slot `tail` holds data.
        let byte = unsafe { self.storage.get().cast::<u8>().add(tail).read() };
        self.tail.store((tail + 1) % N, Ordering::Relaxed);

        // Hand the slot back to the producer.
        self.count.fetch_sub(1, Ordering::Release);
        Some(byte)
    }

    /// Look at the oldest byte without removing it (consumer side).
    pub fn peek(&self) -> Option<u8> {
        if self.count.load(Ordering::Acquire) == 0 {
            return None;
        }
        let tail = self.tail.load(Ordering::Relaxed);
        // SAFETY: as in `pop`.
        Some(unsafe { self.storage.get().cast::<u8>().add(tail).read() })
    }

    /// Number of bytes currently buffered.
    pub fn len(&self) -> usize {
        self.count.load(Ordering::Acquire)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_full(&self) -> bool {
        self.len() == N
    }

    /// Total number of slots.
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Discard all content.
    pub fn reset(&self) {
        self.head.store(0, Ordering::Relaxed);
        self.tail.store(0, Ordering::Relaxed);
        self.count.store(0, Ordering::Release);
    }
}

impl<const N: usize> Default for RingBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> ByteQueue for RingBuffer<N> {
    fn pop(&self) -> Option<u8> {
        RingBuffer::pop(self)
    }

    fn count(&self) -> usize {
        self.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_and_pop() {
        let ring: RingBuffer<4> = RingBuffer::new();
        assert!(ring.is_empty());
        assert_eq!(ring.len(), 0);

        ring.push(b'a').unwrap();
        ring.push(b'b').unwrap();
        ring.push(b'c').unwrap();
        ring.push(b'd').unwrap();
        assert_eq!(ring.len(), 4);
        assert!(ring.is_full());

        // All four slots are usable; the fifth push fails
        assert_eq!(ring.push(b'e'), Err(b'e'));

        assert_eq!(ring.pop(), Some(b'a'));
        assert_eq!(ring.pop(), Some(b'b'));
        assert_eq!(ring.pop(), Some(b'c'));
        assert_eq!(ring.pop(), Some(b'd'));
        assert_eq!(ring.pop(), None);
        assert!(ring.is_empty());
    }

    #[test]
    fn round_trip_every_fill_level() {
        const CAP: usize = 8;
        for n in 0..=CAP {
            let ring: RingBuffer<CAP> = RingBuffer::new();
            for i in 0..n {
                ring.push(i as u8 * 3).unwrap();
            }
            assert_eq!(ring.len(), n);
            for i in 0..n {
                assert_eq!(ring.pop(), Some(i as u8 * 3), "fill level {n}, index {i}");
            }
            assert_eq!(ring.pop(), None);
        }
    }

    #[test]
    fn full_ring_keeps_oldest_content() {
        let ring: RingBuffer<8> = RingBuffer::new();
        for b in b"ABCDEFGH" {
            ring.push(*b).unwrap();
        }
        assert_eq!(ring.push(b'I'), Err(b'I'));
        assert_eq!(ring.len(), 8);

        let mut out = [0u8; 8];
        for slot in out.iter_mut() {
            *slot = ring.pop().unwrap();
        }
        assert_eq!(&out, b"ABCDEFGH");
    }

    #[test]
    fn wraparound() {
        let ring: RingBuffer<3> = RingBuffer::new();

        for round in 0..10u8 {
            let base = round * 10;
            ring.push(base + 1).unwrap();
            ring.push(base + 2).unwrap();
            assert_eq!(ring.pop(), Some(base + 1));
            ring.push(base + 3).unwrap();
            assert_eq!(ring.pop(), Some(base + 2));
            assert_eq!(ring.pop(), Some(base + 3));
            assert!(ring.is_empty());
        }
    }

    #[test]
    fn interleaved_push_pop_never_loses_bytes() {
        let ring: RingBuffer<5> = RingBuffer::new();
        let mut next_in = 0u8;
        let mut next_out = 0u8;

        // Producer bursts of varying size, consumer drains a little less each time
        for burst in 1..=5usize {
            for _ in 0..burst {
                if ring.len() < ring.capacity() {
                    ring.push(next_in).unwrap();
                    next_in = next_in.wrapping_add(1);
                }
            }
            for _ in 0..burst.saturating_sub(1) {
                assert_eq!(ring.pop(), Some(next_out));
                next_out = next_out.wrapping_add(1);
            }
        }
        while let Some(b) = ring.pop() {
            assert_eq!(b, next_out);
            next_out = next_out.wrapping_add(1);
        }
        assert_eq!(next_in, next_out);
    }

    #[test]
    fn peek_does_not_consume() {
        let ring: RingBuffer<2> = RingBuffer::new();
        assert_eq!(ring.peek(), None);
        ring.push(7).unwrap();
        assert_eq!(ring.peek(), Some(7));
        assert_eq!(ring.len(), 1);
        assert_eq!(ring.pop(), Some(7));
    }

    #[test]
    fn reset_empties() {
        let ring: RingBuffer<4> = RingBuffer::new();
        ring.push(1).unwrap();
        ring.push(2).unwrap();
        ring.pop();
        ring.reset();
        assert!(ring.is_empty());
        ring.push(9).unwrap();
        assert_eq!(ring.pop(), Some(9));
    }

    #[test]
    fn concurrent_producer_and_consumer() {
        extern crate std;

        const TOTAL: usize = 10_000;
        let ring: RingBuffer<16> = RingBuffer::new();

        std::thread::scope(|s| {
            s.spawn(|| {
                let mut i = 0usize;
                while i < TOTAL {
                    if ring.push(i as u8).is_ok() {
                        i += 1;
                    } else {
                        std::thread::yield_now();
                    }
                }
            });

            let mut expected = 0usize;
            while expected < TOTAL {
                match ring.pop() {
                    Some(b) => {
                        assert_eq!(b, expected as u8);
                        expected += 1;
                    }
                    None => std::thread::yield_now(),
                }
            }
        });
        assert!(ring.is_empty());
    }
}
