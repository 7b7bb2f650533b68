//! Single-producer, single-consumer byte ring for UART data.
//!
//! One side (say, the TX interrupt handler) only ever advances the read
//! index, the other (foreground code calling `write`) only ever advances the
//! write index. Both indices are free-running counters; the slot is
//! `index & (N - 1)`, so `N` must be a power of two.
//!
//! Access goes through [`Producer`] and [`Consumer`] views. A buffer owned by
//! one piece of code is [`split`](RingBuffer::split) safely; a buffer living
//! in a `static` shared with an ISR hands out views through the `unsafe`
//! [`producer`](RingBuffer::producer) / [`consumer`](RingBuffer::consumer)
//! accessors, and the caller promises each view is used from one context.

use core::cell::UnsafeCell;
use core::marker::PhantomData;
use core::sync::atomic::{AtomicUsize, Ordering};

use common::sync::{IrqControl, without_interrupts};

/// Fixed-capacity circular byte queue.
pub struct RingBuffer<I: IrqControl, const N: usize> {
    buffer: UnsafeCell<[u8; N]>,
    write: AtomicUsize, // Advanced by the producer only
    read: AtomicUsize,  // Advanced by the consumer only
    _irq: PhantomData<I>,
}

// SAFETY: a slot is written by the producer before the Release store of
// `write` publishes it, and read by the consumer only after an Acquire load
// of `write` shows it. The consumer's Release store of `read` hands the slot
// back the same way.
unsafe impl<I: IrqControl, const N: usize> Sync for RingBuffer<I, N> {}

impl<I: IrqControl, const N: usize> RingBuffer<I, N> {
    const MASK: usize = N - 1;

    /// Create a new empty ring buffer
    pub const fn new() -> Self {
        const { assert!(N.is_power_of_two(), "ring buffer capacity must be a power of two") };

        Self {
            buffer: UnsafeCell::new([0; N]),
            write: AtomicUsize::new(0),
            read: AtomicUsize::new(0),
            _irq: PhantomData,
        }
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    /// Number of bytes queued.
    ///
    /// Reads both indices, so it runs with interrupts masked.
    pub fn len(&self) -> usize {
        without_interrupts::<I, _>(|| {
            let write = self.write.load(Ordering::Acquire);
            let read = self.read.load(Ordering::Acquire);
            write.wrapping_sub(read)
        })
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_full(&self) -> bool {
        self.len() == N
    }

    /// Drop everything queued.
    ///
    /// Both indices move, so neither side may be mid-operation; interrupts
    /// are masked for the duration. Callers on the other core (if any) must
    /// be stopped separately.
    pub fn clear(&self) {
        without_interrupts::<I, _>(|| {
            self.read.store(0, Ordering::Release);
            self.write.store(0, Ordering::Release);
        });
    }

    /// Split an exclusively borrowed buffer into its two ends.
    pub fn split(&mut self) -> (Producer<'_, I, N>, Consumer<'_, I, N>) {
        let ring: &Self = self;
        (Producer { ring }, Consumer { ring })
    }

    /// Producer view of a shared buffer.
    ///
    /// # Safety
    ///
    /// At any time at most one execution context may push into this buffer.
    pub unsafe fn producer(&self) -> Producer<'_, I, N> {
        Producer { ring: self }
    }

    /// Consumer view of a shared buffer.
    ///
    /// # Safety
    ///
    /// At any time at most one execution context may pop from this buffer.
    pub unsafe fn consumer(&self) -> Consumer<'_, I, N> {
        Consumer { ring: self }
    }

    #[inline]
    fn slot(&self, index: usize) -> *mut u8 {
        // SAFETY: masked index is always < N.
        unsafe { self.buffer.get().cast::<u8>().add(index & Self::MASK) }
    }
}

impl<I: IrqControl, const N: usize> Default for RingBuffer<I, N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Write end of a [`RingBuffer`].
pub struct Producer<'a, I: IrqControl, const N: usize> {
    ring: &'a RingBuffer<I, N>,
}

impl<I: IrqControl, const N: usize> Producer<'_, I, N> {
    /// Append `byte`; returns `false` and drops it when the buffer is full.
    pub fn try_push(&mut self, byte: u8) -> bool {
        let write = self.ring.write.load(Ordering::Relaxed);
        let read = self.ring.read.load(Ordering::Acquire);

        if write.wrapping_sub(read) == N {
            return false;
        }

        // SAFETY: the slot at `write` is outside the consumer's visible range
        // until the store below.
        unsafe { self.ring.slot(write).write(byte) };
        self.ring.write.store(write.wrapping_add(1), Ordering::Release);
        true
    }

    pub fn is_full(&self) -> bool {
        let write = self.ring.write.load(Ordering::Relaxed);
        let read = self.ring.read.load(Ordering::Acquire);
        write.wrapping_sub(read) == N
    }
}

/// Read end of a [`RingBuffer`].
pub struct Consumer<'a, I: IrqControl, const N: usize> {
    ring: &'a RingBuffer<I, N>,
}

impl<I: IrqControl, const N: usize> Consumer<'_, I, N> {
    /// Remove the oldest byte.
    pub fn try_pop(&mut self) -> Option<u8> {
        let byte = self.peek()?;
        let read = self.ring.read.load(Ordering::Relaxed);
        self.ring.read.store(read.wrapping_add(1), Ordering::Release);
        Some(byte)
    }

    /// Look at the oldest byte without removing it.
    pub fn peek(&self) -> Option<u8> {
        let read = self.ring.read.load(Ordering::Relaxed);
        let write = self.ring.write.load(Ordering::Acquire);

        if read == write {
            return None;
        }

        // SAFETY: the producer published this slot and will not reuse it
        // until `read` moves past it.
        Some(unsafe { self.ring.slot(read).read() })
    }

    pub fn is_empty(&self) -> bool {
        self.peek().is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::arch::host::irq::HostIrq;

    type Ring<const N: usize> = RingBuffer<HostIrq, N>;

    #[test]
    fn test_fifo_order_with_interleaving() {
        let ring = Ring::<8>::new();
        // SAFETY: single-threaded test, one view of each kind.
        let (mut tx, mut rx) = unsafe { (ring.producer(), ring.consumer()) };

        let mut expected = 0u8;
        let mut next = 0u8;
        let mut pushes = 0usize;
        let mut pops = 0usize;

        // Push three, pop two, repeatedly; wraps the ring several times.
        for _ in 0..20 {
            for _ in 0..3 {
                if tx.try_push(next) {
                    next = next.wrapping_add(1);
                    pushes += 1;
                }
                assert_eq!(ring.len(), pushes - pops);
            }
            for _ in 0..2 {
                if let Some(byte) = rx.try_pop() {
                    assert_eq!(byte, expected);
                    expected = expected.wrapping_add(1);
                    pops += 1;
                }
                assert_eq!(ring.len(), pushes - pops);
            }
        }

        while let Some(byte) = rx.try_pop() {
            assert_eq!(byte, expected);
            expected = expected.wrapping_add(1);
            pops += 1;
            assert_eq!(ring.len(), pushes - pops);
        }
        assert_eq!(expected, next);
        assert!(ring.is_empty());
    }

    #[test]
    fn test_full_buffer_drops_newest() {
        let mut ring = Ring::<4>::new();
        {
            let (mut tx, _) = ring.split();
            for byte in 1..=4 {
                assert!(tx.try_push(byte));
            }
            assert!(tx.is_full());
            assert!(!tx.try_push(5));
        }
        assert!(ring.is_full());
        assert_eq!(ring.len(), 4);

        let (_, mut rx) = ring.split();
        assert_eq!(rx.try_pop(), Some(1));
        assert_eq!(rx.try_pop(), Some(2));
        assert_eq!(rx.try_pop(), Some(3));
        assert_eq!(rx.try_pop(), Some(4));
        assert_eq!(rx.try_pop(), None);
    }

    #[test]
    fn test_peek_does_not_consume() {
        let mut ring = Ring::<2>::new();
        let (mut tx, mut rx) = ring.split();

        assert_eq!(rx.peek(), None);
        tx.try_push(b'x');
        assert_eq!(rx.peek(), Some(b'x'));
        assert_eq!(rx.peek(), Some(b'x'));
        assert_eq!(rx.try_pop(), Some(b'x'));
        assert!(rx.is_empty());
    }

    #[test]
    fn test_clear_resets_count() {
        let mut ring = Ring::<4>::new();
        {
            let (mut tx, _) = ring.split();
            tx.try_push(1);
            tx.try_push(2);
        }
        ring.clear();
        assert!(ring.is_empty());

        let (mut tx, mut rx) = ring.split();
        assert!(tx.try_push(9));
        assert_eq!(rx.try_pop(), Some(9));
    }

    #[test]
    fn test_capacity_one() {
        let mut ring = Ring::<1>::new();
        let (mut tx, mut rx) = ring.split();

        assert!(tx.try_push(b'H'));
        assert!(!tx.try_push(b'i'));
        assert_eq!(rx.try_pop(), Some(b'H'));
        assert_eq!(rx.try_pop(), None);
    }

    #[test]
    fn test_concurrent_producer_consumer() {
        const COUNT: usize = 10_000;
        let mut ring = Ring::<16>::new();
        let (mut tx, mut rx) = ring.split();

        std::thread::scope(|s| {
            s.spawn(move || {
                for i in 0..COUNT {
                    while !tx.try_push(i as u8) {
                        std::hint::spin_loop();
                    }
                }
            });

            for i in 0..COUNT {
                let byte = loop {
                    if let Some(byte) = rx.try_pop() {
                        break byte;
                    }
                    std::hint::spin_loop();
                };
                assert_eq!(byte, i as u8);
            }
        });
    }
}
