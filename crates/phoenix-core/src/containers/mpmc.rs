//! Bounded lock-free multi-producer multi-consumer queue.
//!
//! Per-cell sequence numbers arbitrate producers and consumers: an enqueue
//! claims a cell whose sequence equals the producer cursor, CASes the
//! cursor forward, writes the payload, then release-stores `pos + 1` into
//! the cell; a dequeue waits for `pos + 1`, claims, reads, and releases the
//! cell at `pos + capacity` for the next lap.
//!
//! Multi-producer submission order is decided by CAS winning order, which
//! makes this queue inherently nondeterministic. It is used only by the
//! thread-pool scheduler; simulation-visible ordering is always
//! reintroduced by an explicit sort downstream.

use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicUsize, Ordering};

struct Cell<T> {
    sequence: AtomicUsize,
    data: UnsafeCell<MaybeUninit<T>>,
}

/// Bounded MPMC queue. Capacity is rounded up to a power of two.
pub struct MpmcQueue<T> {
    buffer: Box<[Cell<T>]>,
    mask: usize,
    enqueue_pos: AtomicUsize,
    dequeue_pos: AtomicUsize,
}

// Safety: cells are handed to exactly one producer and one consumer by the
// sequence protocol; payloads move across threads, so `T: Send` is required.
unsafe impl<T: Send> Send for MpmcQueue<T> {}
unsafe impl<T: Send> Sync for MpmcQueue<T> {}

impl<T> MpmcQueue<T> {
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(2).next_power_of_two();
        let buffer: Box<[Cell<T>]> = (0..capacity)
            .map(|i| Cell {
                sequence: AtomicUsize::new(i),
                data: UnsafeCell::new(MaybeUninit::uninit()),
            })
            .collect();
        Self {
            buffer,
            mask: capacity - 1,
            enqueue_pos: AtomicUsize::new(0),
            dequeue_pos: AtomicUsize::new(0),
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    /// Attempt to enqueue. Returns the value back when the queue is full.
    pub fn try_enqueue(&self, value: T) -> Result<(), T> {
        let mut pos = self.enqueue_pos.load(Ordering::Relaxed);
        loop {
            let cell = &self.buffer[pos & self.mask];
            let seq = cell.sequence.load(Ordering::Acquire);
            let diff = seq as isize - pos as isize;
            if diff == 0 {
                if self
                    .enqueue_pos
                    .compare_exchange_weak(pos, pos + 1, Ordering::Relaxed, Ordering::Relaxed)
                    .is_ok()
                {
                    // Safety: winning the CAS grants exclusive write access
                    // to this cell until the sequence store below.
                    unsafe {
                        (*cell.data.get()).write(value);
                    }
                    cell.sequence.store(pos + 1, Ordering::Release);
                    return Ok(());
                }
                pos = self.enqueue_pos.load(Ordering::Relaxed);
            } else if diff < 0 {
                return Err(value);
            } else {
                pos = self.enqueue_pos.load(Ordering::Relaxed);
            }
        }
    }

    /// Attempt to dequeue.
    pub fn try_dequeue(&self) -> Option<T> {
        let mut pos = self.dequeue_pos.load(Ordering::Relaxed);
        loop {
            let cell = &self.buffer[pos & self.mask];
            let seq = cell.sequence.load(Ordering::Acquire);
            let diff = seq as isize - (pos + 1) as isize;
            if diff == 0 {
                if self
                    .dequeue_pos
                    .compare_exchange_weak(pos, pos + 1, Ordering::Relaxed, Ordering::Relaxed)
                    .is_ok()
                {
                    // Safety: winning the CAS grants exclusive read access
                    // to the initialized payload in this cell.
                    let value = unsafe { (*cell.data.get()).assume_init_read() };
                    cell.sequence
                        .store(pos + self.buffer.len(), Ordering::Release);
                    return Some(value);
                }
                pos = self.dequeue_pos.load(Ordering::Relaxed);
            } else if diff < 0 {
                return None;
            } else {
                pos = self.dequeue_pos.load(Ordering::Relaxed);
            }
        }
    }

    /// Cursor equality; racy by nature, used only for idle detection.
    pub fn is_empty(&self) -> bool {
        self.enqueue_pos.load(Ordering::Relaxed) == self.dequeue_pos.load(Ordering::Relaxed)
    }
}

impl<T> Drop for MpmcQueue<T> {
    fn drop(&mut self) {
        // Drain any payloads still in flight so they drop exactly once.
        while self.try_dequeue().is_some() {}
    }
}
