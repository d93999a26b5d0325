//! Fixed-capacity single-threaded ring queue.

use serde::{Deserialize, Serialize};

/// FIFO ring buffer with capacity fixed at construction.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FixedRingQueue<T> {
    slots: Vec<Option<T>>,
    head: usize,
    len: usize,
}

impl<T> FixedRingQueue<T> {
    pub fn with_capacity(capacity: usize) -> Self {
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || None);
        Self {
            slots,
            head: 0,
            len: 0,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.len == self.slots.len()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Enqueue at the tail. Returns `false` when full.
    pub fn enqueue(&mut self, value: T) -> bool {
        if self.is_full() {
            return false;
        }
        let tail = (self.head + self.len) % self.slots.len();
        self.slots[tail] = Some(value);
        self.len += 1;
        true
    }

    /// Dequeue from the head.
    pub fn dequeue(&mut self) -> Option<T> {
        if self.len == 0 {
            return None;
        }
        let value = self.slots[self.head].take();
        self.head = (self.head + 1) % self.slots.len();
        self.len -= 1;
        value
    }

    pub fn peek(&self) -> Option<&T> {
        if self.len == 0 {
            return None;
        }
        self.slots[self.head].as_ref()
    }

    pub fn clear(&mut self) {
        for slot in &mut self.slots {
            *slot = None;
        }
        self.head = 0;
        self.len = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fifo_order() {
        let mut q = FixedRingQueue::with_capacity(3);
        assert!(q.enqueue(1));
        assert!(q.enqueue(2));
        assert!(q.enqueue(3));
        assert!(!q.enqueue(4));
        assert_eq!(q.dequeue(), Some(1));
        assert_eq!(q.dequeue(), Some(2));
        assert_eq!(q.dequeue(), Some(3));
        assert_eq!(q.dequeue(), None);
    }

    #[test]
    fn wraps_around() {
        let mut q = FixedRingQueue::with_capacity(2);
        for round in 0..10 {
            assert!(q.enqueue(round));
            assert_eq!(q.dequeue(), Some(round));
        }
        assert!(q.is_empty());
    }

    #[test]
    fn peek_does_not_consume() {
        let mut q = FixedRingQueue::with_capacity(2);
        q.enqueue(9);
        assert_eq!(q.peek(), Some(&9));
        assert_eq!(q.len(), 1);
        assert_eq!(q.dequeue(), Some(9));
    }

    #[test]
    fn clear_resets() {
        let mut q = FixedRingQueue::with_capacity(2);
        q.enqueue(1);
        q.enqueue(2);
        q.clear();
        assert!(q.is_empty());
        assert!(q.enqueue(3));
        assert_eq!(q.dequeue(), Some(3));
    }
}
