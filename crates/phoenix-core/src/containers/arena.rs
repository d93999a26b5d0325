//! Bump arena over a fixed slab.
//!
//! Allocation only moves a cursor forward; individual allocations cannot be
//! freed, only the whole arena at once. For scratch runs that all die
//! together at a known point.

use serde::{Deserialize, Serialize};

/// A range handed out by [`Arena::alloc`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArenaRange {
    pub start: u32,
    pub len: u32,
}

/// Fixed-capacity bump arena of `T` slots.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Arena<T> {
    slots: Vec<T>,
    cursor: usize,
}

impl<T: Default + Clone> Arena<T> {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: vec![T::default(); capacity],
            cursor: 0,
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub fn used(&self) -> usize {
        self.cursor
    }

    #[inline]
    pub fn remaining(&self) -> usize {
        self.slots.len() - self.cursor
    }

    /// Claim `len` default-initialized slots, or `None` if they do not fit.
    pub fn alloc(&mut self, len: usize) -> Option<ArenaRange> {
        if len > self.remaining() {
            return None;
        }
        let start = self.cursor;
        for slot in &mut self.slots[start..start + len] {
            *slot = T::default();
        }
        self.cursor += len;
        Some(ArenaRange {
            start: start as u32,
            len: len as u32,
        })
    }

    pub fn get(&self, range: ArenaRange) -> &[T] {
        &self.slots[range.start as usize..(range.start + range.len) as usize]
    }

    pub fn get_mut(&mut self, range: ArenaRange) -> &mut [T] {
        &mut self.slots[range.start as usize..(range.start + range.len) as usize]
    }

    /// Free everything at once.
    pub fn reset(&mut self) {
        self.cursor = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequential_allocation() {
        let mut a: Arena<u32> = Arena::with_capacity(8);
        let r1 = a.alloc(3).unwrap();
        let r2 = a.alloc(5).unwrap();
        assert_eq!(r1.start, 0);
        assert_eq!(r2.start, 3);
        assert!(a.alloc(1).is_none());
    }

    #[test]
    fn reset_frees_everything() {
        let mut a: Arena<u8> = Arena::with_capacity(4);
        a.alloc(4).unwrap();
        assert_eq!(a.remaining(), 0);
        a.reset();
        assert_eq!(a.remaining(), 4);
        assert!(a.alloc(4).is_some());
    }

    #[test]
    fn ranges_are_zeroed_on_alloc() {
        let mut a: Arena<u32> = Arena::with_capacity(4);
        let r = a.alloc(2).unwrap();
        a.get_mut(r)[0] = 42;
        a.reset();
        let r = a.alloc(2).unwrap();
        assert_eq!(a.get(r), &[0, 0]);
    }
}
