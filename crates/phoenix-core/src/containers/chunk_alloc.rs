//! Homogeneous fixed-size chunk allocator.
//!
//! Hands out chunks of `chunk_len` default-initialized values from a
//! bounded pool. Freed chunks go on a free list and are recycled in LIFO
//! order. For subsystems that need many same-shaped storage runs with
//! O(1) allocation.

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Index of an allocated chunk.
pub type ChunkId = u32;

/// Reserved "no chunk" id.
pub const INVALID_CHUNK_ID: ChunkId = u32::MAX;

/// Fixed pool of fixed-size chunks.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChunkAllocator<T> {
    chunks: Vec<Option<Vec<T>>>,
    free: Vec<ChunkId>,
    chunk_len: usize,
    #[serde(skip)]
    warned_full: bool,
}

impl<T: Default + Clone> ChunkAllocator<T> {
    pub fn new(chunk_len: usize, max_chunks: usize) -> Self {
        let mut chunks = Vec::with_capacity(max_chunks);
        chunks.resize_with(max_chunks, || None);
        Self {
            chunks,
            free: Vec::with_capacity(max_chunks),
            chunk_len,
            warned_full: false,
        }
    }

    #[inline]
    pub fn chunk_len(&self) -> usize {
        self.chunk_len
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.chunks.len()
    }

    /// Number of chunks currently allocated.
    pub fn len(&self) -> usize {
        self.chunks.iter().filter(|c| c.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Allocate a zeroed chunk. Returns [`INVALID_CHUNK_ID`] when the pool
    /// is exhausted.
    pub fn alloc(&mut self) -> ChunkId {
        let id = if let Some(id) = self.free.pop() {
            id
        } else if let Some(index) = self.chunks.iter().position(|c| c.is_none()) {
            index as ChunkId
        } else {
            if !self.warned_full {
                self.warned_full = true;
                warn!(capacity = self.chunks.len(), "chunk allocator exhausted");
            }
            return INVALID_CHUNK_ID;
        };
        self.chunks[id as usize] = Some(vec![T::default(); self.chunk_len]);
        id
    }

    /// Return a chunk to the pool.
    pub fn free(&mut self, id: ChunkId) -> bool {
        match self.chunks.get_mut(id as usize) {
            Some(slot @ Some(_)) => {
                *slot = None;
                self.free.push(id);
                true
            }
            _ => false,
        }
    }

    pub fn chunk(&self, id: ChunkId) -> Option<&[T]> {
        self.chunks.get(id as usize)?.as_deref()
    }

    pub fn chunk_mut(&mut self, id: ChunkId) -> Option<&mut [T]> {
        self.chunks.get_mut(id as usize)?.as_deref_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alloc_gives_zeroed_chunks() {
        let mut a: ChunkAllocator<u32> = ChunkAllocator::new(4, 2);
        let c = a.alloc();
        assert_ne!(c, INVALID_CHUNK_ID);
        assert_eq!(a.chunk(c).unwrap(), &[0, 0, 0, 0]);
    }

    #[test]
    fn exhaustion_and_recycling() {
        let mut a: ChunkAllocator<u8> = ChunkAllocator::new(2, 2);
        let c0 = a.alloc();
        let c1 = a.alloc();
        assert_eq!(a.alloc(), INVALID_CHUNK_ID);

        a.chunk_mut(c0).unwrap()[0] = 99;
        assert!(a.free(c0));
        assert!(!a.free(c0));

        // Recycled chunk comes back zeroed.
        let c2 = a.alloc();
        assert_eq!(c2, c0);
        assert_eq!(a.chunk(c2).unwrap(), &[0, 0]);
        assert_eq!(a.len(), 2);
        let _ = c1;
    }

    #[test]
    fn invalid_ids_resolve_to_none() {
        let a: ChunkAllocator<u8> = ChunkAllocator::new(2, 2);
        assert!(a.chunk(0).is_none());
        assert!(a.chunk(INVALID_CHUNK_ID).is_none());
    }
}
