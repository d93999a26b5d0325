//! Slot allocator with stable ids and compaction.
//!
//! Entries are addressed by a slot-local id that stays valid across
//! [`compact`](BlockAllocator::compact): an `id -> slot index` map is
//! maintained through every move. After compaction, live entries occupy
//! `[0, len)` contiguously so iteration is a straight slice walk.

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::fixed_map::FixedMap;

/// Stable identifier for an allocated entry.
pub type BlockId = u32;

/// Reserved "no entry" id.
pub const INVALID_BLOCK_ID: BlockId = 0;

#[derive(Clone, Debug, Serialize, Deserialize)]
struct Slot<T> {
    id: BlockId,
    value: T,
}

/// Fixed-capacity slot allocator with id-stable compaction.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BlockAllocator<T> {
    slots: Vec<Option<Slot<T>>>,
    index_of: FixedMap<BlockId, u32>,
    next_id: BlockId,
    live: usize,
    #[serde(skip)]
    warned_full: bool,
}

impl<T> BlockAllocator<T> {
    pub fn with_capacity(capacity: usize) -> Self {
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || None);
        Self {
            slots,
            index_of: FixedMap::with_capacity(capacity),
            next_id: 1,
            live: 0,
            warned_full: false,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.live
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.live >= self.slots.len()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Allocate a slot for `value`. Returns [`INVALID_BLOCK_ID`] when full.
    pub fn alloc(&mut self, value: T) -> BlockId {
        if self.is_full() {
            if !self.warned_full {
                self.warned_full = true;
                warn!(capacity = self.slots.len(), "block allocator exhausted");
            }
            return INVALID_BLOCK_ID;
        }
        let index = self
            .slots
            .iter()
            .position(|s| s.is_none())
            .expect("live < capacity implies a free slot");
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1).max(1);
        self.slots[index] = Some(Slot { id, value });
        self.index_of.insert(id, index as u32);
        self.live += 1;
        id
    }

    /// Release the entry with `id`. No-op on unknown ids.
    pub fn free(&mut self, id: BlockId) -> bool {
        let Some(&index) = self.index_of.get(&id) else {
            return false;
        };
        self.slots[index as usize] = None;
        self.index_of.remove(&id);
        self.live -= 1;
        true
    }

    pub fn get(&self, id: BlockId) -> Option<&T> {
        let &index = self.index_of.get(&id)?;
        self.slots[index as usize].as_ref().map(|s| &s.value)
    }

    pub fn get_mut(&mut self, id: BlockId) -> Option<&mut T> {
        let &index = self.index_of.get(&id)?;
        self.slots[index as usize].as_mut().map(|s| &mut s.value)
    }

    pub fn contains(&self, id: BlockId) -> bool {
        self.index_of.contains_key(&id)
    }

    /// Move live entries down so they occupy `[0, len)`.
    ///
    /// Walks a forward hole pointer and a backward live pointer, swapping a
    /// live entry into each hole and updating the id map during the swap.
    pub fn compact(&mut self) {
        if self.live == self.slots.len() {
            return;
        }
        let mut i = 0usize;
        let mut j = self.slots.len();
        while i < j {
            if self.slots[i].is_some() {
                i += 1;
                continue;
            }
            // Find the last live entry.
            j -= 1;
            while j > i && self.slots[j].is_none() {
                j -= 1;
            }
            if j <= i || self.slots[j].is_none() {
                break;
            }
            self.slots.swap(i, j);
            let id = self.slots[i].as_ref().map(|s| s.id).unwrap();
            self.index_of.insert(id, i as u32);
            i += 1;
        }
    }

    /// Iterate live entries in slot order. Contiguous after [`compact`](Self::compact).
    pub fn iter(&self) -> impl Iterator<Item = (BlockId, &T)> {
        self.slots
            .iter()
            .filter_map(|s| s.as_ref().map(|s| (s.id, &s.value)))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (BlockId, &mut T)> {
        self.slots
            .iter_mut()
            .filter_map(|s| s.as_mut().map(|s| (s.id, &mut s.value)))
    }
}
