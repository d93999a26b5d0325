//! Entity identifiers, handles, and the slot table.
//!
//! An [`EntityId`] is a nonzero `u32` that encodes its slot:
//! `slot = id % capacity`, so resolving an id is one modulo and one array
//! read. When a slot is recycled the new id is the old id plus the table
//! capacity -- same slot, different id -- which makes stale ids immediately
//! detectable: a slot is live iff the id stored in it equals the id being
//! asked about.

use serde::{Deserialize, Serialize};
use std::fmt;

use phoenix_core::Name;

// ---------------------------------------------------------------------------
// EntityId
// ---------------------------------------------------------------------------

/// Identifier for a simulation entity. Zero is reserved for "invalid".
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct EntityId(pub u32);

impl EntityId {
    pub const INVALID: EntityId = EntityId(0);

    #[inline]
    pub const fn is_valid(self) -> bool {
        self.0 != 0
    }

    /// The slot this id occupies in a table of `capacity` entries.
    #[inline]
    pub const fn slot(self, capacity: u32) -> u32 {
        self.0 % capacity
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityId({})", self.0)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// EntityHandle
// ---------------------------------------------------------------------------

/// Location of an entity's archetype row: owning list, slot index, and the
/// entity id that disambiguates slot reuse.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EntityHandle {
    /// Id of the owning archetype list.
    pub owner: u32,
    /// Row index within the list.
    pub slot: u32,
    /// The entity this handle was issued for.
    pub entity: EntityId,
}

impl EntityHandle {
    pub const INVALID: EntityHandle = EntityHandle {
        owner: 0,
        slot: 0,
        entity: EntityId::INVALID,
    };

    #[inline]
    pub const fn is_valid(self) -> bool {
        self.entity.is_valid()
    }
}

// ---------------------------------------------------------------------------
// Entity record
// ---------------------------------------------------------------------------

/// Per-entity bookkeeping stored in the entity table.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,
    /// The archetype kind this entity was spawned as.
    pub kind: Name,
    /// Row location in archetype storage.
    pub archetype: EntityHandle,
    /// Head of the intrusive tag list (-1 when empty).
    pub tag_head: i32,
}

impl Entity {
    pub const NO_TAGS: i32 = -1;
}

// ---------------------------------------------------------------------------
// EntityTable
// ---------------------------------------------------------------------------

/// Fixed-capacity table of entity records addressed by `id % capacity`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EntityTable {
    slots: Vec<Entity>,
    alive: Vec<bool>,
    /// Rotating scan cursor so allocation does not always probe slot 0.
    cursor: u32,
    live: u32,
}

impl EntityTable {
    pub fn with_capacity(capacity: u32) -> Self {
        assert!(capacity > 0);
        Self {
            slots: vec![Entity::default(); capacity as usize],
            alive: vec![false; capacity as usize],
            cursor: 0,
            live: 0,
        }
    }

    #[inline]
    pub fn capacity(&self) -> u32 {
        self.slots.len() as u32
    }

    #[inline]
    pub fn len(&self) -> u32 {
        self.live
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.live == self.capacity()
    }

    /// Allocate a fresh id. The recycled id for a slot is always the slot's
    /// previous id plus the capacity, so `id % capacity` stays put and old
    /// ids go stale. Returns [`EntityId::INVALID`] when the table is full.
    pub fn allocate(&mut self, kind: Name) -> EntityId {
        if self.is_full() {
            return EntityId::INVALID;
        }
        let capacity = self.capacity();
        for probe in 0..capacity {
            let slot = (self.cursor + probe) % capacity;
            if self.alive[slot as usize] {
                continue;
            }
            self.cursor = (slot + 1) % capacity;
            let prev = self.slots[slot as usize].id.0;
            let id = if prev == 0 {
                // First use: the smallest id congruent to `slot` and nonzero.
                if slot == 0 {
                    capacity
                } else {
                    slot
                }
            } else {
                prev.wrapping_add(capacity)
            };
            let id = EntityId(id);
            self.slots[slot as usize] = Entity {
                id,
                kind,
                archetype: EntityHandle::INVALID,
                tag_head: Entity::NO_TAGS,
            };
            self.alive[slot as usize] = true;
            self.live += 1;
            return id;
        }
        EntityId::INVALID
    }

    /// Claim a specific id (driver-chosen, e.g. lockstep spawn actions).
    /// Fails when the slot is occupied by a different live entity.
    pub fn allocate_with_id(&mut self, id: EntityId, kind: Name) -> bool {
        if !id.is_valid() {
            return false;
        }
        let slot = id.slot(self.capacity()) as usize;
        if self.alive[slot] {
            return false;
        }
        self.slots[slot] = Entity {
            id,
            kind,
            archetype: EntityHandle::INVALID,
            tag_head: Entity::NO_TAGS,
        };
        self.alive[slot] = true;
        self.live += 1;
        true
    }

    /// Drop a record. Returns `false` on stale or unknown ids.
    pub fn release(&mut self, id: EntityId) -> bool {
        let Some(slot) = self.resolve_slot(id) else {
            return false;
        };
        self.alive[slot] = false;
        self.live -= 1;
        true
    }

    #[inline]
    fn resolve_slot(&self, id: EntityId) -> Option<usize> {
        if !id.is_valid() {
            return None;
        }
        let slot = id.slot(self.capacity()) as usize;
        if self.alive[slot] && self.slots[slot].id == id {
            Some(slot)
        } else {
            None
        }
    }

    #[inline]
    pub fn is_alive(&self, id: EntityId) -> bool {
        self.resolve_slot(id).is_some()
    }

    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.resolve_slot(id).map(|slot| &self.slots[slot])
    }

    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        let slot = self.resolve_slot(id)?;
        Some(&mut self.slots[slot])
    }

    /// Iterate live records in slot order.
    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.slots
            .iter()
            .zip(&self.alive)
            .filter_map(|(e, &alive)| alive.then_some(e))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
