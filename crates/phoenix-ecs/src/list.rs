//! Archetype list: fixed-capacity struct-of-arrays storage.
//!
//! One list holds every entity of a single archetype: a type-erased
//! [`Column`] per component plus a parallel slot array of entity ids. Slots
//! are handed out at a high-water mark that only grows until
//! [`compact`](ArchetypeList::compact) runs (between ticks); a released
//! slot keeps its storage but its entity id goes invalid, which is what
//! makes handles stale-detectable.
//!
//! # Safety
//!
//! Columns manage raw allocations driven by [`ComponentInfo`] function
//! pointers. The invariant that makes every unsafe block below sound:
//! *every slot of every column, in `[0, capacity)`, holds an initialized
//! value at all times* -- construction default-initializes the full
//! capacity, release drops and immediately re-defaults, compaction moves
//! bytes and re-defaults the vacated slot, and drop tears down the full
//! capacity. Typed access additionally checks the stored `TypeId`.

use crate::archetype::ArchetypeDefinition;
use crate::component::{Component, ComponentInfo, ComponentRegistry};
use crate::entity::EntityId;

use std::alloc::{self, Layout};
use std::any::TypeId;

// ---------------------------------------------------------------------------
// Column
// ---------------------------------------------------------------------------

/// Type-erased array of one component type, fully initialized at all times.
pub struct Column {
    data: *mut u8,
    capacity: usize,
    info: ComponentInfo,
}

// Safety: the data pointer is uniquely owned by the column; concurrent
// access is governed by the query layer, and registration bounds component
// types to `Send + Sync`.
unsafe impl Send for Column {}
unsafe impl Sync for Column {}

impl Column {
    fn layout(info: &ComponentInfo, capacity: usize) -> Option<Layout> {
        if info.size == 0 || capacity == 0 {
            return None;
        }
        Layout::from_size_align(info.size * capacity, info.align).ok()
    }

    /// Allocate and default-construct `capacity` values.
    fn new(info: ComponentInfo, capacity: usize) -> Self {
        let data = match Self::layout(&info, capacity) {
            Some(layout) => {
                let data = unsafe { alloc::alloc(layout) };
                assert!(!data.is_null(), "column allocation failed");
                data
            }
            // ZST or zero capacity: a dangling, aligned pointer.
            None => info.align as *mut u8,
        };
        let mut column = Self {
            data,
            capacity,
            info,
        };
        for slot in 0..capacity {
            unsafe { (column.info.default_fn)(column.ptr_at(slot)) };
        }
        column
    }

    #[inline]
    pub fn info(&self) -> &ComponentInfo {
        &self.info
    }

    /// Pointer to the value at `slot`.
    ///
    /// # Safety contract (internal)
    ///
    /// `slot < capacity`; callers uphold aliasing rules.
    #[inline]
    fn ptr_at(&self, slot: usize) -> *mut u8 {
        debug_assert!(slot < self.capacity || self.info.size == 0);
        if self.info.size == 0 {
            return self.info.align as *mut u8;
        }
        unsafe { self.data.add(slot * self.info.size) }
    }

    /// Base pointer for span iteration.
    #[inline]
    pub fn base_ptr(&self) -> *mut u8 {
        self.data
    }

    /// Drop the value at `slot` and re-default it.
    fn reset_slot(&mut self, slot: usize) {
        unsafe {
            (self.info.drop_fn)(self.ptr_at(slot));
            (self.info.default_fn)(self.ptr_at(slot));
        }
    }

    /// Move the value at `from` into `to` (dropping `to`'s old value) and
    /// re-default `from`.
    fn move_slot(&mut self, from: usize, to: usize) {
        if self.info.size == 0 || from == to {
            return;
        }
        unsafe {
            (self.info.drop_fn)(self.ptr_at(to));
            std::ptr::copy_nonoverlapping(self.ptr_at(from), self.ptr_at(to), self.info.size);
            (self.info.default_fn)(self.ptr_at(from));
        }
    }
}

impl Clone for Column {
    fn clone(&self) -> Self {
        let data = match Self::layout(&self.info, self.capacity) {
            Some(layout) => {
                let data = unsafe { alloc::alloc(layout) };
                assert!(!data.is_null(), "column allocation failed");
                data
            }
            None => self.info.align as *mut u8,
        };
        let clone = Self {
            data,
            capacity: self.capacity,
            info: self.info,
        };
        for slot in 0..self.capacity {
            unsafe { (self.info.clone_fn)(self.ptr_at(slot), clone.ptr_at(slot)) };
        }
        clone
    }
}

impl Drop for Column {
    fn drop(&mut self) {
        for slot in 0..self.capacity {
            unsafe { (self.info.drop_fn)(self.ptr_at(slot)) };
        }
        if let Some(layout) = Self::layout(&self.info, self.capacity) {
            unsafe { alloc::dealloc(self.data, layout) };
        }
    }
}

impl std::fmt::Debug for Column {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Column")
            .field("component", &self.info.name)
            .field("capacity", &self.capacity)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// ArchetypeList
// ---------------------------------------------------------------------------

/// All entities of one archetype, SoA-packed.
#[derive(Debug, Clone)]
pub struct ArchetypeList {
    definition: ArchetypeDefinition,
    columns: Vec<Column>,
    /// Slot prefix: which entity occupies each row ([`EntityId::INVALID`]
    /// for free rows).
    entities: Vec<EntityId>,
    high_water: usize,
    live: usize,
}

impl ArchetypeList {
    /// Create storage for `capacity` entities of `definition`'s shape.
    pub fn new(
        definition: ArchetypeDefinition,
        registry: &ComponentRegistry,
        capacity: usize,
    ) -> Option<Self> {
        let mut columns = Vec::with_capacity(definition.num_components());
        for slot in definition.components() {
            let info = registry.info(slot.name)?;
            columns.push(Column::new(*info, capacity));
        }
        Some(Self {
            definition,
            columns,
            entities: vec![EntityId::INVALID; capacity],
            high_water: 0,
            live: 0,
        })
    }

    #[inline]
    pub fn definition(&self) -> &ArchetypeDefinition {
        &self.definition
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.entities.len()
    }

    /// Rows in `[0, high_water)` may be live; the mark only grows until
    /// [`compact`](Self::compact).
    #[inline]
    pub fn high_water(&self) -> usize {
        self.high_water
    }

    #[inline]
    pub fn live(&self) -> usize {
        self.live
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    #[inline]
    pub fn entity_at(&self, slot: usize) -> EntityId {
        self.entities.get(slot).copied().unwrap_or(EntityId::INVALID)
    }

    #[inline]
    pub fn entity_slots(&self) -> &[EntityId] {
        &self.entities[..self.high_water]
    }

    pub fn column_index(&self, name: phoenix_core::Name) -> Option<usize> {
        self.definition.index_of(name)
    }

    #[inline]
    pub fn column(&self, index: usize) -> Option<&Column> {
        self.columns.get(index)
    }

    /// Claim the next slot for `entity`. Components arrive
    /// default-constructed. `None` when the high-water mark hits capacity.
    pub fn acquire_slot(&mut self, entity: EntityId) -> Option<u32> {
        if !entity.is_valid() || self.high_water >= self.capacity() {
            return None;
        }
        let slot = self.high_water;
        self.high_water += 1;
        self.live += 1;
        self.entities[slot] = entity;
        // Storage is already default-initialized (construction or release
        // re-defaulted it), so nothing to construct here.
        Some(slot as u32)
    }

    /// Release a slot, validating that it still belongs to `entity`.
    pub fn release_slot(&mut self, slot: u32, entity: EntityId) -> bool {
        let slot = slot as usize;
        if slot >= self.high_water || self.entities[slot] != entity || !entity.is_valid() {
            return false;
        }
        for column in &mut self.columns {
            column.reset_slot(slot);
        }
        self.entities[slot] = EntityId::INVALID;
        self.live -= 1;
        true
    }

    /// Typed component access; `None` on stale slots, absent components, or
    /// a type whose `TypeId` does not match the registered descriptor.
    pub fn get<T: Component>(&self, slot: u32, entity: EntityId) -> Option<&T> {
        let ptr = self.typed_ptr::<T>(slot, entity)?;
        Some(unsafe { &*ptr })
    }

    /// Typed mutable access with the same validity checks as [`get`](Self::get).
    pub fn get_mut<T: Component>(&mut self, slot: u32, entity: EntityId) -> Option<&mut T> {
        let ptr = self.typed_ptr::<T>(slot, entity)?;
        Some(unsafe { &mut *ptr })
    }

    fn typed_ptr<T: Component>(&self, slot: u32, entity: EntityId) -> Option<*mut T> {
        let index = self.column_index(T::component_name())?;
        let column = &self.columns[index];
        if column.info.type_id != TypeId::of::<T>() {
            return None;
        }
        let slot = slot as usize;
        if slot >= self.high_water || self.entities[slot] != entity || !entity.is_valid() {
            return None;
        }
        Some(column.ptr_at(slot).cast::<T>())
    }

    /// Squeeze out released slots so live rows occupy `[0, live)`.
    ///
    /// Must run between ticks (no outstanding spans). `on_moved` fires for
    /// every relocated entity so the entity table can re-point its handle.
    pub fn compact(&mut self, mut on_moved: impl FnMut(EntityId, u32)) {
        let mut hole = 0usize;
        let mut tail = self.high_water;
        while hole < tail {
            if self.entities[hole].is_valid() {
                hole += 1;
                continue;
            }
            // Pull the last live row down into the hole.
            tail -= 1;
            while tail > hole && !self.entities[tail].is_valid() {
                tail -= 1;
            }
            if tail <= hole || !self.entities[tail].is_valid() {
                break;
            }
            for column in &mut self.columns {
                column.move_slot(tail, hole);
            }
            let moved = self.entities[tail];
            self.entities[hole] = moved;
            self.entities[tail] = EntityId::INVALID;
            on_moved(moved, hole as u32);
            hole += 1;
        }
        self.high_water = self.live;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
