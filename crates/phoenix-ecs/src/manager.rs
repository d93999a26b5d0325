//! The archetype manager: definitions, lists, and dispatch.
//!
//! One manager per world. It owns the component registry, the archetype
//! definitions keyed by kind name, and the archetype lists (one per unique
//! definition hash, allocated from a slot allocator so list ids stay stable
//! across compaction).
//!
//! Structural operations (acquire, release, compact) must happen outside
//! parallel regions; queries hand out spans whose validity depends on it.

use tracing::debug;

use phoenix_core::containers::{BlockAllocator, BlockId, FixedMap};
use phoenix_core::Name;

use crate::archetype::ArchetypeDefinition;
use crate::component::{Component, ComponentRegistry};
use crate::entity::{EntityHandle, EntityId, EntityTable};
use crate::list::ArchetypeList;
use crate::query::{ComponentTuple, EntityComponentSpan, QueryFilter};
use crate::tag::TagPool;
use crate::EcsError;

/// Sizing for a manager's storage pools.
#[derive(Clone, Copy, Debug)]
pub struct ManagerConfig {
    /// Most distinct component types.
    pub max_components: usize,
    /// Most distinct archetype kinds.
    pub max_archetypes: usize,
    /// Entity capacity of each archetype list.
    pub list_capacity: usize,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            max_components: 64,
            max_archetypes: 64,
            list_capacity: 4096,
        }
    }
}

/// Per-world archetype storage and dispatch.
#[derive(Clone, Debug)]
pub struct ArchetypeManager {
    registry: ComponentRegistry,
    definitions: FixedMap<Name, ArchetypeDefinition>,
    lists: BlockAllocator<ArchetypeList>,
    lists_by_hash: FixedMap<u32, BlockId>,
    list_capacity: usize,
}

impl ArchetypeManager {
    pub fn new(config: ManagerConfig) -> Self {
        Self {
            registry: ComponentRegistry::with_capacity(config.max_components),
            definitions: FixedMap::with_capacity(config.max_archetypes),
            lists: BlockAllocator::with_capacity(config.max_archetypes),
            lists_by_hash: FixedMap::with_capacity(config.max_archetypes),
            list_capacity: config.list_capacity,
        }
    }

    #[inline]
    pub fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    /// Register a component type for use in archetypes.
    pub fn register_component<T: Component>(&mut self) -> Name {
        self.registry.register::<T>()
    }

    /// Register an archetype kind over already-registered components.
    pub fn register_archetype(&mut self, kind: Name, components: &[Name]) -> Result<(), EcsError> {
        if self.definitions.contains_key(&kind) {
            return Ok(());
        }
        for &name in components {
            if !self.registry.contains(name) {
                return Err(EcsError::UnknownComponent { name });
            }
        }
        let definition = ArchetypeDefinition::new(kind, components, &self.registry)
            .ok_or(EcsError::InvalidArchetype { kind })?;
        if !self.definitions.insert(kind, definition) {
            return Err(EcsError::CapacityExhausted { what: "archetypes" });
        }
        debug!(?kind, count = components.len(), "archetype registered");
        Ok(())
    }

    pub fn definition(&self, kind: Name) -> Option<&ArchetypeDefinition> {
        self.definitions.get(&kind)
    }

    /// Allocate archetype storage for an entity of `kind`.
    ///
    /// Returns [`EntityHandle::INVALID`] when the kind is unknown or the
    /// backing list is exhausted, per the capacity-failure contract.
    pub fn acquire(&mut self, entity: EntityId, kind: Name) -> EntityHandle {
        let Some(definition) = self.definitions.get(&kind) else {
            return EntityHandle::INVALID;
        };
        let hash = definition.hash();

        let list_id = match self.lists_by_hash.get(&hash) {
            Some(&id) => id,
            None => {
                let Some(list) =
                    ArchetypeList::new(definition.clone(), &self.registry, self.list_capacity)
                else {
                    return EntityHandle::INVALID;
                };
                let id = self.lists.alloc(list);
                if id == phoenix_core::containers::INVALID_BLOCK_ID {
                    return EntityHandle::INVALID;
                }
                self.lists_by_hash.insert(hash, id);
                id
            }
        };

        let Some(list) = self.lists.get_mut(list_id) else {
            return EntityHandle::INVALID;
        };
        match list.acquire_slot(entity) {
            Some(slot) => EntityHandle {
                owner: list_id,
                slot,
                entity,
            },
            None => EntityHandle::INVALID,
        }
    }

    /// Release an entity's archetype row. Component destructors run here;
    /// the slot itself is reclaimed by the next [`compact`](Self::compact).
    pub fn release(&mut self, handle: EntityHandle) -> bool {
        if !handle.is_valid() {
            return false;
        }
        let Some(list) = self.lists.get_mut(handle.owner) else {
            return false;
        };
        list.release_slot(handle.slot, handle.entity)
    }

    /// Typed component read through a handle. `None` on stale handles or
    /// absent components.
    pub fn get_component<T: Component>(&self, handle: EntityHandle) -> Option<&T> {
        self.lists.get(handle.owner)?.get(handle.slot, handle.entity)
    }

    /// Typed component write through a handle.
    pub fn get_component_mut<T: Component>(&mut self, handle: EntityHandle) -> Option<&mut T> {
        self.lists
            .get_mut(handle.owner)?
            .get_mut(handle.slot, handle.entity)
    }

    /// Ids of non-empty lists whose archetype passes `filter`.
    pub fn matching_lists(&self, filter: &QueryFilter) -> Vec<BlockId> {
        self.lists
            .iter()
            .filter(|(_, list)| !list.is_empty() && filter.passes_definition(list.definition()))
            .map(|(id, _)| id)
            .collect()
    }

    pub fn list(&self, id: BlockId) -> Option<&ArchetypeList> {
        self.lists.get(id)
    }

    /// Build a span over one list for the tuple `Q`.
    ///
    /// # Safety
    ///
    /// See [`EntityComponentSpan::from_list`]: no structural changes and no
    /// aliased mutable access to the named columns while the span lives.
    pub unsafe fn span<Q: ComponentTuple>(&self, id: BlockId) -> Option<EntityComponentSpan<Q>> {
        let list = self.lists.get(id)?;
        unsafe { EntityComponentSpan::from_list(list) }
    }

    /// Sequential dispatch: visit every live row of every matching list.
    ///
    /// The exclusive borrow on the manager makes the span construction
    /// sound; rows are yielded one at a time so the closure may freely
    /// mutate the tuple's `&mut` components.
    pub fn for_each<Q: ComponentTuple>(
        &mut self,
        filter: &QueryFilter,
        mut f: impl FnMut(EntityId, Q::Refs<'_>),
    ) {
        let ids = self.matching_lists(filter);
        for id in ids {
            // Safety: `&mut self` excludes all other column access, and no
            // structural change happens inside the loop body.
            let Some(span) = (unsafe { self.span::<Q>(id) }) else {
                continue;
            };
            span.for_each(&mut f);
        }
    }

    /// Sequential dispatch with entity-level tag filtering.
    pub fn for_each_tagged<Q: ComponentTuple>(
        &mut self,
        filter: &QueryFilter,
        table: &EntityTable,
        tags: &TagPool,
        mut f: impl FnMut(EntityId, Q::Refs<'_>),
    ) {
        let ids = self.matching_lists(filter);
        for id in ids {
            let Some(span) = (unsafe { self.span::<Q>(id) }) else {
                continue;
            };
            span.for_each(|entity, refs| {
                let head = table
                    .get(entity)
                    .map(|e| e.tag_head)
                    .unwrap_or(crate::entity::Entity::NO_TAGS);
                if filter.passes_tags(tags, head) {
                    f(entity, refs);
                }
            });
        }
    }

    /// Compact every list (between ticks). `on_moved` receives the new
    /// handle for each relocated entity so the entity table can re-point.
    pub fn compact(&mut self, mut on_moved: impl FnMut(EntityId, EntityHandle)) {
        for (list_id, list) in self.lists.iter_mut() {
            list.compact(|entity, slot| {
                on_moved(
                    entity,
                    EntityHandle {
                        owner: list_id,
                        slot,
                        entity,
                    },
                )
            });
        }
    }

    /// Total live entities across all lists.
    pub fn live_entities(&self) -> usize {
        self.lists.iter().map(|(_, list)| list.live()).sum()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
