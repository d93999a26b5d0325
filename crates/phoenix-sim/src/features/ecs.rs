//! The ECS feature: entity storage, core components, spawn/release.
//!
//! Owns the per-world [`EcsWorldBlock`] (entity table, archetype manager,
//! tag pool) and the structural lifecycle rules: archetype storage is
//! compacted at the top of every world tick -- before any parallel work --
//! and entity acquire/release happens only during action dispatch or
//! sequential channel code, never inside a task group.

use std::sync::Arc;

use tracing::{debug, warn};

use phoenix_core::blackboard::{key as bb_key, KeyQuery};
use phoenix_core::morton::{morton_code, MortonCode};
use phoenix_core::Name;
use phoenix_ecs::prelude::*;
use phoenix_fixed::{Distance, Transform, Value, Vec2};

use crate::action::Action;
use crate::block::{BlockDefinition, BlockType, Lifecycle};
use crate::feature::{Channel, Feature, FeatureDefinition, InsertPosition, UpdateArgs};
use crate::features::blackboard::BlackboardWorldBlock;
use crate::tasks::{WorldCell, WorldTaskQueue};
use crate::world::World;

// ---------------------------------------------------------------------------
// Core components
// ---------------------------------------------------------------------------

/// World-space placement plus the cached Z-order code.
#[derive(Clone, Default, Debug)]
pub struct TransformComponent {
    pub transform: Transform,
    /// Morton code of the position, refreshed each pre-world-update.
    pub zcode: MortonCode,
    /// Transform parent; [`EntityId::INVALID`] for root entities.
    pub attach_parent: EntityId,
}

impl Component for TransformComponent {
    fn component_name() -> Name {
        Name::hashed("transform")
    }
}

/// Body flag bits.
pub mod body_flags {
    /// Participates in solving this tick.
    pub const AWAKE: u8 = 1 << 0;
    /// Infinite-mass body: velocity never changes.
    pub const STATIC: u8 = 1 << 1;
}

/// How a body's position evolves.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BodyMovement {
    /// Integrated from velocity.
    #[default]
    Dynamic,
    /// Inherits the attach parent's world transform.
    Attached,
}

/// Circle collider plus integration state.
#[derive(Clone, Debug)]
pub struct BodyComponent {
    pub linear_velocity: Vec2,
    pub force: Vec2,
    pub radius: Distance,
    pub inv_mass: Value,
    pub linear_damping: Value,
    pub collision_mask: u32,
    pub flags: u8,
    pub sleep_timer: u8,
    pub movement: BodyMovement,
}

impl Default for BodyComponent {
    fn default() -> Self {
        Self {
            linear_velocity: Vec2::ZERO,
            force: Vec2::ZERO,
            radius: Distance::ONE,
            inv_mass: Value::ONE,
            linear_damping: Value::ZERO,
            collision_mask: 1,
            flags: body_flags::AWAKE,
            sleep_timer: super::physics::SLEEP_TIMER,
            movement: BodyMovement::Dynamic,
        }
    }
}

impl Component for BodyComponent {
    fn component_name() -> Name {
        Name::hashed("body")
    }
}

impl BodyComponent {
    #[inline]
    pub fn is_awake(&self) -> bool {
        self.flags & body_flags::AWAKE != 0
    }

    #[inline]
    pub fn set_awake(&mut self, awake: bool) {
        if awake {
            self.flags |= body_flags::AWAKE;
        } else {
            self.flags &= !body_flags::AWAKE;
        }
    }

    #[inline]
    pub fn is_static(&self) -> bool {
        self.flags & body_flags::STATIC != 0
    }
}

// ---------------------------------------------------------------------------
// EcsWorldBlock
// ---------------------------------------------------------------------------

/// Sizing for a world's entity storage.
#[derive(Clone, Copy, Debug)]
pub struct EcsCapacities {
    pub max_entities: u32,
    pub max_tags: usize,
    pub manager: ManagerConfig,
}

impl Default for EcsCapacities {
    fn default() -> Self {
        Self {
            max_entities: 4096,
            max_tags: 4096,
            manager: ManagerConfig::default(),
        }
    }
}

/// All entity state of one world.
#[derive(Clone)]
pub struct EcsWorldBlock {
    pub entities: EntityTable,
    pub manager: ArchetypeManager,
    pub tags: TagPool,
}

impl Default for EcsWorldBlock {
    fn default() -> Self {
        let caps = EcsCapacities::default();
        Self {
            entities: EntityTable::with_capacity(caps.max_entities),
            manager: ArchetypeManager::new(caps.manager),
            tags: TagPool::with_capacity(caps.max_tags),
        }
    }
}

impl BlockType for EcsWorldBlock {
    fn block_name() -> Name {
        Name::hashed("ecs_world")
    }
    fn lifecycle() -> Lifecycle {
        Lifecycle::Dynamic
    }

    /// Entity identities plus every transform/body payload, in stable
    /// iteration order.
    fn digest(&self, hasher: &mut blake3::Hasher) {
        for entity in self.entities.iter() {
            hasher.update(&entity.id.0.to_le_bytes());
            hasher.update(&entity.kind.hash().to_le_bytes());
        }
        let filter = QueryFilter::new().require_all(&[TransformComponent::component_name()]);
        for list_id in self.manager.matching_lists(&filter) {
            let Some(list) = self.manager.list(list_id) else {
                continue;
            };
            for (slot, &entity) in list.entity_slots().iter().enumerate() {
                if !entity.is_valid() {
                    continue;
                }
                if let Some(t) = list.get::<TransformComponent>(slot as u32, entity) {
                    hasher.update(&t.transform.position.x.to_bits().to_le_bytes());
                    hasher.update(&t.transform.position.y.to_bits().to_le_bytes());
                    hasher.update(&t.transform.rotation.to_bits().to_le_bytes());
                }
                if let Some(b) = list.get::<BodyComponent>(slot as u32, entity) {
                    hasher.update(&b.linear_velocity.x.to_bits().to_le_bytes());
                    hasher.update(&b.linear_velocity.y.to_bits().to_le_bytes());
                    hasher.update(&[b.sleep_timer, b.flags]);
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// EcsFeature
// ---------------------------------------------------------------------------

/// An archetype kind registered on demand at first spawn.
#[derive(Clone, Debug)]
pub struct ArchetypeSpec {
    pub kind: Name,
    pub components: Vec<Name>,
}

/// Entity lifecycle feature.
pub struct EcsFeature {
    archetypes: Vec<ArchetypeSpec>,
}

impl EcsFeature {
    /// The default archetype every driver gets: `"unit"` = transform+body.
    pub fn with_default_archetypes() -> Self {
        Self::new(vec![ArchetypeSpec {
            kind: Name::new("unit"),
            components: vec![
                TransformComponent::component_name(),
                BodyComponent::component_name(),
            ],
        }])
    }

    pub fn new(archetypes: Vec<ArchetypeSpec>) -> Self {
        Self { archetypes }
    }

    fn ensure_archetype(&self, block: &mut EcsWorldBlock, kind: Name) -> bool {
        if block.manager.definition(kind).is_some() {
            return true;
        }
        let Some(spec) = self.archetypes.iter().find(|s| s.kind == kind) else {
            return false;
        };
        match block.manager.register_archetype(kind, &spec.components) {
            Ok(()) => true,
            Err(error) => {
                warn!(%kind, %error, "archetype registration failed");
                false
            }
        }
    }

    /// Spawn an entity of `kind` at `position`. Returns
    /// [`EntityId::INVALID`] on unknown kinds or exhausted storage.
    pub fn spawn(
        &self,
        world: &mut World,
        kind: Name,
        position: Vec2,
        velocity: Vec2,
    ) -> EntityId {
        let Some(block) = world.get_block_mut::<EcsWorldBlock>() else {
            return EntityId::INVALID;
        };
        if !self.ensure_archetype(block, kind) {
            warn!(%kind, "spawn of unknown archetype kind");
            return EntityId::INVALID;
        }

        let id = block.entities.allocate(kind);
        if !id.is_valid() {
            return EntityId::INVALID;
        }
        let handle = block.manager.acquire(id, kind);
        if !handle.is_valid() {
            block.entities.release(id);
            return EntityId::INVALID;
        }
        if let Some(record) = block.entities.get_mut(id) {
            record.archetype = handle;
        }

        if let Some(t) = block.manager.get_component_mut::<TransformComponent>(handle) {
            t.transform.position = position;
            t.zcode = morton_code(position);
        }
        if let Some(b) = block.manager.get_component_mut::<BodyComponent>(handle) {
            b.linear_velocity = velocity;
        }
        id
    }

    /// Release an entity and every trace of it: archetype row, tags, and
    /// blackboard rows (hi-wildcard on the entity id).
    pub fn release_entity(world: &mut World, id: EntityId) -> bool {
        // Blackboard cleanup happens against a separate block, so the
        // entity's rows disappear with it even if the board is sorted.
        if let Some(board) = world.get_block_mut::<BlackboardWorldBlock>() {
            board.board.remove_matching(KeyQuery::for_hi(id.0));
        }

        let Some(block) = world.get_block_mut::<EcsWorldBlock>() else {
            return false;
        };
        let Some(record) = block.entities.get_mut(id) else {
            return false;
        };
        let handle = record.archetype;
        let mut tag_head = record.tag_head;
        block.tags.remove_all_tags(&mut tag_head);
        if let Some(record) = block.entities.get_mut(id) {
            record.tag_head = tag_head;
        }
        block.manager.release(handle);
        block.entities.release(id)
    }

    /// Enqueue one task per matching archetype list into the current
    /// group, each receiving the list's component span. Component accesses
    /// are recorded for the debug-build aliasing check.
    pub fn schedule_parallel<Q>(
        world: &World,
        tasks: &mut WorldTaskQueue,
        job: impl Fn(WorldCell, &EntityComponentSpan<Q>) + Send + Sync + 'static,
    ) where
        Q: ComponentTuple + 'static,
    {
        let Some(block) = world.get_block::<EcsWorldBlock>() else {
            return;
        };
        let filter = filter_for::<Q>();
        let lists = block.manager.matching_lists(&filter);

        tasks.begin_group();
        let job = Arc::new(job);
        let names = Q::names();
        let muts = Q::mutability();
        for list_id in lists {
            for i in 0..Q::COUNT {
                tasks.record_access(list_id, names[i], muts[i]);
            }
            // Safety: one task per list within this group, accesses
            // recorded above; no structural ECS changes happen between
            // scheduling and the flush at the channel boundary.
            #[allow(unsafe_code)]
            let span = unsafe { block.manager.span::<Q>(list_id) };
            if let Some(span) = span {
                let job = Arc::clone(&job);
                tasks.schedule(move |cell| job(cell, &span));
            }
        }
        tasks.end_group();
    }
}

impl Feature for EcsFeature {
    fn definition(&self) -> FeatureDefinition {
        FeatureDefinition::new(Name::new("ecs"))
            .with_world_block(BlockDefinition::of::<EcsWorldBlock>())
            .with_channels(&[
                Channel::WorldInitialize,
                Channel::PreWorldUpdate,
                Channel::HandleWorldAction,
            ])
            // Structural work (compaction) must run before any feature
            // schedules parallel work over spans.
            .at(InsertPosition::Begin)
    }

    fn on_world_initialize(&self, world: &mut World) {
        let Some(block) = world.get_block_mut::<EcsWorldBlock>() else {
            return;
        };
        block.manager.register_component::<TransformComponent>();
        block.manager.register_component::<BodyComponent>();
        debug!(world = %world.name(), "ecs components registered");
    }

    fn on_pre_world_update(
        &self,
        world: &mut World,
        _args: &UpdateArgs,
        _tasks: &mut WorldTaskQueue,
    ) {
        let Some(block) = world.get_block_mut::<EcsWorldBlock>() else {
            return;
        };

        // Compact between ticks: slots move, handles re-point.
        let EcsWorldBlock {
            entities, manager, ..
        } = block;
        manager.compact(|entity, new_handle| {
            if let Some(record) = entities.get_mut(entity) {
                record.archetype = new_handle;
            }
        });

        // Refresh Z-order codes from positions.
        let filter = filter_for::<(&mut TransformComponent,)>();
        manager.for_each::<(&mut TransformComponent,)>(&filter, |_, (t,)| {
            t.zcode = morton_code(t.transform.position);
        });
    }

    fn on_handle_world_action(&self, world: &mut World, action: &Action) -> bool {
        if action.verb == Name::hashed("spawn_entity") {
            let Some(kind) = action.data[0].as_name() else {
                return true;
            };
            let position = action.data[1].as_vec2().unwrap_or(Vec2::ZERO);
            let velocity = action.data[2].as_vec2().unwrap_or(Vec2::ZERO);
            let id = self.spawn(world, kind, position, velocity);

            if id.is_valid() {
                let block = world.get_block_mut::<EcsWorldBlock>().expect("spawn succeeded");
                let handle = block.entities.get(id).expect("just spawned").archetype;
                if let Some(radius) = action.data[3].as_distance() {
                    if let Some(b) = block.manager.get_component_mut::<BodyComponent>(handle) {
                        b.radius = radius;
                    }
                }
                if let Some(inv_mass) = action.data[4].as_value() {
                    if let Some(b) = block.manager.get_component_mut::<BodyComponent>(handle) {
                        b.inv_mass = inv_mass;
                    }
                }
            }
            return true;
        }
        false
    }
}

/// Blackboard key for an entity-scoped value: the key name hashes into the
/// lo part, the entity id is the hi part, so releasing an entity can clear
/// all of its rows with one hi-wildcard query.
pub fn entity_blackboard_key(key_name: Name, entity: EntityId) -> phoenix_core::blackboard::BlackboardKey {
    bb_key::create(key_name.hash(), entity.0, 0)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
