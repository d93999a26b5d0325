//! Circle physics: Morton broad phase, sequential-impulse contacts,
//! penetration separation, sleep management.
//!
//! Every post-world-update the solver runs the fixed pipeline:
//!
//! 1. *Populate + Z-sort* (scheduled in pre-world-update): every
//!    (transform, body) pair appends itself to a scratch array under an
//!    atomic ticket, then one task sorts by Z-code with an entity-id
//!    tie-break. The sort is the ordering point -- everything downstream
//!    iterates in Z-order regardless of which worker appended first.
//! 2. *Integrate velocities*: `v += F * invMass * dt; F = 0` for awake,
//!    non-static bodies.
//! 3. `num_iterations` rounds of: broad phase (Morton ranges around each
//!    body's projected position) reserving candidate pairs atomically;
//!    pair sort + run collapse into unique contacts; parallel contact
//!    derivation; `num_solver_steps` projected Gauss-Seidel passes;
//!    position integration with sleep bookkeeping; and
//!    `num_separation_steps` overlap-separation passes (line-vs-circle
//!    reflection, then proportional contact pushes).
//!
//! Concurrency shape: stages that write disjoint rows (populate, broad
//! phase, velocity/position integration, line separation) fan out across
//! the pool; stages that accumulate into shared bodies (PGS, contact
//! pushes) run as single ordered tasks so body velocity accumulation is
//! strictly sequential -- the determinism contract forbids
//! schedule-dependent accumulation order.

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;

use phoenix_core::containers::{FixedVec, ScratchVec};
use phoenix_core::morton::{
    for_each_in_ranges, morton_query, to_morton_aabb, MortonCode, MortonRange, MAX_QUERY_RANGES,
};
use phoenix_core::{Color, Name};
use phoenix_ecs::prelude::EntityId;
use phoenix_fixed::{math, Angle, DeltaTime, Distance, Line, Value, Vec2};

use crate::action::Action;
use crate::block::{BlockDefinition, BlockType, Lifecycle};
use crate::debug::{DebugRenderer, DebugState};
use crate::feature::{Channel, Feature, FeatureDefinition, UpdateArgs};
use crate::features::ecs::{BodyComponent, BodyMovement, EcsFeature, EcsWorldBlock, TransformComponent};
use crate::tasks::{RawRef, WorldCell, WorldTaskQueue};
use crate::world::World;

/// Ticks of stillness before a body loses its awake flag.
pub const SLEEP_TIMER: u8 = 1;

/// Bodies slower than this are considered at rest.
const SLEEP_SPEED: Distance = Distance::from_bits(410); // ~0.1 units/s

const BAUMGARTE: Value = Value::from_bits(410); // 0.1
const MAX_BODIES: usize = 4096;
const MAX_CONTACT_PAIRS: usize = 16384;
const MAX_CONTACTS: usize = 8192;
const MAX_COLLISION_LINES: usize = 256;
const PARALLEL_MIN_CHUNK: u32 = 128;

type BodyQuery = (
    &'static mut TransformComponent,
    &'static mut BodyComponent,
);

// ---------------------------------------------------------------------------
// Scratch data
// ---------------------------------------------------------------------------

/// One simulated body, flattened for Z-ordered iteration.
#[derive(Clone, Copy, Debug, Default)]
pub struct EntityBody {
    pub entity: EntityId,
    pub transform: RawRef<TransformComponent>,
    pub body: RawRef<BodyComponent>,
    pub zcode: MortonCode,
}

/// A broad-phase candidate, deduplicated on the packed id key. The lower
/// entity id is always `a`, so duplicate records are bit-identical and the
/// collapse can keep any one of them.
#[derive(Clone, Copy, Debug, Default)]
pub struct ContactPair {
    pub key: u64,
    pub transform_a: RawRef<TransformComponent>,
    pub body_a: RawRef<BodyComponent>,
    pub transform_b: RawRef<TransformComponent>,
    pub body_b: RawRef<BodyComponent>,
}

/// A derived contact. The accumulated impulse persists across the solver
/// steps of one derivation and resets when the pair is re-derived.
#[derive(Clone, Copy, Debug, Default)]
pub struct Contact {
    pub pair: u32,
    pub normal: Vec2,
    pub bias: Value,
    pub eff_mass: Value,
    pub impulse: Value,
}

// ---------------------------------------------------------------------------
// Blocks
// ---------------------------------------------------------------------------

/// Solver tuning and persistent collision geometry.
#[derive(Clone)]
pub struct PhysicsDynamicBlock {
    pub allow_sleep: bool,
    pub num_iterations: u32,
    pub num_solver_steps: u32,
    pub num_separation_steps: u32,
    pub penetration_threshold: Value,
    pub penetration_correction: Value,
    /// Fixed line colliders (walls).
    pub collision_lines: FixedVec<Line>,
}

impl Default for PhysicsDynamicBlock {
    fn default() -> Self {
        Self {
            allow_sleep: true,
            num_iterations: 2,
            num_solver_steps: 6,
            num_separation_steps: 40,
            penetration_threshold: Value::from_f64(0.05),
            penetration_correction: Value::from_f64(0.1),
            collision_lines: FixedVec::with_capacity(MAX_COLLISION_LINES),
        }
    }
}

impl BlockType for PhysicsDynamicBlock {
    fn block_name() -> Name {
        Name::hashed("physics_config")
    }
    fn lifecycle() -> Lifecycle {
        Lifecycle::Dynamic
    }
    fn digest(&self, hasher: &mut blake3::Hasher) {
        hasher.update(&[self.allow_sleep as u8]);
        hasher.update(&self.num_iterations.to_le_bytes());
        for line in self.collision_lines.iter() {
            hasher.update(&line.start.x.to_bits().to_le_bytes());
            hasher.update(&line.start.y.to_bits().to_le_bytes());
            hasher.update(&line.end.x.to_bits().to_le_bytes());
            hasher.update(&line.end.y.to_bits().to_le_bytes());
        }
    }
}

/// Per-tick solver storage. Never snapshotted.
pub struct PhysicsScratchBlock {
    pub sorted: ScratchVec<EntityBody>,
    pub contact_pairs: ScratchVec<ContactPair>,
    pub contacts: ScratchVec<Contact>,
    /// Diagnostics: widest broad-phase candidate set this tick.
    pub max_query_bodies: u32,
}

impl Default for PhysicsScratchBlock {
    fn default() -> Self {
        Self {
            sorted: ScratchVec::with_capacity(MAX_BODIES),
            contact_pairs: ScratchVec::with_capacity(MAX_CONTACT_PAIRS),
            contacts: ScratchVec::with_capacity(MAX_CONTACTS),
            max_query_bodies: 0,
        }
    }
}

impl Clone for PhysicsScratchBlock {
    fn clone(&self) -> Self {
        Self::default()
    }
}

impl BlockType for PhysicsScratchBlock {
    fn block_name() -> Name {
        Name::hashed("physics_scratch")
    }
    fn lifecycle() -> Lifecycle {
        Lifecycle::Scratch
    }
    fn reset(&mut self) {
        self.sorted.reset();
        self.contact_pairs.reset();
        self.contacts.reset();
        self.max_query_bodies = 0;
    }
}

// ---------------------------------------------------------------------------
// PhysicsFeature
// ---------------------------------------------------------------------------

/// The physics solver feature.
#[derive(Default)]
pub struct PhysicsFeature {
    pub debug_draw_contacts: bool,
}

impl PhysicsFeature {
    pub fn new() -> Self {
        Self::default()
    }

    // -- queries ------------------------------------------------------------

    /// Entities whose circle intersects the circle at `pos`/`range`, via
    /// the previous sort's Z-order index. Broad-phase false positives are
    /// filtered with the exact distance test.
    pub fn query_entities_in_range(world: &World, pos: Vec2, range: Distance) -> Vec<EntityId> {
        let Some(scratch) = world.get_block::<PhysicsScratchBlock>() else {
            return Vec::new();
        };
        let mut ranges: FixedVec<MortonRange> = FixedVec::with_capacity(MAX_QUERY_RANGES);
        morton_query(to_morton_aabb(pos, range), &mut ranges);

        let mut out = Vec::new();
        for_each_in_ranges(
            scratch.sorted.as_slice(),
            |eb| eb.zcode,
            ranges.as_slice(),
            |eb| {
                // Safety: read-only access during sequential action
                // handling; no tasks are in flight.
                let (t, b) = unsafe { (eb.transform.get_ref(), eb.body.get_ref()) };
                if Vec2::distance(pos, t.transform.position) < range + b.radius {
                    out.push(eb.entity);
                }
                false
            },
        );
        out
    }

    /// Radial impulse with linear falloff.
    pub fn add_explosion_force(world: &mut World, pos: Vec2, range: Distance, force: Value) {
        let Some(scratch) = world.get_block::<PhysicsScratchBlock>() else {
            return;
        };
        let mut ranges: FixedVec<MortonRange> = FixedVec::with_capacity(MAX_QUERY_RANGES);
        morton_query(to_morton_aabb(pos, range), &mut ranges);

        for_each_in_ranges(
            scratch.sorted.as_slice(),
            |eb| eb.zcode,
            ranges.as_slice(),
            |eb| {
                // Safety: sequential action handling; no tasks in flight.
                let (t, b) = unsafe { (eb.transform.get_ref(), eb.body.get()) };
                let dir = t.transform.position - pos;
                let dist = dir.length();
                if dist < range && !b.inv_mass.is_zero() {
                    let falloff = Value::ONE - dist / range;
                    let magnitude = force / b.inv_mass;
                    b.linear_velocity += dir.normalized() * (magnitude * falloff);
                    b.set_awake(true);
                }
                false
            },
        );
    }

    /// Direct velocity impulse on one entity.
    pub fn add_force(world: &mut World, entity: EntityId, force: Vec2) {
        let Some(block) = world.get_block_mut::<EcsWorldBlock>() else {
            return;
        };
        let Some(record) = block.entities.get(entity) else {
            return;
        };
        let handle = record.archetype;
        if let Some(body) = block.manager.get_component_mut::<BodyComponent>(handle) {
            body.force += force;
            body.set_awake(true);
        }
    }
}

// ---------------------------------------------------------------------------
// Pipeline tasks
// ---------------------------------------------------------------------------

fn schedule_populate(world: &World, tasks: &mut WorldTaskQueue) {
    EcsFeature::schedule_parallel::<BodyQuery>(world, tasks, |cell, span| {
        let Some(scratch) = cell.get_block::<PhysicsScratchBlock>() else {
            return;
        };
        span.for_each(|entity, (transform, body)| {
            scratch.sorted.push(EntityBody {
                entity,
                zcode: transform.zcode,
                transform: RawRef::new(transform),
                body: RawRef::new(body),
            });
        });
    });

    // Ordering point: commit and sort by (zcode, entity id). The id
    // tie-break makes the order total, so equal codes cannot reorder
    // between runs.
    tasks.schedule(|cell| {
        // Safety: sole task in its group touching the scratch block.
        let scratch = unsafe { cell.get_block_mut::<PhysicsScratchBlock>() }.unwrap();
        scratch.sorted.commit();
        scratch
            .sorted
            .sort_by(|a, b| a.zcode.cmp(&b.zcode).then(a.entity.cmp(&b.entity)));
    });
    tasks.end_group();
}

fn schedule_integrate_velocities(world: &World, tasks: &mut WorldTaskQueue, dt: DeltaTime) {
    EcsFeature::schedule_parallel::<BodyQuery>(world, tasks, move |_cell, span| {
        span.for_each(|_, (_, body)| {
            if !body.is_awake() || body.is_static() {
                body.force = Vec2::ZERO;
                return;
            }
            body.linear_velocity += body.force * body.inv_mass * dt;
            body.force = Vec2::ZERO;
        });
    });
}

fn schedule_broad_phase(tasks: &mut WorldTaskQueue, sorted_len: u32, dt: DeltaTime) {
    tasks.schedule_parallel_range(sorted_len, PARALLEL_MIN_CHUNK, move |cell, start, len| {
        let Some(scratch) = cell.get_block::<PhysicsScratchBlock>() else {
            return;
        };
        let sorted = scratch.sorted.as_slice();
        let mut ranges: FixedVec<MortonRange> = FixedVec::with_capacity(MAX_QUERY_RANGES);

        for body_a in &sorted[start as usize..(start + len) as usize] {
            // Safety: broad phase only reads component data; pair slots
            // are reserved through the atomic ticket.
            let (transform_a, a) = unsafe { (body_a.transform.get_ref(), body_a.body.get_ref()) };
            if !a.is_awake() {
                continue;
            }

            let projected = transform_a.transform.position + a.linear_velocity * dt;
            morton_query(to_morton_aabb(projected, a.radius), &mut ranges);

            for_each_in_ranges(
                sorted,
                |eb| eb.zcode,
                ranges.as_slice(),
                |candidate| {
                    if candidate.entity == body_a.entity {
                        return false;
                    }
                    let (transform_b, b) =
                        unsafe { (candidate.transform.get_ref(), candidate.body.get_ref()) };
                    if a.collision_mask & b.collision_mask == 0 {
                        return false;
                    }
                    // Exact narrow test: projected AABBs may admit false
                    // positives, circle overlap may not.
                    let offset = transform_b.transform.position - transform_a.transform.position;
                    if offset.length() > a.radius + b.radius {
                        return false;
                    }

                    let (lo, hi) = if body_a.entity < candidate.entity {
                        (body_a.entity, candidate.entity)
                    } else {
                        (candidate.entity, body_a.entity)
                    };
                    let key = (hi.0 as u64) << 32 | lo.0 as u64;
                    // Canonical orientation (a = lower id) so duplicate
                    // records are bit-identical.
                    let (pa, pb) = if body_a.entity == lo {
                        (*body_a, *candidate)
                    } else {
                        (*candidate, *body_a)
                    };
                    scratch.contact_pairs.push(ContactPair {
                        key,
                        transform_a: pa.transform,
                        body_a: pa.body,
                        transform_b: pb.transform,
                        body_b: pb.body,
                    });
                    false
                },
            );
        }
    });
}

/// Commit and sort the pair list, collapse duplicate keys into contacts,
/// and wake every contacted body. Runs as one task: the collapse is the
/// second ordering point of the tick.
fn schedule_resolve_pairs(tasks: &mut WorldTaskQueue) {
    tasks.begin_group();
    tasks.schedule(|cell| {
        // Safety: sole task in its group touching the scratch block.
        let scratch = unsafe { cell.get_block_mut::<PhysicsScratchBlock>() }.unwrap();
        scratch.contact_pairs.commit();
        scratch.contact_pairs.sort_by(|a, b| a.key.cmp(&b.key));

        scratch.contacts.reset();
        let mut previous_key = u64::MAX;
        let pair_count = scratch.contact_pairs.len();
        for index in 0..pair_count {
            let pair = scratch.contact_pairs.as_slice()[index];
            if pair.key == previous_key {
                continue;
            }
            previous_key = pair.key;
            if scratch
                .contacts
                .push(Contact {
                    pair: index as u32,
                    ..Contact::default()
                })
                .is_none()
            {
                break;
            }
            // Safety: single-threaded task; bodies are quiescent.
            unsafe {
                pair.body_a.get().set_awake(true);
                pair.body_b.get().set_awake(true);
            }
        }
        scratch.contacts.commit();
    });
    tasks.end_group();
}

fn schedule_derive_contacts(
    tasks: &mut WorldTaskQueue,
    contact_count: u32,
    dt: DeltaTime,
    rng_seed: u64,
) {
    tasks.schedule_parallel_range(contact_count, PARALLEL_MIN_CHUNK, move |cell, start, len| {
        let Some(scratch) = cell.get_block::<PhysicsScratchBlock>() else {
            return;
        };
        for index in start..start + len {
            // Safety: contact indices are partitioned across tasks.
            let contact = unsafe { scratch.contacts.get_mut_unchecked(index as usize) };
            let pair = scratch.contact_pairs.as_slice()[contact.pair as usize];
            // Safety: reads of position/mass; no concurrent writer in
            // this group.
            let (ta, tb) = unsafe { (pair.transform_a.get_ref(), pair.transform_b.get_ref()) };
            let (ba, bb) = unsafe { (pair.body_a.get_ref(), pair.body_b.get_ref()) };

            let mut offset = tb.transform.position - ta.transform.position;
            if offset == Vec2::ZERO {
                // Exactly coincident centers: derive a direction from the
                // deterministic per-tick stream, keyed by contact index so
                // chunking cannot change it.
                let mut rng = Pcg32::seed_from_u64(rng_seed ^ (index as u64).wrapping_mul(0x9e37));
                let quarter_degrees = rng.gen_range(0..1440u32);
                let angle = math::deg_to_rad(Angle::from_bits(
                    ((quarter_degrees as i64) << Angle::FRAC_BITS as i64 >> 2) as i32,
                ));
                offset = Vec2::from_angle(angle);
            }

            let distance = offset.length();
            let radii = ba.radius + bb.radius;
            let slop = Value::from_f64(0.01) * radii;
            let penetration = radii - distance;
            let bias = -(BAUMGARTE * (penetration - slop).max(Value::ZERO)) / dt;

            contact.normal = offset.normalized();
            contact.bias = bias;
            let mass_sum = ba.inv_mass + bb.inv_mass;
            contact.eff_mass = if mass_sum.is_zero() {
                Value::ZERO
            } else {
                Value::ONE / mass_sum
            };
            contact.impulse = Value::ZERO;
        }
    });
}

/// One projected Gauss-Seidel pass over every contact, strictly
/// sequential: per-body velocity accumulation order is part of the
/// deterministic state.
fn schedule_pgs_step(tasks: &mut WorldTaskQueue) {
    tasks.begin_group();
    tasks.schedule(|cell| {
        let Some(scratch) = cell.get_block::<PhysicsScratchBlock>() else {
            return;
        };
        for index in 0..scratch.contacts.len() {
            // Safety: sole task in its group.
            let contact = unsafe { scratch.contacts.get_mut_unchecked(index) };
            let pair = scratch.contact_pairs.as_slice()[contact.pair as usize];
            let (ba, bb) = unsafe { (pair.body_a.get(), pair.body_b.get()) };

            let rel_vel = Vec2::dot(contact.normal, bb.linear_velocity - ba.linear_velocity);
            let lambda = -(rel_vel + contact.bias) * contact.eff_mass;

            // Accumulate and project: no negative normal impulse.
            let old = contact.impulse;
            contact.impulse = (old + lambda).max(Value::ZERO);
            let change = contact.impulse - old;

            let impulse = contact.normal * change;
            if !ba.is_static() {
                ba.linear_velocity -= impulse * ba.inv_mass;
            }
            if !bb.is_static() {
                bb.linear_velocity += impulse * bb.inv_mass;
            }
        }
    });
    tasks.end_group();
}

fn schedule_integrate_positions(
    world: &World,
    tasks: &mut WorldTaskQueue,
    dt: DeltaTime,
    allow_sleep: bool,
) {
    EcsFeature::schedule_parallel::<BodyQuery>(world, tasks, move |_cell, span| {
        span.for_each(|_, (transform, body)| {
            if body.movement == BodyMovement::Attached {
                // Attached bodies are resolved by the sequential parent
                // pass below.
                return;
            }
            if allow_sleep {
                let moving = body.linear_velocity.length() > SLEEP_SPEED;
                if moving {
                    body.sleep_timer = SLEEP_TIMER;
                    body.set_awake(true);
                } else if body.sleep_timer > 0 {
                    body.sleep_timer -= 1;
                    body.set_awake(true);
                } else {
                    body.set_awake(false);
                }
            }

            transform.transform.position += body.linear_velocity * dt;
            body.linear_velocity =
                body.linear_velocity * (Value::ONE - body.linear_damping * dt);
        });
    });

    // Attached bodies inherit the parent's world transform. Sequential:
    // parents may themselves be attached, and chains must resolve in a
    // fixed order. A revisited id terminates the walk (deepest wins).
    tasks.schedule(|cell| {
        let Some(scratch) = cell.get_block::<PhysicsScratchBlock>() else {
            return;
        };
        let Some(ecs) = cell.get_block::<EcsWorldBlock>() else {
            return;
        };
        let sorted = scratch.sorted.as_slice();
        for eb in sorted {
            // Safety: sole task in its group.
            let (transform, body) = unsafe { (eb.transform.get(), eb.body.get_ref()) };
            if body.movement != BodyMovement::Attached {
                continue;
            }
            let mut parent = transform.attach_parent;
            let mut visited = [EntityId::INVALID; 8];
            let mut depth = 0;
            while parent.is_valid() && depth < visited.len() {
                if visited[..depth].contains(&parent) {
                    break;
                }
                visited[depth] = parent;
                depth += 1;

                let Some(record) = ecs.entities.get(parent) else {
                    break;
                };
                let Some(parent_transform) = ecs
                    .manager
                    .get_component::<TransformComponent>(record.archetype)
                else {
                    break;
                };
                transform.transform =
                    phoenix_fixed::Transform::compose(&parent_transform.transform, &Default::default());
                parent = parent_transform.attach_parent;
            }
        }
    });
    tasks.end_group();
}

fn schedule_separation_pass(tasks: &mut WorldTaskQueue, sorted_len: u32) {
    // Line-vs-circle: each entity only touches itself; parallel.
    tasks.schedule_parallel_range(sorted_len, PARALLEL_MIN_CHUNK, |cell, start, len| {
        let Some(scratch) = cell.get_block::<PhysicsScratchBlock>() else {
            return;
        };
        let Some(config) = cell.get_block::<PhysicsDynamicBlock>() else {
            return;
        };
        for eb in &scratch.sorted.as_slice()[start as usize..(start + len) as usize] {
            // Safety: disjoint rows across range chunks.
            let (transform, body) = unsafe { (eb.transform.get(), eb.body.get()) };
            for line in config.collision_lines.iter() {
                let to_line = line.vector_to_line(transform.transform.position);
                let dist = to_line.length();
                if dist.is_zero() || dist >= body.radius {
                    continue;
                }
                let normal = -(to_line / dist);
                let push = normal * (body.radius - dist);
                transform.transform.position += push;
                if Vec2::dot(body.linear_velocity, normal) < Value::ZERO {
                    body.linear_velocity = Vec2::reflect(line.direction(), body.linear_velocity);
                }
                body.set_awake(true);
            }
        }
    });

    // Contact pushes: bodies are shared between contacts; sequential.
    tasks.schedule(|cell| {
        let Some(scratch) = cell.get_block::<PhysicsScratchBlock>() else {
            return;
        };
        let Some(config) = cell.get_block::<PhysicsDynamicBlock>() else {
            return;
        };
        for index in 0..scratch.contacts.len() {
            let contact = scratch.contacts.as_slice()[index];
            let pair = scratch.contact_pairs.as_slice()[contact.pair as usize];
            // Safety: sole task in its group.
            let (ta, tb) = unsafe { (pair.transform_a.get(), pair.transform_b.get()) };
            let (ba, bb) = unsafe { (pair.body_a.get(), pair.body_b.get()) };

            let offset = tb.transform.position - ta.transform.position;
            let distance = offset.length();
            let radii = ba.radius + bb.radius;
            let penetration = radii - distance;
            if penetration <= config.penetration_threshold {
                continue;
            }
            let mass_sum = ba.inv_mass + bb.inv_mass;
            if mass_sum.is_zero() {
                continue;
            }
            let correction = config.penetration_correction * penetration;
            let share_a = correction * (ba.inv_mass / mass_sum);
            let share_b = correction * (bb.inv_mass / mass_sum);
            ta.transform.position -= contact.normal * share_a;
            tb.transform.position += contact.normal * share_b;
            ba.set_awake(true);
            bb.set_awake(true);
        }
    });
    tasks.end_group();
}

// ---------------------------------------------------------------------------
// Feature impl
// ---------------------------------------------------------------------------

impl Feature for PhysicsFeature {
    fn definition(&self) -> FeatureDefinition {
        FeatureDefinition::new(Name::new("physics"))
            .with_world_block(BlockDefinition::of::<PhysicsDynamicBlock>())
            .with_world_block(BlockDefinition::of::<PhysicsScratchBlock>())
            .with_channels(&[
                Channel::PreWorldUpdate,
                Channel::PostWorldUpdate,
                Channel::HandleWorldAction,
                Channel::DebugRender,
            ])
    }

    fn on_pre_world_update(
        &self,
        world: &mut World,
        _args: &UpdateArgs,
        tasks: &mut WorldTaskQueue,
    ) {
        schedule_populate(world, tasks);
    }

    fn on_post_world_update(
        &self,
        world: &mut World,
        args: &UpdateArgs,
        tasks: &mut WorldTaskQueue,
    ) {
        let Some(config) = world.get_block::<PhysicsDynamicBlock>() else {
            return;
        };
        let (iterations, allow_sleep, separation_steps, solver_steps) = (
            config.num_iterations,
            config.allow_sleep,
            config.num_separation_steps,
            config.num_solver_steps,
        );
        let dt = args.dt;
        let sorted_len = {
            let scratch = world
                .get_block::<PhysicsScratchBlock>()
                .expect("physics scratch block");
            scratch.sorted.len() as u32
        };
        // Deterministic per-tick random stream for coincident-center
        // separation directions.
        let rng_seed = ((world.name().hash() as u64) << 32) ^ args.sim_time;

        schedule_integrate_velocities(world, tasks, dt);

        for _ in 0..iterations {
            // Fresh pair list per iteration.
            tasks.schedule(|cell| {
                // Safety: sole task in its group.
                let scratch = unsafe { cell.get_block_mut::<PhysicsScratchBlock>() }.unwrap();
                scratch.contact_pairs.reset();
            });
            tasks.end_group();

            schedule_broad_phase(tasks, sorted_len, dt);
            schedule_resolve_pairs(tasks);

            // The contact count feeds the next schedules; run everything
            // queued so far.
            tasks.flush(world);
            let contact_count = {
                let scratch = world
                    .get_block::<PhysicsScratchBlock>()
                    .expect("physics scratch block");
                scratch.contacts.len() as u32
            };

            schedule_derive_contacts(tasks, contact_count, dt, rng_seed);
            for _ in 0..solver_steps {
                schedule_pgs_step(tasks);
            }
            schedule_integrate_positions(world, tasks, dt, allow_sleep);
            for _ in 0..separation_steps {
                schedule_separation_pass(tasks, sorted_len);
            }
            tasks.flush(world);
        }
    }

    fn on_handle_world_action(&self, world: &mut World, action: &Action) -> bool {
        if action.verb == Name::hashed("release_entities_in_range") {
            let pos = action.data[0].as_vec2().unwrap_or(Vec2::ZERO);
            let range = action.data[1].as_distance().unwrap_or(Distance::ZERO);
            for entity in Self::query_entities_in_range(world, pos, range) {
                EcsFeature::release_entity(world, entity);
            }
            return true;
        }

        if action.verb == Name::hashed("push_entities_in_range") {
            let pos = action.data[0].as_vec2().unwrap_or(Vec2::ZERO);
            let range = action.data[1].as_distance().unwrap_or(Distance::ZERO);
            let force = action.data[2].as_value().unwrap_or(Value::ZERO);
            Self::add_explosion_force(world, pos, range, force);
            return true;
        }

        if action.verb == Name::hashed("set_allow_sleep") {
            let allow = action.data[0].as_bool().unwrap_or(true);
            if let Some(config) = world.get_block_mut::<PhysicsDynamicBlock>() {
                config.allow_sleep = allow;
            }
            return true;
        }

        false
    }

    fn on_debug_render(
        &self,
        world: &World,
        _state: &dyn DebugState,
        renderer: &mut dyn DebugRenderer,
    ) {
        if let Some(config) = world.get_block::<PhysicsDynamicBlock>() {
            for line in config.collision_lines.iter() {
                renderer.draw_line(line.start, line.end, Color::GREEN);
            }
        }
        if !self.debug_draw_contacts {
            return;
        }
        if let Some(scratch) = world.get_block::<PhysicsScratchBlock>() {
            for contact in scratch.contacts.as_slice() {
                let pair = scratch.contact_pairs.as_slice()[contact.pair as usize];
                // Safety: debug rendering runs outside the tick.
                let ta = unsafe { pair.transform_a.get_ref() };
                let start = ta.transform.position;
                let end = start + contact.normal * contact.bias;
                renderer.draw_line(start, end, Color::WHITE);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pair_keys_are_order_independent() {
        let a = EntityId(3);
        let b = EntityId(7);
        let key_ab = (b.0 as u64) << 32 | a.0 as u64;
        let (lo, hi) = if a < b { (a, b) } else { (b, a) };
        assert_eq!((hi.0 as u64) << 32 | lo.0 as u64, key_ab);
    }

    #[test]
    fn body_defaults_are_awake_dynamic() {
        let body = BodyComponent::default();
        assert!(body.is_awake());
        assert!(!body.is_static());
        assert_eq!(body.movement, BodyMovement::Dynamic);
        assert_eq!(body.radius, Distance::ONE);
    }

    #[test]
    fn scratch_reset_clears_everything() {
        let mut scratch = PhysicsScratchBlock::default();
        scratch.sorted.push(EntityBody::default());
        scratch.contact_pairs.push(ContactPair::default());
        scratch.sorted.commit();
        scratch.reset();
        assert!(scratch.sorted.is_empty());
        scratch.sorted.commit();
        assert!(scratch.sorted.is_empty());
    }

    #[test]
    fn dynamic_block_defaults_match_solver_tuning() {
        let config = PhysicsDynamicBlock::default();
        assert_eq!(config.num_iterations, 2);
        assert_eq!(config.num_solver_steps, 6);
        assert_eq!(config.num_separation_steps, 40);
        assert!(config.allow_sleep);
        assert_eq!(config.penetration_threshold, Value::from_f64(0.05));
        assert_eq!(config.penetration_correction, Value::from_f64(0.1));
    }
}
