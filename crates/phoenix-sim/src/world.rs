//! Worlds and the world manager.
//!
//! A [`World`] is a named simulation instance: a block buffer plus
//! lifecycle flags. Worlds are cheap to snapshot -- a snapshot clones the
//! static and dynamic blocks and recreates scratch, yielding an
//! independently mutable copy.
//!
//! The [`WorldManager`] owns every world and its task queue, runs the
//! world-scope channels each step, initializes worlds on first observation
//! through the `WorldInitialize` channel, and hands a snapshot to the
//! embedding's `on_post_world_update` callback after each world's update.

use std::sync::Arc;

use tracing::debug;

use phoenix_core::task::ThreadPool;
use phoenix_core::Name;

use crate::action::Action;
use crate::block::{BlockBuffer, BlockDefinition, BlockType, Lifecycle};
use crate::feature::{Channel, FeatureSet, UpdateArgs};
use crate::tasks::WorldTaskQueue;

// ---------------------------------------------------------------------------
// WorldDynamicBlock
// ---------------------------------------------------------------------------

/// Core per-world state every world carries.
#[derive(Clone, Default)]
pub struct WorldDynamicBlock {
    pub sim_time: u64,
}

impl BlockType for WorldDynamicBlock {
    fn block_name() -> Name {
        Name::hashed("world_core")
    }
    fn lifecycle() -> Lifecycle {
        Lifecycle::Dynamic
    }
    fn digest(&self, hasher: &mut blake3::Hasher) {
        hasher.update(&self.sim_time.to_le_bytes());
    }
}

// ---------------------------------------------------------------------------
// World
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct WorldFlags {
    initialized: bool,
    shut_down: bool,
}

/// A named simulation instance.
pub struct World {
    name: Name,
    buffer: BlockBuffer,
    flags: WorldFlags,
}

impl World {
    pub fn new(name: Name, block_definitions: &[BlockDefinition]) -> Self {
        Self {
            name,
            buffer: BlockBuffer::new(block_definitions),
            flags: WorldFlags::default(),
        }
    }

    #[inline]
    pub fn name(&self) -> Name {
        self.name
    }

    #[inline]
    pub fn is_initialized(&self) -> bool {
        self.flags.initialized
    }

    #[inline]
    pub fn is_shut_down(&self) -> bool {
        self.flags.shut_down
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.flags.initialized && !self.flags.shut_down
    }

    /// Current sim tick as mirrored into the world's dynamic block.
    pub fn sim_time(&self) -> u64 {
        self.buffer
            .get::<WorldDynamicBlock>()
            .map(|b| b.sim_time)
            .unwrap_or(0)
    }

    #[inline]
    pub fn buffer(&self) -> &BlockBuffer {
        &self.buffer
    }

    #[inline]
    pub fn buffer_mut(&mut self) -> &mut BlockBuffer {
        &mut self.buffer
    }

    /// Typed block read.
    #[inline]
    pub fn get_block<T: BlockType>(&self) -> Option<&T> {
        self.buffer.get::<T>()
    }

    /// Typed block write (refused for static blocks after initialization).
    #[inline]
    pub fn get_block_mut<T: BlockType>(&mut self) -> Option<&mut T> {
        self.buffer.get_mut::<T>()
    }

    /// [`get_block`](Self::get_block) for callers that treat a missing
    /// block as a configuration error rather than a soft failure.
    pub fn require_block<T: BlockType>(&self) -> Result<&T, crate::SessionError> {
        self.buffer.get::<T>().ok_or(crate::SessionError::MissingBlock {
            name: T::block_name(),
        })
    }

    /// An independently mutable copy: static/dynamic blocks cloned,
    /// scratch recreated.
    pub fn snapshot(&self) -> World {
        World {
            name: self.name,
            buffer: self.buffer.clone(),
            flags: self.flags,
        }
    }

    /// BLAKE3 digest of the dynamic simulation state. Two runs with
    /// identical inputs must produce identical digests at every tick.
    pub fn state_digest(&self) -> blake3::Hash {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&self.name.hash().to_le_bytes());
        self.buffer.digest(&mut hasher);
        hasher.finalize()
    }
}

impl std::fmt::Debug for World {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("World")
            .field("name", &self.name)
            .field("sim_time", &self.sim_time())
            .field("initialized", &self.flags.initialized)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// WorldManager
// ---------------------------------------------------------------------------

/// Snapshot observer invoked after each world's update channels.
pub type PostWorldUpdateFn = Box<dyn FnMut(World) + Send>;

/// Owns all worlds, their task queues, and world-scope dispatch.
pub struct WorldManager {
    feature_set: Arc<FeatureSet>,
    block_definitions: Vec<BlockDefinition>,
    worlds: Vec<World>,
    queues: Vec<WorldTaskQueue>,
    pool: Arc<ThreadPool>,
    on_post_world_update: Option<PostWorldUpdateFn>,
}

impl WorldManager {
    pub fn new(
        feature_set: Arc<FeatureSet>,
        pool: Arc<ThreadPool>,
        on_post_world_update: Option<PostWorldUpdateFn>,
    ) -> Self {
        // Every world carries the core block plus the union of the
        // features' world block definitions.
        let mut block_definitions = vec![BlockDefinition::of::<WorldDynamicBlock>()];
        block_definitions.extend(feature_set.world_block_definitions());

        Self {
            feature_set,
            block_definitions,
            worlds: Vec::new(),
            queues: Vec::new(),
            pool,
            on_post_world_update,
        }
    }

    /// Create a world, or return the existing one with this name.
    pub fn new_world(&mut self, name: Name) -> &mut World {
        if let Some(index) = self.worlds.iter().position(|w| w.name() == name) {
            debug!(%name, "world already exists");
            return &mut self.worlds[index];
        }
        debug!(%name, "world created");
        self.worlds.push(World::new(name, &self.block_definitions));
        self.queues
            .push(WorldTaskQueue::new(Arc::clone(&self.pool)));
        self.worlds.last_mut().expect("just pushed")
    }

    pub fn get_world(&self, name: Name) -> Option<&World> {
        self.worlds.iter().find(|w| w.name() == name)
    }

    pub fn get_world_mut(&mut self, name: Name) -> Option<&mut World> {
        self.worlds.iter_mut().find(|w| w.name() == name)
    }

    /// The first world created.
    pub fn primary_world(&self) -> Option<&World> {
        self.worlds.first()
    }

    /// Mutable access to the first world created.
    ///
    /// # Panics
    ///
    /// Panics when no world exists yet.
    pub fn primary_world_mut(&mut self) -> &mut World {
        self.worlds.first_mut().expect("no worlds created")
    }

    pub fn worlds(&self) -> &[World] {
        &self.worlds
    }

    pub fn num_worlds(&self) -> usize {
        self.worlds.len()
    }

    /// Step every world (or just `target`): initialize the uninitialized,
    /// then run the three world-update channels with task flushes at each
    /// channel boundary.
    pub fn step(&mut self, args: &UpdateArgs, target: Option<Name>) {
        let feature_set = Arc::clone(&self.feature_set);

        for index in 0..self.worlds.len() {
            if let Some(target) = target {
                if self.worlds[index].name() != target {
                    continue;
                }
            }
            if self.worlds[index].is_shut_down() {
                continue;
            }
            if !self.worlds[index].is_initialized() {
                Self::initialize_world(&feature_set, &mut self.worlds[index]);
            }
            self.update_world(index, args, &feature_set);
        }
    }

    fn initialize_world(feature_set: &FeatureSet, world: &mut World) {
        debug!(name = %world.name(), "initializing world");
        for feature in feature_set.channel(Channel::WorldInitialize) {
            feature.on_world_initialize(world);
        }
        world.buffer.finish_initialization();
        world.flags.initialized = true;
    }

    fn update_world(&mut self, index: usize, args: &UpdateArgs, feature_set: &FeatureSet) {
        let world = &mut self.worlds[index];
        let queue = &mut self.queues[index];

        // Scratch lifecycle: cleared at the top of every world tick.
        world.buffer.reset_scratch();
        if let Some(core) = world.get_block_mut::<WorldDynamicBlock>() {
            core.sim_time = args.sim_time;
        }

        for channel in [
            Channel::PreWorldUpdate,
            Channel::WorldUpdate,
            Channel::PostWorldUpdate,
        ] {
            match channel {
                Channel::PreWorldUpdate => {
                    for feature in feature_set.channel(channel) {
                        feature.on_pre_world_update(world, args, queue);
                    }
                }
                Channel::WorldUpdate => {
                    for feature in feature_set.channel(channel) {
                        feature.on_world_update(world, args, queue);
                    }
                }
                _ => {
                    for feature in feature_set.channel(channel) {
                        feature.on_post_world_update(world, args, queue);
                    }
                }
            }
            // Channel boundaries are task-queue flush points.
            queue.flush(world);
        }

        if let Some(callback) = self.on_post_world_update.as_mut() {
            callback(self.worlds[index].snapshot());
        }
    }

    /// Dispatch an action to every world (or just `target`) through the
    /// three handle-world-action channels. A consuming handler halts
    /// dispatch of the `HandleWorldAction` channel for that world.
    pub fn send_action(&mut self, action: &Action, target: Option<Name>) {
        let feature_set = Arc::clone(&self.feature_set);
        for world in &mut self.worlds {
            if let Some(target) = target {
                if world.name() != target {
                    continue;
                }
            }
            for feature in feature_set.channel(Channel::PreHandleWorldAction) {
                feature.on_pre_handle_world_action(world, action);
            }
            for feature in feature_set.channel(Channel::HandleWorldAction) {
                if feature.on_handle_world_action(world, action) {
                    break;
                }
            }
            for feature in feature_set.channel(Channel::PostHandleWorldAction) {
                feature.on_post_handle_world_action(world, action);
            }
        }
    }

    /// Run the shutdown channel over every world that has not shut down.
    pub fn shutdown(&mut self) {
        let feature_set = Arc::clone(&self.feature_set);
        for world in &mut self.worlds {
            if world.is_shut_down() {
                continue;
            }
            for feature in feature_set.channel(Channel::WorldShutdown) {
                feature.on_world_shutdown(world);
            }
            world.flags.shut_down = true;
        }
    }

    /// Debug-render every world.
    pub fn debug_render(
        &self,
        state: &dyn crate::debug::DebugState,
        renderer: &mut dyn crate::debug::DebugRenderer,
    ) {
        for world in &self.worlds {
            for feature in self.feature_set.channel(Channel::DebugRender) {
                feature.on_debug_render(world, state, renderer);
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
    use crate::feature::{Feature, FeatureDefinition};
    use std::sync::atomic::{AtomicU64, Ordering};

    #[derive(Clone, Default)]
    struct MarkerBlock {
        initialized: bool,
        updates: u64,
    }
    impl BlockType for MarkerBlock {
        fn block_name() -> Name {
            Name::hashed("marker")
        }
        fn lifecycle() -> Lifecycle {
            Lifecycle::Dynamic
        }
        fn digest(&self, hasher: &mut blake3::Hasher) {
            hasher.update(&self.updates.to_le_bytes());
        }
    }

    #[derive(Default)]
    struct MarkerFeature {
        actions_handled: AtomicU64,
    }

    impl Feature for MarkerFeature {
        fn definition(&self) -> FeatureDefinition {
            FeatureDefinition::new(Name::hashed("marker_feature"))
                .with_world_block(BlockDefinition::of::<MarkerBlock>())
                .with_channels(&[
                    Channel::WorldInitialize,
                    Channel::WorldUpdate,
                    Channel::HandleWorldAction,
                ])
        }

        fn on_world_initialize(&self, world: &mut World) {
            world.get_block_mut::<MarkerBlock>().unwrap().initialized = true;
        }

        fn on_world_update(
            &self,
            world: &mut World,
            _args: &UpdateArgs,
            _tasks: &mut WorldTaskQueue,
        ) {
            world.get_block_mut::<MarkerBlock>().unwrap().updates += 1;
        }

        fn on_handle_world_action(&self, _world: &mut World, action: &Action) -> bool {
            if action.verb == Name::hashed("ping") {
                self.actions_handled.fetch_add(1, Ordering::SeqCst);
                return true;
            }
            false
        }
    }

    fn manager() -> (WorldManager, Arc<MarkerFeature>) {
        let feature = Arc::new(MarkerFeature::default());
        let set = Arc::new(FeatureSet::new(vec![
            feature.clone() as Arc<dyn Feature>
        ]));
        let pool = Arc::new(ThreadPool::new("world-test", 2, 128));
        (WorldManager::new(set, pool, None), feature)
    }

    #[test]
    fn first_step_initializes_worlds() {
        let (mut m, _) = manager();
        m.new_world(Name::hashed("main"));
        assert!(!m.primary_world().unwrap().is_initialized());

        m.step(&UpdateArgs::new(1, 60), None);

        let world = m.primary_world().unwrap();
        assert!(world.is_initialized());
        assert!(world.get_block::<MarkerBlock>().unwrap().initialized);
        assert_eq!(world.get_block::<MarkerBlock>().unwrap().updates, 1);
        assert_eq!(world.sim_time(), 1);
    }

    #[test]
    fn duplicate_world_names_resolve_to_one_world() {
        let (mut m, _) = manager();
        m.new_world(Name::hashed("main"));
        m.new_world(Name::hashed("main"));
        assert_eq!(m.num_worlds(), 1);
    }

    #[test]
    fn targeted_step_skips_other_worlds() {
        let (mut m, _) = manager();
        m.new_world(Name::hashed("a"));
        m.new_world(Name::hashed("b"));

        m.step(&UpdateArgs::new(1, 60), Some(Name::hashed("a")));
        // Targeted stepping only initializes/updates "a".
        assert!(m.get_world(Name::hashed("a")).unwrap().is_initialized());
        assert!(!m.get_world(Name::hashed("b")).unwrap().is_initialized());
    }

    #[test]
    fn actions_consume_and_halt() {
        let (mut m, feature) = manager();
        m.new_world(Name::hashed("main"));
        m.step(&UpdateArgs::new(1, 60), None);

        m.send_action(&Action::new(Name::hashed("ping")), None);
        assert_eq!(feature.actions_handled.load(Ordering::SeqCst), 1);

        // Unknown verbs are offered but not consumed.
        m.send_action(&Action::new(Name::hashed("unknown")), None);
        assert_eq!(feature.actions_handled.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn snapshots_are_independent() {
        let (mut m, _) = manager();
        m.new_world(Name::hashed("main"));
        m.step(&UpdateArgs::new(1, 60), None);

        let snapshot = m.primary_world().unwrap().snapshot();
        m.step(&UpdateArgs::new(2, 60), None);

        assert_eq!(snapshot.get_block::<MarkerBlock>().unwrap().updates, 1);
        let live = m.primary_world().unwrap();
        assert_eq!(live.get_block::<MarkerBlock>().unwrap().updates, 2);
        assert_ne!(snapshot.state_digest(), live.state_digest());
    }

    #[test]
    fn post_world_update_callback_receives_snapshots() {
        let feature = Arc::new(MarkerFeature::default());
        let set = Arc::new(FeatureSet::new(vec![
            feature.clone() as Arc<dyn Feature>
        ]));
        let pool = Arc::new(ThreadPool::new("world-test-cb", 2, 128));

        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let seen2 = Arc::clone(&seen);
        let callback: PostWorldUpdateFn = Box::new(move |world| {
            seen2
                .lock()
                .unwrap()
                .push(world.get_block::<MarkerBlock>().unwrap().updates);
        });

        let mut m = WorldManager::new(set, pool, Some(callback));
        m.new_world(Name::hashed("main"));
        m.step(&UpdateArgs::new(1, 60), None);
        m.step(&UpdateArgs::new(2, 60), None);

        assert_eq!(*seen.lock().unwrap(), vec![1, 2]);
    }

    #[test]
    fn shutdown_marks_worlds() {
        let (mut m, _) = manager();
        m.new_world(Name::hashed("main"));
        m.step(&UpdateArgs::new(1, 60), None);
        m.shutdown();
        assert!(m.primary_world().unwrap().is_shut_down());
        assert!(!m.primary_world().unwrap().is_active());

        // Stepping a shut-down world is a no-op.
        m.step(&UpdateArgs::new(2, 60), None);
        assert_eq!(
            m.primary_world().unwrap().get_block::<MarkerBlock>().unwrap().updates,
            1
        );
    }
}
