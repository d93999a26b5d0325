//! Features and channels.
//!
//! A feature is a unit of behavior: it declares the blocks it contributes
//! to session and world buffers, subscribes to *channels* (named points in
//! the tick pipeline), and implements handler callbacks. Features are
//! stateless objects -- all per-tick state lives in their blocks -- so one
//! feature instance serves every world.
//!
//! Channel dispatch is strictly sequential over the subscribed features in
//! registration order (refined by [`InsertPosition`]); parallelism happens
//! *inside* a handler through the world task queue, and channel boundaries
//! are task-queue flush points.

use std::sync::Arc;

use phoenix_core::Name;
use phoenix_fixed::DeltaTime;

use crate::action::Action;
use crate::block::{BlockBuffer, BlockDefinition};
use crate::debug::{DebugRenderer, DebugState};
use crate::tasks::WorldTaskQueue;
use crate::world::World;

// ---------------------------------------------------------------------------
// Channels
// ---------------------------------------------------------------------------

/// Every dispatch point in the tick pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(usize)]
pub enum Channel {
    PreUpdate,
    Update,
    PostUpdate,
    PreHandleAction,
    HandleAction,
    PostHandleAction,
    WorldInitialize,
    WorldShutdown,
    PreWorldUpdate,
    WorldUpdate,
    PostWorldUpdate,
    PreHandleWorldAction,
    HandleWorldAction,
    PostHandleWorldAction,
    DebugRender,
}

impl Channel {
    pub const COUNT: usize = 15;

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }
}

/// Where a feature lands in each subscribed channel's order.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum InsertPosition {
    /// Before previously registered features.
    Begin,
    /// Registration order.
    #[default]
    Default,
    /// After everything registered so far and later `Default` entries.
    End,
}

// ---------------------------------------------------------------------------
// FeatureDefinition
// ---------------------------------------------------------------------------

/// A feature's registration manifest.
#[derive(Debug, Default)]
pub struct FeatureDefinition {
    pub name: Name,
    pub session_blocks: Vec<BlockDefinition>,
    pub world_blocks: Vec<BlockDefinition>,
    pub channels: Vec<Channel>,
    pub insert_position: InsertPosition,
}

impl FeatureDefinition {
    pub fn new(name: Name) -> Self {
        Self {
            name,
            ..Default::default()
        }
    }

    pub fn with_session_block(mut self, def: BlockDefinition) -> Self {
        self.session_blocks.push(def);
        self
    }

    pub fn with_world_block(mut self, def: BlockDefinition) -> Self {
        self.world_blocks.push(def);
        self
    }

    pub fn with_channels(mut self, channels: &[Channel]) -> Self {
        self.channels.extend_from_slice(channels);
        self
    }

    pub fn at(mut self, position: InsertPosition) -> Self {
        self.insert_position = position;
        self
    }
}

// ---------------------------------------------------------------------------
// Update / action arguments
// ---------------------------------------------------------------------------

/// Per-step timing context handed to every handler.
#[derive(Clone, Copy, Debug)]
pub struct UpdateArgs {
    pub sim_time: u64,
    pub step_hz: u32,
    pub dt: DeltaTime,
}

impl UpdateArgs {
    pub fn new(sim_time: u64, step_hz: u32) -> Self {
        Self {
            sim_time,
            step_hz,
            dt: DeltaTime::from_hz(step_hz.max(1)),
        }
    }
}

// ---------------------------------------------------------------------------
// Feature trait
// ---------------------------------------------------------------------------

/// A unit of simulation behavior. Every handler has a no-op default; a
/// feature implements only the channels it subscribes to.
#[allow(unused_variables)]
pub trait Feature: Send + Sync {
    fn definition(&self) -> FeatureDefinition;

    /// Session construction hook (before any tick).
    fn initialize(&self) {}
    /// Session teardown hook.
    fn shutdown(&self) {}

    // -- session-scope channels ---------------------------------------------

    fn on_pre_update(&self, session: &mut BlockBuffer, args: &UpdateArgs) {}
    fn on_update(&self, session: &mut BlockBuffer, args: &UpdateArgs) {}
    fn on_post_update(&self, session: &mut BlockBuffer, args: &UpdateArgs) {}

    fn on_pre_handle_action(&self, session: &mut BlockBuffer, action: &Action) {}
    /// Return `true` to consume the action, halting dispatch for its verb.
    fn on_handle_action(&self, session: &mut BlockBuffer, action: &Action) -> bool {
        false
    }
    fn on_post_handle_action(&self, session: &mut BlockBuffer, action: &Action) {}

    // -- world-scope channels -----------------------------------------------

    fn on_world_initialize(&self, world: &mut World) {}
    fn on_world_shutdown(&self, world: &mut World) {}

    fn on_pre_world_update(&self, world: &mut World, args: &UpdateArgs, tasks: &mut WorldTaskQueue) {
    }
    fn on_world_update(&self, world: &mut World, args: &UpdateArgs, tasks: &mut WorldTaskQueue) {}
    fn on_post_world_update(&self, world: &mut World, args: &UpdateArgs, tasks: &mut WorldTaskQueue) {
    }

    fn on_pre_handle_world_action(&self, world: &mut World, action: &Action) {}
    /// Return `true` to consume the action, halting dispatch for its verb.
    fn on_handle_world_action(&self, world: &mut World, action: &Action) -> bool {
        false
    }
    fn on_post_handle_world_action(&self, world: &mut World, action: &Action) {}

    // -- diagnostics --------------------------------------------------------

    fn on_debug_render(
        &self,
        world: &World,
        state: &dyn DebugState,
        renderer: &mut dyn DebugRenderer,
    ) {
    }
}

// ---------------------------------------------------------------------------
// FeatureSet
// ---------------------------------------------------------------------------

/// The ordered feature list plus per-channel dispatch orders.
pub struct FeatureSet {
    features: Vec<Arc<dyn Feature>>,
    /// Indices into `features`, one ordered list per channel.
    channels: Vec<Vec<usize>>,
}

impl FeatureSet {
    pub fn new(features: Vec<Arc<dyn Feature>>) -> Self {
        let mut channels: Vec<Vec<usize>> = vec![Vec::new(); Channel::COUNT];

        // Subscription order is registration order, refined by insert
        // position: Begin entries land before everything registered so
        // far, End entries after everything.
        let mut begin: Vec<Vec<usize>> = vec![Vec::new(); Channel::COUNT];
        let mut middle: Vec<Vec<usize>> = vec![Vec::new(); Channel::COUNT];
        let mut end: Vec<Vec<usize>> = vec![Vec::new(); Channel::COUNT];

        for (index, feature) in features.iter().enumerate() {
            let definition = feature.definition();
            for channel in &definition.channels {
                let bucket = match definition.insert_position {
                    InsertPosition::Begin => &mut begin,
                    InsertPosition::Default => &mut middle,
                    InsertPosition::End => &mut end,
                };
                bucket[channel.index()].push(index);
            }
        }
        for i in 0..Channel::COUNT {
            channels[i].extend(&begin[i]);
            channels[i].extend(&middle[i]);
            channels[i].extend(&end[i]);
        }

        Self { features, channels }
    }

    #[inline]
    pub fn features(&self) -> &[Arc<dyn Feature>] {
        &self.features
    }

    /// The features subscribed to `channel`, in dispatch order.
    pub fn channel(&self, channel: Channel) -> impl Iterator<Item = &Arc<dyn Feature>> {
        self.channels[channel.index()]
            .iter()
            .map(move |&i| &self.features[i])
    }

    /// Union of all world block definitions, in feature order.
    pub fn world_block_definitions(&self) -> Vec<BlockDefinition> {
        let mut defs = Vec::new();
        for feature in &self.features {
            defs.extend(feature.definition().world_blocks);
        }
        defs
    }

    /// Union of all session block definitions, in feature order.
    pub fn session_block_definitions(&self) -> Vec<BlockDefinition> {
        let mut defs = Vec::new();
        for feature in &self.features {
            defs.extend(feature.definition().session_blocks);
        }
        defs
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
