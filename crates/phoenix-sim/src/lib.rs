//! Phoenix simulation shell.
//!
//! The deterministic orchestrator over the fixed-point kernel, the
//! archetype ECS, and the navigation core: block buffers partitioned by
//! lifecycle, the feature/channel pipeline, the fixed-step session with
//! its timestamped action queue, per-world task queues with barrier
//! groups, and the core features (ECS, physics, nav mesh, blackboard,
//! trace).
//!
//! Given identical initial state, action stream, and step rate, two
//! sessions produce byte-identical world digests at every tick -- on any
//! machine. The test suite pins that property with BLAKE3 digests.
//!
//! # Quick Start
//!
//! ```
//! use phoenix_core::Name;
//! use phoenix_fixed::Vec2;
//! use phoenix_sim::prelude::*;
//!
//! let mut session = Session::new(SessionArgs {
//!     features: core_features(),
//!     num_workers: Some(2),
//!     on_post_world_update: None,
//! });
//! session.initialize();
//! session.world_manager_mut().new_world(Name::new("main"));
//!
//! session.queue_action(
//!     Action::new(Name::new("spawn_entity"))
//!         .with(0, Name::new("unit"))
//!         .with(1, Vec2::from_int(3, 4)),
//! );
//! session.step(60);
//!
//! let world = session.world_manager().primary_world().unwrap();
//! assert_eq!(world.sim_time(), 1);
//! ```

#![deny(unsafe_code)]

pub mod action;
pub mod block;
pub mod debug;
pub mod feature;
pub mod features;
pub mod session;
#[allow(unsafe_code)]
pub mod tasks;
pub mod world;

use phoenix_core::Name;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Session-level configuration errors. Per-tick failures never surface
/// here -- they follow the sentinel contract (invalid ids, `None`,
/// dropped actions with a warning).
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SessionError {
    /// A world name was requested twice with conflicting intent.
    #[error("world {name:?} already exists")]
    WorldExists { name: Name },

    /// A required block was missing from a buffer.
    #[error("block {name:?} is not present in this buffer")]
    MissingBlock { name: Name },
}

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::action::{Action, Variant};
    pub use crate::block::{BlockBuffer, BlockDefinition, BlockType, Lifecycle};
    pub use crate::debug::{DebugRenderer, DebugState, NullDebugState, RecordingRenderer};
    pub use crate::feature::{
        Channel, Feature, FeatureDefinition, FeatureSet, InsertPosition, UpdateArgs,
    };
    pub use crate::features::{
        core_features, ArchetypeSpec, BlackboardFeature, BlackboardWorldBlock, BodyComponent,
        BodyMovement, EcsFeature, EcsWorldBlock, NavMeshFeature, NavMeshWorldBlock,
        PhysicsDynamicBlock, PhysicsFeature, PhysicsScratchBlock, TraceFeature,
        TransformComponent,
    };
    pub use crate::session::{Session, SessionArgs, TickReport, CLOCKS_PER_SEC};
    pub use crate::tasks::{RawRef, WorldCell, WorldTaskQueue};
    pub use crate::world::{World, WorldDynamicBlock, WorldManager};
    pub use crate::SessionError;
}
