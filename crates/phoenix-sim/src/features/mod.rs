//! The core feature set.
//!
//! [`core_features`] returns the standard stack in registration order:
//! ECS first (structural work precedes everything), then physics, nav
//! mesh, blackboard, and the trace logger at the end.

pub mod blackboard;
#[allow(unsafe_code)]
pub mod ecs;
pub mod navmesh;
#[allow(unsafe_code)]
pub mod physics;
pub mod trace;

use std::sync::Arc;

use crate::feature::Feature;

pub use blackboard::{BlackboardFeature, BlackboardWorldBlock};
pub use ecs::{
    body_flags, entity_blackboard_key, ArchetypeSpec, BodyComponent, BodyMovement, EcsFeature,
    EcsWorldBlock, TransformComponent,
};
pub use navmesh::{NavMeshFeature, NavMeshWorldBlock};
pub use physics::{
    Contact, ContactPair, EntityBody, PhysicsDynamicBlock, PhysicsFeature, PhysicsScratchBlock,
};
pub use trace::TraceFeature;

/// The standard feature stack.
pub fn core_features() -> Vec<Arc<dyn Feature>> {
    vec![
        Arc::new(EcsFeature::with_default_archetypes()),
        Arc::new(PhysicsFeature::new()),
        Arc::new(NavMeshFeature::new()),
        Arc::new(BlackboardFeature::new()),
        Arc::new(TraceFeature::new()),
    ]
}
