//! Phoenix archetype ECS.
//!
//! Entities whose component set is fixed at spawn by their *archetype*:
//! storage is struct-of-arrays per archetype (one type-erased column per
//! component plus a parallel entity-id slot array), handles are
//! generationally stale-detectable, and typed queries iterate spans of
//! uniform-archetype rows -- sequentially or as units of parallel work.
//!
//! # Quick Start
//!
//! ```
//! use phoenix_core::Name;
//! use phoenix_ecs::prelude::*;
//!
//! #[derive(Debug, Clone, Default)]
//! struct Position { x: i32, y: i32 }
//!
//! impl Component for Position {
//!     fn component_name() -> Name { Name::hashed("position") }
//! }
//!
//! let mut manager = ArchetypeManager::new(ManagerConfig::default());
//! manager.register_component::<Position>();
//! manager.register_archetype(Name::hashed("marker"), &[Name::hashed("position")]).unwrap();
//!
//! let handle = manager.acquire(EntityId(1), Name::hashed("marker"));
//! assert!(handle.is_valid());
//! manager.get_component_mut::<Position>(handle).unwrap().x = 5;
//! assert_eq!(manager.get_component::<Position>(handle).unwrap().x, 5);
//! ```

#![deny(unsafe_code)]

pub mod archetype;
#[allow(unsafe_code)]
pub mod component;
pub mod entity;
#[allow(unsafe_code)]
pub mod list;
#[allow(unsafe_code)]
pub mod manager;
#[allow(unsafe_code)]
pub mod query;
pub mod tag;

use phoenix_core::Name;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors surfaced by registration-time ECS operations. Per-tick paths
/// report failure through sentinels (invalid handles, `None`, `false`)
/// instead -- they never allocate and never panic.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum EcsError {
    /// A component name was referenced before registration.
    #[error("component {name:?} is not registered")]
    UnknownComponent { name: Name },

    /// An archetype definition could not be built (duplicate members or
    /// too many components).
    #[error("archetype {kind:?} definition is invalid")]
    InvalidArchetype { kind: Name },

    /// A fixed registry ran out of room.
    #[error("{what} capacity exhausted")]
    CapacityExhausted { what: &'static str },
}

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::archetype::{ArchetypeDefinition, ComponentSlot, MAX_COMPONENTS_PER_ARCHETYPE};
    pub use crate::component::{Component, ComponentInfo, ComponentRegistry};
    pub use crate::entity::{Entity, EntityHandle, EntityId, EntityTable};
    pub use crate::list::ArchetypeList;
    pub use crate::manager::{ArchetypeManager, ManagerConfig};
    pub use crate::query::{
        filter_for, ComponentTuple, EntityComponentSpan, QueryFilter, QueryItem,
    };
    pub use crate::tag::{TagNode, TagPool};
    pub use crate::EcsError;
}
