//! Phoenix core infrastructure.
//!
//! The allocation-free substrate under the simulation: FNV hashing and
//! stable [`Name`](name::Name) tokens, fixed-capacity containers, the
//! Morton-code spatial index, the thread pool and grouped task queues, the
//! blackboard, and the profiling seam.
//!
//! Everything simulation-visible in this crate is deterministic; the one
//! deliberately nondeterministic component (the MPMC scheduler queue) is
//! confined to thread dispatch, where an explicit sort downstream always
//! reintroduces ordering before results become simulation state.

#![deny(unsafe_code)]

#[allow(unsafe_code)]
pub mod containers;

pub mod blackboard;
pub mod color;
pub mod hash;
pub mod morton;
pub mod name;
pub mod profile;
pub mod task;

pub use color::Color;
pub use name::Name;

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::blackboard::{Blackboard, BlackboardKey, KeyQuery};
    pub use crate::color::Color;
    pub use crate::containers::{
        Arena, BlockAllocator, ChunkAllocator, FixedBvh, FixedMap, FixedRingQueue, FixedSet,
        FixedVec, MpmcQueue, ScratchVec,
    };
    pub use crate::hash::{fnv1a32, fnv1a64};
    pub use crate::morton::{morton_code, morton_query, to_morton_aabb, MortonCode, MortonRange};
    pub use crate::name::Name;
    pub use crate::profile::{profiler, set_profiler, ProfileZone, Profiler};
    pub use crate::task::{Task, TaskHandle, TaskQueue, ThreadPool};
}
