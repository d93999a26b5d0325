//! Fixed-capacity containers.
//!
//! Every container here allocates its full capacity at construction and
//! never allocates again: simulation paths are allocation-free. Exhaustion
//! is reported through return values (`false` / `None` / invalid ids),
//! never by panicking, with a single `warn!` per container lifetime.

pub mod arena;
pub mod block_alloc;
pub mod bvh;
pub mod chunk_alloc;
pub mod fixed_map;
pub mod fixed_vec;
#[allow(unsafe_code)]
pub mod mpmc;
pub mod ring_queue;
#[allow(unsafe_code)]
pub mod scratch_vec;

pub use arena::{Arena, ArenaRange};
pub use block_alloc::{BlockAllocator, BlockId, INVALID_BLOCK_ID};
pub use bvh::{Aabb, FixedBvh};
pub use chunk_alloc::{ChunkAllocator, ChunkId, INVALID_CHUNK_ID};
pub use fixed_map::{FixedMap, FixedSet};
pub use fixed_vec::FixedVec;
pub use mpmc::MpmcQueue;
pub use ring_queue::FixedRingQueue;
pub use scratch_vec::ScratchVec;
