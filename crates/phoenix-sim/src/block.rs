//! Block buffers: lifecycle-tagged simulation storage.
//!
//! All per-tick state lives in named *blocks* inside a session's or world's
//! [`BlockBuffer`]. A block's lifecycle class decides how the buffer treats
//! it:
//!
//! - **Static** -- written only during initialization; writes afterwards
//!   are refused (returning `None`) because static data is shared by
//!   reference semantics across snapshots.
//! - **Dynamic** -- the simulation state proper; cloned into snapshots and
//!   folded into the world digest.
//! - **Scratch** -- reset at the start of every tick, never snapshotted;
//!   recreated fresh in snapshot copies.
//!
//! Blocks are addressed by their type's stable name with a linear scan --
//! buffers hold a handful of blocks, so a map would cost more than it
//! saves.

use std::any::Any;

use tracing::warn;

use phoenix_core::Name;

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

/// How a block behaves across ticks and snapshots.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Lifecycle {
    /// Never written after initialization.
    Static,
    /// Simulation state: snapshotted and digested.
    Dynamic,
    /// Cleared every tick; excluded from snapshots.
    Scratch,
}

// ---------------------------------------------------------------------------
// BlockType
// ---------------------------------------------------------------------------

/// A concrete block type storable in a [`BlockBuffer`].
pub trait BlockType: Clone + Default + Send + Sync + 'static {
    fn block_name() -> Name;
    fn lifecycle() -> Lifecycle;

    /// Per-tick clear. Only meaningful for scratch blocks.
    fn reset(&mut self) {}

    /// Fold this block's simulation-relevant state into the world digest.
    /// Dynamic blocks should implement this; the default contributes
    /// nothing.
    fn digest(&self, hasher: &mut blake3::Hasher) {
        let _ = hasher;
    }
}

/// Object-safe shim over [`BlockType`].
trait BlockObject: Any + Send + Sync {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
    fn clone_block(&self) -> Box<dyn BlockObject>;
    fn reset_block(&mut self);
    fn digest_block(&self, hasher: &mut blake3::Hasher);
}

impl<T: BlockType> BlockObject for T {
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
    fn clone_block(&self) -> Box<dyn BlockObject> {
        Box::new(self.clone())
    }
    fn reset_block(&mut self) {
        self.reset();
    }
    fn digest_block(&self, hasher: &mut blake3::Hasher) {
        self.digest(hasher);
    }
}

// ---------------------------------------------------------------------------
// BlockDefinition
// ---------------------------------------------------------------------------

/// A feature's declaration that a buffer should carry one block.
#[derive(Clone, Copy)]
pub struct BlockDefinition {
    pub name: Name,
    pub lifecycle: Lifecycle,
    factory: fn() -> Box<dyn BlockObject>,
}

impl BlockDefinition {
    pub fn of<T: BlockType>() -> Self {
        fn make<T: BlockType>() -> Box<dyn BlockObject> {
            Box::new(T::default())
        }
        Self {
            name: T::block_name(),
            lifecycle: T::lifecycle(),
            factory: make::<T>,
        }
    }
}

impl std::fmt::Debug for BlockDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockDefinition")
            .field("name", &self.name)
            .field("lifecycle", &self.lifecycle)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// BlockBuffer
// ---------------------------------------------------------------------------

struct BlockEntry {
    name: Name,
    lifecycle: Lifecycle,
    factory: fn() -> Box<dyn BlockObject>,
    value: Box<dyn BlockObject>,
    warned_static_write: bool,
}

/// An ordered list of lifecycle-tagged blocks.
pub struct BlockBuffer {
    blocks: Vec<BlockEntry>,
    initialized: bool,
}

impl BlockBuffer {
    /// Build a buffer from block definitions. Duplicate names keep the
    /// first definition.
    pub fn new(definitions: &[BlockDefinition]) -> Self {
        let mut blocks: Vec<BlockEntry> = Vec::with_capacity(definitions.len());
        for def in definitions {
            if blocks.iter().any(|b| b.name == def.name) {
                continue;
            }
            blocks.push(BlockEntry {
                name: def.name,
                lifecycle: def.lifecycle,
                factory: def.factory,
                value: (def.factory)(),
                warned_static_write: false,
            });
        }
        Self {
            blocks,
            initialized: false,
        }
    }

    #[inline]
    pub fn num_blocks(&self) -> usize {
        self.blocks.len()
    }

    pub fn contains(&self, name: Name) -> bool {
        self.blocks.iter().any(|b| b.name == name)
    }

    /// Typed read access.
    pub fn get<T: BlockType>(&self) -> Option<&T> {
        let name = T::block_name();
        self.blocks
            .iter()
            .find(|b| b.name == name)?
            .value
            .as_any()
            .downcast_ref::<T>()
    }

    /// Typed write access. Static blocks refuse writes once the buffer is
    /// initialized (one warning per block).
    pub fn get_mut<T: BlockType>(&mut self) -> Option<&mut T> {
        let name = T::block_name();
        let initialized = self.initialized;
        let entry = self.blocks.iter_mut().find(|b| b.name == name)?;
        if initialized && entry.lifecycle == Lifecycle::Static {
            if !entry.warned_static_write {
                entry.warned_static_write = true;
                warn!(block = %entry.name, "write to static block after initialization refused");
            }
            return None;
        }
        entry.value.as_any_mut().downcast_mut::<T>()
    }

    /// Seal static blocks. Called once session/world initialization ends.
    pub fn finish_initialization(&mut self) {
        self.initialized = true;
    }

    #[inline]
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Per-tick scratch clear.
    pub fn reset_scratch(&mut self) {
        for entry in &mut self.blocks {
            if entry.lifecycle == Lifecycle::Scratch {
                entry.value.reset_block();
            }
        }
    }

    /// Fold every dynamic block into `hasher`, in block order.
    pub fn digest(&self, hasher: &mut blake3::Hasher) {
        for entry in &self.blocks {
            if entry.lifecycle == Lifecycle::Dynamic {
                hasher.update(&entry.name.hash().to_le_bytes());
                entry.value.digest_block(hasher);
            }
        }
    }
}

/// Snapshot semantics: static and dynamic blocks deep-copy, scratch blocks
/// come back factory-fresh.
impl Clone for BlockBuffer {
    fn clone(&self) -> Self {
        let blocks = self
            .blocks
            .iter()
            .map(|entry| BlockEntry {
                name: entry.name,
                lifecycle: entry.lifecycle,
                factory: entry.factory,
                value: match entry.lifecycle {
                    Lifecycle::Scratch => (entry.factory)(),
                    _ => entry.value.clone_block(),
                },
                warned_static_write: false,
            })
            .collect();
        Self {
            blocks,
            initialized: self.initialized,
        }
    }
}

impl std::fmt::Debug for BlockBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockBuffer")
            .field("blocks", &self.blocks.iter().map(|b| b.name).collect::<Vec<_>>())
            .field("initialized", &self.initialized)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Default)]
    struct Settings {
        gravity: i32,
    }
    impl BlockType for Settings {
        fn block_name() -> Name {
            Name::hashed("settings")
        }
        fn lifecycle() -> Lifecycle {
            Lifecycle::Static
        }
    }

    #[derive(Clone, Default)]
    struct State {
        counter: u64,
    }
    impl BlockType for State {
        fn block_name() -> Name {
            Name::hashed("state")
        }
        fn lifecycle() -> Lifecycle {
            Lifecycle::Dynamic
        }
        fn digest(&self, hasher: &mut blake3::Hasher) {
            hasher.update(&self.counter.to_le_bytes());
        }
    }

    #[derive(Clone, Default)]
    struct PerTick {
        entries: Vec<u32>,
    }
    impl BlockType for PerTick {
        fn block_name() -> Name {
            Name::hashed("per_tick")
        }
        fn lifecycle() -> Lifecycle {
            Lifecycle::Scratch
        }
        fn reset(&mut self) {
            self.entries.clear();
        }
    }

    fn buffer() -> BlockBuffer {
        BlockBuffer::new(&[
            BlockDefinition::of::<Settings>(),
            BlockDefinition::of::<State>(),
            BlockDefinition::of::<PerTick>(),
        ])
    }

    #[test]
    fn typed_access_by_block_name() {
        let mut b = buffer();
        assert_eq!(b.num_blocks(), 3);
        b.get_mut::<State>().unwrap().counter = 9;
        assert_eq!(b.get::<State>().unwrap().counter, 9);
        assert!(b.contains(Name::hashed("settings")));
    }

    #[test]
    fn duplicate_definitions_keep_first() {
        let b = BlockBuffer::new(&[
            BlockDefinition::of::<State>(),
            BlockDefinition::of::<State>(),
        ]);
        assert_eq!(b.num_blocks(), 1);
    }

    #[test]
    fn static_blocks_freeze_after_initialization() {
        let mut b = buffer();
        b.get_mut::<Settings>().unwrap().gravity = -10;
        b.finish_initialization();
        assert!(b.get_mut::<Settings>().is_none());
        assert_eq!(b.get::<Settings>().unwrap().gravity, -10);
        // Dynamic blocks stay writable.
        assert!(b.get_mut::<State>().is_some());
    }

    #[test]
    fn scratch_blocks_reset_each_tick() {
        let mut b = buffer();
        b.get_mut::<PerTick>().unwrap().entries.push(1);
        b.reset_scratch();
        assert!(b.get::<PerTick>().unwrap().entries.is_empty());
    }

    #[test]
    fn snapshot_excludes_scratch_and_copies_dynamic() {
        let mut b = buffer();
        b.get_mut::<State>().unwrap().counter = 5;
        b.get_mut::<PerTick>().unwrap().entries.push(42);
        b.finish_initialization();

        let mut snap = b.clone();
        assert_eq!(snap.get::<State>().unwrap().counter, 5);
        assert!(snap.get::<PerTick>().unwrap().entries.is_empty());

        // Snapshot is independently mutable.
        snap.get_mut::<State>().unwrap().counter = 100;
        assert_eq!(b.get::<State>().unwrap().counter, 5);
    }

    #[test]
    fn digest_covers_dynamic_blocks_only() {
        let mut a = buffer();
        let mut b = buffer();
        a.get_mut::<PerTick>().unwrap().entries.push(1);
        // Scratch difference: digests equal.
        let (mut ha, mut hb) = (blake3::Hasher::new(), blake3::Hasher::new());
        a.digest(&mut ha);
        b.digest(&mut hb);
        assert_eq!(ha.finalize(), hb.finalize());

        // Dynamic difference: digests diverge.
        b.get_mut::<State>().unwrap().counter = 1;
        let (mut ha, mut hb) = (blake3::Hasher::new(), blake3::Hasher::new());
        a.digest(&mut ha);
        b.digest(&mut hb);
        assert_ne!(ha.finalize(), hb.finalize());
    }

    #[test]
    fn missing_block_is_none() {
        #[derive(Clone, Default)]
        struct Absent;
        impl BlockType for Absent {
            fn block_name() -> Name {
                Name::hashed("absent")
            }
            fn lifecycle() -> Lifecycle {
                Lifecycle::Dynamic
            }
        }
        let b = buffer();
        assert!(b.get::<Absent>().is_none());
    }
}
