//! The blackboard feature: a per-world key/value scratchpad for gameplay
//! logic, sorted between ticks so in-tick queries binary-search.

use phoenix_core::blackboard::Blackboard;
use phoenix_core::Name;

use crate::block::{BlockDefinition, BlockType, Lifecycle};
use crate::feature::{Channel, Feature, FeatureDefinition, UpdateArgs};
use crate::tasks::WorldTaskQueue;
use crate::world::World;

const BLACKBOARD_CAPACITY: usize = 8192;

/// The world's blackboard.
#[derive(Clone)]
pub struct BlackboardWorldBlock {
    pub board: Blackboard,
}

impl Default for BlackboardWorldBlock {
    fn default() -> Self {
        Self {
            board: Blackboard::with_capacity(BLACKBOARD_CAPACITY),
        }
    }
}

impl BlockType for BlackboardWorldBlock {
    fn block_name() -> Name {
        Name::hashed("blackboard")
    }
    fn lifecycle() -> Lifecycle {
        Lifecycle::Dynamic
    }
    fn digest(&self, hasher: &mut blake3::Hasher) {
        for (key, value) in self.board.entries() {
            hasher.update(&key.to_le_bytes());
            hasher.update(&value.to_le_bytes());
        }
    }
}

/// Maintains the per-world blackboard block.
#[derive(Default)]
pub struct BlackboardFeature;

impl BlackboardFeature {
    pub fn new() -> Self {
        Self
    }
}

impl Feature for BlackboardFeature {
    fn definition(&self) -> FeatureDefinition {
        FeatureDefinition::new(Name::new("blackboard"))
            .with_world_block(BlockDefinition::of::<BlackboardWorldBlock>())
            .with_channels(&[Channel::PostWorldUpdate])
    }

    /// Sort between ticks so next tick's reads can binary search and the
    /// digest walks entries in key order.
    fn on_post_world_update(
        &self,
        world: &mut World,
        _args: &UpdateArgs,
        _tasks: &mut WorldTaskQueue,
    ) {
        if let Some(block) = world.get_block_mut::<BlackboardWorldBlock>() {
            block.board.sort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use phoenix_core::blackboard::key;

    #[test]
    fn post_update_sorts_the_board() {
        let mut world = World::new(
            Name::hashed("test"),
            &[BlockDefinition::of::<BlackboardWorldBlock>()],
        );
        let feature = BlackboardFeature::new();

        {
            let block = world.get_block_mut::<BlackboardWorldBlock>().unwrap();
            block.board.set(key::create(9, 1, 0), 9u32);
            block.board.set(key::create(3, 1, 0), 3u32);
            block.board.set(key::create(7, 1, 0), 7u32);
        }

        let pool = std::sync::Arc::new(phoenix_core::task::ThreadPool::new("bb-test", 1, 64));
        let mut tasks = WorldTaskQueue::new(pool);
        feature.on_post_world_update(&mut world, &UpdateArgs::new(1, 60), &mut tasks);

        let block = world.get_block::<BlackboardWorldBlock>().unwrap();
        let keys: Vec<u64> = block.board.entries().iter().map(|(k, _)| *k).collect();
        let mut sorted = keys.clone();
        sorted.sort_unstable();
        assert_eq!(keys, sorted);
    }

    #[test]
    fn digest_reflects_contents() {
        let a = BlackboardWorldBlock::default();
        let mut b = BlackboardWorldBlock::default();
        b.board.set(key::create(1, 1, 0), 5u32);

        let (mut ha, mut hb) = (blake3::Hasher::new(), blake3::Hasher::new());
        a.digest(&mut ha);
        b.digest(&mut hb);
        assert_ne!(ha.finalize(), hb.finalize());
    }
}
