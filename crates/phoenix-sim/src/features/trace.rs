//! The trace feature: logs channel traffic at trace level.
//!
//! Carries no blocks and changes no state; registered at the end of the
//! feature list so its output reflects what the frame actually did.

use tracing::trace;

use phoenix_core::Name;

use crate::action::Action;
use crate::block::BlockBuffer;
use crate::feature::{Channel, Feature, FeatureDefinition, InsertPosition, UpdateArgs};
use crate::tasks::WorldTaskQueue;
use crate::world::World;

/// Diagnostic channel logger.
#[derive(Default)]
pub struct TraceFeature;

impl TraceFeature {
    pub fn new() -> Self {
        Self
    }
}

impl Feature for TraceFeature {
    fn definition(&self) -> FeatureDefinition {
        FeatureDefinition::new(Name::new("trace"))
            .with_channels(&[
                Channel::PreUpdate,
                Channel::PostUpdate,
                Channel::PostWorldUpdate,
                Channel::PostHandleWorldAction,
            ])
            .at(InsertPosition::End)
    }

    fn on_pre_update(&self, _session: &mut BlockBuffer, args: &UpdateArgs) {
        trace!(sim_time = args.sim_time, "step begin");
    }

    fn on_post_update(&self, _session: &mut BlockBuffer, args: &UpdateArgs) {
        trace!(sim_time = args.sim_time, "session channels done");
    }

    fn on_post_world_update(
        &self,
        world: &mut World,
        args: &UpdateArgs,
        _tasks: &mut WorldTaskQueue,
    ) {
        trace!(world = %world.name(), sim_time = args.sim_time, "world updated");
    }

    fn on_post_handle_world_action(&self, world: &mut World, action: &Action) {
        trace!(world = %world.name(), verb = %action.verb, "action handled");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscribes_to_diagnostic_channels_only() {
        let def = TraceFeature::new().definition();
        assert!(def.world_blocks.is_empty());
        assert!(def.session_blocks.is_empty());
        assert_eq!(def.insert_position, InsertPosition::End);
        assert!(def.channels.contains(&Channel::PostWorldUpdate));
    }
}
