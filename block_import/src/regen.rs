use std::sync::Arc;

use async_trait::async_trait;
use derive_more::Constructor;
use helper_functions::context::StateContext;
use log::{debug, warn};
use transition_functions::StateRootPolicy;
use types::{
    config::Config,
    phase0::{
        containers::BeaconBlock,
        primitives::{Slot, H256},
    },
};

use crate::{db::ChainDb, error::RegenError};

/// Source of pre-states for blocks.
#[async_trait]
pub trait PreStateProvider: Send + Sync {
    /// Returns the post-state of `block.parent_root` advanced to `block.slot`.
    async fn get_pre_state(&self, block: &BeaconBlock) -> Result<StateContext, RegenError>;
}

/// Rebuilds pre-states from cached states and stored blocks.
///
/// If the parent state is not cached, blocks are replayed on top of the nearest cached
/// ancestor state. Replayed states are cached along the way.
#[derive(Constructor)]
pub struct StateRegenerator {
    config: Arc<Config>,
    db: Arc<ChainDb>,
}

#[async_trait]
impl PreStateProvider for StateRegenerator {
    async fn get_pre_state(&self, block: &BeaconBlock) -> Result<StateContext, RegenError> {
        let parent_root = block.parent_root;
        let slot = block.slot;

        let parent_state = match self.cached_state(parent_root, slot) {
            Some(state) => state,
            None => self.replay(parent_root, slot)?,
        };

        if parent_state.slot() == slot {
            return Ok(parent_state);
        }

        let pre_state = transition_functions::process_slots(&self.config, &parent_state, slot)
            .map_err(|source| RegenError::ProcessSlots {
                block_root: parent_root,
                slot,
                source,
            })?;

        self.cache_state(parent_root, &pre_state);

        Ok(pre_state)
    }
}

impl StateRegenerator {
    fn replay(&self, block_root: H256, slot: Slot) -> Result<StateContext, RegenError> {
        let mut blocks = vec![];
        let mut root = block_root;
        let mut limit = slot;

        let base_state = loop {
            if let Some(state) = self.cached_state(root, limit) {
                break state;
            }

            let block = self
                .db
                .block(root)
                .ok_or(RegenError::BlockNotFound { block_root: root })?;

            limit = block.slot();
            root = block.parent_root();
            blocks.push(block);
        };

        debug!(
            "replaying {} blocks to rebuild state (block_root: {block_root:?}, base_slot: {})",
            blocks.len(),
            base_state.slot(),
        );

        blocks.into_iter().rev().try_fold(base_state, |state, block| {
            let block_root = block.block_root();

            let post_state = transition_functions::state_transition(
                &self.config,
                &state,
                &block,
                StateRootPolicy::Trust,
            )
            .map_err(|source| RegenError::Replay { block_root, source })?;

            self.cache_state(block_root, &post_state);

            Ok(post_state)
        })
    }

    fn cached_state(&self, block_root: H256, slot: Slot) -> Option<StateContext> {
        match self.db.state_cache().before_or_at_slot(block_root, slot) {
            Ok(Some(state)) => return Some(state),
            Ok(None) => {}
            Err(error) => warn!("state cache lookup failed: {error}"),
        }

        self.db
            .checkpoint_state_cache()
            .latest_for_root(block_root)
            .map(|(_, state)| state)
            .filter(|state| state.slot() <= slot)
    }

    fn cache_state(&self, block_root: H256, state: &StateContext) {
        if let Err(error) = self.db.state_cache().insert(block_root, state.clone()) {
            warn!("failed to cache state (block_root: {block_root:?}): {error}");
        }
    }
}
