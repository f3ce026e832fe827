use core::time::Duration;
use std::{collections::HashMap, sync::Arc};

use anyhow::Result;
use log::debug;
use parking_lot::RwLock;
use state_cache::{CheckpointStateCache, StateCache};
use types::{
    config::Config,
    phase0::{
        containers::{Checkpoint, SignedBeaconBlock},
        primitives::H256,
    },
};

const STATE_CACHE_LOCK_TIMEOUT: Duration = Duration::from_secs(1);

/// In-memory storage for imported blocks and the states derived from them.
pub struct ChainDb {
    blocks: RwLock<HashMap<H256, Arc<SignedBeaconBlock>>>,
    state_cache: StateCache,
    checkpoint_state_cache: CheckpointStateCache,
}

impl ChainDb {
    #[must_use]
    pub fn new(config: &Config) -> Self {
        Self {
            blocks: RwLock::default(),
            state_cache: StateCache::new(STATE_CACHE_LOCK_TIMEOUT),
            checkpoint_state_cache: CheckpointStateCache::new(config.checkpoint_state_cache_size),
        }
    }

    #[must_use]
    pub fn block(&self, block_root: H256) -> Option<Arc<SignedBeaconBlock>> {
        self.blocks.read().get(&block_root).cloned()
    }

    #[must_use]
    pub fn contains_block(&self, block_root: H256) -> bool {
        self.blocks.read().contains_key(&block_root)
    }

    pub fn insert_block(&self, block_root: H256, block: Arc<SignedBeaconBlock>) {
        self.blocks.write().insert(block_root, block);
    }

    #[must_use]
    pub const fn state_cache(&self) -> &StateCache {
        &self.state_cache
    }

    #[must_use]
    pub const fn checkpoint_state_cache(&self) -> &CheckpointStateCache {
        &self.checkpoint_state_cache
    }

    /// Drops blocks and states that can no longer be needed once `finalized_checkpoint` is
    /// finalized.
    ///
    /// The finalized block and its post-state are kept as the base for rebuilding later states.
    pub fn prune(&self, finalized_checkpoint: Checkpoint) -> Result<()> {
        let Some(finalized_slot) = self
            .block(finalized_checkpoint.root)
            .map(|block| block.slot())
        else {
            return Ok(());
        };

        let pruned_blocks = {
            let mut blocks = self.blocks.write();
            let before = blocks.len();
            blocks.retain(|_, block| block.slot() >= finalized_slot);
            before - blocks.len()
        };

        if let Some(last_pruned_slot) = finalized_slot.checked_sub(1) {
            self.state_cache.prune(last_pruned_slot)?;
        }

        self.checkpoint_state_cache
            .prune(finalized_checkpoint.epoch);

        debug!(
            "pruned {pruned_blocks} blocks older than finalized checkpoint \
             (finalized_checkpoint: {finalized_checkpoint:?})",
        );

        Ok(())
    }
}
