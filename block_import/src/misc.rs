use std::sync::Arc;

use anyhow::{ensure, Result};
use fork_choice_store::{BlockNode, Store};
use helper_functions::{context::StateContext, misc, predicates};
use types::{
    config::Config,
    phase0::{
        beacon_state::BeaconState,
        containers::{BeaconBlock, BeaconBlockHeader, Checkpoint, SignedBeaconBlock},
        primitives::{Epoch, Gwei, H256},
    },
    traits::HashTreeRoot as _,
};

use crate::db::ChainDb;

/// Splits `blocks` into maximal runs of consecutive blocks from the same epoch.
///
/// Blocks in one run can have their signatures verified against the same state.
#[must_use]
pub fn group_blocks_by_epoch<'blocks>(
    config: &Config,
    blocks: &'blocks [Arc<SignedBeaconBlock>],
) -> Vec<&'blocks [Arc<SignedBeaconBlock>]> {
    blocks
        .chunk_by(|previous, next| {
            misc::compute_epoch_at_slot(config, previous.slot())
                == misc::compute_epoch_at_slot(config, next.slot())
        })
        .collect()
}

/// Effective balances of validators active in `epoch`. Inactive validators get 0.
#[must_use]
pub fn effective_balances(state: &BeaconState, epoch: Epoch) -> Arc<[Gwei]> {
    state
        .validators
        .iter()
        .map(|validator| {
            if predicates::is_active_validator(validator, epoch) {
                validator.effective_balance
            } else {
                0
            }
        })
        .collect()
}

/// The block and state fork choice starts from.
#[derive(Clone, Debug)]
pub struct Anchor {
    block: Arc<SignedBeaconBlock>,
    block_root: H256,
    state: StateContext,
}

impl Anchor {
    /// Builds an anchor from a state whose latest block has an empty body, such as a genesis
    /// state.
    pub fn from_state(config: &Config, state: BeaconState) -> Result<Self> {
        let state = StateContext::new(config, state)?;
        let state_root = state.state_root();
        let latest_block_header = state.state().latest_block_header;

        let header = if latest_block_header.state_root.is_zero() {
            BeaconBlockHeader {
                state_root,
                ..latest_block_header
            }
        } else {
            latest_block_header
        };

        let block = SignedBeaconBlock {
            message: BeaconBlock {
                slot: header.slot,
                proposer_index: header.proposer_index,
                parent_root: header.parent_root,
                state_root: header.state_root,
                ..BeaconBlock::default()
            },
            ..SignedBeaconBlock::default()
        };

        let block_root = block.block_root();

        ensure!(
            block_root == header.hash_tree_root(),
            "latest block in anchor state has a non-empty body",
        );

        Ok(Self {
            block: Arc::new(block),
            block_root,
            state,
        })
    }

    #[must_use]
    pub const fn block_root(&self) -> H256 {
        self.block_root
    }

    #[must_use]
    pub const fn state(&self) -> &StateContext {
        &self.state
    }

    #[must_use]
    pub fn checkpoint(&self, config: &Config) -> Checkpoint {
        Checkpoint::new(self.epoch(config), self.block_root)
    }

    /// A fork choice store with the anchor as its only block.
    #[must_use]
    pub fn fork_choice_store(&self, config: &Config) -> Store {
        let epoch = self.epoch(config);

        let node = BlockNode {
            block_root: self.block_root,
            parent_root: self.block.parent_root(),
            slot: self.block.slot(),
            state_root: self.block.message().state_root,
            justified_checkpoint: Checkpoint::default(),
            finalized_checkpoint: Checkpoint::default(),
        };

        Store::new(node, epoch, effective_balances(self.state.state(), epoch))
    }

    /// A database holding the anchor block and its state.
    pub fn chain_db(&self, config: &Config) -> Result<ChainDb> {
        let db = ChainDb::new(config);

        db.insert_block(self.block_root, Arc::clone(&self.block));
        db.state_cache().insert(self.block_root, self.state.clone())?;

        if misc::is_epoch_start(config, self.block.slot()) {
            db.checkpoint_state_cache()
                .insert(self.checkpoint(config), self.state.clone());
        }

        Ok(db)
    }

    fn epoch(&self, config: &Config) -> Epoch {
        misc::compute_epoch_at_slot(config, self.block.slot())
    }
}

#[cfg(test)]
mod tests {
    use types::phase0::{consts::FAR_FUTURE_EPOCH, primitives::Slot};

    use super::*;

    fn block_at(slot: Slot) -> Arc<SignedBeaconBlock> {
        let mut block = SignedBeaconBlock::default();
        block.message.slot = slot;
        Arc::new(block)
    }

    fn slots(groups: &[&[Arc<SignedBeaconBlock>]]) -> Vec<Vec<Slot>> {
        groups
            .iter()
            .map(|group| group.iter().map(|block| block.slot()).collect())
            .collect()
    }

    #[test]
    fn blocks_are_grouped_into_contiguous_epoch_runs() {
        let config = Config::minimal();
        let blocks = [1, 2, 7, 8, 9, 17, 30].map(block_at);

        let groups = group_blocks_by_epoch(&config, &blocks);

        assert_eq!(slots(&groups), [vec![1, 2, 7], vec![8, 9], vec![17], vec![30]]);
        assert!(group_blocks_by_epoch(&config, &[]).is_empty());
    }

    #[test]
    fn inactive_validators_get_zero_balance() -> Result<()> {
        let config = Config::minimal();
        let mut state = interop::quick_start_beacon_state(&config, 3)?;

        for validator in state.validators.iter_mut() {
            validator.effective_balance = 32;
        }

        state.validators[1].exit_epoch = 1;

        assert_eq!(*effective_balances(&state, 1), [32, 0, 32]);
        assert_eq!(*effective_balances(&state, 0), [32, 32, 32]);

        state.validators[1].activation_epoch = FAR_FUTURE_EPOCH;
        state.validators[1].exit_epoch = FAR_FUTURE_EPOCH;

        assert_eq!(*effective_balances(&state, 0), [32, 0, 32]);

        Ok(())
    }

    #[test]
    fn genesis_anchor_seeds_fork_choice_and_caches() -> Result<()> {
        let config = Config::minimal();
        let state = interop::quick_start_beacon_state(&config, 8)?;
        let anchor = Anchor::from_state(&config, state)?;

        let store = anchor.fork_choice_store(&config);
        let db = anchor.chain_db(&config)?;

        assert_eq!(store.head().block_root, anchor.block_root());
        assert_eq!(store.justified_checkpoint(), anchor.checkpoint(&config));
        assert_eq!(store.justified_balances().len(), 8);
        assert!(db.contains_block(anchor.block_root()));
        assert!(db
            .checkpoint_state_cache()
            .get(anchor.checkpoint(&config))
            .is_some());

        Ok(())
    }
}
