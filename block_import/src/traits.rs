use std::sync::Arc;

use anyhow::Result;
use fork_choice_store::{ApplyBlockChanges, BlockNode, LatestMessage, Store};
use helper_functions::context::StateContext;
use parking_lot::Mutex;
use transition_functions::StateRootPolicy;
use types::{
    config::Config,
    phase0::{
        beacon_state::BeaconState,
        containers::{Checkpoint, SignedBeaconBlock},
        primitives::{Gwei, Slot, H256},
    },
};

/// The parts of fork choice the import pipeline relies on.
pub trait ForkChoice: Send + Sync {
    fn contains_block(&self, block_root: H256) -> bool;

    fn head(&self) -> BlockNode;

    fn state_root(&self, block_root: H256) -> Option<H256>;

    fn justified_checkpoint(&self) -> Checkpoint;

    fn finalized_checkpoint(&self) -> Checkpoint;

    /// Returns `true` if `descendant_root` is `ancestor_root` or one of its descendants.
    fn is_descendant(&self, ancestor_root: H256, descendant_root: H256) -> bool;

    fn common_ancestor_slot(&self, a_root: H256, b_root: H256) -> Option<Slot>;

    /// Adds a block whose signatures and state transition have already been checked.
    ///
    /// `justified_balances` may be empty, in which case the previous balances are kept.
    fn on_block(
        &self,
        block: &SignedBeaconBlock,
        block_root: H256,
        post_state: &BeaconState,
        justified_balances: Arc<[Gwei]>,
    ) -> Result<ApplyBlockChanges>;
}

impl ForkChoice for Mutex<Store> {
    fn contains_block(&self, block_root: H256) -> bool {
        self.lock().contains_block(block_root)
    }

    fn head(&self) -> BlockNode {
        *self.lock().head()
    }

    fn state_root(&self, block_root: H256) -> Option<H256> {
        self.lock().block(block_root).map(|block| block.state_root)
    }

    fn justified_checkpoint(&self) -> Checkpoint {
        self.lock().justified_checkpoint()
    }

    fn finalized_checkpoint(&self) -> Checkpoint {
        self.lock().finalized_checkpoint()
    }

    fn is_descendant(&self, ancestor_root: H256, descendant_root: H256) -> bool {
        self.lock().is_ancestor(ancestor_root, descendant_root)
    }

    fn common_ancestor_slot(&self, a_root: H256, b_root: H256) -> Option<Slot> {
        self.lock()
            .common_ancestor(a_root, b_root)
            .map(|block| block.slot)
    }

    fn on_block(
        &self,
        block: &SignedBeaconBlock,
        block_root: H256,
        post_state: &BeaconState,
        justified_balances: Arc<[Gwei]>,
    ) -> Result<ApplyBlockChanges> {
        let message = block.message();

        let node = BlockNode {
            block_root,
            parent_root: message.parent_root,
            slot: message.slot,
            state_root: message.state_root,
            justified_checkpoint: post_state.current_justified_checkpoint,
            finalized_checkpoint: post_state.finalized_checkpoint,
        };

        let votes = message
            .body
            .attestations
            .iter()
            .flat_map(|attestation| {
                let latest_message = LatestMessage {
                    epoch: attestation.data.target.epoch,
                    root: attestation.data.beacon_block_root,
                };

                attestation
                    .attesting_indices
                    .iter()
                    .map(move |validator_index| (*validator_index, latest_message))
            });

        let mut store = self.lock();
        let changes = store.apply_block(node, justified_balances)?;

        if changes != ApplyBlockChanges::AlreadyPresent {
            store.apply_votes(votes);
        }

        Ok(changes)
    }
}

pub trait StateTransition: Send + Sync {
    /// Applies `block` to `pre_state`, advancing it through empty slots first.
    fn apply(
        &self,
        config: &Config,
        pre_state: StateContext,
        block: &SignedBeaconBlock,
    ) -> Result<StateContext>;

    fn process_slots(&self, config: &Config, state: &StateContext, slot: Slot)
        -> Result<StateContext>;
}

/// The state transition from `transition_functions` with state roots checked.
#[derive(Clone, Copy, Default, Debug)]
pub struct PhaseZeroTransition;

impl StateTransition for PhaseZeroTransition {
    fn apply(
        &self,
        config: &Config,
        pre_state: StateContext,
        block: &SignedBeaconBlock,
    ) -> Result<StateContext> {
        transition_functions::state_transition(config, &pre_state, block, StateRootPolicy::Verify)
    }

    fn process_slots(
        &self,
        config: &Config,
        state: &StateContext,
        slot: Slot,
    ) -> Result<StateContext> {
        transition_functions::process_slots(config, state, slot)
    }
}
