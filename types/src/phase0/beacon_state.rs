use im::Vector;

use crate::{
    nonstandard::JustificationBits,
    phase0::{
        containers::{BeaconBlockHeader, Checkpoint, PendingAttestation, Validator},
        primitives::{Epoch, Gwei, Slot, UnixSeconds, H256},
    },
    traits::HashTreeRoot,
};

/// Phase 0 beacon state, trimmed to the fields the block import pipeline reads and writes.
///
/// Collections use [`im::Vector`] so that states can be cloned cheaply when they are cached
/// and later advanced or mutated by a state transition.
#[derive(Clone, PartialEq, Eq, Default, Debug)]
pub struct BeaconState {
    pub genesis_time: UnixSeconds,
    pub genesis_validators_root: H256,
    pub slot: Slot,

    pub latest_block_header: BeaconBlockHeader,
    // Both have length `slots_per_historical_root`.
    pub block_roots: Vector<H256>,
    pub state_roots: Vector<H256>,

    pub validators: Vector<Validator>,
    pub balances: Vector<Gwei>,

    // Length `epochs_per_historical_vector`.
    pub randao_mixes: Vector<H256>,

    pub previous_epoch_attestations: Vector<PendingAttestation>,
    pub current_epoch_attestations: Vector<PendingAttestation>,

    pub justification_bits: JustificationBits,
    pub previous_justified_checkpoint: Checkpoint,
    pub current_justified_checkpoint: Checkpoint,
    pub finalized_checkpoint: Checkpoint,
}

impl BeaconState {
    #[must_use]
    pub fn validator_count(&self) -> usize {
        self.validators.len()
    }

    #[must_use]
    pub fn finalized_epoch(&self) -> Epoch {
        self.finalized_checkpoint.epoch
    }
}

impl HashTreeRoot for BeaconState {
    fn hash_tree_root(&self) -> H256 {
        hashing::merkleize(&[
            self.genesis_time.hash_tree_root(),
            self.genesis_validators_root,
            self.slot.hash_tree_root(),
            self.latest_block_header.hash_tree_root(),
            fixed_vector_root(&self.block_roots),
            fixed_vector_root(&self.state_roots),
            self.validators.hash_tree_root(),
            self.balances.hash_tree_root(),
            fixed_vector_root(&self.randao_mixes),
            self.previous_epoch_attestations.hash_tree_root(),
            self.current_epoch_attestations.hash_tree_root(),
            self.justification_bits.hash_tree_root(),
            self.previous_justified_checkpoint.hash_tree_root(),
            self.current_justified_checkpoint.hash_tree_root(),
            self.finalized_checkpoint.hash_tree_root(),
        ])
    }
}

fn fixed_vector_root(roots: &Vector<H256>) -> H256 {
    hashing::merkleize(&roots.iter().copied().collect::<Vec<_>>())
}
