use std::sync::Arc;

use anyhow::{ensure, Result};
use helper_functions::context::StateContext;
use types::{
    config::Config,
    nonstandard::StateRootPolicy,
    phase0::{beacon_state::BeaconState, containers::SignedBeaconBlock},
    traits::HashTreeRoot as _,
};

use crate::{block_processing, error::Error, slot_processing};

/// Applies `block` on top of `context`, advancing through empty slots first.
///
/// Block signatures are not verified.
pub fn state_transition(
    config: &Config,
    context: &StateContext,
    block: &SignedBeaconBlock,
    state_root_policy: StateRootPolicy,
) -> Result<StateContext> {
    let block = block.message();
    let advanced = slot_processing::process_slots(config, context, block.slot)?;
    let epoch_context = Arc::clone(advanced.epoch_context());
    let mut state = BeaconState::clone(advanced.state());

    block_processing::process_block(config, &mut state, &epoch_context, block)?;

    if state_root_policy == StateRootPolicy::Verify {
        let computed = state.hash_tree_root();

        ensure!(
            computed == block.state_root,
            Error::StateRootMismatch {
                computed,
                in_block: block.state_root,
            },
        );
    }

    Ok(StateContext::from_parts(Arc::new(state), epoch_context))
}

#[cfg(test)]
mod tests {
    use bls::SignatureBytes;
    use types::phase0::{
        containers::{Attestation, BeaconBlock, SignedVoluntaryExit, VoluntaryExit},
        primitives::{Slot, H256},
    };

    use super::*;

    fn genesis(config: &Config) -> Result<StateContext> {
        StateContext::new(config, interop::quick_start_beacon_state(config, 8)?)
    }

    fn unsigned_block(config: &Config, parent: &StateContext, slot: Slot) -> Result<SignedBeaconBlock> {
        let advanced = slot_processing::process_slots(config, parent, slot)?;

        let message = BeaconBlock {
            slot,
            proposer_index: advanced.epoch_context().proposer_index(slot)?,
            parent_root: advanced.state().latest_block_header.hash_tree_root(),
            ..BeaconBlock::default()
        };

        Ok(SignedBeaconBlock {
            message,
            signature: SignatureBytes::zero(),
        })
    }

    fn with_state_root(
        config: &Config,
        parent: &StateContext,
        mut block: SignedBeaconBlock,
    ) -> Result<SignedBeaconBlock> {
        let post = state_transition(config, parent, &block, StateRootPolicy::Trust)?;
        block.message.state_root = post.state_root();
        Ok(block)
    }

    #[test]
    fn verified_block_produces_matching_state_root() -> Result<()> {
        let config = Config::minimal();
        let genesis = genesis(&config)?;
        let block = with_state_root(&config, &genesis, unsigned_block(&config, &genesis, 3)?)?;

        let post = state_transition(&config, &genesis, &block, StateRootPolicy::Verify)?;

        assert_eq!(post.slot(), 3);
        assert_eq!(post.state_root(), block.message.state_root);
        assert_eq!(post.state().latest_block_header.slot, 3);

        Ok(())
    }

    #[test]
    fn wrong_state_root_is_rejected_only_when_verified() -> Result<()> {
        let config = Config::minimal();
        let genesis = genesis(&config)?;
        let mut block = unsigned_block(&config, &genesis, 1)?;

        block.message.state_root = H256::repeat_byte(1);

        let error = state_transition(&config, &genesis, &block, StateRootPolicy::Verify)
            .expect_err("state root is wrong");

        assert!(matches!(
            error.downcast_ref::<Error>(),
            Some(Error::StateRootMismatch { .. }),
        ));

        state_transition(&config, &genesis, &block, StateRootPolicy::Trust)?;

        Ok(())
    }

    #[test]
    fn block_must_build_on_latest_header() -> Result<()> {
        let config = Config::minimal();
        let genesis = genesis(&config)?;
        let mut block = unsigned_block(&config, &genesis, 1)?;

        block.message.parent_root = H256::repeat_byte(2);

        let error = state_transition(&config, &genesis, &block, StateRootPolicy::Trust)
            .expect_err("parent root is wrong");

        assert!(matches!(
            error.downcast_ref::<Error>(),
            Some(Error::ParentRootMismatch { .. }),
        ));

        Ok(())
    }

    #[test]
    fn block_must_name_expected_proposer() -> Result<()> {
        let config = Config::minimal();
        let genesis = genesis(&config)?;
        let mut block = unsigned_block(&config, &genesis, 1)?;

        block.message.proposer_index = (block.message.proposer_index + 1) % 8;

        let error = state_transition(&config, &genesis, &block, StateRootPolicy::Trust)
            .expect_err("proposer is wrong");

        assert!(matches!(
            error.downcast_ref::<Error>(),
            Some(Error::ProposerIndexMismatch { .. }),
        ));

        Ok(())
    }

    #[test]
    fn attestations_are_recorded_as_pending() -> Result<()> {
        let config = Config::minimal();
        let genesis = genesis(&config)?;
        let mut block = unsigned_block(&config, &genesis, 2)?;

        let mut attestation = Attestation {
            attesting_indices: vec![1, 4, 6],
            ..Attestation::default()
        };

        attestation.data.slot = 1;

        block.message.body.attestations.push(attestation.clone());

        let post = state_transition(&config, &genesis, &block, StateRootPolicy::Trust)?;
        let pending = &post.state().current_epoch_attestations;

        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].attesting_indices, [1, 4, 6]);
        assert_eq!(pending[0].inclusion_delay, 1);

        attestation.attesting_indices = vec![4, 1];
        block.message.body.attestations = vec![attestation];

        let error = state_transition(&config, &genesis, &block, StateRootPolicy::Trust)
            .expect_err("indices are unsorted");

        assert!(matches!(
            error.downcast_ref::<Error>(),
            Some(Error::AttestingIndicesInvalid),
        ));

        Ok(())
    }

    #[test]
    fn voluntary_exit_sets_exit_epoch_once() -> Result<()> {
        let config = Config::minimal();
        let genesis = genesis(&config)?;
        let mut block = unsigned_block(&config, &genesis, 1)?;

        let exit = SignedVoluntaryExit {
            message: VoluntaryExit {
                epoch: 0,
                validator_index: 5,
            },
            signature: SignatureBytes::zero(),
        };

        block.message.body.voluntary_exits.push(exit);

        let post = state_transition(&config, &genesis, &block, StateRootPolicy::Trust)?;

        assert_eq!(post.state().validators[5].exit_epoch, 1 + config.max_seed_lookahead);

        block.message.body.voluntary_exits.push(exit);

        let error = state_transition(&config, &genesis, &block, StateRootPolicy::Trust)
            .expect_err("validator exits twice");

        assert!(matches!(
            error.downcast_ref::<Error>(),
            Some(Error::ValidatorAlreadyExited { index: 5, .. }),
        ));

        Ok(())
    }
}
