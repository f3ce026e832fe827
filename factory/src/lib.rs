//! Builders for correctly signed blocks on top of interop states.
//!
//! Proposers, attesters and exiting validators sign with the interop keys, so every signature
//! produced here verifies unless it is deliberately broken.

use std::sync::Arc;

use anyhow::Result;
use bls::{Signature, SignatureBytes};
use helper_functions::{
    accessors,
    context::StateContext,
    misc,
    signing::{RandaoEpoch, SignForState as _},
};
use itertools::Itertools as _;
use transition_functions::StateRootPolicy;
use types::{
    config::Config,
    phase0::{
        containers::{
            Attestation, AttestationData, BeaconBlock, BeaconBlockBody, Checkpoint,
            SignedBeaconBlock, SignedVoluntaryExit, VoluntaryExit,
        },
        primitives::{Slot, ValidatorIndex, H256},
    },
    traits::HashTreeRoot as _,
};

pub type BlockWithState = (Arc<SignedBeaconBlock>, StateContext);

pub fn genesis(config: &Config, validator_count: u64) -> Result<StateContext> {
    StateContext::new(config, interop::quick_start_beacon_state(config, validator_count)?)
}

pub fn empty_block(config: &Config, parent: &StateContext, slot: Slot) -> Result<BlockWithState> {
    block(config, parent, slot, |_| Ok(BeaconBlockBody::default()))
}

/// A block containing an attestation to the previous slot by every active validator.
pub fn block_with_attestation(
    config: &Config,
    parent: &StateContext,
    slot: Slot,
) -> Result<BlockWithState> {
    block(config, parent, slot, |pre_state| {
        Ok(BeaconBlockBody {
            attestations: vec![full_attestation(config, pre_state, slot.saturating_sub(1))?],
            ..BeaconBlockBody::default()
        })
    })
}

pub fn block_with_voluntary_exit(
    config: &Config,
    parent: &StateContext,
    slot: Slot,
    validator_index: ValidatorIndex,
) -> Result<BlockWithState> {
    block(config, parent, slot, |pre_state| {
        let message = VoluntaryExit {
            epoch: accessors::get_current_epoch(config, pre_state.state()),
            validator_index,
        };

        let secret_key = interop::secret_key(validator_index);

        let signed_exit = SignedVoluntaryExit {
            message,
            signature: message.sign(config, pre_state.state(), &secret_key).into(),
        };

        Ok(BeaconBlockBody {
            voluntary_exits: vec![signed_exit],
            ..BeaconBlockBody::default()
        })
    })
}

/// Blocks at `slots` each building on the one before it, starting from `parent`.
///
/// With `attest` set, every block after genesis carries a full attestation to the slot before it.
pub fn chain(
    config: &Config,
    parent: &StateContext,
    slots: impl IntoIterator<Item = Slot>,
    attest: bool,
) -> Result<(Vec<Arc<SignedBeaconBlock>>, StateContext)> {
    let mut blocks = vec![];
    let mut state = parent.clone();

    for slot in slots {
        let (block, post_state) = if attest && slot > 0 {
            block_with_attestation(config, &state, slot)?
        } else {
            empty_block(config, &state, slot)?
        };

        blocks.push(block);
        state = post_state;
    }

    Ok((blocks, state))
}

/// A copy of `block` whose proposer signature is well-formed but signs a different message.
#[must_use]
pub fn with_invalid_signature(block: &SignedBeaconBlock) -> Arc<SignedBeaconBlock> {
    let signature = interop::secret_key(0).sign(H256::repeat_byte(0xff)).into();

    Arc::new(SignedBeaconBlock {
        message: block.message.clone(),
        signature,
    })
}

/// Attestation to `data_slot` by every validator active in its epoch.
///
/// `state` must be past `data_slot` and in the same or the next epoch.
pub fn full_attestation(config: &Config, state: &StateContext, data_slot: Slot) -> Result<Attestation> {
    let state = state.state();
    let target_epoch = misc::compute_epoch_at_slot(config, data_slot);

    let source = if target_epoch == accessors::get_current_epoch(config, state) {
        state.current_justified_checkpoint
    } else {
        state.previous_justified_checkpoint
    };

    let data = AttestationData {
        slot: data_slot,
        beacon_block_root: accessors::get_block_root_at_slot(config, state, data_slot)?,
        source,
        target: Checkpoint::new(
            target_epoch,
            accessors::get_block_root(config, state, target_epoch)?,
        ),
    };

    let attesting_indices = accessors::get_active_validator_indices(state, target_epoch);

    let signatures = attesting_indices
        .iter()
        .map(|index| data.sign(config, state, &interop::secret_key(*index)))
        .collect_vec();

    Ok(Attestation {
        attesting_indices,
        data,
        signature: Signature::aggregate(&signatures)?.into(),
    })
}

fn block(
    config: &Config,
    parent: &StateContext,
    slot: Slot,
    body: impl FnOnce(&StateContext) -> Result<BeaconBlockBody>,
) -> Result<BlockWithState> {
    let pre_state = transition_functions::process_slots(config, parent, slot)?;
    let proposer_index = pre_state.epoch_context().proposer_index(slot)?;
    let secret_key = interop::secret_key(proposer_index);
    let epoch = misc::compute_epoch_at_slot(config, slot);

    let mut body = body(&pre_state)?;

    body.randao_reveal = RandaoEpoch::from(epoch)
        .sign(config, pre_state.state(), &secret_key)
        .into();

    let mut message = BeaconBlock {
        slot,
        proposer_index,
        parent_root: pre_state.state().latest_block_header.hash_tree_root(),
        state_root: H256::zero(),
        body,
    };

    let unsigned_block = SignedBeaconBlock {
        message: message.clone(),
        signature: SignatureBytes::empty(),
    };

    let post_state = transition_functions::state_transition(
        config,
        &pre_state,
        &unsigned_block,
        StateRootPolicy::Trust,
    )?;

    message.state_root = post_state.state_root();

    let signature = message.sign(config, pre_state.state(), &secret_key).into();
    let block = Arc::new(SignedBeaconBlock { message, signature });

    Ok((block, post_state))
}
