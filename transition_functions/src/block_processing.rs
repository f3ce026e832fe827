use anyhow::{ensure, Result};
use helper_functions::{accessors, context::EpochContext, misc, predicates};
use types::{
    config::Config,
    phase0::{
        beacon_state::BeaconState,
        consts::FAR_FUTURE_EPOCH,
        containers::{
            Attestation, BeaconBlock, BeaconBlockHeader, PendingAttestation, Validator,
            VoluntaryExit,
        },
        primitives::{ValidatorIndex, H256},
    },
    traits::HashTreeRoot as _,
};

use crate::error::Error;

pub fn process_block(
    config: &Config,
    state: &mut BeaconState,
    epoch_context: &EpochContext,
    block: &BeaconBlock,
) -> Result<()> {
    process_block_header(state, epoch_context, block)?;
    process_randao(config, state, block);

    for attestation in &block.body.attestations {
        process_attestation(config, state, attestation, block.proposer_index)?;
    }

    for signed_exit in &block.body.voluntary_exits {
        process_voluntary_exit(config, state, signed_exit.message)?;
    }

    Ok(())
}

fn process_block_header(
    state: &mut BeaconState,
    epoch_context: &EpochContext,
    block: &BeaconBlock,
) -> Result<()> {
    // > Verify that the slots match
    ensure!(
        block.slot == state.slot,
        Error::SlotMismatch {
            state_slot: state.slot,
            block_slot: block.slot,
        },
    );

    // > Verify that the block is newer than latest block header
    ensure!(
        block.slot > state.latest_block_header.slot,
        Error::BlockNotNewerThanLatestBlockHeader {
            block_slot: block.slot,
            block_header_slot: state.latest_block_header.slot,
        },
    );

    // > Verify that proposer index is the correct index
    let computed = epoch_context.proposer_index(block.slot)?;

    ensure!(
        block.proposer_index == computed,
        Error::ProposerIndexMismatch {
            in_block: block.proposer_index,
            computed,
        },
    );

    // > Verify that the parent matches
    let computed = state.latest_block_header.hash_tree_root();

    ensure!(
        block.parent_root == computed,
        Error::ParentRootMismatch {
            computed,
            in_block: block.parent_root,
        },
    );

    // > Cache current block as the new latest block
    state.latest_block_header = BeaconBlockHeader {
        // > Overwritten in the next process_slot call
        state_root: H256::zero(),
        ..block.to_header()
    };

    // > Verify proposer is not slashed
    let proposer = validator(state, block.proposer_index)?;

    ensure!(
        !proposer.slashed,
        Error::ProposerSlashed {
            index: block.proposer_index,
        },
    );

    Ok(())
}

fn process_randao(config: &Config, state: &mut BeaconState, block: &BeaconBlock) {
    let epoch = accessors::get_current_epoch(config, state);
    let reveal_hash = hashing::hash_bytes(block.body.randao_reveal.as_bytes());
    let mix = accessors::get_randao_mix(config, state, epoch) ^ reveal_hash;

    state
        .randao_mixes
        .set(accessors::randao_index(config, epoch), mix);
}

fn process_attestation(
    config: &Config,
    state: &mut BeaconState,
    attestation: &Attestation,
    proposer_index: ValidatorIndex,
) -> Result<()> {
    let data = attestation.data;
    let previous_epoch = accessors::get_previous_epoch(config, state);
    let current_epoch = accessors::get_current_epoch(config, state);
    let target_epoch = data.target.epoch;

    ensure!(
        target_epoch == previous_epoch || target_epoch == current_epoch,
        Error::AttestationTargetsOldEpoch { target_epoch },
    );

    let slot_epoch = misc::compute_epoch_at_slot(config, data.slot);

    ensure!(
        target_epoch == slot_epoch,
        Error::AttestationTargetsWrongEpoch {
            target_epoch,
            slot_epoch,
        },
    );

    ensure!(
        data.slot + config.min_attestation_inclusion_delay.get() <= state.slot
            && state.slot <= data.slot + config.slots_per_epoch(),
        Error::AttestationOutsideInclusionRange {
            state_slot: state.slot,
            attestation_slot: data.slot,
        },
    );

    let indices = attestation.attesting_indices.as_slice();
    let validator_count = u64::try_from(state.validators.len())?;

    ensure!(
        !indices.is_empty()
            && predicates::is_sorted_and_unique(indices)
            && indices.iter().all(|index| *index < validator_count),
        Error::AttestingIndicesInvalid,
    );

    let justified_checkpoint = if target_epoch == current_epoch {
        state.current_justified_checkpoint
    } else {
        state.previous_justified_checkpoint
    };

    ensure!(
        data.source == justified_checkpoint,
        Error::AttestationSourceMismatch {
            in_state: justified_checkpoint,
            in_block: data.source,
        },
    );

    let pending_attestation = PendingAttestation {
        attesting_indices: indices.to_vec(),
        data,
        inclusion_delay: state.slot - data.slot,
        proposer_index,
    };

    if target_epoch == current_epoch {
        state.current_epoch_attestations.push_back(pending_attestation);
    } else {
        state.previous_epoch_attestations.push_back(pending_attestation);
    }

    Ok(())
}

fn process_voluntary_exit(config: &Config, state: &mut BeaconState, exit: VoluntaryExit) -> Result<()> {
    let current_epoch = accessors::get_current_epoch(config, state);
    let index = exit.validator_index;
    let validator = validator(state, index)?;

    // > Verify the validator is active
    ensure!(
        predicates::is_active_validator(validator, current_epoch),
        Error::ValidatorNotActive { index },
    );

    // > Verify exit has not been initiated
    ensure!(
        validator.exit_epoch == FAR_FUTURE_EPOCH,
        Error::ValidatorAlreadyExited {
            index,
            exit_epoch: validator.exit_epoch,
        },
    );

    // > Exits must specify an epoch when they become valid; they are not valid before then
    ensure!(
        current_epoch >= exit.epoch,
        Error::VoluntaryExitIsPremature {
            epoch: exit.epoch,
            current_epoch,
        },
    );

    let exit_epoch = misc::compute_activation_exit_epoch(config, current_epoch);
    let position = usize::try_from(index)?;

    if let Some(validator) = state.validators.get_mut(position) {
        validator.exit_epoch = exit_epoch;
    }

    Ok(())
}

fn validator(state: &BeaconState, index: ValidatorIndex) -> Result<&Validator> {
    usize::try_from(index)
        .ok()
        .and_then(|position| state.validators.get(position))
        .ok_or_else(|| Error::ValidatorIndexOutOfBounds { index }.into())
}
