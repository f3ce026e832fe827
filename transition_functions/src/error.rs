use thiserror::Error;
use types::phase0::{
    containers::Checkpoint,
    primitives::{Epoch, Slot, ValidatorIndex, H256},
};

#[derive(Debug, Error)]
pub enum Error {
    #[error(
        "attestation in slot {attestation_slot} is outside \
         inclusion range for state at slot {state_slot}"
    )]
    AttestationOutsideInclusionRange {
        state_slot: Slot,
        attestation_slot: Slot,
    },
    #[error(
        "attestation source does not match justified checkpoint \
         (in_state: {in_state:?}, in_block: {in_block:?})"
    )]
    AttestationSourceMismatch {
        in_state: Checkpoint,
        in_block: Checkpoint,
    },
    #[error("attestation targets epoch {target_epoch} but was made in epoch {slot_epoch}")]
    AttestationTargetsWrongEpoch { target_epoch: Epoch, slot_epoch: Epoch },
    #[error("attestation targets epoch {target_epoch} which is neither current nor previous")]
    AttestationTargetsOldEpoch { target_epoch: Epoch },
    #[error("attesting indices are empty, unsorted, duplicated or out of range")]
    AttestingIndicesInvalid,
    #[error("block is not newer than latest block header ({block_slot} <= {block_header_slot})")]
    BlockNotNewerThanLatestBlockHeader {
        block_slot: Slot,
        block_header_slot: Slot,
    },
    #[error("block parent root ({in_block:?}) does not match latest block header ({computed:?})")]
    ParentRootMismatch { computed: H256, in_block: H256 },
    #[error("proposer (validator {index}) is slashed")]
    ProposerSlashed { index: ValidatorIndex },
    #[error("proposer index is incorrect (in_block: {in_block}, computed: {computed})")]
    ProposerIndexMismatch {
        in_block: ValidatorIndex,
        computed: ValidatorIndex,
    },
    #[error("block slot ({block_slot}) does not match state slot ({state_slot})")]
    SlotMismatch { state_slot: Slot, block_slot: Slot },
    #[error("target slot ({target}) is earlier than current slot ({current})")]
    SlotEarlier { current: Slot, target: Slot },
    #[error("state root in block ({in_block:?}) does not match state ({computed:?})")]
    StateRootMismatch { computed: H256, in_block: H256 },
    #[error("validator {index} is not active")]
    ValidatorNotActive { index: ValidatorIndex },
    #[error("validator {index} exited in epoch {exit_epoch}")]
    ValidatorAlreadyExited {
        index: ValidatorIndex,
        exit_epoch: Epoch,
    },
    #[error("validator index {index} is out of bounds")]
    ValidatorIndexOutOfBounds { index: ValidatorIndex },
    #[error("voluntary exit is for a future epoch (epoch: {epoch}, current_epoch: {current_epoch})")]
    VoluntaryExitIsPremature { epoch: Epoch, current_epoch: Epoch },
}
