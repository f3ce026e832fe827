use bls::{PublicKeyBytes, SignatureBytes};
use serde::{Deserialize, Serialize};

use crate::phase0::primitives::{Domain, Epoch, Gwei, Slot, ValidatorIndex, H256};

#[derive(
    Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Debug, Deserialize, Serialize,
)]
#[serde(deny_unknown_fields)]
pub struct Checkpoint {
    pub epoch: Epoch,
    pub root: H256,
}

#[derive(Clone, Copy, PartialEq, Eq, Default, Debug)]
pub struct Validator {
    pub pubkey: PublicKeyBytes,
    pub effective_balance: Gwei,
    pub slashed: bool,
    pub activation_epoch: Epoch,
    pub exit_epoch: Epoch,
}

#[derive(Clone, Copy, PartialEq, Eq, Default, Debug)]
pub struct BeaconBlockHeader {
    pub slot: Slot,
    pub proposer_index: ValidatorIndex,
    pub parent_root: H256,
    pub state_root: H256,
    pub body_root: H256,
}

#[derive(Clone, Copy, PartialEq, Eq, Default, Debug)]
pub struct AttestationData {
    pub slot: Slot,
    pub beacon_block_root: H256,
    pub source: Checkpoint,
    pub target: Checkpoint,
}

/// An aggregate attestation that names its participants directly.
///
/// `attesting_indices` must be sorted and free of duplicates.
#[derive(Clone, PartialEq, Eq, Default, Debug)]
pub struct Attestation {
    pub attesting_indices: Vec<ValidatorIndex>,
    pub data: AttestationData,
    pub signature: SignatureBytes,
}

#[derive(Clone, PartialEq, Eq, Default, Debug)]
pub struct PendingAttestation {
    pub attesting_indices: Vec<ValidatorIndex>,
    pub data: AttestationData,
    pub inclusion_delay: u64,
    pub proposer_index: ValidatorIndex,
}

#[derive(Clone, Copy, PartialEq, Eq, Default, Debug)]
pub struct VoluntaryExit {
    pub epoch: Epoch,
    pub validator_index: ValidatorIndex,
}

#[derive(Clone, Copy, PartialEq, Eq, Default, Debug)]
pub struct SignedVoluntaryExit {
    pub message: VoluntaryExit,
    pub signature: SignatureBytes,
}

#[derive(Clone, PartialEq, Eq, Default, Debug)]
pub struct BeaconBlockBody {
    pub randao_reveal: SignatureBytes,
    pub graffiti: H256,
    pub attestations: Vec<Attestation>,
    pub voluntary_exits: Vec<SignedVoluntaryExit>,
}

#[derive(Clone, PartialEq, Eq, Default, Debug)]
pub struct BeaconBlock {
    pub slot: Slot,
    pub proposer_index: ValidatorIndex,
    pub parent_root: H256,
    pub state_root: H256,
    pub body: BeaconBlockBody,
}

#[derive(Clone, PartialEq, Eq, Default, Debug)]
pub struct SignedBeaconBlock {
    pub message: BeaconBlock,
    pub signature: SignatureBytes,
}

#[derive(Clone, Copy, PartialEq, Eq, Default, Debug)]
pub struct SigningData {
    pub object_root: H256,
    pub domain: Domain,
}
