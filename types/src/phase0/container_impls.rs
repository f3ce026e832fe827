use crate::{
    impl_container_root,
    phase0::{
        containers::{
            Attestation, AttestationData, BeaconBlock, BeaconBlockBody, BeaconBlockHeader,
            Checkpoint, PendingAttestation, SignedBeaconBlock, SignedVoluntaryExit, SigningData,
            Validator, VoluntaryExit,
        },
        primitives::{Epoch, Slot, H256},
    },
    traits::HashTreeRoot as _,
};

impl_container_root!(Checkpoint { epoch, root });

impl_container_root!(Validator {
    pubkey,
    effective_balance,
    slashed,
    activation_epoch,
    exit_epoch,
});

impl_container_root!(BeaconBlockHeader {
    slot,
    proposer_index,
    parent_root,
    state_root,
    body_root,
});

impl_container_root!(AttestationData {
    slot,
    beacon_block_root,
    source,
    target,
});

impl_container_root!(Attestation {
    attesting_indices,
    data,
    signature,
});

impl_container_root!(PendingAttestation {
    attesting_indices,
    data,
    inclusion_delay,
    proposer_index,
});

impl_container_root!(VoluntaryExit {
    epoch,
    validator_index,
});

impl_container_root!(SignedVoluntaryExit { message, signature });

impl_container_root!(BeaconBlockBody {
    randao_reveal,
    graffiti,
    attestations,
    voluntary_exits,
});

// The root of a block is equal to the root of its header.
impl_container_root!(BeaconBlock {
    slot,
    proposer_index,
    parent_root,
    state_root,
    body,
});

impl_container_root!(SignedBeaconBlock { message, signature });

impl_container_root!(SigningData {
    object_root,
    domain,
});

impl Checkpoint {
    #[must_use]
    pub const fn new(epoch: Epoch, root: H256) -> Self {
        Self { epoch, root }
    }
}

impl BeaconBlock {
    #[must_use]
    pub fn to_header(&self) -> BeaconBlockHeader {
        BeaconBlockHeader {
            slot: self.slot,
            proposer_index: self.proposer_index,
            parent_root: self.parent_root,
            state_root: self.state_root,
            body_root: self.body.hash_tree_root(),
        }
    }
}

impl SignedBeaconBlock {
    #[must_use]
    pub const fn message(&self) -> &BeaconBlock {
        &self.message
    }

    #[must_use]
    pub const fn slot(&self) -> Slot {
        self.message.slot
    }

    #[must_use]
    pub const fn parent_root(&self) -> H256 {
        self.message.parent_root
    }

    /// The root that identifies this block in fork choice and in other blocks' `parent_root`.
    #[must_use]
    pub fn block_root(&self) -> H256 {
        self.message.hash_tree_root()
    }
}

#[cfg(test)]
mod tests {
    use crate::traits::HashTreeRoot;

    use super::*;

    #[test]
    fn block_root_matches_header_root() {
        let block = BeaconBlock {
            slot: 3,
            proposer_index: 1,
            parent_root: H256::repeat_byte(1),
            state_root: H256::repeat_byte(2),
            body: BeaconBlockBody {
                graffiti: H256::repeat_byte(3),
                ..BeaconBlockBody::default()
            },
        };

        assert_eq!(block.hash_tree_root(), block.to_header().hash_tree_root());
    }

    #[test]
    fn signature_does_not_affect_block_root() {
        let message = BeaconBlock {
            slot: 5,
            ..BeaconBlock::default()
        };

        let unsigned = SignedBeaconBlock {
            message: message.clone(),
            signature: bls::SignatureBytes::zero(),
        };

        let signed = SignedBeaconBlock {
            message,
            signature: bls::SignatureBytes::repeat_byte(9),
        };

        assert_eq!(unsigned.block_root(), signed.block_root());
        assert_ne!(unsigned.hash_tree_root(), signed.hash_tree_root());
    }
}
