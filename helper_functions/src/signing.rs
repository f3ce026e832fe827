use bls::{SecretKey, Signature};
use derive_more::From;
use types::{
    config::Config,
    phase0::{
        beacon_state::BeaconState,
        consts::{DOMAIN_BEACON_ATTESTER, DOMAIN_BEACON_PROPOSER, DOMAIN_RANDAO, DOMAIN_VOLUNTARY_EXIT},
        containers::{AttestationData, BeaconBlock, VoluntaryExit},
        primitives::{DomainType, Epoch, H256},
    },
    traits::HashTreeRoot,
};

use crate::{accessors, error::SignatureKind, misc};

// This wrapper is needed to differentiate between `Epoch` and other `u64`s.
#[derive(Clone, Copy, From)]
pub struct RandaoEpoch(Epoch);

impl HashTreeRoot for RandaoEpoch {
    fn hash_tree_root(&self) -> H256 {
        self.0.hash_tree_root()
    }
}

/// Objects signed with a domain derived from the chain's genesis.
pub trait SignForState: HashTreeRoot {
    const DOMAIN_TYPE: DomainType;
    const SIGNATURE_KIND: SignatureKind;

    fn signing_root(&self, config: &Config, state: &BeaconState) -> H256 {
        let domain = accessors::get_domain(config, state, Self::DOMAIN_TYPE);
        misc::compute_signing_root(self, domain)
    }

    fn sign(&self, config: &Config, state: &BeaconState, secret_key: &SecretKey) -> Signature {
        secret_key.sign(self.signing_root(config, state))
    }
}

impl SignForState for AttestationData {
    const DOMAIN_TYPE: DomainType = DOMAIN_BEACON_ATTESTER;
    const SIGNATURE_KIND: SignatureKind = SignatureKind::Attestation;
}

impl SignForState for BeaconBlock {
    const DOMAIN_TYPE: DomainType = DOMAIN_BEACON_PROPOSER;
    const SIGNATURE_KIND: SignatureKind = SignatureKind::Block;
}

impl SignForState for RandaoEpoch {
    const DOMAIN_TYPE: DomainType = DOMAIN_RANDAO;
    const SIGNATURE_KIND: SignatureKind = SignatureKind::Randao;
}

impl SignForState for VoluntaryExit {
    const DOMAIN_TYPE: DomainType = DOMAIN_VOLUNTARY_EXIT;
    const SIGNATURE_KIND: SignatureKind = SignatureKind::VoluntaryExit;
}
