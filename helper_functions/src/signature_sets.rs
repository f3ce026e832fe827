//! Signature sets extracted from blocks so that they can be verified in one batch.

use anyhow::{ensure, Result};
use bls::{PublicKey, Signature, SignatureBytes};
use rayon::iter::{IntoParallelRefIterator as _, ParallelIterator as _};
use types::{
    config::Config,
    phase0::{
        containers::{Attestation, SignedBeaconBlock, SignedVoluntaryExit},
        primitives::H256,
    },
};

use crate::{
    context::StateContext,
    error::{Error, SignatureKind},
    misc,
    signing::{RandaoEpoch, SignForState},
};

/// One signature over `signing_root` by the aggregate of `public_keys`.
#[derive(Clone, Debug)]
pub struct SignatureSet {
    pub kind: SignatureKind,
    pub public_keys: Vec<PublicKey>,
    pub signing_root: H256,
    pub signature: SignatureBytes,
}

impl SignatureSet {
    fn single(
        kind: SignatureKind,
        public_key: PublicKey,
        signing_root: H256,
        signature: SignatureBytes,
    ) -> Self {
        Self {
            kind,
            public_keys: vec![public_key],
            signing_root,
            signature,
        }
    }

    fn aggregate_public_key(&self) -> Option<PublicKey> {
        match self.public_keys.as_slice() {
            [public_key] => Some(*public_key),
            public_keys => PublicKey::aggregate_nonempty(public_keys).ok(),
        }
    }
}

pub fn proposer_signature_set(
    config: &Config,
    context: &StateContext,
    block: &SignedBeaconBlock,
) -> Result<SignatureSet> {
    let message = block.message();
    let proposer_index = context.epoch_context().proposer_index(message.slot)?;
    let public_key = *context.epoch_context().public_key(proposer_index)?;

    Ok(SignatureSet::single(
        SignatureKind::Block,
        public_key,
        message.signing_root(config, context.state()),
        block.signature,
    ))
}

pub fn randao_signature_set(
    config: &Config,
    context: &StateContext,
    block: &SignedBeaconBlock,
) -> Result<SignatureSet> {
    let message = block.message();
    let proposer_index = context.epoch_context().proposer_index(message.slot)?;
    let public_key = *context.epoch_context().public_key(proposer_index)?;
    let epoch = misc::compute_epoch_at_slot(config, message.slot);

    Ok(SignatureSet::single(
        SignatureKind::Randao,
        public_key,
        RandaoEpoch::from(epoch).signing_root(config, context.state()),
        message.body.randao_reveal,
    ))
}

pub fn attestation_signature_set(
    config: &Config,
    context: &StateContext,
    attestation: &Attestation,
) -> Result<SignatureSet> {
    ensure!(
        !attestation.attesting_indices.is_empty(),
        Error::NoParticipants(SignatureKind::Attestation),
    );

    let public_keys = attestation
        .attesting_indices
        .iter()
        .map(|index| context.epoch_context().public_key(*index).copied())
        .collect::<Result<_>>()?;

    Ok(SignatureSet {
        kind: SignatureKind::Attestation,
        public_keys,
        signing_root: attestation.data.signing_root(config, context.state()),
        signature: attestation.signature,
    })
}

pub fn voluntary_exit_signature_set(
    config: &Config,
    context: &StateContext,
    signed_exit: &SignedVoluntaryExit,
) -> Result<SignatureSet> {
    let public_key = *context
        .epoch_context()
        .public_key(signed_exit.message.validator_index)?;

    Ok(SignatureSet::single(
        SignatureKind::VoluntaryExit,
        public_key,
        signed_exit.message.signing_root(config, context.state()),
        signed_exit.signature,
    ))
}

/// Every signature set in `block`, with the proposer signature first.
///
/// `context` must be in the same epoch as `block`.
pub fn get_all_block_signature_sets(
    config: &Config,
    context: &StateContext,
    block: &SignedBeaconBlock,
) -> Result<Vec<SignatureSet>> {
    let mut sets = vec![proposer_signature_set(config, context, block)?];
    sets.extend(get_all_block_signature_sets_except_proposer(config, context, block)?);
    Ok(sets)
}

/// Like [`get_all_block_signature_sets`] but without the proposer signature.
///
/// Used when the proposer signature was already checked, e.g. on gossip.
pub fn get_all_block_signature_sets_except_proposer(
    config: &Config,
    context: &StateContext,
    block: &SignedBeaconBlock,
) -> Result<Vec<SignatureSet>> {
    let body = &block.message().body;
    let mut sets = Vec::with_capacity(1 + body.attestations.len() + body.voluntary_exits.len());

    sets.push(randao_signature_set(config, context, block)?);

    for attestation in &body.attestations {
        sets.push(attestation_signature_set(config, context, attestation)?);
    }

    for signed_exit in &body.voluntary_exits {
        sets.push(voluntary_exit_signature_set(config, context, signed_exit)?);
    }

    Ok(sets)
}

/// Verifies all `sets` together. Returns `true` for an empty batch.
///
/// Malformed signatures and empty key sets make the whole batch invalid.
#[must_use]
pub fn verify_signature_sets(sets: &[SignatureSet]) -> bool {
    if sets.is_empty() {
        return true;
    }

    let parsed = sets
        .par_iter()
        .map(|set| {
            let signature = Signature::try_from(set.signature).ok()?;
            let public_key = set.aggregate_public_key()?;
            Some((signature, public_key))
        })
        .collect::<Option<Vec<_>>>();

    let Some(parsed) = parsed else {
        return false;
    };

    if let [(signature, public_key)] = parsed.as_slice() {
        return signature.verify(sets[0].signing_root, public_key);
    }

    let messages = sets.iter().map(|set| set.signing_root.as_bytes());
    let signatures = parsed.iter().map(|(signature, _)| signature);
    let public_keys = parsed.iter().map(|(_, public_key)| public_key);

    Signature::multi_verify(messages, signatures, public_keys)
}

#[cfg(test)]
mod tests {
    use types::phase0::containers::{BeaconBlock, BeaconBlockBody};

    use super::*;

    fn signed_set(index: u64, signing_root: H256) -> SignatureSet {
        let secret_key = interop::secret_key(index);

        SignatureSet::single(
            SignatureKind::Block,
            secret_key.to_public_key(),
            signing_root,
            secret_key.sign(signing_root).into(),
        )
    }

    #[test]
    fn empty_batch_is_valid() {
        assert!(verify_signature_sets(&[]));
    }

    #[test]
    fn batch_of_valid_sets_is_valid() {
        let sets = [
            signed_set(0, H256::repeat_byte(1)),
            signed_set(1, H256::repeat_byte(2)),
            signed_set(2, H256::repeat_byte(3)),
        ];

        assert!(verify_signature_sets(&sets[..1]));
        assert!(verify_signature_sets(&sets));
    }

    #[test]
    fn one_bad_set_invalidates_the_batch() {
        let mut sets = vec![
            signed_set(0, H256::repeat_byte(1)),
            signed_set(1, H256::repeat_byte(2)),
        ];

        sets[1].signing_root = H256::repeat_byte(9);

        assert!(!verify_signature_sets(&sets));
    }

    #[test]
    fn malformed_signature_invalidates_the_batch() {
        let mut set = signed_set(0, H256::repeat_byte(1));
        set.signature = SignatureBytes::zero();

        assert!(!verify_signature_sets(&[set]));
    }

    #[test]
    fn aggregate_sets_are_checked_against_every_participant() -> Result<()> {
        let signing_root = H256::repeat_byte(4);
        let secret_keys = [interop::secret_key(0), interop::secret_key(1)];

        let signatures = secret_keys
            .iter()
            .map(|secret_key| secret_key.sign(signing_root))
            .collect::<Vec<_>>();

        let set = SignatureSet {
            kind: SignatureKind::Attestation,
            public_keys: secret_keys.iter().map(bls::SecretKey::to_public_key).collect(),
            signing_root,
            signature: Signature::aggregate(&signatures)?.into(),
        };

        let mut missing_participant = set.clone();
        missing_participant.public_keys.pop();

        assert!(verify_signature_sets(&[set]));
        assert!(!verify_signature_sets(&[missing_participant]));

        Ok(())
    }

    #[test]
    fn block_sets_name_the_proposer_first() -> Result<()> {
        let config = Config::minimal();
        let state = interop::quick_start_beacon_state(&config, 8)?;
        let context = StateContext::new(&config, state)?;

        let block = SignedBeaconBlock {
            message: BeaconBlock {
                slot: 1,
                proposer_index: context.epoch_context().proposer_index(1)?,
                body: BeaconBlockBody::default(),
                ..BeaconBlock::default()
            },
            signature: SignatureBytes::zero(),
        };

        let all = get_all_block_signature_sets(&config, &context, &block)?;
        let except_proposer = get_all_block_signature_sets_except_proposer(&config, &context, &block)?;

        assert_eq!(all.len(), 2);
        assert_eq!(all[0].kind, SignatureKind::Block);
        assert_eq!(all[1].kind, SignatureKind::Randao);
        assert_eq!(except_proposer.len(), 1);

        Ok(())
    }
}
