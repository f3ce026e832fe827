use core::num::NonZeroU64;

use blst::{
    blst_scalar,
    min_pk::{AggregateSignature as RawAggregateSignature, Signature as RawSignature},
    BLST_ERROR,
};
use derive_more::From;
use itertools::Itertools as _;
use rand::Rng as _;

use crate::{
    consts::DOMAIN_SEPARATION_TAG, error::Error, public_key::PublicKey,
    signature_bytes::SignatureBytes,
};

const MULTI_VERIFY_RANDOM_BYTES: usize = size_of::<NonZeroU64>();
const MULTI_VERIFY_RANDOM_BITS: usize = MULTI_VERIFY_RANDOM_BYTES * 8;

#[derive(Clone, Copy, PartialEq, Eq, Debug, From)]
pub struct Signature(RawSignature);

impl TryFrom<SignatureBytes> for Signature {
    type Error = Error;

    #[inline]
    fn try_from(bytes: SignatureBytes) -> Result<Self, Self::Error> {
        RawSignature::uncompress(bytes.as_bytes())
            .map(Self)
            .map_err(|_| Error::InvalidSignature)
    }
}

impl Signature {
    #[must_use]
    pub fn verify(&self, message: impl AsRef<[u8]>, public_key: &PublicKey) -> bool {
        let result = self.0.verify(
            true,
            message.as_ref(),
            DOMAIN_SEPARATION_TAG,
            &[],
            public_key.as_raw(),
            false,
        );

        result == BLST_ERROR::BLST_SUCCESS
    }

    #[must_use]
    pub fn fast_aggregate_verify<'keys>(
        &self,
        message: impl AsRef<[u8]>,
        public_keys: impl IntoIterator<Item = &'keys PublicKey>,
    ) -> bool {
        let public_keys = public_keys.into_iter().map(PublicKey::as_raw).collect_vec();

        if public_keys.is_empty() {
            return false;
        }

        let result = self.0.fast_aggregate_verify(
            true,
            message.as_ref(),
            DOMAIN_SEPARATION_TAG,
            public_keys.as_slice(),
        );

        result == BLST_ERROR::BLST_SUCCESS
    }

    pub fn aggregate<'signatures>(
        signatures: impl IntoIterator<Item = &'signatures Self>,
    ) -> Result<Self, Error> {
        let raw_signatures = signatures.into_iter().map(Self::as_raw).collect_vec();

        RawAggregateSignature::aggregate(raw_signatures.as_slice(), false)
            .map(|aggregate| Self(aggregate.to_signature()))
            .map_err(|_| Error::InvalidSignature)
    }

    /// Verifies `(message, signature, public key)` triples together.
    ///
    /// Each signature is multiplied by a random nonzero scalar before the pairings are combined,
    /// so an invalid triple cannot be cancelled out by another one.
    #[must_use]
    pub fn multi_verify<'all>(
        messages: impl IntoIterator<Item = &'all [u8]>,
        signatures: impl IntoIterator<Item = &'all Self>,
        public_keys: impl IntoIterator<Item = &'all PublicKey>,
    ) -> bool {
        let messages = messages.into_iter().collect_vec();
        let signatures = signatures.into_iter().map(Self::as_raw).collect_vec();
        let public_keys = public_keys.into_iter().map(PublicKey::as_raw).collect_vec();

        if signatures.is_empty() {
            return true;
        }

        // `ThreadRng` is cryptographically secure.
        let mut rng = rand::thread_rng();

        let randoms = core::iter::repeat_with(|| {
            let mut scalar = blst_scalar::default();
            let nonzero_bytes = rng.gen::<NonZeroU64>().get().to_le_bytes();
            scalar.b[..MULTI_VERIFY_RANDOM_BYTES].copy_from_slice(&nonzero_bytes);
            scalar
        })
        .take(signatures.len())
        .collect_vec();

        let result = RawSignature::verify_multiple_aggregate_signatures(
            messages.as_slice(),
            DOMAIN_SEPARATION_TAG,
            public_keys.as_slice(),
            false,
            signatures.as_slice(),
            true,
            randoms.as_slice(),
            MULTI_VERIFY_RANDOM_BITS,
        );

        result == BLST_ERROR::BLST_SUCCESS
    }

    #[must_use]
    pub(crate) const fn as_raw(&self) -> &RawSignature {
        &self.0
    }
}
