use blst::min_pk::{AggregatePublicKey as RawAggregatePublicKey, PublicKey as RawPublicKey};
use derive_more::From;

use crate::{error::Error, public_key_bytes::PublicKeyBytes};

#[derive(Clone, Copy, PartialEq, Eq, Default, Debug, From)]
pub struct PublicKey(RawPublicKey);

impl TryFrom<PublicKeyBytes> for PublicKey {
    type Error = Error;

    #[inline]
    fn try_from(bytes: PublicKeyBytes) -> Result<Self, Self::Error> {
        let raw =
            RawPublicKey::uncompress(bytes.as_bytes()).map_err(|_| Error::InvalidPublicKey)?;

        // Rejects the identity point and points outside the subgroup.
        raw.validate().map_err(|_| Error::InvalidPublicKey)?;

        Ok(Self(raw))
    }
}

impl PublicKey {
    pub fn aggregate_nonempty<'keys>(
        public_keys: impl IntoIterator<Item = &'keys Self>,
    ) -> Result<Self, Error> {
        let raw_keys = public_keys
            .into_iter()
            .map(Self::as_raw)
            .collect::<Vec<_>>();

        if raw_keys.is_empty() {
            return Err(Error::NoPublicKeysToAggregate);
        }

        RawAggregatePublicKey::aggregate(raw_keys.as_slice(), false)
            .map(|aggregate| Self(aggregate.to_public_key()))
            .map_err(|_| Error::InvalidPublicKey)
    }

    #[must_use]
    pub(crate) const fn as_raw(&self) -> &RawPublicKey {
        &self.0
    }
}
