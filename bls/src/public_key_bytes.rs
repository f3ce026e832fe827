use fixed_hash::construct_fixed_hash;

use crate::public_key::PublicKey;

construct_fixed_hash! {
    pub struct PublicKeyBytes(48);
}

impl From<PublicKey> for PublicKeyBytes {
    #[inline]
    fn from(public_key: PublicKey) -> Self {
        Self(public_key.as_raw().compress())
    }
}
