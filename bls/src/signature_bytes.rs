use fixed_hash::construct_fixed_hash;

use crate::signature::Signature;

construct_fixed_hash! {
    pub struct SignatureBytes(96);
}

impl From<Signature> for SignatureBytes {
    #[inline]
    fn from(signature: Signature) -> Self {
        Self(signature.as_raw().compress())
    }
}

impl SignatureBytes {
    /// The compressed point at infinity.
    #[must_use]
    pub fn empty() -> Self {
        let mut bytes = Self::zero();
        bytes.0[0] = 0xc0;
        bytes
    }

    #[must_use]
    pub fn is_empty(self) -> bool {
        self == Self::empty()
    }
}
