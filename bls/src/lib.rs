//! BLS12-381 signatures as used by the beacon chain (public keys in G1, signatures in G2).
//!
//! Only the [`blst`] backend is supported.

pub use crate::{
    consts::DOMAIN_SEPARATION_TAG,
    error::Error,
    public_key::PublicKey,
    public_key_bytes::PublicKeyBytes,
    secret_key::{SecretKey, SecretKeyBytes},
    signature::Signature,
    signature_bytes::SignatureBytes,
};

pub type AggregatePublicKey = PublicKey;
pub type AggregateSignature = Signature;

mod consts;
mod error;
mod public_key;
mod public_key_bytes;
mod secret_key;
mod signature;
mod signature_bytes;
