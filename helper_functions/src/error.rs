use parse_display::Display;
use thiserror::Error;
use types::phase0::primitives::{Slot, ValidatorIndex};

#[derive(Debug, Error)]
pub enum Error {
    #[error("no validators are active")]
    NoActiveValidators,
    #[error("slot {slot} is out of range of state at slot {state_slot}")]
    SlotOutOfRange { slot: Slot, state_slot: Slot },
    #[error("slot {slot} is not in epoch context for epoch starting at {epoch_start}")]
    SlotNotInEpochContext { slot: Slot, epoch_start: Slot },
    #[error("validator index {index} is out of bounds")]
    ValidatorIndexOutOfBounds { index: ValidatorIndex },
    #[error("public key of validator {index} is invalid")]
    PublicKeyInvalid { index: ValidatorIndex },
    #[error("{0} has no participants")]
    NoParticipants(SignatureKind),
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Display)]
pub enum SignatureKind {
    #[display("attestation signature")]
    Attestation,
    #[display("block signature")]
    Block,
    #[display("RANDAO reveal")]
    Randao,
    #[display("voluntary exit signature")]
    VoluntaryExit,
}
