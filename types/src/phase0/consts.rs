use hex_literal::hex;

use crate::phase0::primitives::{DomainType, Epoch, Gwei, Slot, H32};

pub const DOMAIN_BEACON_ATTESTER: DomainType = H32(hex!("01000000"));
pub const DOMAIN_BEACON_PROPOSER: DomainType = H32(hex!("00000000"));
pub const DOMAIN_RANDAO: DomainType = H32(hex!("02000000"));
pub const DOMAIN_VOLUNTARY_EXIT: DomainType = H32(hex!("04000000"));
pub const FAR_FUTURE_EPOCH: Epoch = Epoch::MAX;
pub const GENESIS_EPOCH: Epoch = 0;
pub const GENESIS_SLOT: Slot = 0;
pub const JUSTIFICATION_BITS_LENGTH: usize = 4;
pub const MIN_SEED_LOOKAHEAD: Epoch = 1;

// Denominated in Gwei, so this is 32 ETH.
pub const MAX_EFFECTIVE_BALANCE: Gwei = 32_000_000_000;
