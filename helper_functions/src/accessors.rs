use anyhow::{ensure, Result};
use types::{
    config::Config,
    phase0::{
        beacon_state::BeaconState,
        consts::{GENESIS_EPOCH, MIN_SEED_LOOKAHEAD},
        primitives::{Domain, DomainType, Epoch, Gwei, Slot, ValidatorIndex, H256},
    },
};

use crate::{error::Error, misc, predicates};

#[must_use]
pub fn get_current_epoch(config: &Config, state: &BeaconState) -> Epoch {
    misc::compute_epoch_at_slot(config, state.slot)
}

#[must_use]
pub fn get_previous_epoch(config: &Config, state: &BeaconState) -> Epoch {
    get_current_epoch(config, state)
        .saturating_sub(1)
        .max(GENESIS_EPOCH)
}

#[must_use]
pub fn get_active_validator_indices(state: &BeaconState, epoch: Epoch) -> Vec<ValidatorIndex> {
    (0..)
        .zip(&state.validators)
        .filter(|(_, validator)| predicates::is_active_validator(validator, epoch))
        .map(|(index, _)| index)
        .collect()
}

/// Sum of effective balances of validators active in `epoch`. Never zero.
#[must_use]
pub fn get_total_active_balance(state: &BeaconState, epoch: Epoch) -> Gwei {
    state
        .validators
        .iter()
        .filter(|validator| predicates::is_active_validator(validator, epoch))
        .map(|validator| validator.effective_balance)
        .sum::<Gwei>()
        .max(1)
}

pub fn get_block_root_at_slot(config: &Config, state: &BeaconState, slot: Slot) -> Result<H256> {
    ensure!(
        slot < state.slot && state.slot <= slot + config.slots_per_historical_root.get(),
        Error::SlotOutOfRange {
            slot,
            state_slot: state.slot,
        },
    );

    Ok(state.block_roots[historical_index(config, slot)])
}

pub fn get_block_root(config: &Config, state: &BeaconState, epoch: Epoch) -> Result<H256> {
    get_block_root_at_slot(config, state, misc::compute_start_slot_at_epoch(config, epoch))
}

#[must_use]
pub fn get_randao_mix(config: &Config, state: &BeaconState, epoch: Epoch) -> H256 {
    state.randao_mixes[randao_index(config, epoch)]
}

/// The seed for `epoch` is fixed at least one epoch in advance, so it does not change while
/// blocks of `epoch` are being applied.
#[must_use]
pub fn get_seed(config: &Config, state: &BeaconState, epoch: Epoch, domain_type: DomainType) -> H256 {
    let mix_epoch = epoch
        + config.epochs_per_historical_vector.get()
        - MIN_SEED_LOOKAHEAD
        - 1;

    let mut bytes = Vec::with_capacity(DomainType::len_bytes() + 8 + H256::len_bytes());
    bytes.extend_from_slice(domain_type.as_bytes());
    bytes.extend_from_slice(&epoch.to_le_bytes());
    bytes.extend_from_slice(get_randao_mix(config, state, mix_epoch).as_bytes());

    hashing::hash_bytes(bytes)
}

/// Selects the proposer of `slot` from the active validators of its epoch.
pub fn compute_proposer_index(
    seed: H256,
    slot: Slot,
    active_validator_indices: &[ValidatorIndex],
) -> Result<ValidatorIndex> {
    ensure!(!active_validator_indices.is_empty(), Error::NoActiveValidators);

    let hash = hashing::hash_256_64(seed, slot);
    let mut prefix = [0; 8];
    prefix.copy_from_slice(&hash[..8]);

    let total = u64::try_from(active_validator_indices.len())?;
    let position = usize::try_from(u64::from_le_bytes(prefix) % total)?;

    Ok(active_validator_indices[position])
}

#[must_use]
pub fn get_domain(config: &Config, state: &BeaconState, domain_type: DomainType) -> Domain {
    misc::compute_domain(
        domain_type,
        config.genesis_fork_version,
        state.genesis_validators_root,
    )
}

#[must_use]
pub fn historical_index(config: &Config, slot: Slot) -> usize {
    // The remainder is less than `slots_per_historical_root`, which fits in `usize`.
    #[expect(clippy::cast_possible_truncation)]
    let index = (slot % config.slots_per_historical_root) as usize;
    index
}

#[must_use]
pub fn randao_index(config: &Config, epoch: Epoch) -> usize {
    #[expect(clippy::cast_possible_truncation)]
    let index = (epoch % config.epochs_per_historical_vector) as usize;
    index
}
