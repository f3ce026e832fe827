use std::sync::Arc;

use anyhow::{ensure, Result};
use bls::PublicKey;
use rayon::iter::{
    IndexedParallelIterator as _, IntoParallelRefIterator as _, ParallelIterator as _,
};
use types::{
    config::Config,
    phase0::{
        beacon_state::BeaconState,
        consts::DOMAIN_BEACON_PROPOSER,
        primitives::{Epoch, Slot, ValidatorIndex, H256},
    },
    traits::HashTreeRoot as _,
};

use crate::{accessors, error::Error, misc};

/// Data derived from a state that stays the same for a whole epoch.
///
/// Public keys are decompressed once and shared between consecutive epochs as long as the
/// validator registry does not grow.
#[derive(Debug)]
pub struct EpochContext {
    epoch: Epoch,
    epoch_start: Slot,
    active_validator_indices: Vec<ValidatorIndex>,
    proposers: Vec<ValidatorIndex>,
    public_keys: Arc<[PublicKey]>,
}

impl EpochContext {
    pub fn new(config: &Config, state: &BeaconState) -> Result<Self> {
        let public_keys = decompress_public_keys(state)?;
        Self::with_public_keys(config, state, public_keys)
    }

    /// Builds the context for the epoch `state` is currently in, reusing keys from `self`.
    pub fn advance(&self, config: &Config, state: &BeaconState) -> Result<Self> {
        let public_keys = if self.public_keys.len() == state.validators.len() {
            Arc::clone(&self.public_keys)
        } else {
            decompress_public_keys(state)?
        };

        Self::with_public_keys(config, state, public_keys)
    }

    fn with_public_keys(
        config: &Config,
        state: &BeaconState,
        public_keys: Arc<[PublicKey]>,
    ) -> Result<Self> {
        let epoch = accessors::get_current_epoch(config, state);
        let epoch_start = misc::compute_start_slot_at_epoch(config, epoch);
        let active_validator_indices = accessors::get_active_validator_indices(state, epoch);
        let seed = accessors::get_seed(config, state, epoch, DOMAIN_BEACON_PROPOSER);

        let proposers = (epoch_start..epoch_start + config.slots_per_epoch())
            .map(|slot| accessors::compute_proposer_index(seed, slot, &active_validator_indices))
            .collect::<Result<_>>()?;

        Ok(Self {
            epoch,
            epoch_start,
            active_validator_indices,
            proposers,
            public_keys,
        })
    }

    #[must_use]
    pub const fn epoch(&self) -> Epoch {
        self.epoch
    }

    #[must_use]
    pub fn active_validator_indices(&self) -> &[ValidatorIndex] {
        &self.active_validator_indices
    }

    pub fn proposer_index(&self, slot: Slot) -> Result<ValidatorIndex> {
        let position = slot
            .checked_sub(self.epoch_start)
            .and_then(|offset| usize::try_from(offset).ok())
            .filter(|position| *position < self.proposers.len());

        let Some(position) = position else {
            return Err(Error::SlotNotInEpochContext {
                slot,
                epoch_start: self.epoch_start,
            }
            .into());
        };

        Ok(self.proposers[position])
    }

    pub fn public_key(&self, index: ValidatorIndex) -> Result<&PublicKey> {
        usize::try_from(index)
            .ok()
            .and_then(|index| self.public_keys.get(index))
            .ok_or_else(|| Error::ValidatorIndexOutOfBounds { index }.into())
    }
}

fn decompress_public_keys(state: &BeaconState) -> Result<Arc<[PublicKey]>> {
    let validators = state.validators.iter().collect::<Vec<_>>();

    let public_keys = validators
        .par_iter()
        .enumerate()
        .map(|(index, validator)| {
            PublicKey::try_from(validator.pubkey).map_err(|_| {
                let index = index as ValidatorIndex;
                Error::PublicKeyInvalid { index }.into()
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(public_keys.into())
}

/// A state together with the [`EpochContext`] of the epoch it is in.
///
/// Both halves are reference counted so that caches can hand out copies freely.
#[derive(Clone, Debug)]
pub struct StateContext {
    state: Arc<BeaconState>,
    epoch_context: Arc<EpochContext>,
}

impl StateContext {
    pub fn new(config: &Config, state: BeaconState) -> Result<Self> {
        let epoch_context = EpochContext::new(config, &state)?;
        Ok(Self::from_parts(Arc::new(state), Arc::new(epoch_context)))
    }

    /// # Panics
    ///
    /// Panics in debug builds if `epoch_context` was built for a different epoch.
    #[must_use]
    pub fn from_parts(state: Arc<BeaconState>, epoch_context: Arc<EpochContext>) -> Self {
        debug_assert!(state.slot >= epoch_context.epoch_start);

        Self {
            state,
            epoch_context,
        }
    }

    #[must_use]
    pub const fn state(&self) -> &Arc<BeaconState> {
        &self.state
    }

    #[must_use]
    pub const fn epoch_context(&self) -> &Arc<EpochContext> {
        &self.epoch_context
    }

    #[must_use]
    pub fn slot(&self) -> Slot {
        self.state.slot
    }

    #[must_use]
    pub fn state_root(&self) -> H256 {
        self.state.hash_tree_root()
    }

    /// Returns `true` if both contexts refer to the same state allocation.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.state, &other.state)
    }

    pub fn ensure_slot_at_most(&self, slot: Slot) -> Result<()> {
        ensure!(
            self.slot() <= slot,
            Error::SlotOutOfRange {
                slot,
                state_slot: self.slot(),
            },
        );

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn proposers_cover_exactly_one_epoch() -> Result<()> {
        let config = Config::minimal();
        let state = interop::quick_start_beacon_state(&config, 8)?;
        let context = StateContext::new(&config, state)?;
        let epoch_context = context.epoch_context();

        for slot in 0..config.slots_per_epoch() {
            let proposer = epoch_context.proposer_index(slot)?;
            assert!(epoch_context.active_validator_indices().contains(&proposer));
        }

        assert!(epoch_context.proposer_index(config.slots_per_epoch()).is_err());

        Ok(())
    }

    #[test]
    fn public_keys_are_shared_when_registry_is_unchanged() -> Result<()> {
        let config = Config::minimal();
        let mut state = interop::quick_start_beacon_state(&config, 4)?;
        let first = EpochContext::new(&config, &state)?;

        state.slot = config.slots_per_epoch();

        let second = first.advance(&config, &state)?;

        assert_eq!(second.epoch(), 1);
        assert!(Arc::ptr_eq(&first.public_keys, &second.public_keys));
        assert!(second.public_key(4).is_err());

        Ok(())
    }
}
