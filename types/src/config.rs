use core::num::NonZeroU64;
use std::borrow::Cow;

use hex_literal::hex;
use nonzero_ext::nonzero;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::phase0::{
    consts::MAX_EFFECTIVE_BALANCE,
    primitives::{Epoch, Gwei, Version, H32},
};

/// Chain parameters used by the block import pipeline.
///
/// Field names follow the upper snake case used by `consensus-specs` configuration files.
#[expect(
    clippy::unsafe_derive_deserialize,
    reason = "A false positive triggered by `nonzero!`. \
              `Config` has no invariants beyond those checked by `Config::validate`."
)]
#[expect(
    clippy::struct_field_names,
    reason = "`config_name` matches the key used in configuration files."
)]
#[derive(Clone, PartialEq, Eq, Debug, Deserialize, Serialize)]
#[serde(default, rename_all = "SCREAMING_SNAKE_CASE")]
pub struct Config {
    // Meta
    pub config_name: Cow<'static, str>,

    // Time and history
    pub slots_per_epoch: NonZeroU64,
    pub slots_per_historical_root: NonZeroU64,
    pub epochs_per_historical_vector: NonZeroU64,

    // Validators
    pub max_effective_balance: Gwei,
    pub min_attestation_inclusion_delay: NonZeroU64,
    pub max_seed_lookahead: Epoch,

    // Genesis
    pub genesis_fork_version: Version,

    // Node-local
    pub max_events: usize,
    pub checkpoint_state_cache_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self::mainnet()
    }
}

impl Config {
    #[must_use]
    pub fn mainnet() -> Self {
        Self {
            config_name: Cow::Borrowed("mainnet"),
            slots_per_epoch: nonzero!(32_u64),
            slots_per_historical_root: nonzero!(8192_u64),
            epochs_per_historical_vector: nonzero!(65536_u64),
            max_effective_balance: MAX_EFFECTIVE_BALANCE,
            min_attestation_inclusion_delay: nonzero!(1_u64),
            max_seed_lookahead: 4,
            genesis_fork_version: H32(hex!("00000000")),
            max_events: 100,
            checkpoint_state_cache_size: 32,
        }
    }

    #[must_use]
    pub fn minimal() -> Self {
        Self {
            config_name: Cow::Borrowed("minimal"),
            slots_per_epoch: nonzero!(8_u64),
            slots_per_historical_root: nonzero!(64_u64),
            epochs_per_historical_vector: nonzero!(64_u64),
            genesis_fork_version: H32(hex!("00000001")),
            checkpoint_state_cache_size: 8,
            ..Self::mainnet()
        }
    }

    pub fn from_yaml(yaml: &str) -> Result<Self, Error> {
        let config = serde_yaml::from_str::<Self>(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.config_name.is_empty() {
            return Err(Error::NameEmpty);
        }

        for character in self.config_name.chars() {
            if !matches!(character, 'a'..='z' | '0'..='9' | '-') {
                return Err(Error::NameContainsIllegalCharacters);
            }
        }

        if self.slots_per_historical_root < self.slots_per_epoch {
            return Err(Error::HistoryShorterThanEpoch);
        }

        if self.checkpoint_state_cache_size == 0 {
            return Err(Error::CheckpointStateCacheEmpty);
        }

        if self.max_events == 0 {
            return Err(Error::MaxEventsZero);
        }

        Ok(())
    }

    #[must_use]
    pub fn slots_per_epoch(&self) -> u64 {
        self.slots_per_epoch.get()
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration name is empty")]
    NameEmpty,
    #[error("configuration name contains illegal characters")]
    NameContainsIllegalCharacters,
    #[error("SLOTS_PER_HISTORICAL_ROOT is smaller than SLOTS_PER_EPOCH")]
    HistoryShorterThanEpoch,
    #[error("CHECKPOINT_STATE_CACHE_SIZE must be positive")]
    CheckpointStateCacheEmpty,
    #[error("MAX_EVENTS must be positive")]
    MaxEventsZero,
    #[error("failed to parse configuration")]
    Yaml(#[from] serde_yaml::Error),
}

#[expect(
    clippy::needless_pass_by_value,
    reason = "Refactoring worsens readability, which is more important in tests."
)]
