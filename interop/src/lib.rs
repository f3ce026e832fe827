use anyhow::{ensure, Result};
use bls::{SecretKey, SecretKeyBytes};
use hex_literal::hex;
use im::Vector;
use num_bigint::BigUint;
use types::{
    config::Config,
    phase0::{
        beacon_state::BeaconState,
        consts::{FAR_FUTURE_EPOCH, GENESIS_EPOCH},
        containers::{BeaconBlockBody, BeaconBlockHeader, Validator},
        primitives::{UnixSeconds, ValidatorIndex, H256},
    },
    traits::HashTreeRoot as _,
};

/// <https://github.com/ethereum/eth2.0-pm/tree/b7c76e7a9d036ce73ca6aa0b7065db92f7728f41/interop/mocked_start#create-genesis-state>
const QUICK_START_ETH1_BLOCK_HASH: H256 = H256([0x42; 32]);

/// <https://github.com/ethereum/eth2.0-pm/tree/b7c76e7a9d036ce73ca6aa0b7065db92f7728f41/interop/mocked_start#create-genesis-state>
const QUICK_START_ETH1_BLOCK_TIMESTAMP: UnixSeconds = 1 << 40;

/// <https://github.com/ethereum/eth2.0-pm/tree/b7c76e7a9d036ce73ca6aa0b7065db92f7728f41/interop/mocked_start#pubkeyprivkey-generation>
///
/// Encoded in binary to avoid parsing a decimal string at runtime.
const CURVE_ORDER: &[u8] =
    &hex!("73eda753299d7d483339d80809a1d80553bda402fffe5bfeffffffff00000001");

/// Genesis state with `validator_count` validators using the interop keys, all active from
/// genesis with the maximum effective balance.
pub fn quick_start_beacon_state(config: &Config, validator_count: u64) -> Result<BeaconState> {
    ensure!(validator_count > 0, "genesis state must have at least one validator");

    let validators = (0..validator_count)
        .map(|index| Validator {
            pubkey: secret_key(index).to_public_key().into(),
            effective_balance: config.max_effective_balance,
            slashed: false,
            activation_epoch: GENESIS_EPOCH,
            exit_epoch: FAR_FUTURE_EPOCH,
        })
        .collect::<Vector<_>>();

    let balances = validators
        .iter()
        .map(|validator| validator.effective_balance)
        .collect();

    let historical_length = usize::try_from(config.slots_per_historical_root.get())?;
    let randao_length = usize::try_from(config.epochs_per_historical_vector.get())?;

    Ok(BeaconState {
        genesis_time: QUICK_START_ETH1_BLOCK_TIMESTAMP,
        genesis_validators_root: validators.hash_tree_root(),
        latest_block_header: BeaconBlockHeader {
            body_root: BeaconBlockBody::default().hash_tree_root(),
            ..BeaconBlockHeader::default()
        },
        block_roots: vec![H256::zero(); historical_length].into(),
        state_roots: vec![H256::zero(); historical_length].into(),
        validators,
        balances,
        randao_mixes: vec![QUICK_START_ETH1_BLOCK_HASH; randao_length].into(),
        ..BeaconState::default()
    })
}

/// <https://github.com/ethereum/eth2.0-pm/tree/b7c76e7a9d036ce73ca6aa0b7065db92f7728f41/interop/mocked_start#pubkeyprivkey-generation>
#[must_use]
pub fn secret_key(validator_index: ValidatorIndex) -> SecretKey {
    let index_hash = hashing::hash_256(validator_index.hash_tree_root());
    let curve_order = BigUint::from_bytes_be(CURVE_ORDER);
    let secret_key_uint = BigUint::from_bytes_le(index_hash.as_bytes()) % &curve_order;
    let unpadded = secret_key_uint.to_bytes_be();
    let mut padded = SecretKeyBytes::default();
    padded[size_of::<SecretKeyBytes>() - unpadded.len()..].copy_from_slice(unpadded.as_slice());
    padded
        .try_into()
        .expect("the algorithm given in the standard should produce valid secret keys")
}
