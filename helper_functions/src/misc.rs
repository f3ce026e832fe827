use types::{
    config::Config,
    phase0::{
        containers::SigningData,
        primitives::{Domain, DomainType, Epoch, Slot, Version, H256},
    },
    traits::HashTreeRoot,
};

#[must_use]
pub fn compute_epoch_at_slot(config: &Config, slot: Slot) -> Epoch {
    slot / config.slots_per_epoch
}

#[must_use]
pub fn compute_start_slot_at_epoch(config: &Config, epoch: Epoch) -> Slot {
    epoch.saturating_mul(config.slots_per_epoch())
}

#[must_use]
pub fn is_epoch_start(config: &Config, slot: Slot) -> bool {
    slots_since_epoch_start(config, slot) == 0
}

#[must_use]
pub fn slots_since_epoch_start(config: &Config, slot: Slot) -> u64 {
    slot % config.slots_per_epoch
}

/// The epoch at which an exit initiated in `epoch` takes effect.
#[must_use]
pub const fn compute_activation_exit_epoch(config: &Config, epoch: Epoch) -> Epoch {
    epoch + 1 + config.max_seed_lookahead
}

/// Domain type followed by the first 28 bytes of the fork data root.
#[must_use]
pub fn compute_domain(
    domain_type: DomainType,
    fork_version: Version,
    genesis_validators_root: H256,
) -> Domain {
    let fork_data_root = hashing::merkleize(&[
        fork_version.hash_tree_root(),
        genesis_validators_root,
    ]);

    let mut domain = Domain::zero();
    domain[..DomainType::len_bytes()].copy_from_slice(domain_type.as_bytes());
    domain[DomainType::len_bytes()..]
        .copy_from_slice(&fork_data_root[..Domain::len_bytes() - DomainType::len_bytes()]);
    domain
}

#[must_use]
pub fn compute_signing_root(object: &(impl HashTreeRoot + ?Sized), domain: Domain) -> H256 {
    SigningData {
        object_root: object.hash_tree_root(),
        domain,
    }
    .hash_tree_root()
}
