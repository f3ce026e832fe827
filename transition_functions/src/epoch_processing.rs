use std::collections::HashSet;

use anyhow::Result;
use helper_functions::{accessors, predicates};
use im::Vector;
use types::{
    config::Config,
    phase0::{
        beacon_state::BeaconState,
        consts::GENESIS_EPOCH,
        containers::{Checkpoint, PendingAttestation},
        primitives::{Epoch, Gwei, ValidatorIndex},
    },
};

pub fn process_epoch(config: &Config, state: &mut BeaconState) -> Result<()> {
    process_justification_and_finalization(config, state)?;
    process_randao_mixes_reset(config, state);
    process_participation_record_updates(state);
    Ok(())
}

fn process_justification_and_finalization(config: &Config, state: &mut BeaconState) -> Result<()> {
    if !should_process_justification_and_finalization(config, state) {
        return Ok(());
    }

    let previous_epoch = accessors::get_previous_epoch(config, state);
    let current_epoch = accessors::get_current_epoch(config, state);

    let previous_epoch_target_balance = get_target_balance(
        config,
        state,
        &state.previous_epoch_attestations,
        previous_epoch,
    )?;

    let current_epoch_target_balance = get_target_balance(
        config,
        state,
        &state.current_epoch_attestations,
        current_epoch,
    )?;

    let current_epoch_active_balance = accessors::get_total_active_balance(state, current_epoch);

    weigh_justification_and_finalization(
        config,
        state,
        current_epoch_active_balance,
        previous_epoch_target_balance,
        current_epoch_target_balance,
    )
}

fn should_process_justification_and_finalization(config: &Config, state: &BeaconState) -> bool {
    // Initial checkpoints have a zero root.
    // Updates are skipped in the first two epochs to avoid modifying it.
    GENESIS_EPOCH + 1 < accessors::get_current_epoch(config, state)
}

/// Total effective balance of unslashed validators that voted for the checkpoint of `epoch`.
fn get_target_balance(
    config: &Config,
    state: &BeaconState,
    attestations: &Vector<PendingAttestation>,
    epoch: Epoch,
) -> Result<Gwei> {
    let target_root = accessors::get_block_root(config, state, epoch)?;

    let attesters = attestations
        .iter()
        .filter(|attestation| attestation.data.target.root == target_root)
        .flat_map(|attestation| attestation.attesting_indices.iter().copied())
        .collect::<HashSet<ValidatorIndex>>();

    let balance = attesters
        .into_iter()
        .filter_map(|index| state.validators.get(usize::try_from(index).ok()?))
        .filter(|validator| !validator.slashed && predicates::is_active_validator(validator, epoch))
        .map(|validator| validator.effective_balance)
        .sum();

    Ok(balance)
}

fn weigh_justification_and_finalization(
    config: &Config,
    state: &mut BeaconState,
    current_epoch_active_balance: Gwei,
    previous_epoch_target_balance: Gwei,
    current_epoch_target_balance: Gwei,
) -> Result<()> {
    let previous_epoch = accessors::get_previous_epoch(config, state);
    let current_epoch = accessors::get_current_epoch(config, state);
    let old_previous_justified_checkpoint = state.previous_justified_checkpoint;
    let old_current_justified_checkpoint = state.current_justified_checkpoint;

    // Process justifications
    state.previous_justified_checkpoint = state.current_justified_checkpoint;
    state.justification_bits.shift_up_by_1();

    for (epoch, bit, target_balance) in [
        (previous_epoch, 1, previous_epoch_target_balance),
        (current_epoch, 0, current_epoch_target_balance),
    ] {
        if target_balance * 3 >= current_epoch_active_balance * 2 {
            let root = accessors::get_block_root(config, state, epoch)?;
            state.current_justified_checkpoint = Checkpoint { epoch, root };
            state.justification_bits.set(bit, true);
        }
    }

    // Process finalizations
    let bits = state.justification_bits;

    // The 2nd/3rd/4th most recent epochs are justified, the 2nd using the 4th as source
    if bits.all(1..4) && old_previous_justified_checkpoint.epoch + 3 == current_epoch {
        state.finalized_checkpoint = old_previous_justified_checkpoint;
    }

    // The 2nd/3rd most recent epochs are justified, the 2nd using the 3rd as source
    if bits.all(1..3) && old_previous_justified_checkpoint.epoch + 2 == current_epoch {
        state.finalized_checkpoint = old_previous_justified_checkpoint;
    }

    // The 1st/2nd/3rd most recent epochs are justified, the 1st using the 3rd as source
    if bits.all(0..3) && old_current_justified_checkpoint.epoch + 2 == current_epoch {
        state.finalized_checkpoint = old_current_justified_checkpoint;
    }

    // The 1st/2nd most recent epochs are justified, the 1st using the 2nd as source
    if bits.all(0..2) && old_current_justified_checkpoint.epoch + 1 == current_epoch {
        state.finalized_checkpoint = old_current_justified_checkpoint;
    }

    Ok(())
}

fn process_randao_mixes_reset(config: &Config, state: &mut BeaconState) {
    let current_epoch = accessors::get_current_epoch(config, state);
    let next_epoch = current_epoch + 1;
    let mix = accessors::get_randao_mix(config, state, current_epoch);

    state
        .randao_mixes
        .set(accessors::randao_index(config, next_epoch), mix);
}

fn process_participation_record_updates(state: &mut BeaconState) {
    state.previous_epoch_attestations = core::mem::take(&mut state.current_epoch_attestations);
}

#[cfg(test)]
mod tests {
    use types::phase0::primitives::H256;

    use super::*;

    fn state_at_end_of_epoch(config: &Config, epoch: Epoch) -> Result<BeaconState> {
        let mut state = interop::quick_start_beacon_state(config, 4)?;

        state.slot = (epoch + 1) * config.slots_per_epoch() - 1;

        for (index, root) in state.block_roots.iter_mut().enumerate() {
            *root = H256::from_low_u64_be(index as u64 + 1);
        }

        Ok(state)
    }

    fn votes(config: &Config, state: &BeaconState, epoch: Epoch, indices: &[ValidatorIndex]) -> Result<PendingAttestation> {
        let mut attestation = PendingAttestation {
            attesting_indices: indices.to_vec(),
            ..PendingAttestation::default()
        };

        attestation.data.target = Checkpoint {
            epoch,
            root: accessors::get_block_root(config, state, epoch)?,
        };

        Ok(attestation)
    }

    #[test]
    fn supermajority_justifies_current_epoch() -> Result<()> {
        let config = Config::minimal();
        let mut state = state_at_end_of_epoch(&config, 2)?;

        let attestation = votes(&config, &state, 2, &[0, 1, 2])?;
        state.current_epoch_attestations.push_back(attestation);

        process_epoch(&config, &mut state)?;

        assert_eq!(state.current_justified_checkpoint.epoch, 2);
        assert!(state.justification_bits.get(0));
        assert!(state.current_epoch_attestations.is_empty());
        assert_eq!(state.previous_epoch_attestations.len(), 1);

        Ok(())
    }

    #[test]
    fn minority_does_not_justify() -> Result<()> {
        let config = Config::minimal();
        let mut state = state_at_end_of_epoch(&config, 2)?;

        let attestation = votes(&config, &state, 2, &[0, 1])?;
        state.current_epoch_attestations.push_back(attestation);

        process_epoch(&config, &mut state)?;

        assert_eq!(state.current_justified_checkpoint, Checkpoint::default());
        assert!(!state.justification_bits.get(0));

        Ok(())
    }

    #[test]
    fn duplicate_votes_are_counted_once() -> Result<()> {
        let config = Config::minimal();
        let mut state = state_at_end_of_epoch(&config, 2)?;

        for _ in 0..3 {
            let attestation = votes(&config, &state, 2, &[0, 1])?;
            state.current_epoch_attestations.push_back(attestation);
        }

        process_epoch(&config, &mut state)?;

        assert!(!state.justification_bits.get(0));

        Ok(())
    }

    #[test]
    fn consecutive_justification_finalizes_previous_checkpoint() -> Result<()> {
        let config = Config::minimal();
        let mut state = state_at_end_of_epoch(&config, 3)?;
        let justified = Checkpoint {
            epoch: 2,
            root: accessors::get_block_root(&config, &state, 2)?,
        };

        state.current_justified_checkpoint = justified;
        state.justification_bits.set(0, true);

        let attestation = votes(&config, &state, 3, &[0, 1, 2, 3])?;
        state.current_epoch_attestations.push_back(attestation);

        process_epoch(&config, &mut state)?;

        assert_eq!(state.current_justified_checkpoint.epoch, 3);
        assert_eq!(state.finalized_checkpoint, justified);

        Ok(())
    }

    #[test]
    fn first_epochs_are_not_weighed() -> Result<()> {
        let config = Config::minimal();
        let mut state = state_at_end_of_epoch(&config, 1)?;

        let attestation = votes(&config, &state, 1, &[0, 1, 2, 3])?;
        state.current_epoch_attestations.push_back(attestation);

        process_epoch(&config, &mut state)?;

        assert_eq!(state.current_justified_checkpoint, Checkpoint::default());

        Ok(())
    }

    #[test]
    fn randao_mix_is_carried_into_next_epoch() -> Result<()> {
        let config = Config::minimal();
        let mut state = state_at_end_of_epoch(&config, 0)?;

        state.randao_mixes.set(0, H256::repeat_byte(7));

        process_epoch(&config, &mut state)?;

        assert_eq!(state.randao_mixes[1], H256::repeat_byte(7));

        Ok(())
    }
}
