use std::sync::Arc;

use anyhow::{ensure, Result};
use helper_functions::{accessors, context::StateContext, misc};
use types::{
    config::Config,
    phase0::{beacon_state::BeaconState, primitives::Slot},
    traits::HashTreeRoot as _,
};

use crate::{epoch_processing, error::Error};

/// Advances `context` to `slot`, running epoch processing at every epoch boundary.
///
/// Returns a copy of `context` if it is already at `slot`.
pub fn process_slots(config: &Config, context: &StateContext, slot: Slot) -> Result<StateContext> {
    ensure!(
        context.slot() <= slot,
        Error::SlotEarlier {
            current: context.slot(),
            target: slot,
        },
    );

    if context.slot() == slot {
        return Ok(context.clone());
    }

    let mut state = BeaconState::clone(context.state());
    let mut epoch_context = Arc::clone(context.epoch_context());

    while state.slot < slot {
        process_slot(config, &mut state);

        if misc::is_epoch_start(config, state.slot + 1) {
            epoch_processing::process_epoch(config, &mut state)?;
        }

        state.slot += 1;

        if misc::is_epoch_start(config, state.slot) {
            epoch_context = Arc::new(epoch_context.advance(config, &state)?);
        }
    }

    Ok(StateContext::from_parts(Arc::new(state), epoch_context))
}

/// Caches the roots of the state and of the latest block before the slot is incremented.
pub fn process_slot(config: &Config, state: &mut BeaconState) {
    let index = accessors::historical_index(config, state.slot);

    let previous_state_root = state.hash_tree_root();
    state.state_roots.set(index, previous_state_root);

    if state.latest_block_header.state_root.is_zero() {
        state.latest_block_header.state_root = previous_state_root;
    }

    let previous_block_root = state.latest_block_header.hash_tree_root();
    state.block_roots.set(index, previous_block_root);
}
