//! A deterministic state transition in the shape of the Phase 0 one.
//!
//! Signatures are not checked here. Callers are expected to verify them in batches before
//! applying blocks.

pub use error::Error;
pub use slot_processing::{process_slot, process_slots};
pub use state_transition::state_transition;
pub use types::nonstandard::StateRootPolicy;

mod block_processing;
mod epoch_processing;
mod error;
mod slot_processing;
mod state_transition;
