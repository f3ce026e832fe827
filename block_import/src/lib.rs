//! The block import pipeline.
//!
//! Takes untrusted blocks or contiguous runs of them, checks that they build on known history,
//! verifies their signatures in batches, applies the state transition and adds them to fork
//! choice. Observers are notified through [`EventChannels`].
//!
//! The collaborators the pipeline depends on are abstracted by traits:
//! - [`ForkChoice`], implemented for [`parking_lot::Mutex`]`<`[`fork_choice_store::Store`]`>`.
//! - [`PreStateProvider`], implemented by [`StateRegenerator`].
//! - [`SignatureVerifier`], implemented by [`BlsVerifier`].
//! - [`StateTransition`], implemented by [`PhaseZeroTransition`].

pub use crate::{
    block_importer::BlockImporter,
    db::ChainDb,
    error::{BlockError, BlockErrorCode, ChainSegmentError, RegenError},
    events::{
        BlockEvent, ChainReorgEvent, CheckpointEvent, Event, EventChannels,
        FinalizedCheckpointEvent, HeadEvent, Topic, DEFAULT_MAX_EVENTS,
    },
    jobs::{BlockJob, ChainSegmentJob},
    misc::{effective_balances, group_blocks_by_epoch, Anchor},
    regen::{PreStateProvider, StateRegenerator},
    traits::{ForkChoice, PhaseZeroTransition, StateTransition},
    verifier::{BlsVerifier, SignatureVerifier},
};

mod block_importer;
mod db;
mod error;
mod events;
mod jobs;
mod misc;
mod regen;
mod traits;
mod verifier;

#[cfg(test)]
mod helpers;
