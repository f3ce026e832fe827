//! An in-memory block tree with LMD-GHOST style head selection.
//!
//! Blocks are added with [`Store::apply_block`] once they have been fully validated.
//! The store keeps the highest justified and finalized checkpoints it has seen and prunes
//! branches that conflict with the finalized checkpoint.
//!
//! Votes are weighed with the balances of the justified checkpoint state. Those are supplied by
//! the caller along with blocks that advance the justified checkpoint.

pub use crate::{
    error::Error,
    misc::{ApplyBlockChanges, BlockNode, LatestMessage},
    store::Store,
};

mod error;
mod misc;
mod store;
