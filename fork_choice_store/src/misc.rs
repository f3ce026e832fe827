use types::phase0::{
    containers::Checkpoint,
    primitives::{Epoch, Slot, H256},
};

/// A block as seen by fork choice.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct BlockNode {
    pub block_root: H256,
    pub parent_root: H256,
    pub slot: Slot,
    pub state_root: H256,
    pub justified_checkpoint: Checkpoint,
    pub finalized_checkpoint: Checkpoint,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct LatestMessage {
    pub epoch: Epoch,
    pub root: H256,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ApplyBlockChanges {
    /// The block was already in the store. Nothing changed.
    AlreadyPresent,
    CanonicalChainExtended {
        finalized_checkpoint_updated: bool,
    },
    Reorganized {
        finalized_checkpoint_updated: bool,
        old_head: BlockNode,
    },
    AlternateChainExtended {
        finalized_checkpoint_updated: bool,
    },
}

impl ApplyBlockChanges {
    #[must_use]
    pub const fn is_finalized_checkpoint_updated(&self) -> bool {
        match *self {
            Self::AlreadyPresent => false,
            Self::CanonicalChainExtended {
                finalized_checkpoint_updated,
            }
            | Self::Reorganized {
                finalized_checkpoint_updated,
                ..
            }
            | Self::AlternateChainExtended {
                finalized_checkpoint_updated,
            } => finalized_checkpoint_updated,
        }
    }
}
