use thiserror::Error;
use types::phase0::primitives::{Slot, H256};

#[derive(Debug, Error)]
pub enum Error {
    #[error("parent of block {block_root:?} is unknown (parent_root: {parent_root:?})")]
    ParentUnknown { block_root: H256, parent_root: H256 },
    #[error("block {block_root:?} at slot {slot} is not newer than its parent at slot {parent_slot}")]
    BlockNotNewerThanParent {
        block_root: H256,
        slot: Slot,
        parent_slot: Slot,
    },
}
