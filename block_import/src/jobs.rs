use std::sync::Arc;

use types::phase0::{containers::SignedBeaconBlock, primitives::H256};

/// One block to import along with what is already known about it.
///
/// The signature flags are updated by [`BlockImporter::process_block`] once the signatures are
/// verified, so a job that fails later in the pipeline can be resubmitted without verifying
/// them again.
///
/// [`BlockImporter::process_block`]: crate::BlockImporter::process_block
#[expect(clippy::struct_excessive_bools)]
#[derive(Clone, Debug)]
pub struct BlockJob {
    pub block: Arc<SignedBeaconBlock>,
    pub valid_signatures: bool,
    pub valid_proposer_signature: bool,
    /// The block is known to descend from finalized history.
    pub prefinalized: bool,
    /// Failure should be followed by another attempt rather than a peer penalty.
    pub reprocess: bool,
}

impl BlockJob {
    #[must_use]
    pub const fn new(block: Arc<SignedBeaconBlock>) -> Self {
        Self {
            block,
            valid_signatures: false,
            valid_proposer_signature: false,
            prefinalized: false,
            reprocess: false,
        }
    }

    #[must_use]
    pub fn block_root(&self) -> H256 {
        self.block.block_root()
    }
}

/// Blocks in slot order where every block except the first is a child of the one before it.
///
/// The flags apply to every block in the segment.
#[expect(clippy::struct_excessive_bools)]
#[derive(Clone, Debug)]
pub struct ChainSegmentJob {
    pub blocks: Vec<Arc<SignedBeaconBlock>>,
    pub valid_signatures: bool,
    pub valid_proposer_signature: bool,
    pub prefinalized: bool,
    pub reprocess: bool,
}

impl ChainSegmentJob {
    #[must_use]
    pub const fn new(blocks: Vec<Arc<SignedBeaconBlock>>) -> Self {
        Self {
            blocks,
            valid_signatures: false,
            valid_proposer_signature: false,
            prefinalized: false,
            reprocess: false,
        }
    }

    /// The job for a single block of this segment whose signatures were already verified.
    #[must_use]
    pub fn verified_block_job(&self, block: Arc<SignedBeaconBlock>) -> BlockJob {
        BlockJob {
            block,
            valid_signatures: true,
            valid_proposer_signature: true,
            prefinalized: self.prefinalized,
            reprocess: self.reprocess,
        }
    }
}
