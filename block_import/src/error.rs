use strum::{AsRefStr, Display};
use thiserror::Error;
use types::phase0::primitives::{Slot, H256};

#[derive(Clone, Copy, PartialEq, Eq, Debug, AsRefStr, Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum BlockErrorCode {
    ParentUnknown,
    InvalidSignature,
    PrestateMissing,
    BeaconChainError,
}

/// Reasons a block is rejected by the import pipeline.
///
/// Anything that does not fit one of the first three variants is reported as
/// [`BlockError::BeaconChainError`] with the original error as its source.
#[derive(Debug, Error)]
pub enum BlockError {
    #[error("parent of block {block_root:?} is unknown (parent_root: {parent_root:?})")]
    ParentUnknown { block_root: H256, parent_root: H256 },
    #[error("signatures in block {block_root:?} are invalid")]
    InvalidSignature { block_root: H256 },
    #[error("pre-state for block {block_root:?} is unavailable")]
    PrestateMissing {
        block_root: H256,
        #[source]
        source: RegenError,
    },
    #[error("failed to import block {block_root:?}")]
    BeaconChainError {
        block_root: H256,
        #[source]
        source: anyhow::Error,
    },
}

impl BlockError {
    #[must_use]
    pub const fn code(&self) -> BlockErrorCode {
        match self {
            Self::ParentUnknown { .. } => BlockErrorCode::ParentUnknown,
            Self::InvalidSignature { .. } => BlockErrorCode::InvalidSignature,
            Self::PrestateMissing { .. } => BlockErrorCode::PrestateMissing,
            Self::BeaconChainError { .. } => BlockErrorCode::BeaconChainError,
        }
    }

    #[must_use]
    pub const fn block_root(&self) -> H256 {
        match *self {
            Self::ParentUnknown { block_root, .. }
            | Self::InvalidSignature { block_root }
            | Self::PrestateMissing { block_root, .. }
            | Self::BeaconChainError { block_root, .. } => block_root,
        }
    }

    // Errors raised by the pipeline itself are already classified and pass through unchanged.
    pub(crate) fn classify(block_root: H256, error: anyhow::Error) -> Self {
        match error.downcast::<Self>() {
            Ok(block_error) => block_error,
            Err(source) => Self::BeaconChainError { block_root, source },
        }
    }
}

/// A chain segment import that stopped partway.
///
/// Blocks imported before the failure stay imported.
#[derive(Debug, Error)]
#[error("chain segment import failed after importing {imported_blocks} blocks")]
pub struct ChainSegmentError {
    #[source]
    pub error: BlockError,
    pub imported_blocks: usize,
}

impl ChainSegmentError {
    #[must_use]
    pub const fn code(&self) -> BlockErrorCode {
        self.error.code()
    }
}

#[derive(Debug, Error)]
pub enum RegenError {
    #[error("block {block_root:?} needed to rebuild the pre-state is not stored")]
    BlockNotFound { block_root: H256 },
    #[error("failed to advance state of block {block_root:?} to slot {slot}")]
    ProcessSlots {
        block_root: H256,
        slot: Slot,
        #[source]
        source: anyhow::Error,
    },
    #[error("failed to replay block {block_root:?}")]
    Replay {
        block_root: H256,
        #[source]
        source: anyhow::Error,
    },
}

#[cfg(test)]
mod tests {
    use anyhow::anyhow;

    use super::*;

    #[test]
    fn codes_are_screaming_snake_case() {
        let block_root = H256::zero();

        let errors = [
            BlockError::ParentUnknown {
                block_root,
                parent_root: block_root,
            },
            BlockError::InvalidSignature { block_root },
            BlockError::PrestateMissing {
                block_root,
                source: RegenError::BlockNotFound { block_root },
            },
            BlockError::BeaconChainError {
                block_root,
                source: anyhow!("boom"),
            },
        ];

        let codes = errors.iter().map(|error| error.code().to_string());

        assert!(codes.eq([
            "PARENT_UNKNOWN",
            "INVALID_SIGNATURE",
            "PRESTATE_MISSING",
            "BEACON_CHAIN_ERROR",
        ]));
    }

    #[test]
    fn classified_errors_pass_through_unchanged() {
        let block_root = H256::repeat_byte(1);
        let other_root = H256::repeat_byte(2);

        let error = BlockError::classify(
            other_root,
            BlockError::InvalidSignature { block_root }.into(),
        );

        assert_eq!(error.code(), BlockErrorCode::InvalidSignature);
        assert_eq!(error.block_root(), block_root);
    }

    #[test]
    fn other_errors_become_beacon_chain_errors_with_cause() {
        let block_root = H256::repeat_byte(1);
        let error = BlockError::classify(block_root, anyhow!("state root mismatch"));

        assert_eq!(error.code(), BlockErrorCode::BeaconChainError);
        assert_eq!(error.block_root(), block_root);
        assert_eq!(
            core::error::Error::source(&error).map(ToString::to_string),
            Some("state root mismatch".to_owned()),
        );
    }
}
