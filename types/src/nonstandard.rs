use core::ops::Range;

use crate::{
    phase0::{consts::JUSTIFICATION_BITS_LENGTH, primitives::H256},
    traits::HashTreeRoot,
};

/// `BeaconState.justification_bits`. Bit 0 corresponds to the current epoch.
#[derive(Clone, Copy, PartialEq, Eq, Default, Debug)]
pub struct JustificationBits(u8);

impl JustificationBits {
    const MASK: u8 = (1 << JUSTIFICATION_BITS_LENGTH) - 1;

    #[must_use]
    pub const fn get(self, bit: usize) -> bool {
        self.0 & (1 << bit) != 0
    }

    pub fn set(&mut self, bit: usize, value: bool) {
        assert!(bit < JUSTIFICATION_BITS_LENGTH);

        if value {
            self.0 |= 1 << bit;
        } else {
            self.0 &= !(1 << bit);
        }
    }

    pub fn shift_up_by_1(&mut self) {
        self.0 = (self.0 << 1) & Self::MASK;
    }

    #[must_use]
    pub fn all(self, bits: Range<usize>) -> bool {
        bits.into_iter().all(|bit| self.get(bit))
    }

    #[must_use]
    pub const fn into_inner(self) -> u8 {
        self.0
    }
}

impl HashTreeRoot for JustificationBits {
    fn hash_tree_root(&self) -> H256 {
        let mut chunk = H256::zero();
        chunk.0[0] = self.0;
        chunk
    }
}

/// Whether a block's `state_root` should be checked against the computed post-state root.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum StateRootPolicy {
    Verify,
    Trust,
}
