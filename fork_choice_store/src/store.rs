use std::{collections::HashMap as StdHashMap, sync::Arc};

use anyhow::{ensure, Result};
use im::{HashMap, HashSet, Vector};
use log::debug;
use types::phase0::{
    containers::Checkpoint,
    primitives::{Epoch, Gwei, Slot, ValidatorIndex, H256},
};

use crate::{
    error::Error,
    misc::{ApplyBlockChanges, BlockNode, LatestMessage},
};

/// Fork choice state.
///
/// Uses persistent collections so that snapshots are cheap to take.
#[derive(Clone, Debug)]
pub struct Store {
    blocks: HashMap<H256, BlockNode>,
    children: HashMap<H256, Vector<H256>>,
    justified_checkpoint: Checkpoint,
    finalized_checkpoint: Checkpoint,
    justified_balances: Arc<[Gwei]>,
    latest_messages: HashMap<ValidatorIndex, LatestMessage>,
    head: H256,
}

impl Store {
    /// Creates a store with `anchor` as the only block.
    ///
    /// The anchor is treated as both justified and finalized regardless of the checkpoints in it.
    #[must_use]
    pub fn new(anchor: BlockNode, anchor_epoch: Epoch, justified_balances: Arc<[Gwei]>) -> Self {
        let anchor_checkpoint = Checkpoint::new(anchor_epoch, anchor.block_root);

        let anchor = BlockNode {
            justified_checkpoint: anchor_checkpoint,
            finalized_checkpoint: anchor_checkpoint,
            ..anchor
        };

        Self {
            blocks: HashMap::unit(anchor.block_root, anchor),
            children: HashMap::new(),
            justified_checkpoint: anchor_checkpoint,
            finalized_checkpoint: anchor_checkpoint,
            justified_balances,
            latest_messages: HashMap::new(),
            head: anchor.block_root,
        }
    }

    #[must_use]
    pub fn contains_block(&self, block_root: H256) -> bool {
        self.blocks.contains_key(&block_root)
    }

    #[must_use]
    pub fn block(&self, block_root: H256) -> Option<&BlockNode> {
        self.blocks.get(&block_root)
    }

    #[must_use]
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    #[must_use]
    pub const fn justified_checkpoint(&self) -> Checkpoint {
        self.justified_checkpoint
    }

    #[must_use]
    pub const fn finalized_checkpoint(&self) -> Checkpoint {
        self.finalized_checkpoint
    }

    #[must_use]
    pub fn justified_balances(&self) -> &[Gwei] {
        &self.justified_balances
    }

    /// # Panics
    ///
    /// Panics if the head block was removed from the store, which pruning never does.
    #[must_use]
    pub fn head(&self) -> &BlockNode {
        self.blocks
            .get(&self.head)
            .expect("the head is always a descendant of the finalized block and is never pruned")
    }

    #[must_use]
    pub fn latest_message(&self, validator_index: ValidatorIndex) -> Option<LatestMessage> {
        self.latest_messages.get(&validator_index).copied()
    }

    /// Returns `true` if `ancestor_root` is `descendant_root` or one of its ancestors.
    #[must_use]
    pub fn is_ancestor(&self, ancestor_root: H256, descendant_root: H256) -> bool {
        let Some(ancestor) = self.blocks.get(&ancestor_root) else {
            return false;
        };

        self.ancestors(descendant_root)
            .take_while(|block| block.slot >= ancestor.slot)
            .any(|block| block.block_root == ancestor_root)
    }

    #[must_use]
    pub fn common_ancestor(&self, a_root: H256, b_root: H256) -> Option<&BlockNode> {
        let a_ancestors = self
            .ancestors(a_root)
            .map(|block| block.block_root)
            .collect::<HashSet<H256>>();

        self.ancestors(b_root)
            .find(|block| a_ancestors.contains(&block.block_root))
    }

    /// Adds a fully validated block.
    ///
    /// `justified_balances` replaces the stored balances if the block advances the justified
    /// checkpoint and the slice is not empty.
    pub fn apply_block(
        &mut self,
        node: BlockNode,
        justified_balances: Arc<[Gwei]>,
    ) -> Result<ApplyBlockChanges> {
        let block_root = node.block_root;

        if self.contains_block(block_root) {
            return Ok(ApplyBlockChanges::AlreadyPresent);
        }

        let Some(parent) = self.blocks.get(&node.parent_root) else {
            return Err(Error::ParentUnknown {
                block_root,
                parent_root: node.parent_root,
            }
            .into());
        };

        ensure!(
            node.slot > parent.slot,
            Error::BlockNotNewerThanParent {
                block_root,
                slot: node.slot,
                parent_slot: parent.slot,
            },
        );

        let old_head = *self.head();
        let old_finalized_checkpoint = self.finalized_checkpoint;

        let justified_checkpoint_updated =
            self.update_checkpoints(node.justified_checkpoint, node.finalized_checkpoint);

        if justified_checkpoint_updated && !justified_balances.is_empty() {
            self.justified_balances = justified_balances;
        }

        self.blocks.insert(block_root, node);
        self.children
            .entry(node.parent_root)
            .or_default()
            .push_back(block_root);

        let finalized_checkpoint_updated = old_finalized_checkpoint != self.finalized_checkpoint;

        if finalized_checkpoint_updated {
            self.prune_after_finalization();
        }

        self.update_head();

        let changes = if self.head == old_head.block_root {
            ApplyBlockChanges::AlternateChainExtended {
                finalized_checkpoint_updated,
            }
        } else if self.is_ancestor(old_head.block_root, self.head) {
            ApplyBlockChanges::CanonicalChainExtended {
                finalized_checkpoint_updated,
            }
        } else {
            ApplyBlockChanges::Reorganized {
                finalized_checkpoint_updated,
                old_head,
            }
        };

        Ok(changes)
    }

    /// Records votes and recomputes the head.
    ///
    /// A vote replaces an earlier one only if it is for a later epoch.
    /// Votes for blocks not in the store are ignored.
    pub fn apply_votes(&mut self, votes: impl IntoIterator<Item = (ValidatorIndex, LatestMessage)>) {
        for (validator_index, message) in votes {
            if !self.contains_block(message.root) {
                continue;
            }

            let is_newer = self
                .latest_messages
                .get(&validator_index)
                .is_none_or(|existing| message.epoch > existing.epoch);

            if is_newer {
                self.latest_messages.insert(validator_index, message);
            }
        }

        self.update_head();
    }

    fn update_checkpoints(
        &mut self,
        justified_checkpoint: Checkpoint,
        finalized_checkpoint: Checkpoint,
    ) -> bool {
        let mut justified_checkpoint_updated = false;

        if justified_checkpoint.epoch > self.justified_checkpoint.epoch {
            self.justified_checkpoint = justified_checkpoint;
            justified_checkpoint_updated = true;
        }

        if finalized_checkpoint.epoch > self.finalized_checkpoint.epoch {
            self.finalized_checkpoint = finalized_checkpoint;
        }

        justified_checkpoint_updated
    }

    fn ancestors(&self, block_root: H256) -> impl Iterator<Item = &BlockNode> {
        core::iter::successors(self.blocks.get(&block_root), |block| {
            self.blocks.get(&block.parent_root)
        })
    }

    fn update_head(&mut self) {
        let weights = self.weights();

        // The justified block may be missing if its checkpoint comes from a state whose block
        // was never imported here. Fall back to the finalized one, which is always present.
        let mut head = if self.contains_block(self.justified_checkpoint.root) {
            self.justified_checkpoint.root
        } else {
            self.finalized_checkpoint.root
        };

        if !self.contains_block(head) {
            return;
        }

        while let Some(children) = self.children.get(&head) {
            let best_child = children
                .iter()
                .copied()
                .max_by_key(|child| (weights.get(child).copied().unwrap_or_default(), *child));

            match best_child {
                Some(child) => head = child,
                None => break,
            }
        }

        if head != self.head {
            debug!("fork choice head changed (old: {:?}, new: {head:?})", self.head);
        }

        self.head = head;
    }

    fn weights(&self) -> StdHashMap<H256, Gwei> {
        let mut weights = StdHashMap::<H256, Gwei>::new();

        for (validator_index, message) in &self.latest_messages {
            let balance = usize::try_from(*validator_index)
                .ok()
                .and_then(|index| self.justified_balances.get(index))
                .copied()
                .unwrap_or_default();

            if balance == 0 {
                continue;
            }

            for block in self.ancestors(message.root) {
                *weights.entry(block.block_root).or_default() += balance;
            }
        }

        weights
    }

    fn prune_after_finalization(&mut self) {
        let finalized_root = self.finalized_checkpoint.root;

        if !self.contains_block(finalized_root) {
            return;
        }

        let mut retained = HashSet::unit(finalized_root);
        let mut pending = vec![finalized_root];

        while let Some(block_root) = pending.pop() {
            for child in self.children.get(&block_root).into_iter().flatten() {
                retained.insert(*child);
                pending.push(*child);
            }
        }

        let before = self.blocks.len();

        self.blocks.retain(|block_root, _| retained.contains(block_root));
        self.children.retain(|block_root, _| retained.contains(block_root));
        self.latest_messages
            .retain(|_, message| retained.contains(&message.root));

        debug!(
            "pruned {} blocks after finalization (finalized_checkpoint: {:?})",
            before - self.blocks.len(),
            self.finalized_checkpoint,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn root(byte: u8) -> H256 {
        H256::repeat_byte(byte)
    }

    fn node(block_root: H256, parent_root: H256, slot: Slot) -> BlockNode {
        BlockNode {
            block_root,
            parent_root,
            slot,
            state_root: H256::zero(),
            justified_checkpoint: Checkpoint::default(),
            finalized_checkpoint: Checkpoint::default(),
        }
    }

    fn new_store() -> Store {
        Store::new(node(root(1), H256::zero(), 0), 0, Arc::from([32, 32, 32]))
    }

    fn vote(root: H256) -> LatestMessage {
        LatestMessage { epoch: 1, root }
    }

    #[test]
    fn block_with_unknown_parent_is_rejected() {
        let mut store = new_store();

        let error = store
            .apply_block(node(root(3), root(2), 1), Arc::from([]))
            .expect_err("parent is unknown");

        assert!(matches!(
            error.downcast_ref::<Error>(),
            Some(Error::ParentUnknown { parent_root, .. }) if *parent_root == root(2),
        ));
        assert!(!store.contains_block(root(3)));
    }

    #[test]
    fn applying_a_known_block_changes_nothing() -> Result<()> {
        let mut store = new_store();

        store.apply_block(node(root(2), root(1), 1), Arc::from([]))?;

        assert_eq!(
            store.apply_block(node(root(2), root(1), 1), Arc::from([]))?,
            ApplyBlockChanges::AlreadyPresent,
        );
        assert_eq!(store.block_count(), 2);

        Ok(())
    }

    #[test]
    fn head_follows_the_chain_and_breaks_ties_by_root() -> Result<()> {
        let mut store = new_store();

        let changes = store.apply_block(node(root(2), root(1), 1), Arc::from([]))?;

        assert_eq!(
            changes,
            ApplyBlockChanges::CanonicalChainExtended {
                finalized_checkpoint_updated: false,
            },
        );
        assert_eq!(store.head().block_root, root(2));

        store.apply_block(node(root(9), root(1), 2), Arc::from([]))?;

        assert_eq!(store.head().block_root, root(9));

        Ok(())
    }

    #[test]
    fn votes_outweigh_root_tie_break() -> Result<()> {
        let mut store = new_store();

        store.apply_block(node(root(2), root(1), 1), Arc::from([]))?;
        store.apply_block(node(root(9), root(1), 1), Arc::from([]))?;
        store.apply_votes([(0, vote(root(2))), (1, vote(root(2))), (2, vote(root(9)))]);

        assert_eq!(store.head().block_root, root(2));

        let changes = store.apply_block(node(root(10), root(9), 2), Arc::from([]))?;

        assert_eq!(
            changes,
            ApplyBlockChanges::AlternateChainExtended {
                finalized_checkpoint_updated: false,
            },
        );

        Ok(())
    }

    #[test]
    fn older_votes_do_not_replace_newer_ones() -> Result<()> {
        let mut store = new_store();

        store.apply_block(node(root(2), root(1), 1), Arc::from([]))?;
        store.apply_votes([(0, LatestMessage { epoch: 3, root: root(2) })]);
        store.apply_votes([(0, LatestMessage { epoch: 2, root: root(1) })]);
        store.apply_votes([(1, vote(root(7)))]);

        assert_eq!(store.latest_message(0).map(|message| message.root), Some(root(2)));
        assert_eq!(store.latest_message(1), None);

        Ok(())
    }

    #[test]
    fn checkpoints_only_move_forward() -> Result<()> {
        let mut store = new_store();

        let mut second = node(root(2), root(1), 9);
        second.justified_checkpoint = Checkpoint::new(1, root(1));

        store.apply_block(second, Arc::from([32, 0, 32]))?;

        assert_eq!(store.justified_checkpoint(), Checkpoint::new(1, root(1)));
        assert_eq!(store.justified_balances(), [32, 0, 32]);

        let mut stale = node(root(3), root(2), 10);
        stale.justified_checkpoint = Checkpoint::new(0, root(1));

        store.apply_block(stale, Arc::from([1]))?;

        assert_eq!(store.justified_checkpoint(), Checkpoint::new(1, root(1)));
        assert_eq!(store.justified_balances(), [32, 0, 32]);

        Ok(())
    }

    #[test]
    fn empty_balances_keep_previous_ones() -> Result<()> {
        let mut store = new_store();

        let mut block = node(root(2), root(1), 9);
        block.justified_checkpoint = Checkpoint::new(1, root(1));

        store.apply_block(block, Arc::from([]))?;

        assert_eq!(store.justified_checkpoint().epoch, 1);
        assert_eq!(store.justified_balances(), [32, 32, 32]);

        Ok(())
    }

    #[test]
    fn finalization_prunes_conflicting_branches() -> Result<()> {
        let mut store = new_store();

        store.apply_block(node(root(2), root(1), 1), Arc::from([]))?;
        store.apply_block(node(root(3), root(1), 2), Arc::from([]))?;

        let mut finalizing = node(root(4), root(2), 20);
        finalizing.justified_checkpoint = Checkpoint::new(2, root(2));
        finalizing.finalized_checkpoint = Checkpoint::new(1, root(2));

        let changes = store.apply_block(finalizing, Arc::from([]))?;

        assert!(changes.is_finalized_checkpoint_updated());
        assert!(store.contains_block(root(2)));
        assert!(store.contains_block(root(4)));
        assert!(!store.contains_block(root(1)));
        assert!(!store.contains_block(root(3)));
        assert_eq!(store.head().block_root, root(4));

        Ok(())
    }

    #[test]
    fn ancestry_queries_walk_parent_links() -> Result<()> {
        let mut store = new_store();

        store.apply_block(node(root(2), root(1), 1), Arc::from([]))?;
        store.apply_block(node(root(3), root(2), 2), Arc::from([]))?;
        store.apply_block(node(root(4), root(2), 3), Arc::from([]))?;

        assert!(store.is_ancestor(root(1), root(3)));
        assert!(store.is_ancestor(root(3), root(3)));
        assert!(!store.is_ancestor(root(3), root(4)));
        assert_eq!(
            store.common_ancestor(root(3), root(4)).map(|block| block.block_root),
            Some(root(2)),
        );

        Ok(())
    }
}
