use std::sync::Arc;

use anyhow::{anyhow, Result};
use derive_more::Constructor;
use fork_choice_store::{ApplyBlockChanges, BlockNode, Store};
use helper_functions::{
    context::StateContext,
    misc,
    signature_sets::{self, SignatureSet},
};
use log::{debug, info, warn};
use parking_lot::Mutex;
use types::{
    config::Config,
    phase0::{
        beacon_state::BeaconState,
        containers::{Checkpoint, SignedBeaconBlock},
        primitives::{Gwei, H256},
    },
};

use crate::{
    db::ChainDb,
    error::{BlockError, ChainSegmentError},
    events::{ChainReorgEvent, EventChannels},
    jobs::{BlockJob, ChainSegmentJob},
    misc::{effective_balances, group_blocks_by_epoch},
    regen::{PreStateProvider, StateRegenerator},
    traits::{ForkChoice, PhaseZeroTransition, StateTransition},
    verifier::{BlsVerifier, SignatureVerifier},
};

/// Imports blocks into fork choice.
///
/// A block is added to fork choice only after its parent is known, its signatures are verified
/// and the state transition succeeds. Blocks are imported one at a time. Segment imports yield to
/// the runtime after every block.
#[derive(Constructor)]
pub struct BlockImporter<
    F = Mutex<Store>,
    R = StateRegenerator,
    V = BlsVerifier,
    T = PhaseZeroTransition,
> {
    config: Arc<Config>,
    fork_choice: Arc<F>,
    regen: R,
    verifier: V,
    transition: T,
    db: Arc<ChainDb>,
    event_channels: Arc<EventChannels>,
}

impl<F, R, V, T> BlockImporter<F, R, V, T>
where
    F: ForkChoice,
    R: PreStateProvider,
    V: SignatureVerifier,
    T: StateTransition,
{
    #[must_use]
    pub const fn config(&self) -> &Arc<Config> {
        &self.config
    }

    #[must_use]
    pub const fn fork_choice(&self) -> &Arc<F> {
        &self.fork_choice
    }

    #[must_use]
    pub const fn db(&self) -> &Arc<ChainDb> {
        &self.db
    }

    #[must_use]
    pub const fn event_channels(&self) -> &Arc<EventChannels> {
        &self.event_channels
    }

    /// Imports a single block.
    ///
    /// On success the signature flags in `job` are set so that the job can be resubmitted
    /// without verifying signatures again.
    pub async fn process_block(&self, job: &mut BlockJob) -> Result<(), BlockError> {
        let block = Arc::clone(&job.block);
        let block_root = block.block_root();
        let parent_root = block.parent_root();

        if !self.fork_choice.contains_block(parent_root) {
            return Err(BlockError::ParentUnknown {
                block_root,
                parent_root,
            });
        }

        let pre_state = self
            .regen
            .get_pre_state(block.message())
            .await
            .map_err(|source| BlockError::PrestateMissing { block_root, source })?;

        if !job.valid_signatures {
            let signature_sets =
                self.signature_sets(&pre_state, &block, job.valid_proposer_signature)
                    .map_err(|error| BlockError::classify(block_root, error))?;

            if !self.verifier.verify_batch(signature_sets).await {
                return Err(BlockError::InvalidSignature { block_root });
            }

            job.valid_proposer_signature = true;
            job.valid_signatures = true;
        }

        self.import_block(pre_state, job, block_root)
            .map_err(|error| BlockError::classify(block_root, error))?;

        Ok(())
    }

    /// Imports blocks in order, verifying signatures once per epoch.
    ///
    /// Blocks imported before a failure stay imported.
    /// [`ChainSegmentError::imported_blocks`] reports how many were added to fork choice.
    pub async fn process_chain_segment(&self, job: ChainSegmentJob) -> Result<(), ChainSegmentError> {
        let mut imported_blocks = 0;

        let Some(first_block) = job.blocks.first() else {
            return Ok(());
        };

        let parent_root = first_block.parent_root();

        if !self.fork_choice.contains_block(parent_root) {
            return Err(ChainSegmentError {
                error: BlockError::ParentUnknown {
                    block_root: first_block.block_root(),
                    parent_root,
                },
                imported_blocks,
            });
        }

        for blocks in group_blocks_by_epoch(&self.config, &job.blocks) {
            if let Err(error) = self
                .process_epoch_blocks(&job, blocks, &mut imported_blocks)
                .await
            {
                return Err(ChainSegmentError {
                    error,
                    imported_blocks,
                });
            }
        }

        info!(
            "imported chain segment ({imported_blocks} of {} blocks, head: {:?})",
            job.blocks.len(),
            self.fork_choice.head().block_root,
        );

        Ok(())
    }

    async fn process_epoch_blocks(
        &self,
        job: &ChainSegmentJob,
        blocks: &[Arc<SignedBeaconBlock>],
        imported_blocks: &mut usize,
    ) -> Result<(), BlockError> {
        let Some(first_block) = blocks.first() else {
            return Ok(());
        };

        let first_block_root = first_block.block_root();

        debug!(
            "processing {} blocks of chain segment (first_slot: {}, verify_signatures: {})",
            blocks.len(),
            first_block.slot(),
            !job.valid_signatures,
        );

        let mut state = self
            .regen
            .get_pre_state(first_block.message())
            .await
            .map_err(|source| BlockError::PrestateMissing {
                block_root: first_block_root,
                source,
            })?;

        if !job.valid_signatures {
            let mut signature_sets = vec![];

            for block in blocks {
                let block_sets = self
                    .signature_sets(&state, block, job.valid_proposer_signature)
                    .map_err(|error| BlockError::classify(block.block_root(), error))?;

                signature_sets.extend(block_sets);
            }

            if !self.verifier.verify_batch(signature_sets).await {
                return Err(BlockError::InvalidSignature {
                    block_root: first_block_root,
                });
            }
        }

        for block in blocks {
            let block_job = job.verified_block_job(Arc::clone(block));
            let block_root = block.block_root();

            let (post_state, imported) = self
                .import_block(state, &block_job, block_root)
                .map_err(|error| BlockError::classify(block_root, error))?;

            state = post_state;

            if imported {
                *imported_blocks += 1;
            }

            tokio::task::yield_now().await;
        }

        Ok(())
    }

    fn signature_sets(
        &self,
        pre_state: &StateContext,
        block: &SignedBeaconBlock,
        valid_proposer_signature: bool,
    ) -> Result<Vec<SignatureSet>> {
        if valid_proposer_signature {
            signature_sets::get_all_block_signature_sets_except_proposer(
                &self.config,
                pre_state,
                block,
            )
        } else {
            signature_sets::get_all_block_signature_sets(&self.config, pre_state, block)
        }
    }

    // Returns the post-state and whether the block was new to fork choice.
    fn import_block(
        &self,
        pre_state: StateContext,
        job: &BlockJob,
        block_root: H256,
    ) -> Result<(StateContext, bool)> {
        let block = &job.block;
        let slot = block.slot();
        let post_state = self.transition.apply(&self.config, pre_state, block)?;

        self.cache_states(block, block_root, &post_state)?;

        let justified_balances = self.justified_balances(post_state.state());
        let old_head = self.fork_choice.head();

        let changes =
            self.fork_choice
                .on_block(block, block_root, post_state.state(), justified_balances)?;

        if changes == ApplyBlockChanges::AlreadyPresent {
            debug!("block already imported (block_root: {block_root:?}, slot: {slot})");
            return Ok((post_state, false));
        }

        self.db.insert_block(block_root, Arc::clone(block));

        let new_head = self.fork_choice.head();

        if new_head.block_root != old_head.block_root {
            self.on_head_changed(&old_head, &new_head);
        }

        if changes.is_finalized_checkpoint_updated() {
            self.on_finalized_checkpoint_updated();
        }

        if misc::is_epoch_start(&self.config, slot) {
            let epoch = misc::compute_epoch_at_slot(&self.config, slot);
            let checkpoint = Checkpoint::new(epoch, block_root);

            self.event_channels
                .send_checkpoint_event(checkpoint, block.message().state_root);
        }

        self.event_channels.send_block_event(slot, block_root);

        debug!(
            "imported block (block_root: {block_root:?}, slot: {slot}, prefinalized: {}, \
             reprocess: {})",
            job.prefinalized, job.reprocess,
        );

        Ok((post_state, true))
    }

    // Caches the post-state and any checkpoint state the block establishes.
    // If the first slots of the block's epoch are empty, the checkpoint for that epoch is the
    // parent block advanced to the start of the epoch.
    fn cache_states(
        &self,
        block: &SignedBeaconBlock,
        block_root: H256,
        post_state: &StateContext,
    ) -> Result<()> {
        let slot = block.slot();
        let epoch = misc::compute_epoch_at_slot(&self.config, slot);
        let checkpoint_state_cache = self.db.checkpoint_state_cache();

        self.db.state_cache().insert(block_root, post_state.clone())?;

        if misc::is_epoch_start(&self.config, slot) {
            checkpoint_state_cache.insert(Checkpoint::new(epoch, block_root), post_state.clone());
            return Ok(());
        }

        let parent_root = block.parent_root();

        let Some(parent) = self.db.block(parent_root) else {
            return Ok(());
        };

        let checkpoint = Checkpoint::new(epoch, parent_root);

        if misc::compute_epoch_at_slot(&self.config, parent.slot()) == epoch
            || checkpoint_state_cache.get(checkpoint).is_some()
        {
            return Ok(());
        }

        let epoch_start = misc::compute_start_slot_at_epoch(&self.config, epoch);

        let checkpoint_state =
            self.db
                .state_cache()
                .get_or_insert_with(parent_root, epoch_start, |cached_state| {
                    let parent_state = cached_state.ok_or_else(|| {
                        anyhow!("post-state of block {parent_root:?} is not cached")
                    })?;

                    self.transition
                        .process_slots(&self.config, parent_state, epoch_start)
                })?;

        checkpoint_state_cache.insert(checkpoint, checkpoint_state);

        Ok(())
    }

    // Empty balances make fork choice keep the ones it has.
    fn justified_balances(&self, post_state: &BeaconState) -> Arc<[Gwei]> {
        let checkpoint = post_state.current_justified_checkpoint;

        if checkpoint.epoch <= self.fork_choice.justified_checkpoint().epoch {
            return Arc::from([]);
        }

        if let Some(checkpoint_state) = self.db.checkpoint_state_cache().get(checkpoint) {
            let epoch = checkpoint_state.epoch_context().epoch();
            return effective_balances(checkpoint_state.state(), epoch);
        }

        warn!(
            "state for justified checkpoint is not cached; \
             fork choice will keep previous balances (checkpoint: {checkpoint:?})",
        );

        Arc::from([])
    }

    fn on_head_changed(&self, old_head: &BlockNode, new_head: &BlockNode) {
        self.event_channels.send_head_event(&self.config, new_head);

        if self
            .fork_choice
            .is_descendant(old_head.block_root, new_head.block_root)
        {
            return;
        }

        let common_ancestor_slot = self
            .fork_choice
            .common_ancestor_slot(old_head.block_root, new_head.block_root);

        let chain_reorg_event =
            ChainReorgEvent::new(&self.config, old_head, new_head, common_ancestor_slot);

        info!(
            "chain reorganized (old_head: {:?}, new_head: {:?}, depth: {})",
            old_head.block_root, new_head.block_root, chain_reorg_event.depth,
        );

        self.event_channels.send_chain_reorg_event(chain_reorg_event);
    }

    fn on_finalized_checkpoint_updated(&self) {
        let finalized_checkpoint = self.fork_choice.finalized_checkpoint();

        let state_root = self
            .fork_choice
            .state_root(finalized_checkpoint.root)
            .unwrap_or_else(|| {
                warn!(
                    "finalized block is not in fork choice; \
                     sending finalized checkpoint event without state root \
                     (finalized_checkpoint: {finalized_checkpoint:?})",
                );

                H256::zero()
            });

        info!("finalized checkpoint updated (finalized_checkpoint: {finalized_checkpoint:?})");

        self.event_channels
            .send_finalized_checkpoint_event(finalized_checkpoint, state_root);

        if let Err(error) = self.db.prune(finalized_checkpoint) {
            warn!("failed to prune after finalization: {error}");
        }
    }
}
