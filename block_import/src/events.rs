use anyhow::Result;
use fork_choice_store::BlockNode;
use helper_functions::misc;
use log::warn;
use serde::Serialize;
use strum::{AsRefStr, EnumString};
use tokio::sync::broadcast::{self, Receiver, Sender};
use types::{
    config::Config,
    phase0::{
        containers::Checkpoint,
        primitives::{Epoch, Slot, H256},
    },
};

pub const DEFAULT_MAX_EVENTS: usize = 100;

#[derive(Clone, Copy, PartialEq, Eq, Debug, AsRefStr, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum Topic {
    Block,
    ChainReorg,
    Checkpoint,
    FinalizedCheckpoint,
    Head,
}

#[derive(Clone, Debug)]
pub enum Event {
    Block(BlockEvent),
    ChainReorg(ChainReorgEvent),
    Checkpoint(CheckpointEvent),
    FinalizedCheckpoint(FinalizedCheckpointEvent),
    Head(HeadEvent),
}

impl Event {
    #[must_use]
    pub const fn topic(&self) -> Topic {
        match self {
            Self::Block(_) => Topic::Block,
            Self::ChainReorg(_) => Topic::ChainReorg,
            Self::Checkpoint(_) => Topic::Checkpoint,
            Self::FinalizedCheckpoint(_) => Topic::FinalizedCheckpoint,
            Self::Head(_) => Topic::Head,
        }
    }
}

/// Broadcast channels for observers of the import pipeline.
///
/// Sending never fails the pipeline. Events on topics without subscribers are not constructed.
#[derive(Clone, Debug)]
pub struct EventChannels {
    pub blocks: Sender<Event>,
    pub chain_reorgs: Sender<Event>,
    pub checkpoints: Sender<Event>,
    pub finalized_checkpoints: Sender<Event>,
    pub heads: Sender<Event>,
}

impl Default for EventChannels {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_EVENTS)
    }
}

impl EventChannels {
    /// `max_events` must be positive. [`Config::validate`] rejects configurations where it is not.
    #[must_use]
    pub fn new(max_events: usize) -> Self {
        Self {
            blocks: broadcast::channel(max_events).0,
            chain_reorgs: broadcast::channel(max_events).0,
            checkpoints: broadcast::channel(max_events).0,
            finalized_checkpoints: broadcast::channel(max_events).0,
            heads: broadcast::channel(max_events).0,
        }
    }

    #[must_use]
    pub fn receiver_for(&self, topic: Topic) -> Receiver<Event> {
        match topic {
            Topic::Block => &self.blocks,
            Topic::ChainReorg => &self.chain_reorgs,
            Topic::Checkpoint => &self.checkpoints,
            Topic::FinalizedCheckpoint => &self.finalized_checkpoints,
            Topic::Head => &self.heads,
        }
        .subscribe()
    }

    pub fn send_block_event(&self, slot: Slot, block_root: H256) {
        if let Err(error) = self.send_block_event_internal(slot, block_root) {
            warn!("unable to send block event: {error}");
        }
    }

    pub fn send_chain_reorg_event(&self, chain_reorg_event: ChainReorgEvent) {
        if let Err(error) = self.send_chain_reorg_event_internal(chain_reorg_event) {
            warn!("unable to send chain reorg event: {error}");
        }
    }

    pub fn send_checkpoint_event(&self, checkpoint: Checkpoint, state_root: H256) {
        if let Err(error) = self.send_checkpoint_event_internal(checkpoint, state_root) {
            warn!("unable to send checkpoint event: {error}");
        }
    }

    pub fn send_finalized_checkpoint_event(&self, finalized_checkpoint: Checkpoint, state_root: H256) {
        if let Err(error) =
            self.send_finalized_checkpoint_event_internal(finalized_checkpoint, state_root)
        {
            warn!("unable to send finalized checkpoint event: {error}");
        }
    }

    pub fn send_head_event(&self, config: &Config, head: &BlockNode) {
        if let Err(error) = self.send_head_event_internal(config, head) {
            warn!("unable to send head event: {error}");
        }
    }

    fn send_block_event_internal(&self, slot: Slot, block_root: H256) -> Result<()> {
        if self.blocks.receiver_count() > 0 {
            let block_event = BlockEvent {
                slot,
                block: block_root,
            };

            self.blocks.send(Event::Block(block_event))?;
        }

        Ok(())
    }

    fn send_chain_reorg_event_internal(&self, chain_reorg_event: ChainReorgEvent) -> Result<()> {
        if self.chain_reorgs.receiver_count() > 0 {
            self.chain_reorgs
                .send(Event::ChainReorg(chain_reorg_event))?;
        }

        Ok(())
    }

    fn send_checkpoint_event_internal(&self, checkpoint: Checkpoint, state_root: H256) -> Result<()> {
        if self.checkpoints.receiver_count() > 0 {
            let checkpoint_event = CheckpointEvent {
                block: checkpoint.root,
                state: state_root,
                epoch: checkpoint.epoch,
            };

            self.checkpoints.send(Event::Checkpoint(checkpoint_event))?;
        }

        Ok(())
    }

    fn send_finalized_checkpoint_event_internal(
        &self,
        finalized_checkpoint: Checkpoint,
        state_root: H256,
    ) -> Result<()> {
        if self.finalized_checkpoints.receiver_count() > 0 {
            let finalized_checkpoint_event = FinalizedCheckpointEvent {
                block: finalized_checkpoint.root,
                state: state_root,
                epoch: finalized_checkpoint.epoch,
            };

            self.finalized_checkpoints
                .send(Event::FinalizedCheckpoint(finalized_checkpoint_event))?;
        }

        Ok(())
    }

    fn send_head_event_internal(&self, config: &Config, head: &BlockNode) -> Result<()> {
        if self.heads.receiver_count() > 0 {
            let head_event = HeadEvent {
                slot: head.slot,
                block: head.block_root,
                state: head.state_root,
                epoch_transition: misc::is_epoch_start(config, head.slot),
            };

            self.heads.send(Event::Head(head_event))?;
        }

        Ok(())
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize)]
pub struct BlockEvent {
    pub slot: Slot,
    pub block: H256,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize)]
pub struct ChainReorgEvent {
    pub slot: Slot,
    pub depth: u64,
    pub old_head_block: H256,
    pub new_head_block: H256,
    pub old_head_state: H256,
    pub new_head_state: H256,
    pub epoch: Epoch,
}

impl ChainReorgEvent {
    /// `depth` is the distance from `old_head` back to the common ancestor.
    ///
    /// If the old head was pruned by finalization, the start of the finalized epoch stands in
    /// for the common ancestor.
    #[must_use]
    pub fn new(
        config: &Config,
        old_head: &BlockNode,
        new_head: &BlockNode,
        common_ancestor_slot: Option<Slot>,
    ) -> Self {
        let depth = common_ancestor_slot
            .unwrap_or_else(|| {
                misc::compute_start_slot_at_epoch(config, old_head.finalized_checkpoint.epoch)
            })
            .abs_diff(old_head.slot);

        Self {
            slot: new_head.slot,
            depth,
            old_head_block: old_head.block_root,
            new_head_block: new_head.block_root,
            old_head_state: old_head.state_root,
            new_head_state: new_head.state_root,
            epoch: misc::compute_epoch_at_slot(config, new_head.slot),
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize)]
pub struct CheckpointEvent {
    pub block: H256,
    pub state: H256,
    pub epoch: Epoch,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize)]
pub struct FinalizedCheckpointEvent {
    pub block: H256,
    pub state: H256,
    pub epoch: Epoch,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize)]
pub struct HeadEvent {
    pub slot: Slot,
    pub block: H256,
    pub state: H256,
    pub epoch_transition: bool,
}
