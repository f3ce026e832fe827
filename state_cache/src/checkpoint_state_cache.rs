use helper_functions::context::StateContext;
use im::OrdMap;
use log::debug;
use parking_lot::Mutex;
use types::phase0::{
    containers::Checkpoint,
    primitives::{Epoch, H256},
};

/// States at the first slot of an epoch, keyed by the checkpoint they belong to.
///
/// Holds at most `capacity` entries. When full, the checkpoint with the lowest epoch is evicted.
pub struct CheckpointStateCache {
    states: Mutex<OrdMap<Checkpoint, StateContext>>,
    capacity: usize,
}

impl CheckpointStateCache {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            states: Mutex::new(OrdMap::new()),
            capacity,
        }
    }

    #[must_use]
    pub fn get(&self, checkpoint: Checkpoint) -> Option<StateContext> {
        self.states.lock().get(&checkpoint).cloned()
    }

    /// The state for the checkpoint with the highest epoch whose root is `root`.
    #[must_use]
    pub fn latest_for_root(&self, root: H256) -> Option<(Checkpoint, StateContext)> {
        self.states
            .lock()
            .iter()
            .rev()
            .find(|(checkpoint, _)| checkpoint.root == root)
            .map(|(checkpoint, state)| (*checkpoint, state.clone()))
    }

    pub fn insert(&self, checkpoint: Checkpoint, state: StateContext) {
        let mut states = self.states.lock();

        states.insert(checkpoint, state);

        while states.len() > self.capacity {
            let Some(evicted) = states.get_min().map(|(checkpoint, _)| *checkpoint) else {
                break;
            };

            states.remove(&evicted);

            debug!("evicted checkpoint state from cache (checkpoint: {evicted:?})");
        }
    }

    /// Removes states for checkpoints before `finalized_epoch`.
    pub fn prune(&self, finalized_epoch: Epoch) {
        let mut states = self.states.lock();
        let before = states.len();

        *states = states
            .range(Checkpoint::new(finalized_epoch, H256::zero())..)
            .map(|(checkpoint, state)| (*checkpoint, state.clone()))
            .collect();

        debug!(
            "pruned {} checkpoint states before epoch {finalized_epoch}",
            before - states.len(),
        );
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.states.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.states.lock().is_empty()
    }
}
