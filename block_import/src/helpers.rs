use core::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use fork_choice_store::Store;
use helper_functions::{context::StateContext, signature_sets::SignatureSet};
use parking_lot::Mutex;
use tokio::sync::broadcast::Receiver;
use types::{
    config::Config,
    phase0::{containers::BeaconBlock, primitives::H256},
};

use crate::{
    block_importer::BlockImporter,
    error::RegenError,
    events::{Event, EventChannels, Topic},
    misc::Anchor,
    regen::{PreStateProvider, StateRegenerator},
    traits::{ForkChoice as _, PhaseZeroTransition},
    verifier::{BlsVerifier, SignatureVerifier},
};

pub type TestImporter<R = StateRegenerator> =
    BlockImporter<Mutex<Store>, R, CountingVerifier, PhaseZeroTransition>;

/// Passes batches to [`BlsVerifier`] and counts them.
pub struct CountingVerifier {
    inner: BlsVerifier,
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl SignatureVerifier for CountingVerifier {
    async fn verify_batch(&self, signature_sets: Vec<SignatureSet>) -> bool {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.verify_batch(signature_sets).await
    }
}

pub struct MissingStateRegen;

#[async_trait]
impl PreStateProvider for MissingStateRegen {
    async fn get_pre_state(&self, block: &BeaconBlock) -> Result<StateContext, RegenError> {
        Err(RegenError::BlockNotFound {
            block_root: block.parent_root,
        })
    }
}

pub struct Context<R = StateRegenerator> {
    pub importer: TestImporter<R>,
    pub genesis: StateContext,
    verifier_calls: Arc<AtomicUsize>,
}

impl Context {
    pub fn new() -> Result<Self> {
        Self::with_config(Config::minimal())
    }

    pub fn with_config(config: Config) -> Result<Self> {
        let config = Arc::new(config);

        Self::build(&config, |db| {
            StateRegenerator::new(Arc::clone(&config), Arc::clone(db))
        })
    }
}

impl Context<MissingStateRegen> {
    pub fn with_missing_states() -> Result<Self> {
        Self::build(&Arc::new(Config::minimal()), |_| MissingStateRegen)
    }
}

impl<R: PreStateProvider> Context<R> {
    fn build(
        config: &Arc<Config>,
        regen: impl FnOnce(&Arc<crate::db::ChainDb>) -> R,
    ) -> Result<Self> {
        let state = interop::quick_start_beacon_state(config, 8)?;
        let anchor = Anchor::from_state(config, state)?;
        let fork_choice = Arc::new(Mutex::new(anchor.fork_choice_store(config)));
        let db = Arc::new(anchor.chain_db(config)?);
        let verifier_calls = Arc::<AtomicUsize>::default();

        let verifier = CountingVerifier {
            inner: BlsVerifier::new()?,
            calls: Arc::clone(&verifier_calls),
        };

        let importer = BlockImporter::new(
            Arc::clone(config),
            fork_choice,
            regen(&db),
            verifier,
            PhaseZeroTransition,
            db,
            Arc::new(EventChannels::new(config.max_events)),
        );

        Ok(Self {
            importer,
            genesis: anchor.state().clone(),
            verifier_calls,
        })
    }

    pub fn config(&self) -> &Config {
        self.importer.config()
    }

    pub fn verifier_calls(&self) -> usize {
        self.verifier_calls.load(Ordering::SeqCst)
    }

    pub fn contains_block(&self, block_root: H256) -> bool {
        self.importer.fork_choice().contains_block(block_root)
    }

    pub fn block_count(&self) -> usize {
        self.importer.fork_choice().lock().block_count()
    }

    pub fn head_root(&self) -> H256 {
        self.importer.fork_choice().head().block_root
    }

    pub fn subscribe(&self, topic: Topic) -> Receiver<Event> {
        self.importer.event_channels().receiver_for(topic)
    }
}

pub fn drain(receiver: &mut Receiver<Event>) -> Vec<Event> {
    core::iter::from_fn(|| receiver.try_recv().ok()).collect()
}
