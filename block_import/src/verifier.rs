use anyhow::Result;
use async_trait::async_trait;
use futures::channel::oneshot;
use helper_functions::signature_sets::{self, SignatureSet};
use log::{debug, warn};
use rayon::{ThreadPool, ThreadPoolBuilder};

#[async_trait]
pub trait SignatureVerifier: Send + Sync {
    /// Returns `true` if every set in the batch is valid.
    async fn verify_batch(&self, signature_sets: Vec<SignatureSet>) -> bool;
}

/// Verifies signature batches on a dedicated thread pool.
pub struct BlsVerifier {
    thread_pool: ThreadPool,
}

impl BlsVerifier {
    pub fn new() -> Result<Self> {
        let thread_pool = ThreadPoolBuilder::new()
            .thread_name(|index| format!("bls-{index}"))
            .build()?;

        Ok(Self { thread_pool })
    }
}

#[async_trait]
impl SignatureVerifier for BlsVerifier {
    async fn verify_batch(&self, signature_sets: Vec<SignatureSet>) -> bool {
        let (sender, receiver) = oneshot::channel();
        let set_count = signature_sets.len();

        self.thread_pool.spawn(move || {
            let valid = signature_sets::verify_signature_sets(&signature_sets);

            if sender.send(valid).is_err() {
                debug!("signature batch result dropped because the receiver is gone");
            }
        });

        match receiver.await {
            Ok(valid) => valid,
            Err(error) => {
                warn!("signature batch of {set_count} sets was not verified: {error}");
                false
            }
        }
    }
}
