pub use checkpoint_state_cache::CheckpointStateCache;
pub use state_cache::StateCache;

mod checkpoint_state_cache;
mod state_cache;
