use core::time::Duration;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use helper_functions::context::StateContext;
use im::{HashMap, OrdMap};
use log::{debug, warn};
use parking_lot::{Mutex, MutexGuard};
use thiserror::Error;
use types::phase0::primitives::{Slot, H256};

type StateMap = OrdMap<Slot, StateContext>;
type StateMapLock = Arc<Mutex<StateMap>>;

#[derive(Debug, Error)]
enum CacheLockError {
    #[error("could not obtain state cache lock in {} ms", timeout.as_millis())]
    CacheLockTimeout { timeout: Duration },
    #[error("could not obtain state cache lock in {} ms with block root {block_root:?}", timeout.as_millis())]
    StateMapLockTimeout { block_root: H256, timeout: Duration },
}

/// States keyed by the root of the latest block applied to them.
///
/// A block root may map to several states: its post-state and copies of it advanced through
/// empty slots.
pub struct StateCache {
    cache: Mutex<HashMap<H256, StateMapLock>>,
    try_lock_timeout: Duration,
}

impl StateCache {
    #[must_use]
    pub fn new(try_lock_timeout: Duration) -> Self {
        Self {
            cache: Mutex::new(HashMap::new()),
            try_lock_timeout,
        }
    }

    /// The latest state for `block_root` that is not past `slot`.
    pub fn before_or_at_slot(&self, block_root: H256, slot: Slot) -> Result<Option<StateContext>> {
        let Some(state_map_lock) = self.get_by_root(block_root)? else {
            return Ok(None);
        };

        let state = self
            .try_lock_map(&state_map_lock, block_root)?
            .get_prev(&slot)
            .map(|(_, state)| state.clone());

        Ok(state)
    }

    /// Returns the cached state for `block_root` at `slot` or computes and caches it with `f`.
    ///
    /// `f` receives the latest cached state before `slot`, if any.
    pub fn get_or_insert_with(
        &self,
        block_root: H256,
        slot: Slot,
        f: impl FnOnce(Option<&StateContext>) -> Result<StateContext>,
    ) -> Result<StateContext> {
        let state_map_lock = match self.get_or_init_by_root(block_root) {
            Ok(lock) => lock,
            Err(error) => {
                if error.is::<CacheLockError>() {
                    return f(None);
                }

                return Err(error);
            }
        };

        let mut state_map_guard = match self.try_lock_map(&state_map_lock, block_root) {
            Ok(guard) => guard,
            Err(error) => {
                if error.is::<CacheLockError>() {
                    return f(None);
                }

                return Err(error);
            }
        };

        let pre_state = state_map_guard.get_prev(&slot).map(|(_, state)| state);

        if let Some(state) = pre_state {
            if state.slot() == slot {
                return Ok(state.clone());
            }
        }

        let post_state = f(pre_state)?;

        state_map_guard.insert(post_state.slot(), post_state.clone());

        Ok(post_state)
    }

    pub fn insert(&self, block_root: H256, state: StateContext) -> Result<()> {
        let state_map_lock = self.get_or_init_by_root(block_root)?;

        self.try_lock_map(&state_map_lock, block_root)?
            .insert(state.slot(), state);

        Ok(())
    }

    pub fn contains_block(&self, block_root: H256) -> Result<bool> {
        Ok(self.try_lock_cache()?.contains_key(&block_root))
    }

    pub fn len(&self) -> Result<usize> {
        let mut length = 0;

        for (block_root, state_map_lock) in self.all_state_map_locks()? {
            length += self.try_lock_map(&state_map_lock, block_root)?.len();
        }

        Ok(length)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Removes all states at or before `last_pruned_slot`.
    pub fn prune(&self, last_pruned_slot: Slot) -> Result<()> {
        for (block_root, state_map_lock) in self.all_state_map_locks()? {
            let mut state_map = self.try_lock_map(&state_map_lock, block_root)?;
            let (_, retained) = state_map.split(&last_pruned_slot);
            *state_map = retained;
        }

        self.try_lock_cache()?.retain(|block_root, state_map_lock| {
            self.try_lock_map(state_map_lock, *block_root)
                .ok()
                .is_some_and(|state_map| !state_map.is_empty())
        });

        debug!("pruned state cache up to slot {last_pruned_slot}");

        Ok(())
    }

    fn all_state_map_locks(&self) -> Result<Vec<(H256, StateMapLock)>> {
        let locks = self
            .try_lock_cache()?
            .iter()
            .map(|(block_root, state_map_lock)| (*block_root, Arc::clone(state_map_lock)))
            .collect();

        Ok(locks)
    }

    fn get_or_init_by_root(&self, block_root: H256) -> Result<StateMapLock> {
        let state_map_lock = self
            .try_lock_cache()?
            .entry(block_root)
            .or_insert_with(StateMapLock::default)
            .clone();

        Ok(state_map_lock)
    }

    fn get_by_root(&self, block_root: H256) -> Result<Option<StateMapLock>> {
        Ok(self.try_lock_cache()?.get(&block_root).cloned())
    }

    fn try_lock_cache(&self) -> Result<MutexGuard<'_, HashMap<H256, StateMapLock>>> {
        let timeout = self.try_lock_timeout;

        self.cache.try_lock_for(timeout).ok_or_else(|| {
            let error = CacheLockError::CacheLockTimeout { timeout };

            warn!("{error:?}");

            anyhow!(error)
        })
    }

    fn try_lock_map<'map>(
        &self,
        state_map_lock: &'map StateMapLock,
        block_root: H256,
    ) -> Result<MutexGuard<'map, StateMap>> {
        let timeout = self.try_lock_timeout;

        state_map_lock.try_lock_for(timeout).ok_or_else(|| {
            let error = CacheLockError::StateMapLockTimeout {
                block_root,
                timeout,
            };

            warn!("{error:?}");

            anyhow!(error)
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::test_utils::context_at_slot;

    use super::*;

    const ROOT_1: H256 = H256::repeat_byte(1);
    const ROOT_2: H256 = H256::repeat_byte(2);
    const ROOT_3: H256 = H256::repeat_byte(3);

    fn slot_of(state: Option<StateContext>) -> Option<Slot> {
        state.as_ref().map(StateContext::slot)
    }

    #[test]
    fn test_state_cache_len() -> Result<()> {
        let cache = new_test_cache()?;

        assert_eq!(cache.len()?, 4);
        assert!(cache.contains_block(ROOT_1)?);
        assert!(!cache.contains_block(ROOT_3)?);

        Ok(())
    }

    #[test]
    fn test_state_cache_before_or_at_slot() -> Result<()> {
        let cache = new_test_cache()?;

        assert_eq!(slot_of(cache.before_or_at_slot(ROOT_2, 1)?), None);
        assert_eq!(slot_of(cache.before_or_at_slot(ROOT_2, 3)?), Some(3));
        assert_eq!(slot_of(cache.before_or_at_slot(ROOT_2, 4)?), Some(3));
        assert_eq!(slot_of(cache.before_or_at_slot(ROOT_2, 9)?), Some(5));
        assert_eq!(slot_of(cache.before_or_at_slot(ROOT_3, 9)?), None);

        Ok(())
    }

    #[test]
    fn test_state_cache_get_or_insert_with() -> Result<()> {
        let cache = new_test_cache()?;

        let cached = cache.get_or_insert_with(ROOT_2, 3, |_| panic!("state should be cached"))?;

        assert_eq!(cached.slot(), 3);

        let computed = cache.get_or_insert_with(ROOT_1, 4, |pre_state| {
            assert_eq!(pre_state.map(StateContext::slot), Some(1));
            context_at_slot(4)
        })?;

        assert_eq!(computed.slot(), 4);
        assert_eq!(slot_of(cache.before_or_at_slot(ROOT_1, 9)?), Some(4));
        assert_eq!(cache.len()?, 5);

        Ok(())
    }

    #[test]
    fn test_state_cache_prune() -> Result<()> {
        let cache = new_test_cache()?;

        cache.prune(2)?;

        assert_eq!(slot_of(cache.before_or_at_slot(ROOT_1, 1)?), None);
        assert_eq!(slot_of(cache.before_or_at_slot(ROOT_2, 2)?), None);
        assert_eq!(slot_of(cache.before_or_at_slot(ROOT_2, 3)?), Some(3));
        assert_eq!(slot_of(cache.before_or_at_slot(ROOT_2, 5)?), Some(5));
        assert!(!cache.contains_block(ROOT_1)?);
        assert_eq!(cache.len()?, 2);

        Ok(())
    }

    fn new_test_cache() -> Result<StateCache> {
        let cache = StateCache::new(Duration::from_secs(1));

        cache.insert(ROOT_1, context_at_slot(1)?)?;
        cache.insert(ROOT_2, context_at_slot(2)?)?;
        cache.insert(ROOT_2, context_at_slot(3)?)?;
        cache.insert(ROOT_2, context_at_slot(5)?)?;

        Ok(cache)
    }
}
