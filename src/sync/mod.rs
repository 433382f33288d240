//! Client-side copy of server data and the optimistic move protocol on top
//! of it.

pub mod cache;
pub mod optimistic;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

pub use cache::{CacheKey, CachedValue, QueryCache};
pub use optimistic::{
    MoveCoordinator, MoveDispatcher, MoveOutcome, MoveSnapshot, Restore, SettledMove,
};

pub type SharedCache = Arc<Mutex<QueryCache>>;

pub fn shared_cache() -> SharedCache {
    Arc::new(Mutex::new(QueryCache::new()))
}

/// Cache writes are single assignments, so a poisoned lock still guards
/// consistent data.
pub(crate) fn lock(cache: &SharedCache) -> MutexGuard<'_, QueryCache> {
    cache.lock().unwrap_or_else(PoisonError::into_inner)
}
