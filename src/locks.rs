use std::hash::Hash;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, RwLock};

use crate::model::{PoolKey, SlotKey};

/// Lazily created per-key locks. Entries are never evicted: keys are bounded
/// by active schedules × slots and pools, not by request volume.
pub struct LockRegistry<K, L> {
    locks: DashMap<K, Arc<L>>,
}

pub type SlotLocks = LockRegistry<SlotKey, RwLock<()>>;
pub type PoolLocks = LockRegistry<PoolKey, Mutex<()>>;

impl<K, L> Default for LockRegistry<K, L>
where
    K: Eq + Hash + Clone,
    L: Default,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, L> LockRegistry<K, L>
where
    K: Eq + Hash + Clone,
    L: Default,
{
    pub fn new() -> Self {
        Self {
            locks: DashMap::new(),
        }
    }

    /// Return the lock for `key`, creating it if needed. Racing creators of a
    /// new key converge on one instance via the shard-locked entry API.
    pub fn get_or_create(&self, key: &K) -> Arc<L> {
        if let Some(lock) = self.locks.get(key) {
            return lock.value().clone();
        }
        self.locks.entry(key.clone()).or_default().value().clone()
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}
