mod admission;
mod arrangement;
mod error;
mod queries;
mod slots;
mod window;

pub use error::EngineError;
pub use window::validate_window;

use std::io;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{OwnedMutexGuard, OwnedRwLockReadGuard, OwnedRwLockWriteGuard};

use crate::arrange::TacticTable;
use crate::config::{EngineConfig, ExclusiveSets};
use crate::locks::{PoolLocks, SlotLocks};
use crate::model::*;
use crate::notify::NotifyHub;
use crate::observability;
use crate::reaper;
use crate::store::{InMemoryStore, Store};

pub(crate) fn now_ms() -> Ms {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as Ms)
        .unwrap_or(0)
}

/// The allocator core: slot reservations, pool admission and arrangement,
/// all on top of a `Store` and two lock registries owned by this instance.
pub struct Engine {
    store: Arc<dyn Store>,
    slot_locks: Arc<SlotLocks>,
    pool_locks: Arc<PoolLocks>,
    pub notify: Arc<NotifyHub>,
    exclusive: ExclusiveSets,
    tactics: TacticTable,
}

impl Engine {
    pub fn new(store: Arc<dyn Store>, config: &EngineConfig) -> Self {
        Self::with_locks(
            store,
            config,
            Arc::new(SlotLocks::new()),
            Arc::new(PoolLocks::new()),
        )
    }

    /// Share lock registries between engines over the same store.
    pub fn with_locks(
        store: Arc<dyn Store>,
        config: &EngineConfig,
        slot_locks: Arc<SlotLocks>,
        pool_locks: Arc<PoolLocks>,
    ) -> Self {
        Self {
            store,
            slot_locks,
            pool_locks,
            notify: Arc::new(NotifyHub::new()),
            exclusive: ExclusiveSets::new(&config.exclusive_wars),
            tactics: TacticTable::builtin(),
        }
    }

    /// Build an engine over the reference store, WAL-backed and compacted in
    /// the background when `config.wal_path` is set. Needs a tokio runtime.
    pub fn open(config: &EngineConfig) -> io::Result<(Self, Arc<InMemoryStore>)> {
        let store = match &config.wal_path {
            Some(path) => {
                let store = Arc::new(InMemoryStore::open(path)?);
                tokio::spawn(reaper::run_compactor(store.clone(), config.compact_threshold));
                store
            }
            None => Arc::new(InMemoryStore::new()),
        };
        let engine = Self::new(store.clone(), config);
        Ok((engine, store))
    }

    pub fn with_tactics(mut self, tactics: TacticTable) -> Self {
        self.tactics = tactics;
        self
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    pub fn slot_locks(&self) -> &SlotLocks {
        &self.slot_locks
    }

    pub fn pool_locks(&self) -> &PoolLocks {
        &self.pool_locks
    }

    // ── Lock helpers ─────────────────────────────────────────

    pub(super) async fn read_slot(&self, key: &SlotKey) -> OwnedRwLockReadGuard<()> {
        let lock = self.slot_locks.get_or_create(key);
        metrics::gauge!(observability::LOCK_KEYS, "registry" => "slot").set(self.slot_locks.len() as f64);
        let start = Instant::now();
        let guard = lock.read_owned().await;
        record_lock_wait("slot", start);
        guard
    }

    pub(super) async fn write_slot(&self, key: &SlotKey) -> OwnedRwLockWriteGuard<()> {
        let lock = self.slot_locks.get_or_create(key);
        let start = Instant::now();
        let guard = lock.write_owned().await;
        record_lock_wait("slot", start);
        guard
    }

    pub(super) async fn lock_pool(&self, pool: &PoolKey) -> OwnedMutexGuard<()> {
        let lock = self.pool_locks.get_or_create(pool);
        metrics::gauge!(observability::LOCK_KEYS, "registry" => "pool").set(self.pool_locks.len() as f64);
        let start = Instant::now();
        let guard = lock.lock_owned().await;
        record_lock_wait("pool", start);
        guard
    }

    // ── Authorization ────────────────────────────────────────

    pub(super) async fn require_schedule_owner(
        &self,
        schedule_id: ScheduleId,
        caller: ActorId,
    ) -> Result<ActorId, EngineError> {
        let owner = self
            .store
            .schedule_owner(schedule_id)
            .await?
            .ok_or(EngineError::ScheduleNotFound(schedule_id))?;
        if owner != caller {
            return Err(EngineError::NotAuthorized(caller));
        }
        Ok(owner)
    }

    pub(super) async fn group_owner(&self, group_id: GroupId) -> Result<ActorId, EngineError> {
        self.store
            .group_owner(group_id)
            .await?
            .ok_or(EngineError::GroupNotFound(group_id))
    }

    pub(super) async fn require_group_owner(
        &self,
        group_id: GroupId,
        caller: ActorId,
    ) -> Result<(), EngineError> {
        if self.group_owner(group_id).await? != caller {
            return Err(EngineError::NotAuthorized(caller));
        }
        Ok(())
    }
}

fn record_lock_wait(lock: &'static str, start: Instant) {
    metrics::histogram!(observability::LOCK_WAIT_SECONDS, "lock" => lock)
        .record(start.elapsed().as_secs_f64());
}
