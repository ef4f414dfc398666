//! Storage collaborator. The engine treats the store as the source of truth
//! and re-reads it inside every critical section.

mod memory;

pub use memory::InMemoryStore;

use async_trait::async_trait;
use ulid::Ulid;

use crate::arrange::{ArrangementTemplate, SortKey};
use crate::model::*;

#[derive(Debug)]
pub enum StoreError {
    /// Uniqueness backstop on `(schedule, office, day, slot)`.
    SlotOccupied { slot: u8, holder: ActorId },
    /// Uniqueness backstop on `(schedule, office, day, actor)`.
    ActorAlreadyBound { slot: u8 },
    NotFound(Ulid),
    Corrupt(String),
    Wal(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::SlotOccupied { slot, holder } => {
                write!(f, "slot {slot} already bound to {holder}")
            }
            StoreError::ActorAlreadyBound { slot } => {
                write!(f, "actor already bound to slot {slot}")
            }
            StoreError::NotFound(id) => write!(f, "not found: {id}"),
            StoreError::Corrupt(msg) => write!(f, "corrupt record: {msg}"),
            StoreError::Wal(msg) => write!(f, "WAL error: {msg}"),
        }
    }
}

impl std::error::Error for StoreError {}

#[async_trait]
pub trait Store: Send + Sync {
    // ── Directory ────────────────────────────────────────────

    async fn schedule_owner(&self, schedule_id: ScheduleId) -> Result<Option<ActorId>, StoreError>;
    async fn is_member(&self, schedule_id: ScheduleId, actor_id: ActorId) -> Result<bool, StoreError>;
    async fn group_owner(&self, group_id: GroupId) -> Result<Option<ActorId>, StoreError>;

    // ── Windows ──────────────────────────────────────────────

    async fn load_window(
        &self,
        schedule_id: ScheduleId,
        office: OfficeType,
    ) -> Result<Option<AvailabilityWindow>, StoreError>;
    async fn save_window(
        &self,
        schedule_id: ScheduleId,
        office: OfficeType,
        window: &AvailabilityWindow,
    ) -> Result<(), StoreError>;

    // ── Slot bindings ────────────────────────────────────────

    async fn load_binding(&self, key: &SlotKey) -> Result<Option<ActorId>, StoreError>;
    async fn find_binding(&self, day: &DayKey, actor_id: ActorId) -> Result<Option<SlotBinding>, StoreError>;
    async fn list_bindings(&self, day: &DayKey) -> Result<Vec<SlotBinding>, StoreError>;
    /// Conditional insert: fails if the slot is bound or the actor already
    /// holds a slot on the same office and day.
    async fn save_binding(&self, binding: &SlotBinding) -> Result<(), StoreError>;
    async fn delete_binding(&self, key: &SlotKey) -> Result<Option<SlotBinding>, StoreError>;

    // ── Pools and claims ─────────────────────────────────────

    async fn pool_limits(&self, group_id: GroupId, war_kind: WarKind) -> Result<Option<PoolLimits>, StoreError>;
    async fn save_pool_limits(
        &self,
        group_id: GroupId,
        war_kind: WarKind,
        limits: PoolLimits,
    ) -> Result<(), StoreError>;
    async fn count_arranged(&self, pool: &PoolKey) -> Result<u32, StoreError>;
    async fn count_pending(&self, pool: &PoolKey) -> Result<u32, StoreError>;

    async fn load_claim(&self, id: ClaimId) -> Result<Option<Claim>, StoreError>;
    async fn claims_for_actor(&self, group_id: GroupId, actor_id: ActorId) -> Result<Vec<Claim>, StoreError>;
    /// Insert or overwrite a claim in one write. Its allocation follows the
    /// status: an approved claim holds one in its current pool, any other
    /// status holds none.
    async fn save_claim(&self, claim: &Claim) -> Result<(), StoreError>;
    /// Change status in one write; the allocation follows as in `save_claim`.
    async fn update_claim_status(&self, id: ClaimId, status: ClaimStatus) -> Result<(), StoreError>;
    /// Remove a claim together with its allocation.
    async fn delete_claim(&self, id: ClaimId) -> Result<Option<Claim>, StoreError>;

    // ── Arrangement inputs ───────────────────────────────────

    /// Actors allocated to `pool`, sorted by `key`.
    async fn load_sorted_actors(&self, pool: &PoolKey, key: SortKey) -> Result<Vec<ActorProfile>, StoreError>;
    async fn load_template(&self, name: &str) -> Result<Option<ArrangementTemplate>, StoreError>;
}
