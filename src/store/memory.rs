use std::collections::{BTreeMap, HashSet};
use std::io;
use std::path::Path;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::{mpsc, oneshot, RwLock};

use crate::arrange::{sort_actors, ArrangementTemplate, SortKey};
use crate::model::*;
use crate::observability;
use crate::wal::Wal;

use super::{Store, StoreError};

// ── Group-commit WAL channel ─────────────────────────────

enum WalCommand {
    Append {
        event: Event,
        response: oneshot::Sender<io::Result<()>>,
    },
    Compact {
        events: Vec<Event>,
        response: oneshot::Sender<io::Result<()>>,
    },
    AppendsSinceCompact {
        response: oneshot::Sender<u64>,
    },
}

/// Background task that owns the WAL and batches appends for group commit:
/// block for the first append, drain whatever else is queued, then fsync once
/// for the whole batch and answer every sender.
async fn wal_writer_loop(mut wal: Wal, mut rx: mpsc::Receiver<WalCommand>) {
    while let Some(cmd) = rx.recv().await {
        match cmd {
            WalCommand::Append { event, response } => {
                let mut batch = vec![(event, response)];
                let mut deferred = None;
                loop {
                    match rx.try_recv() {
                        Ok(WalCommand::Append { event, response }) => batch.push((event, response)),
                        Ok(other) => {
                            deferred = Some(other);
                            break;
                        }
                        Err(_) => break,
                    }
                }
                flush_and_respond(&mut wal, &mut batch);
                if let Some(other) = deferred {
                    handle_non_append(&mut wal, other);
                }
            }
            other => handle_non_append(&mut wal, other),
        }
    }
}

fn flush_and_respond(wal: &mut Wal, batch: &mut Vec<(Event, oneshot::Sender<io::Result<()>>)>) {
    metrics::histogram!(observability::WAL_FLUSH_BATCH_SIZE).record(batch.len() as f64);
    let flush_start = std::time::Instant::now();

    let mut append_err: Option<io::Error> = None;
    for (event, _) in batch.iter() {
        if let Err(e) = wal.append_buffered(event) {
            append_err = Some(e);
            break;
        }
    }
    // Flush even after an append error so partial bytes don't leak into the
    // next batch.
    let flush_err = wal.flush_sync().err();
    metrics::histogram!(observability::WAL_FLUSH_DURATION_SECONDS)
        .record(flush_start.elapsed().as_secs_f64());

    let result = append_err.or(flush_err);
    if let Some(e) = &result {
        tracing::warn!("WAL flush failed for {} events: {e}", batch.len());
    }
    for (_, tx) in batch.drain(..) {
        let r = match &result {
            None => Ok(()),
            Some(e) => Err(io::Error::new(e.kind(), e.to_string())),
        };
        let _ = tx.send(r);
    }
}

fn handle_non_append(wal: &mut Wal, cmd: WalCommand) {
    match cmd {
        WalCommand::Compact { events, response } => {
            let result = Wal::write_compact_file(wal.path(), &events)
                .and_then(|()| wal.swap_compact_file());
            let _ = response.send(result);
        }
        WalCommand::AppendsSinceCompact { response } => {
            let _ = response.send(wal.appends_since_compact());
        }
        WalCommand::Append { .. } => unreachable!(),
    }
}

struct ScheduleEntry {
    owner: ActorId,
    members: HashSet<ActorId>,
}

/// Reference `Store`: DashMap tables, optionally made durable by a WAL.
pub struct InMemoryStore {
    schedules: DashMap<ScheduleId, ScheduleEntry>,
    groups: DashMap<GroupId, ActorId>,
    profiles: DashMap<ActorId, ActorProfile>,
    windows: DashMap<(ScheduleId, OfficeType), AvailabilityWindow>,
    bindings: DashMap<DayKey, BTreeMap<u8, SlotBinding>>,
    limits: DashMap<(GroupId, WarKind), PoolLimits>,
    claims: DashMap<ClaimId, Claim>,
    allocations: DashMap<ClaimId, Allocation>,
    /// Templates by name, kept as their JSON documents.
    templates: DashMap<String, String>,
    wal_tx: Option<mpsc::Sender<WalCommand>>,
    /// Writes hold it shared from WAL append through apply; compaction holds
    /// it exclusively so the snapshot and the log swap see no write in flight.
    commit_gate: RwLock<()>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    /// Volatile store; nothing survives the process.
    pub fn new() -> Self {
        Self {
            schedules: DashMap::new(),
            groups: DashMap::new(),
            profiles: DashMap::new(),
            windows: DashMap::new(),
            bindings: DashMap::new(),
            limits: DashMap::new(),
            claims: DashMap::new(),
            allocations: DashMap::new(),
            templates: DashMap::new(),
            wal_tx: None,
            commit_gate: RwLock::new(()),
        }
    }

    /// Replay the WAL at `path` and keep appending to it. Must run inside a
    /// tokio runtime: the group-commit writer is spawned here.
    pub fn open(path: &Path) -> io::Result<Self> {
        let events = Wal::replay(path)?;
        let wal = Wal::open(path)?;
        let (wal_tx, wal_rx) = mpsc::channel(4096);
        tokio::spawn(wal_writer_loop(wal, wal_rx));

        let mut store = Self::new();
        for event in &events {
            store.apply(event);
        }
        store.wal_tx = Some(wal_tx);
        tracing::info!("replayed {} events from {}", events.len(), path.display());
        Ok(store)
    }

    pub fn is_durable(&self) -> bool {
        self.wal_tx.is_some()
    }

    // ── Seeding (directory data owned by the outer application) ──

    pub async fn register_schedule(&self, id: ScheduleId, owner: ActorId) -> Result<(), StoreError> {
        self.commit(Event::ScheduleRegistered { id, owner }).await
    }

    pub async fn add_member(&self, schedule_id: ScheduleId, actor_id: ActorId) -> Result<(), StoreError> {
        if !self.schedules.contains_key(&schedule_id) {
            return Err(StoreError::NotFound(schedule_id));
        }
        self.commit(Event::MemberAdded { schedule_id, actor_id }).await
    }

    pub async fn register_group(&self, id: GroupId, owner: ActorId) -> Result<(), StoreError> {
        self.commit(Event::GroupRegistered { id, owner }).await
    }

    pub async fn save_profile(&self, profile: ActorProfile) -> Result<(), StoreError> {
        self.commit(Event::ProfileSaved(profile)).await
    }

    pub async fn save_template(&self, template: &ArrangementTemplate) -> Result<(), StoreError> {
        let json = template
            .to_json()
            .map_err(|e| StoreError::Corrupt(e.to_string()))?;
        self.commit(Event::TemplateSaved {
            name: template.name.clone(),
            json,
        })
        .await
    }

    // ── Persistence ──────────────────────────────────────────

    async fn persist(&self, event: &Event) -> Result<(), StoreError> {
        let Some(tx) = &self.wal_tx else {
            return Ok(());
        };
        let (resp_tx, resp_rx) = oneshot::channel();
        tx.send(WalCommand::Append {
            event: event.clone(),
            response: resp_tx,
        })
        .await
        .map_err(|_| StoreError::Wal("WAL writer shut down".into()))?;
        resp_rx
            .await
            .map_err(|_| StoreError::Wal("WAL writer dropped response".into()))?
            .map_err(|e| StoreError::Wal(e.to_string()))
    }

    /// WAL-append then apply.
    async fn commit(&self, event: Event) -> Result<(), StoreError> {
        let _gate = self.commit_gate.read().await;
        self.persist(&event).await?;
        self.apply(&event);
        Ok(())
    }

    /// Apply an event to the tables. Shared by live writes and replay.
    fn apply(&self, event: &Event) {
        match event {
            Event::ScheduleRegistered { id, owner } => {
                self.schedules
                    .entry(*id)
                    .and_modify(|s| s.owner = *owner)
                    .or_insert_with(|| ScheduleEntry {
                        owner: *owner,
                        members: HashSet::new(),
                    });
            }
            Event::MemberAdded { schedule_id, actor_id } => {
                if let Some(mut s) = self.schedules.get_mut(schedule_id) {
                    s.members.insert(*actor_id);
                }
            }
            Event::GroupRegistered { id, owner } => {
                self.groups.insert(*id, *owner);
            }
            Event::ProfileSaved(profile) => {
                self.profiles.insert(profile.id, profile.clone());
            }
            Event::WindowConfigured { schedule_id, office, window } => {
                self.windows.insert((*schedule_id, *office), window.clone());
            }
            Event::BindingCreated(binding) => {
                self.bindings
                    .entry(binding.key.day())
                    .or_default()
                    .insert(binding.key.slot, binding.clone());
            }
            Event::BindingDeleted { key } => {
                self.unbind(key);
            }
            Event::PoolLimitsSet { group_id, war_kind, limits } => {
                self.limits.insert((*group_id, *war_kind), *limits);
            }
            Event::ClaimSaved(claim) => {
                self.seat(claim);
                self.claims.insert(claim.id, claim.clone());
            }
            Event::ClaimStatusChanged { id, status } => {
                if let Some(mut claim) = self.claims.get_mut(id) {
                    claim.status = *status;
                    self.seat(&claim);
                }
            }
            Event::ClaimDeleted { id } => {
                self.claims.remove(id);
                self.allocations.remove(id);
            }
            Event::TemplateSaved { name, json } => {
                self.templates.insert(name.clone(), json.clone());
            }
        }
    }

    /// An approved claim holds exactly one allocation, in its current pool.
    fn seat(&self, claim: &Claim) {
        if claim.status == ClaimStatus::Approved {
            self.allocations.insert(
                claim.id,
                Allocation {
                    claim_id: claim.id,
                    pool: claim.pool,
                    actor_id: claim.actor_id,
                },
            );
        } else {
            self.allocations.remove(&claim.id);
        }
    }

    /// Check both uniqueness constraints and insert under one shard lock.
    fn try_bind(&self, binding: &SlotBinding) -> Result<(), StoreError> {
        let mut day = self.bindings.entry(binding.key.day()).or_default();
        if let Some(existing) = day.get(&binding.key.slot) {
            return Err(StoreError::SlotOccupied {
                slot: binding.key.slot,
                holder: existing.actor_id,
            });
        }
        if let Some(held) = day.values().find(|b| b.actor_id == binding.actor_id) {
            return Err(StoreError::ActorAlreadyBound { slot: held.key.slot });
        }
        day.insert(binding.key.slot, binding.clone());
        Ok(())
    }

    fn unbind(&self, key: &SlotKey) -> Option<SlotBinding> {
        let mut day = self.bindings.get_mut(&key.day())?;
        day.remove(&key.slot)
    }

    // ── Compaction ───────────────────────────────────────────

    /// The minimal event list that rebuilds the current tables.
    pub fn snapshot_events(&self) -> Vec<Event> {
        let mut events = Vec::new();
        for entry in self.schedules.iter() {
            events.push(Event::ScheduleRegistered {
                id: *entry.key(),
                owner: entry.owner,
            });
            for actor_id in &entry.members {
                events.push(Event::MemberAdded {
                    schedule_id: *entry.key(),
                    actor_id: *actor_id,
                });
            }
        }
        for entry in self.groups.iter() {
            events.push(Event::GroupRegistered {
                id: *entry.key(),
                owner: *entry.value(),
            });
        }
        for entry in self.profiles.iter() {
            events.push(Event::ProfileSaved(entry.value().clone()));
        }
        for entry in self.templates.iter() {
            events.push(Event::TemplateSaved {
                name: entry.key().clone(),
                json: entry.value().clone(),
            });
        }
        for entry in self.windows.iter() {
            let (schedule_id, office) = *entry.key();
            events.push(Event::WindowConfigured {
                schedule_id,
                office,
                window: entry.value().clone(),
            });
        }
        for entry in self.limits.iter() {
            let (group_id, war_kind) = *entry.key();
            events.push(Event::PoolLimitsSet {
                group_id,
                war_kind,
                limits: *entry.value(),
            });
        }
        for entry in self.bindings.iter() {
            for binding in entry.value().values() {
                events.push(Event::BindingCreated(binding.clone()));
            }
        }
        for entry in self.claims.iter() {
            events.push(Event::ClaimSaved(entry.value().clone()));
        }
        events
    }

    /// Rewrite the WAL from a snapshot. No-op for a volatile store.
    pub async fn compact_wal(&self) -> Result<(), StoreError> {
        let Some(tx) = &self.wal_tx else {
            return Ok(());
        };
        let _gate = self.commit_gate.write().await;
        let events = self.snapshot_events();
        let (resp_tx, resp_rx) = oneshot::channel();
        tx.send(WalCommand::Compact {
            events,
            response: resp_tx,
        })
        .await
        .map_err(|_| StoreError::Wal("WAL writer shut down".into()))?;
        resp_rx
            .await
            .map_err(|_| StoreError::Wal("WAL writer dropped response".into()))?
            .map_err(|e| StoreError::Wal(e.to_string()))
    }

    pub async fn wal_appends_since_compact(&self) -> u64 {
        let Some(tx) = &self.wal_tx else {
            return 0;
        };
        let (resp_tx, resp_rx) = oneshot::channel();
        if tx
            .send(WalCommand::AppendsSinceCompact { response: resp_tx })
            .await
            .is_err()
        {
            return 0;
        }
        resp_rx.await.unwrap_or(0)
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn schedule_owner(&self, schedule_id: ScheduleId) -> Result<Option<ActorId>, StoreError> {
        Ok(self.schedules.get(&schedule_id).map(|s| s.owner))
    }

    async fn is_member(&self, schedule_id: ScheduleId, actor_id: ActorId) -> Result<bool, StoreError> {
        Ok(self
            .schedules
            .get(&schedule_id)
            .is_some_and(|s| s.members.contains(&actor_id)))
    }

    async fn group_owner(&self, group_id: GroupId) -> Result<Option<ActorId>, StoreError> {
        Ok(self.groups.get(&group_id).map(|g| *g.value()))
    }

    async fn load_window(
        &self,
        schedule_id: ScheduleId,
        office: OfficeType,
    ) -> Result<Option<AvailabilityWindow>, StoreError> {
        Ok(self.windows.get(&(schedule_id, office)).map(|w| w.value().clone()))
    }

    async fn save_window(
        &self,
        schedule_id: ScheduleId,
        office: OfficeType,
        window: &AvailabilityWindow,
    ) -> Result<(), StoreError> {
        self.commit(Event::WindowConfigured {
            schedule_id,
            office,
            window: window.clone(),
        })
        .await
    }

    async fn load_binding(&self, key: &SlotKey) -> Result<Option<ActorId>, StoreError> {
        Ok(self
            .bindings
            .get(&key.day())
            .and_then(|day| day.get(&key.slot).map(|b| b.actor_id)))
    }

    async fn find_binding(&self, day: &DayKey, actor_id: ActorId) -> Result<Option<SlotBinding>, StoreError> {
        Ok(self
            .bindings
            .get(day)
            .and_then(|d| d.values().find(|b| b.actor_id == actor_id).cloned()))
    }

    async fn list_bindings(&self, day: &DayKey) -> Result<Vec<SlotBinding>, StoreError> {
        Ok(self
            .bindings
            .get(day)
            .map(|d| d.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn save_binding(&self, binding: &SlotBinding) -> Result<(), StoreError> {
        let _gate = self.commit_gate.read().await;
        self.try_bind(binding)?;
        if let Err(e) = self.persist(&Event::BindingCreated(binding.clone())).await {
            self.unbind(&binding.key);
            return Err(e);
        }
        Ok(())
    }

    async fn delete_binding(&self, key: &SlotKey) -> Result<Option<SlotBinding>, StoreError> {
        let _gate = self.commit_gate.read().await;
        if self.load_binding(key).await?.is_none() {
            return Ok(None);
        }
        self.persist(&Event::BindingDeleted { key: *key }).await?;
        Ok(self.unbind(key))
    }

    async fn pool_limits(&self, group_id: GroupId, war_kind: WarKind) -> Result<Option<PoolLimits>, StoreError> {
        Ok(self.limits.get(&(group_id, war_kind)).map(|l| *l.value()))
    }

    async fn save_pool_limits(
        &self,
        group_id: GroupId,
        war_kind: WarKind,
        limits: PoolLimits,
    ) -> Result<(), StoreError> {
        self.commit(Event::PoolLimitsSet { group_id, war_kind, limits }).await
    }

    async fn count_arranged(&self, pool: &PoolKey) -> Result<u32, StoreError> {
        Ok(self.allocations.iter().filter(|a| a.pool == *pool).count() as u32)
    }

    async fn count_pending(&self, pool: &PoolKey) -> Result<u32, StoreError> {
        Ok(self
            .claims
            .iter()
            .filter(|c| c.pool == *pool && c.status == ClaimStatus::Pending)
            .count() as u32)
    }

    async fn load_claim(&self, id: ClaimId) -> Result<Option<Claim>, StoreError> {
        Ok(self.claims.get(&id).map(|c| c.value().clone()))
    }

    async fn claims_for_actor(&self, group_id: GroupId, actor_id: ActorId) -> Result<Vec<Claim>, StoreError> {
        let mut claims: Vec<Claim> = self
            .claims
            .iter()
            .filter(|c| c.actor_id == actor_id && c.pool.group_id == group_id)
            .map(|c| c.value().clone())
            .collect();
        claims.sort_by_key(|c| c.id);
        Ok(claims)
    }

    async fn save_claim(&self, claim: &Claim) -> Result<(), StoreError> {
        self.commit(Event::ClaimSaved(claim.clone())).await
    }

    async fn update_claim_status(&self, id: ClaimId, status: ClaimStatus) -> Result<(), StoreError> {
        if !self.claims.contains_key(&id) {
            return Err(StoreError::NotFound(id));
        }
        self.commit(Event::ClaimStatusChanged { id, status }).await
    }

    async fn delete_claim(&self, id: ClaimId) -> Result<Option<Claim>, StoreError> {
        let Some(claim) = self.load_claim(id).await? else {
            return Ok(None);
        };
        self.commit(Event::ClaimDeleted { id }).await?;
        Ok(Some(claim))
    }

    async fn load_sorted_actors(&self, pool: &PoolKey, key: SortKey) -> Result<Vec<ActorProfile>, StoreError> {
        let mut actors: Vec<ActorProfile> = self
            .allocations
            .iter()
            .filter(|a| a.pool == *pool)
            .map(|a| {
                self.profiles
                    .get(&a.actor_id)
                    .map(|p| p.value().clone())
                    .unwrap_or_else(|| ActorProfile {
                        id: a.actor_id,
                        name: a.actor_id.to_string(),
                        bonus: 0,
                        stats: Vec::new(),
                    })
            })
            .collect();
        sort_actors(&mut actors, key);
        Ok(actors)
    }

    async fn load_template(&self, name: &str) -> Result<Option<ArrangementTemplate>, StoreError> {
        let Some(json) = self.templates.get(name).map(|t| t.value().clone()) else {
            return Ok(None);
        };
        ArrangementTemplate::from_json(&json)
            .map(Some)
            .map_err(|e| StoreError::Corrupt(format!("template {name}: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use ulid::Ulid;

    fn test_wal_path(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join("muster_test_store");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        let _ = std::fs::remove_file(&path);
        path
    }

    fn binding(day: DayKey, slot: u8, actor_id: ActorId) -> SlotBinding {
        SlotBinding {
            key: day.slot(slot),
            actor_id,
            created_at: 0,
        }
    }

    fn day() -> DayKey {
        DayKey {
            schedule_id: Ulid::new(),
            office: OfficeType::Construction,
            target_date: 100,
        }
    }

    #[tokio::test]
    async fn save_binding_enforces_slot_uniqueness() {
        let store = InMemoryStore::new();
        let d = day();
        let (a, b) = (Ulid::new(), Ulid::new());
        store.save_binding(&binding(d, 5, a)).await.unwrap();
        let err = store.save_binding(&binding(d, 5, b)).await.unwrap_err();
        assert!(matches!(err, StoreError::SlotOccupied { slot: 5, holder } if holder == a));
    }

    #[tokio::test]
    async fn save_binding_enforces_one_slot_per_actor() {
        let store = InMemoryStore::new();
        let d = day();
        let a = Ulid::new();
        store.save_binding(&binding(d, 5, a)).await.unwrap();
        let err = store.save_binding(&binding(d, 6, a)).await.unwrap_err();
        assert!(matches!(err, StoreError::ActorAlreadyBound { slot: 5 }));

        // another day is a different key
        let other = DayKey { target_date: 101, ..d };
        store.save_binding(&binding(other, 6, a)).await.unwrap();
    }

    #[tokio::test]
    async fn delete_binding_frees_slot() {
        let store = InMemoryStore::new();
        let d = day();
        let a = Ulid::new();
        store.save_binding(&binding(d, 1, a)).await.unwrap();
        assert_eq!(store.delete_binding(&d.slot(1)).await.unwrap().map(|b| b.actor_id), Some(a));
        assert!(store.delete_binding(&d.slot(1)).await.unwrap().is_none());
        assert!(store.load_binding(&d.slot(1)).await.unwrap().is_none());
    }

    fn claim(pool: PoolKey, actor_id: ActorId, status: ClaimStatus) -> Claim {
        Claim {
            id: Ulid::new(),
            pool,
            actor_id,
            status,
            created_at: 0,
        }
    }

    #[tokio::test]
    async fn claim_seat_follows_status() {
        let store = InMemoryStore::new();
        let pool = PoolKey::main(Ulid::new(), WarKind(1));
        let mut c = claim(pool, Ulid::new(), ClaimStatus::Pending);
        store.save_claim(&c).await.unwrap();
        assert_eq!(store.count_pending(&pool).await.unwrap(), 1);
        assert_eq!(store.count_arranged(&pool).await.unwrap(), 0);

        c.status = ClaimStatus::Approved;
        store.save_claim(&c).await.unwrap();
        assert_eq!(store.count_pending(&pool).await.unwrap(), 0);
        assert_eq!(store.count_arranged(&pool).await.unwrap(), 1);

        // moving an approved claim moves its seat with it
        let subs = PoolKey::substitute(pool.group_id, pool.war_kind);
        c.pool = subs;
        store.save_claim(&c).await.unwrap();
        assert_eq!(store.count_arranged(&pool).await.unwrap(), 0);
        assert_eq!(store.count_arranged(&subs).await.unwrap(), 1);

        assert_eq!(store.delete_claim(c.id).await.unwrap().map(|d| d.id), Some(c.id));
        assert_eq!(store.count_arranged(&subs).await.unwrap(), 0);
        assert!(store.delete_claim(c.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn status_change_syncs_seat() {
        let store = InMemoryStore::new();
        let pool = PoolKey::main(Ulid::new(), WarKind(2));
        let c = claim(pool, Ulid::new(), ClaimStatus::Approved);
        store.save_claim(&c).await.unwrap();
        store.update_claim_status(c.id, ClaimStatus::Rejected).await.unwrap();
        assert_eq!(store.count_arranged(&pool).await.unwrap(), 0);
        assert_eq!(store.load_claim(c.id).await.unwrap().unwrap().status, ClaimStatus::Rejected);

        let missing = store.update_claim_status(Ulid::new(), ClaimStatus::Rejected).await;
        assert!(matches!(missing, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn sorted_actors_fall_back_to_bare_profiles() {
        let store = InMemoryStore::new();
        let pool = PoolKey::main(Ulid::new(), WarKind(3));
        let strong = Ulid::new();
        let unknown = Ulid::new();
        store
            .save_profile(ActorProfile {
                id: strong,
                name: "Strong".into(),
                bonus: 50,
                stats: vec![],
            })
            .await
            .unwrap();
        for actor_id in [unknown, strong] {
            store
                .save_claim(&claim(pool, actor_id, ClaimStatus::Approved))
                .await
                .unwrap();
        }
        store
            .save_claim(&claim(pool, Ulid::new(), ClaimStatus::Pending))
            .await
            .unwrap();
        let actors = store.load_sorted_actors(&pool, SortKey::Bonus).await.unwrap();
        assert_eq!(actors.len(), 2);
        assert_eq!(actors[0].name, "Strong");
        assert_eq!(actors[1].id, unknown);
    }

    #[tokio::test]
    async fn corrupt_template_is_reported() {
        let store = InMemoryStore::new();
        store.apply(&Event::TemplateSaved {
            name: "bad".into(),
            json: "{not json".into(),
        });
        assert!(matches!(store.load_template("bad").await, Err(StoreError::Corrupt(_))));
        assert!(store.load_template("absent").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn wal_replay_restores_tables() {
        let path = test_wal_path("replay_tables.wal");
        let schedule = Ulid::new();
        let owner = Ulid::new();
        let member = Ulid::new();
        let d = DayKey {
            schedule_id: schedule,
            office: OfficeType::Research,
            target_date: 7,
        };
        {
            let store = InMemoryStore::open(&path).unwrap();
            assert!(store.is_durable());
            store.register_schedule(schedule, owner).await.unwrap();
            store.add_member(schedule, member).await.unwrap();
            store.save_binding(&binding(d, 3, member)).await.unwrap();
            store.save_binding(&binding(d, 4, owner)).await.unwrap();
            store.delete_binding(&d.slot(4)).await.unwrap();
        }

        let store = InMemoryStore::open(&path).unwrap();
        assert_eq!(store.schedule_owner(schedule).await.unwrap(), Some(owner));
        assert!(store.is_member(schedule, member).await.unwrap());
        assert_eq!(store.load_binding(&d.slot(3)).await.unwrap(), Some(member));
        assert!(store.load_binding(&d.slot(4)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn compaction_preserves_state_and_resets_counter() {
        let path = test_wal_path("compact_state.wal");
        let group = Ulid::new();
        {
            let store = InMemoryStore::open(&path).unwrap();
            store.register_group(group, Ulid::new()).await.unwrap();
            for main in 1..=10 {
                store
                    .save_pool_limits(group, WarKind(1), PoolLimits { main, substitute: 1 })
                    .await
                    .unwrap();
            }
            assert_eq!(store.wal_appends_since_compact().await, 11);
            store.compact_wal().await.unwrap();
            assert_eq!(store.wal_appends_since_compact().await, 0);
        }
        assert_eq!(Wal::replay(&path).unwrap().len(), 2);

        let store = InMemoryStore::open(&path).unwrap();
        let limits = store.pool_limits(group, WarKind(1)).await.unwrap().unwrap();
        assert_eq!(limits.main, 10);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn compaction_keeps_writes_acknowledged_meanwhile() {
        let path = test_wal_path("compact_concurrent.wal");
        let store = std::sync::Arc::new(InMemoryStore::open(&path).unwrap());
        let owner = Ulid::new();

        let mut writers = Vec::new();
        for _ in 0..8 {
            let store = store.clone();
            writers.push(tokio::spawn(async move {
                let mut ids = Vec::new();
                for _ in 0..150 {
                    let id = Ulid::new();
                    store.register_group(id, owner).await.unwrap();
                    ids.push(id);
                }
                ids
            }));
        }
        let compactor = {
            let store = store.clone();
            tokio::spawn(async move {
                for _ in 0..100 {
                    store.compact_wal().await.unwrap();
                    tokio::task::yield_now().await;
                }
            })
        };

        let mut acknowledged = Vec::new();
        for w in writers {
            acknowledged.extend(w.await.unwrap());
        }
        compactor.await.unwrap();
        drop(store);

        let reopened = InMemoryStore::open(&path).unwrap();
        assert_eq!(acknowledged.len(), 1200);
        for id in acknowledged {
            assert_eq!(reopened.group_owner(id).await.unwrap(), Some(owner));
        }
    }

    #[tokio::test]
    async fn approved_claims_survive_compaction_with_their_seats() {
        let path = test_wal_path("compact_claims.wal");
        let pool = PoolKey::main(Ulid::new(), WarKind(4));
        let approved = claim(pool, Ulid::new(), ClaimStatus::Approved);
        let pending = claim(pool, Ulid::new(), ClaimStatus::Pending);
        {
            let store = InMemoryStore::open(&path).unwrap();
            store.save_claim(&approved).await.unwrap();
            store.save_claim(&pending).await.unwrap();
            store.compact_wal().await.unwrap();
        }
        let store = InMemoryStore::open(&path).unwrap();
        assert_eq!(store.count_arranged(&pool).await.unwrap(), 1);
        assert_eq!(store.count_pending(&pool).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn add_member_requires_schedule() {
        let store = InMemoryStore::new();
        let result = store.add_member(Ulid::new(), Ulid::new()).await;
        assert!(matches!(result, Err(StoreError::NotFound(_))));
    }
}
