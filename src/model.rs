use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::limits::SLOTS_PER_DAY;

/// Unix milliseconds.
pub type Ms = i64;

/// UTC calendar day, counted from the Unix epoch.
pub type Day = i64;

pub type ActorId = Ulid;
pub type ScheduleId = Ulid;
pub type GroupId = Ulid;
pub type ClaimId = Ulid;

pub const HOUR_MS: Ms = 3_600_000;
pub const DAY_MS: Ms = 24 * HOUR_MS;

pub fn day_of(t: Ms) -> Day {
    t.div_euclid(DAY_MS)
}

/// Half-open interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: Ms,
    pub end: Ms,
}

impl Span {
    pub fn new(start: Ms, end: Ms) -> Self {
        debug_assert!(start < end, "Span start must be before end");
        Self { start, end }
    }

    pub fn duration_ms(&self) -> Ms {
        self.end - self.start
    }

    pub fn contains_instant(&self, t: Ms) -> bool {
        self.start <= t && t < self.end
    }
}

// ── Offices ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum OfficeType {
    Construction,
    Research,
    Training,
    Strategy,
    Security,
}

impl OfficeType {
    pub const ALL: [OfficeType; 5] = [
        OfficeType::Construction,
        OfficeType::Research,
        OfficeType::Training,
        OfficeType::Strategy,
        OfficeType::Security,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OfficeType::Construction => "construction",
            OfficeType::Research => "research",
            OfficeType::Training => "training",
            OfficeType::Strategy => "strategy",
            OfficeType::Security => "security",
        }
    }
}

impl fmt::Display for OfficeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OfficeType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OfficeType::ALL
            .into_iter()
            .find(|o| o.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown office type: {s}"))
    }
}

/// Open/close times for new reservations on one office, and the day those
/// reservations are for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityWindow {
    pub open_at: Ms,
    pub close_at: Ms,
    pub target_date: Day,
    pub disabled_slots: BTreeSet<u8>,
}

impl AvailabilityWindow {
    pub fn span(&self) -> Span {
        Span {
            start: self.open_at,
            end: self.close_at,
        }
    }

    pub fn is_open(&self, now: Ms) -> bool {
        self.span().contains_instant(now)
    }

    pub fn is_disabled(&self, slot: u8) -> bool {
        self.disabled_slots.contains(&slot)
    }
}

/// All bindings for one office on one day share this key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DayKey {
    pub schedule_id: ScheduleId,
    pub office: OfficeType,
    pub target_date: Day,
}

impl DayKey {
    pub fn slot(&self, slot: u8) -> SlotKey {
        SlotKey {
            schedule_id: self.schedule_id,
            office: self.office,
            target_date: self.target_date,
            slot,
        }
    }
}

/// One exclusive hour on one office on one day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SlotKey {
    pub schedule_id: ScheduleId,
    pub office: OfficeType,
    pub target_date: Day,
    pub slot: u8,
}

impl SlotKey {
    pub fn day(&self) -> DayKey {
        DayKey {
            schedule_id: self.schedule_id,
            office: self.office,
            target_date: self.target_date,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotBinding {
    pub key: SlotKey,
    pub actor_id: ActorId,
    pub created_at: Ms,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotState {
    Free,
    Disabled,
    Taken(ActorId),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotView {
    pub slot: u8,
    pub state: SlotState,
}

pub fn all_slots() -> impl Iterator<Item = u8> {
    0..SLOTS_PER_DAY
}

// ── War pools ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct WarKind(pub u16);

impl fmt::Display for WarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "war#{}", self.0)
    }
}

/// A quota-bounded sign-up bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PoolKey {
    pub group_id: GroupId,
    pub war_kind: WarKind,
    pub substitute: bool,
}

impl PoolKey {
    pub fn main(group_id: GroupId, war_kind: WarKind) -> Self {
        Self { group_id, war_kind, substitute: false }
    }

    pub fn substitute(group_id: GroupId, war_kind: WarKind) -> Self {
        Self { group_id, war_kind, substitute: true }
    }

    pub fn role(&self) -> &'static str {
        if self.substitute { "substitute" } else { "main" }
    }
}

impl fmt::Display for PoolKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} pool of group {}", self.war_kind, self.role(), self.group_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PoolLimits {
    pub main: u32,
    pub substitute: u32,
}

impl PoolLimits {
    pub fn for_pool(&self, pool: &PoolKey) -> u32 {
        if pool.substitute { self.substitute } else { self.main }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClaimStatus {
    Pending,
    Approved,
    Rejected,
}

impl ClaimStatus {
    /// Pending and approved claims hold capacity.
    pub fn is_live(&self) -> bool {
        matches!(self, ClaimStatus::Pending | ClaimStatus::Approved)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimKind {
    Immediate,
    PendingReview,
}

impl ClaimKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClaimKind::Immediate => "immediate",
            ClaimKind::PendingReview => "pending_review",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claim {
    pub id: ClaimId,
    pub pool: PoolKey,
    pub actor_id: ActorId,
    pub status: ClaimStatus,
    pub created_at: Ms,
}

/// A committed seat in a pool; counted as `arranged`. Derived from an
/// approved claim, never written on its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allocation {
    pub claim_id: ClaimId,
    pub pool: PoolKey,
    pub actor_id: ActorId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolUsage {
    pub pool: PoolKey,
    pub limit: u32,
    pub arranged: u32,
    pub pending: u32,
}

// ── Actors ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorProfile {
    pub id: ActorId,
    pub name: String,
    #[serde(default)]
    pub bonus: u64,
    #[serde(default)]
    pub stats: Vec<u64>,
}

impl ActorProfile {
    pub fn stat_sum(&self) -> u64 {
        self.stats.iter().sum()
    }
}

/// The WAL record format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    ScheduleRegistered {
        id: ScheduleId,
        owner: ActorId,
    },
    MemberAdded {
        schedule_id: ScheduleId,
        actor_id: ActorId,
    },
    GroupRegistered {
        id: GroupId,
        owner: ActorId,
    },
    ProfileSaved(ActorProfile),
    WindowConfigured {
        schedule_id: ScheduleId,
        office: OfficeType,
        window: AvailabilityWindow,
    },
    BindingCreated(SlotBinding),
    BindingDeleted {
        key: SlotKey,
    },
    PoolLimitsSet {
        group_id: GroupId,
        war_kind: WarKind,
        limits: PoolLimits,
    },
    ClaimSaved(Claim),
    ClaimStatusChanged {
        id: ClaimId,
        status: ClaimStatus,
    },
    ClaimDeleted {
        id: ClaimId,
    },
    TemplateSaved {
        name: String,
        json: String,
    },
}
