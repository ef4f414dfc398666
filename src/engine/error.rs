use crate::model::*;
use crate::store::StoreError;

#[derive(Debug)]
pub enum EngineError {
    NotEligible {
        actor_id: ActorId,
        schedule_id: ScheduleId,
    },
    NotAuthorized(ActorId),
    ScheduleNotFound(ScheduleId),
    GroupNotFound(GroupId),
    WindowNotConfigured {
        schedule_id: ScheduleId,
        office: OfficeType,
    },
    InvalidWindow(&'static str),
    OutsideWindow {
        now: Ms,
        open_at: Ms,
        close_at: Ms,
    },
    InvalidSlot(u8),
    SlotDisabled(u8),
    SlotTaken(u8),
    /// The actor already holds `slot` on this office for the day.
    AlreadyReserved {
        slot: u8,
    },
    PoolNotConfigured(PoolKey),
    QuotaExceeded {
        pool: PoolKey,
        limit: u32,
    },
    /// The actor already holds a live claim in a mutually exclusive pool.
    AlreadyClaimed {
        existing: ClaimId,
        pool: PoolKey,
    },
    ClaimNotFound(ClaimId),
    ClaimNotPending {
        id: ClaimId,
        status: ClaimStatus,
    },
    InvalidMove(&'static str),
    InvalidTemplateExpression {
        group: String,
        expr: String,
        reason: &'static str,
    },
    UnknownTactic(String),
    LimitExceeded(&'static str),
    Store(StoreError),
}

impl EngineError {
    /// Whether the same request might succeed later without the caller
    /// changing it.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            EngineError::OutsideWindow { .. } | EngineError::QuotaExceeded { .. } | EngineError::Store(_)
        )
    }
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::NotEligible { actor_id, schedule_id } => {
                write!(f, "actor {actor_id} is not a member of schedule {schedule_id}")
            }
            EngineError::NotAuthorized(id) => write!(f, "actor {id} is not allowed to do that"),
            EngineError::ScheduleNotFound(id) => write!(f, "schedule not found: {id}"),
            EngineError::GroupNotFound(id) => write!(f, "group not found: {id}"),
            EngineError::WindowNotConfigured { schedule_id, office } => {
                write!(f, "no {office} reservation window configured for schedule {schedule_id}")
            }
            EngineError::InvalidWindow(msg) => write!(f, "invalid window: {msg}"),
            EngineError::OutsideWindow { now, open_at, close_at } => write!(
                f,
                "reservations are open during [{open_at}, {close_at}), not at {now}"
            ),
            EngineError::InvalidSlot(slot) => write!(f, "slot {slot} does not exist"),
            EngineError::SlotDisabled(slot) => write!(f, "slot {slot} is disabled"),
            EngineError::SlotTaken(slot) => write!(f, "slot {slot} is already taken"),
            EngineError::AlreadyReserved { slot } => {
                write!(f, "already holding slot {slot} on this office for the day")
            }
            EngineError::PoolNotConfigured(pool) => write!(f, "no limits configured for {pool}"),
            EngineError::QuotaExceeded { pool, limit } => {
                write!(f, "{pool} is full: limit {limit}")
            }
            EngineError::AlreadyClaimed { existing, pool } => {
                write!(f, "already signed up for {pool} (claim {existing})")
            }
            EngineError::ClaimNotFound(id) => write!(f, "claim not found: {id}"),
            EngineError::ClaimNotPending { id, status } => {
                write!(f, "claim {id} is {status:?}, not pending")
            }
            EngineError::InvalidMove(msg) => write!(f, "invalid move: {msg}"),
            EngineError::InvalidTemplateExpression { group, expr, reason } => {
                write!(f, "group {group:?}: bad rank expression {expr:?}: {reason}")
            }
            EngineError::UnknownTactic(name) => write!(f, "unknown tactic: {name}"),
            EngineError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            EngineError::Store(e) => write!(f, "store error: {e}"),
        }
    }
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EngineError::Store(e) => Some(e),
            _ => None,
        }
    }
}

/// Store-level uniqueness violations surface exactly like the in-process
/// checks they back up.
impl From<StoreError> for EngineError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::SlotOccupied { slot, .. } => EngineError::SlotTaken(slot),
            StoreError::ActorAlreadyBound { slot } => EngineError::AlreadyReserved { slot },
            other => EngineError::Store(other),
        }
    }
}
