use crate::engine::EngineError;

// ── Allocation outcomes ─────────────────────────────────────────

/// Counter: slot reservation attempts. Labels: outcome.
pub const RESERVATIONS_TOTAL: &str = "muster_reservations_total";

/// Counter: slot releases. Labels: outcome.
pub const RELEASES_TOTAL: &str = "muster_releases_total";

/// Counter: pool admission attempts. Labels: kind, outcome.
pub const ADMISSIONS_TOTAL: &str = "muster_admissions_total";

/// Counter: claim reviews. Labels: action (approve, reject), outcome.
pub const REVIEWS_TOTAL: &str = "muster_reviews_total";

/// Counter: claim moves between pools. Labels: outcome.
pub const MOVES_TOTAL: &str = "muster_moves_total";

/// Counter: arrangements produced. Labels: source (template, builtin), outcome.
pub const ARRANGEMENTS_TOTAL: &str = "muster_arrangements_total";

/// Histogram: time spent waiting for a slot or pool lock, in seconds. Labels: lock.
pub const LOCK_WAIT_SECONDS: &str = "muster_lock_wait_seconds";

// ── Resource utilization ───────────────────────────────────────

/// Gauge: keys held by a lock registry. Labels: registry.
pub const LOCK_KEYS: &str = "muster_lock_keys";

/// Histogram: WAL group-commit flush duration in seconds.
pub const WAL_FLUSH_DURATION_SECONDS: &str = "muster_wal_flush_duration_seconds";

/// Histogram: WAL group-commit batch size (events per flush).
pub const WAL_FLUSH_BATCH_SIZE: &str = "muster_wal_flush_batch_size";

/// Map a result to a short label for metrics.
pub fn outcome_label<T>(result: &Result<T, EngineError>) -> &'static str {
    match result {
        Ok(_) => "ok",
        Err(e) => error_label(e),
    }
}

pub fn error_label(err: &EngineError) -> &'static str {
    match err {
        EngineError::NotEligible { .. } => "not_eligible",
        EngineError::NotAuthorized(_) => "not_authorized",
        EngineError::ScheduleNotFound(_) => "schedule_not_found",
        EngineError::GroupNotFound(_) => "group_not_found",
        EngineError::WindowNotConfigured { .. } => "window_not_configured",
        EngineError::InvalidWindow(_) => "invalid_window",
        EngineError::OutsideWindow { .. } => "outside_window",
        EngineError::InvalidSlot(_) => "invalid_slot",
        EngineError::SlotDisabled(_) => "slot_disabled",
        EngineError::SlotTaken(_) => "slot_taken",
        EngineError::AlreadyReserved { .. } => "already_reserved",
        EngineError::PoolNotConfigured(_) => "pool_not_configured",
        EngineError::QuotaExceeded { .. } => "quota_exceeded",
        EngineError::AlreadyClaimed { .. } => "already_claimed",
        EngineError::ClaimNotFound(_) => "claim_not_found",
        EngineError::ClaimNotPending { .. } => "claim_not_pending",
        EngineError::InvalidMove(_) => "invalid_move",
        EngineError::InvalidTemplateExpression { .. } => "invalid_template",
        EngineError::UnknownTactic(_) => "unknown_tactic",
        EngineError::LimitExceeded(_) => "limit_exceeded",
        EngineError::Store(_) => "store_error",
    }
}
