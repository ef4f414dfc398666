/// Hourly slots per office per day.
pub const SLOTS_PER_DAY: u8 = 24;

/// Highest rank a template expression may name.
pub const MAX_RANK: u32 = 1_000;

/// Longest accepted rank expression, in bytes.
pub const MAX_RANK_EXPR_LEN: usize = 256;

pub const MAX_TEMPLATE_GROUPS: usize = 64;
pub const MAX_NAME_LEN: usize = 256;
pub const MAX_ACTORS_PER_ARRANGEMENT: usize = 10_000;

/// WAL appends before the compactor rewrites the log.
pub const DEFAULT_COMPACT_THRESHOLD: u64 = 1_000;
