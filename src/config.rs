use std::collections::HashMap;
use std::path::PathBuf;

use crate::limits::DEFAULT_COMPACT_THRESHOLD;
use crate::model::WarKind;

/// Engine settings, normally read from `MUSTER_*` environment variables.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Backing WAL for the reference store; volatile when unset.
    pub wal_path: Option<PathBuf>,
    pub compact_threshold: u64,
    /// War kinds an actor may hold at most one live claim across.
    pub exclusive_wars: Vec<Vec<WarKind>>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            wal_path: None,
            compact_threshold: DEFAULT_COMPACT_THRESHOLD,
            exclusive_wars: Vec::new(),
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Self {
        let wal_path = std::env::var("MUSTER_WAL_PATH").ok().map(PathBuf::from);
        let compact_threshold: u64 = std::env::var("MUSTER_COMPACT_THRESHOLD")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_COMPACT_THRESHOLD);
        let exclusive_wars = std::env::var("MUSTER_EXCLUSIVE_WARS")
            .ok()
            .map(|s| parse_exclusive_wars(&s))
            .unwrap_or_default();
        Self {
            wal_path,
            compact_threshold,
            exclusive_wars,
        }
    }
}

/// Parse `"1,2;3,4"` into `[[1,2],[3,4]]`. Unparseable entries are skipped.
pub fn parse_exclusive_wars(s: &str) -> Vec<Vec<WarKind>> {
    s.split(';')
        .map(|set| {
            set.split(',')
                .filter_map(|k| k.trim().parse::<u16>().ok())
                .map(WarKind)
                .collect::<Vec<_>>()
        })
        .filter(|set| !set.is_empty())
        .collect()
}

/// Lookup from a war kind to every kind it excludes (itself included).
#[derive(Debug, Clone, Default)]
pub struct ExclusiveSets {
    by_kind: HashMap<WarKind, Vec<WarKind>>,
}

impl ExclusiveSets {
    pub fn new(sets: &[Vec<WarKind>]) -> Self {
        let mut by_kind: HashMap<WarKind, Vec<WarKind>> = HashMap::new();
        for set in sets {
            for kind in set {
                let entry = by_kind.entry(*kind).or_default();
                for other in set {
                    if !entry.contains(other) {
                        entry.push(*other);
                    }
                }
            }
        }
        Self { by_kind }
    }

    pub fn excludes(&self, a: WarKind, b: WarKind) -> bool {
        a == b || self.by_kind.get(&a).is_some_and(|set| set.contains(&b))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_sets() {
        assert_eq!(
            parse_exclusive_wars("1,2; 3 ,4"),
            vec![vec![WarKind(1), WarKind(2)], vec![WarKind(3), WarKind(4)]]
        );
        assert_eq!(parse_exclusive_wars("x;;5"), vec![vec![WarKind(5)]]);
        assert!(parse_exclusive_wars("").is_empty());
    }

    #[test]
    fn exclusion_is_symmetric_and_reflexive() {
        let sets = ExclusiveSets::new(&[vec![WarKind(1), WarKind(2)]]);
        assert!(sets.excludes(WarKind(1), WarKind(2)));
        assert!(sets.excludes(WarKind(2), WarKind(1)));
        assert!(sets.excludes(WarKind(9), WarKind(9)));
        assert!(!sets.excludes(WarKind(1), WarKind(3)));
    }

    #[test]
    fn overlapping_sets_merge_per_kind() {
        let sets = ExclusiveSets::new(&[vec![WarKind(1), WarKind(2)], vec![WarKind(2), WarKind(3)]]);
        assert!(sets.excludes(WarKind(2), WarKind(3)));
        assert!(sets.excludes(WarKind(2), WarKind(1)));
        assert!(!sets.excludes(WarKind(1), WarKind(3)));
    }
}
