//! Batch partitioning of ranked actors into named groups.
//!
//! The caller sorts actors (see [`sort_actors`]); a template then claims
//! specific ranks per group, and whoever is left over is dealt round-robin
//! across the declared groups in rank order. Output depends only on the input
//! order and the template, never on hash iteration.

mod rank;
mod tactics;

pub use rank::{parse_ranks, RankSpec};
pub use tactics::{RallyLeaders, SingleFile, SnakeDraft, Tactic, TacticTable, TemplateTactic};

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::engine::EngineError;
use crate::limits::*;
use crate::model::ActorProfile;

/// Name of the group created when a template declares none.
pub const DEFAULT_GROUP_NAME: &str = "Main";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateGroup {
    pub name: String,
    #[serde(default)]
    pub ranks: RankSpec,
    #[serde(default)]
    pub task: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl TemplateGroup {
    pub fn new(name: impl Into<String>, ranks: &str) -> Self {
        Self {
            name: name.into(),
            ranks: RankSpec::Expr(ranks.to_string()),
            task: None,
            notes: None,
        }
    }

    pub fn with_task(mut self, task: impl Into<String>) -> Self {
        self.task = Some(task.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArrangementTemplate {
    pub name: String,
    #[serde(default)]
    pub groups: Vec<TemplateGroup>,
}

impl ArrangementTemplate {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Parse every group's rank expression up front. A malformed expression
    /// fails the whole template, naming the offending group.
    pub fn resolve_ranks(&self) -> Result<Vec<Vec<u32>>, EngineError> {
        if self.groups.len() > MAX_TEMPLATE_GROUPS {
            return Err(EngineError::LimitExceeded("too many template groups"));
        }
        self.groups
            .iter()
            .map(|g| {
                if g.name.len() > MAX_NAME_LEN {
                    return Err(EngineError::LimitExceeded("group name too long"));
                }
                g.ranks
                    .resolve()
                    .map_err(|reason| EngineError::InvalidTemplateExpression {
                        group: g.name.clone(),
                        expr: g.ranks.to_string(),
                        reason,
                    })
            })
            .collect()
    }
}

/// One output group with its resolved display text and members in rank order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Arrangement {
    pub name: String,
    pub task: Option<String>,
    pub notes: Option<String>,
    pub members: Vec<ActorProfile>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SortKey {
    #[default]
    Bonus,
    StatSum,
}

impl FromStr for SortKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bonus" => Ok(SortKey::Bonus),
            "stats" | "stat_sum" => Ok(SortKey::StatSum),
            other => Err(format!("unknown sort key: {other}")),
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortKey::Bonus => f.write_str("bonus"),
            SortKey::StatSum => f.write_str("stats"),
        }
    }
}

/// Descending by the chosen key; ties go to the lower actor id.
pub fn sort_actors(actors: &mut [ActorProfile], key: SortKey) {
    match key {
        SortKey::Bonus => actors.sort_by(|a, b| b.bonus.cmp(&a.bonus).then(a.id.cmp(&b.id))),
        SortKey::StatSum => {
            actors.sort_by(|a, b| b.stat_sum().cmp(&a.stat_sum()).then(a.id.cmp(&b.id)))
        }
    }
}

/// Partition `actors` (already sorted) into the template's groups.
pub fn assign(
    actors: &[ActorProfile],
    template: &ArrangementTemplate,
) -> Result<Vec<Arrangement>, EngineError> {
    if actors.len() > MAX_ACTORS_PER_ARRANGEMENT {
        return Err(EngineError::LimitExceeded("too many actors"));
    }
    let resolved = template.resolve_ranks()?;
    let group_count = template.groups.len().max(1);

    let mut members: Vec<Vec<usize>> = vec![Vec::new(); group_count];
    let mut taken = vec![false; actors.len()];

    for (gi, ranks) in resolved.iter().enumerate() {
        for &rank in ranks {
            let idx = rank as usize - 1;
            if idx < actors.len() && !taken[idx] {
                taken[idx] = true;
                members[gi].push(idx);
            }
        }
    }

    let mut next = 0usize;
    for (idx, _) in taken.iter().enumerate().filter(|(_, t)| !**t) {
        members[next % group_count].push(idx);
        next += 1;
    }

    let arrangements = members
        .into_iter()
        .enumerate()
        .map(|(gi, mut idxs)| {
            idxs.sort_unstable();
            let group_members: Vec<ActorProfile> =
                idxs.into_iter().map(|i| actors[i].clone()).collect();
            match template.groups.get(gi) {
                Some(g) => Arrangement {
                    name: render_placeholders(&g.name, &group_members),
                    task: g.task.as_deref().map(|t| render_placeholders(t, &group_members)),
                    notes: g.notes.clone(),
                    members: group_members,
                },
                None => Arrangement {
                    name: DEFAULT_GROUP_NAME.to_string(),
                    task: None,
                    notes: None,
                    members: group_members,
                },
            }
        })
        .collect();
    Ok(arrangements)
}

/// Replace `{#n}` with the name of the group's n-th member (1-based).
/// Placeholders that point past the member list are left as written.
pub fn render_placeholders(text: &str, members: &[ActorProfile]) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find("{#") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let resolved = after.find('}').and_then(|end| {
            let n: usize = after[..end].parse().ok()?;
            let member = members.get(n.checked_sub(1)?)?;
            Some((member.name.as_str(), end))
        });
        match resolved {
            Some((name, end)) => {
                out.push_str(name);
                rest = &after[end + 1..];
            }
            None => {
                out.push_str("{#");
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use ulid::Ulid;

    fn actors(n: usize) -> Vec<ActorProfile> {
        (0..n)
            .map(|i| ActorProfile {
                id: Ulid::from_parts(1, i as u128),
                name: format!("p{}", i + 1),
                bonus: 1_000 - i as u64,
                stats: vec![],
            })
            .collect()
    }

    fn names(a: &Arrangement) -> Vec<&str> {
        a.members.iter().map(|m| m.name.as_str()).collect()
    }

    #[test]
    fn ranks_then_round_robin() {
        let template = ArrangementTemplate {
            name: "t".into(),
            groups: vec![TemplateGroup::new("A", "1-2"), TemplateGroup::new("B", "3")],
        };
        let out = assign(&actors(7), &template).unwrap();
        assert_eq!(out.len(), 2);
        // leftovers p4..p7 alternate A, B, A, B
        assert_eq!(names(&out[0]), vec!["p1", "p2", "p4", "p6"]);
        assert_eq!(names(&out[1]), vec!["p3", "p5", "p7"]);
    }

    #[test]
    fn every_actor_appears_exactly_once() {
        let template = ArrangementTemplate {
            name: "t".into(),
            groups: vec![
                TemplateGroup::new("A", "2,9"),
                TemplateGroup::new("B", "1,2"),
                TemplateGroup::new("C", "40-50"),
            ],
        };
        let input = actors(13);
        let out = assign(&input, &template).unwrap();
        let mut seen: Vec<Ulid> = out.iter().flat_map(|a| a.members.iter().map(|m| m.id)).collect();
        assert_eq!(seen.len(), input.len());
        seen.sort();
        seen.dedup();
        assert_eq!(seen.len(), input.len());
    }

    #[test]
    fn earlier_group_wins_shared_rank() {
        let template = ArrangementTemplate {
            name: "t".into(),
            groups: vec![TemplateGroup::new("A", "1"), TemplateGroup::new("B", "1,2")],
        };
        let out = assign(&actors(2), &template).unwrap();
        assert_eq!(names(&out[0]), vec!["p1"]);
        assert_eq!(names(&out[1]), vec!["p2"]);
    }

    #[test]
    fn empty_template_uses_one_implicit_group() {
        let template = ArrangementTemplate {
            name: "empty".into(),
            groups: vec![],
        };
        let out = assign(&actors(3), &template).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].name, DEFAULT_GROUP_NAME);
        assert_eq!(names(&out[0]), vec!["p1", "p2", "p3"]);
    }

    #[test]
    fn no_actors_still_yields_groups() {
        let template = ArrangementTemplate {
            name: "t".into(),
            groups: vec![TemplateGroup::new("A", "1"), TemplateGroup::new("B", "")],
        };
        let out = assign(&[], &template).unwrap();
        assert_eq!(out.len(), 2);
        assert!(out.iter().all(|a| a.members.is_empty()));
    }

    #[test]
    fn assignment_is_deterministic() {
        let template = ArrangementTemplate {
            name: "t".into(),
            groups: vec![
                TemplateGroup::new("A", "3,1"),
                TemplateGroup::new("B", "2"),
                TemplateGroup::new("C", ""),
            ],
        };
        let input = actors(11);
        assert_eq!(assign(&input, &template).unwrap(), assign(&input, &template).unwrap());
    }

    #[test]
    fn malformed_expression_fails_whole_template() {
        let template = ArrangementTemplate {
            name: "t".into(),
            groups: vec![TemplateGroup::new("A", "1"), TemplateGroup::new("B", "x-2")],
        };
        match assign(&actors(3), &template) {
            Err(EngineError::InvalidTemplateExpression { group, expr, reason }) => {
                assert_eq!(group, "B");
                assert_eq!(expr, "x-2");
                assert_eq!(reason, "not a number");
            }
            other => panic!("expected InvalidTemplateExpression, got {other:?}"),
        }
    }

    #[test]
    fn placeholders_resolve_against_final_members() {
        let template = ArrangementTemplate {
            name: "t".into(),
            groups: vec![
                TemplateGroup::new("Rally {#1}", "2").with_task("follow {#1}, backup {#2}"),
                TemplateGroup::new("Rest", "1"),
            ],
        };
        let out = assign(&actors(3), &template).unwrap();
        // group A holds p2 by rank and p3 by round-robin
        assert_eq!(out[0].name, "Rally p2");
        assert_eq!(out[0].task.as_deref(), Some("follow p2, backup p3"));
    }

    #[test]
    fn unresolvable_placeholders_stay_literal() {
        let members = actors(1);
        assert_eq!(render_placeholders("{#2} and {#x} and {#1}", &members), "{#2} and {#x} and p1");
        assert_eq!(render_placeholders("open {#", &members), "open {#");
    }

    #[test]
    fn sort_by_bonus_then_id() {
        let mut input = vec![
            ActorProfile { id: Ulid::from_parts(1, 2), name: "b".into(), bonus: 5, stats: vec![] },
            ActorProfile { id: Ulid::from_parts(1, 1), name: "a".into(), bonus: 5, stats: vec![] },
            ActorProfile { id: Ulid::from_parts(1, 3), name: "c".into(), bonus: 9, stats: vec![] },
        ];
        sort_actors(&mut input, SortKey::Bonus);
        let order: Vec<&str> = input.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(order, vec!["c", "a", "b"]);
    }

    #[test]
    fn sort_by_stat_sum() {
        let mut input = vec![
            ActorProfile { id: Ulid::from_parts(1, 1), name: "a".into(), bonus: 99, stats: vec![1, 2] },
            ActorProfile { id: Ulid::from_parts(1, 2), name: "b".into(), bonus: 0, stats: vec![10, 10] },
        ];
        sort_actors(&mut input, SortKey::StatSum);
        assert_eq!(input[0].name, "b");
    }

    #[test]
    fn template_json_accepts_both_rank_forms() {
        let json = r#"{
            "name": "castle",
            "groups": [
                {"name": "Front", "ranks": "1-2", "task": "hold the gate"},
                {"name": "Back", "ranks": [3, 4]}
            ]
        }"#;
        let template = ArrangementTemplate::from_json(json).unwrap();
        assert_eq!(template.resolve_ranks().unwrap(), vec![vec![1, 2], vec![3, 4]]);
        let again = ArrangementTemplate::from_json(&template.to_json().unwrap()).unwrap();
        assert_eq!(again, template);
    }

    #[test]
    fn sort_key_parses() {
        assert_eq!("Bonus".parse::<SortKey>(), Ok(SortKey::Bonus));
        assert_eq!("stats".parse::<SortKey>(), Ok(SortKey::StatSum));
        assert!("power".parse::<SortKey>().is_err());
    }
}
