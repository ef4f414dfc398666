use std::collections::BTreeMap;
use std::sync::Arc;

use crate::engine::EngineError;
use crate::model::ActorProfile;

use super::{assign, Arrangement, ArrangementTemplate, TemplateGroup};

/// A named way of splitting ranked actors into groups.
pub trait Tactic: Send + Sync {
    fn name(&self) -> &str;
    fn arrange(&self, actors: &[ActorProfile]) -> Result<Vec<Arrangement>, EngineError>;
}

/// Data-driven tactic backed by a stored template.
pub struct TemplateTactic {
    template: ArrangementTemplate,
}

impl TemplateTactic {
    pub fn new(template: ArrangementTemplate) -> Self {
        Self { template }
    }
}

impl Tactic for TemplateTactic {
    fn name(&self) -> &str {
        &self.template.name
    }

    fn arrange(&self, actors: &[ActorProfile]) -> Result<Vec<Arrangement>, EngineError> {
        assign(actors, &self.template)
    }
}

/// Everyone in one group.
pub struct SingleFile;

impl Tactic for SingleFile {
    fn name(&self) -> &str {
        "single"
    }

    fn arrange(&self, actors: &[ActorProfile]) -> Result<Vec<Arrangement>, EngineError> {
        let template = ArrangementTemplate {
            name: self.name().to_string(),
            groups: vec![TemplateGroup::new("Main", "")],
        };
        assign(actors, &template)
    }
}

/// The top `leaders` ranks each lead a rally; everyone else joins round-robin.
pub struct RallyLeaders {
    pub leaders: u32,
}

impl Tactic for RallyLeaders {
    fn name(&self) -> &str {
        "rally"
    }

    fn arrange(&self, actors: &[ActorProfile]) -> Result<Vec<Arrangement>, EngineError> {
        let groups = (1..=self.leaders.max(1))
            .map(|rank| {
                TemplateGroup::new("Rally {#1}", &rank.to_string())
                    .with_task("join the rally led by {#1}")
            })
            .collect();
        let template = ArrangementTemplate {
            name: self.name().to_string(),
            groups,
        };
        let mut out = assign(actors, &template)?;
        // No leader to name the rally after.
        for (rank, group) in (1..).zip(out.iter_mut()) {
            if group.members.is_empty() {
                group.name = format!("Rally {rank}");
                group.task = None;
            }
        }
        Ok(out)
    }
}

/// Balanced groups by snake draft: 1→A, 2→B, 3→B, 4→A, ...
pub struct SnakeDraft {
    pub groups: usize,
}

impl Tactic for SnakeDraft {
    fn name(&self) -> &str {
        "snake"
    }

    fn arrange(&self, actors: &[ActorProfile]) -> Result<Vec<Arrangement>, EngineError> {
        let n = self.groups.max(1);
        let mut out: Vec<Arrangement> = (0..n)
            .map(|i| Arrangement {
                name: format!("Team {}", i + 1),
                task: None,
                notes: None,
                members: Vec::new(),
            })
            .collect();
        for (i, actor) in actors.iter().enumerate() {
            let round = i / n;
            let pos = i % n;
            let target = if round % 2 == 0 { pos } else { n - 1 - pos };
            out[target].members.push(actor.clone());
        }
        Ok(out)
    }
}

/// Name → tactic lookup. Ordered so listings are stable.
#[derive(Clone, Default)]
pub struct TacticTable {
    tactics: BTreeMap<String, Arc<dyn Tactic>>,
}

impl TacticTable {
    pub fn builtin() -> Self {
        let mut table = Self::default();
        table.register(Arc::new(SingleFile));
        table.register(Arc::new(RallyLeaders { leaders: 3 }));
        table.register(Arc::new(SnakeDraft { groups: 2 }));
        table
    }

    pub fn register(&mut self, tactic: Arc<dyn Tactic>) {
        self.tactics.insert(tactic.name().to_string(), tactic);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tactic>> {
        self.tactics.get(name).cloned()
    }

    pub fn names(&self) -> Vec<&str> {
        self.tactics.keys().map(String::as_str).collect()
    }
}
