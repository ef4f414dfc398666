use std::sync::Arc;

use tracing::{debug, info};

use crate::arrange::{Arrangement, SortKey, Tactic, TemplateTactic};
use crate::model::PoolKey;
use crate::observability::{self, outcome_label};

use super::{Engine, EngineError};

impl Engine {
    /// Split the actors allocated to `pool` into groups. `tactic` names a
    /// stored template first, then a built-in tactic.
    pub async fn arrange(
        &self,
        pool: PoolKey,
        tactic: &str,
        sort: SortKey,
    ) -> Result<Vec<Arrangement>, EngineError> {
        let (source, result) = match self.resolve_tactic(tactic).await {
            Ok((source, tactic)) => {
                let result = match self.store.load_sorted_actors(&pool, sort).await {
                    Ok(actors) => tactic.arrange(&actors),
                    Err(e) => Err(e.into()),
                };
                (source, result)
            }
            Err(e) => ("unresolved", Err(e)),
        };
        metrics::counter!(
            observability::ARRANGEMENTS_TOTAL,
            "source" => source,
            "outcome" => outcome_label(&result)
        )
        .increment(1);
        match &result {
            Ok(groups) => info!("arranged {pool} with {tactic} ({source}) into {} groups", groups.len()),
            Err(e) => debug!("arrangement of {pool} with {tactic} failed: {e}"),
        }
        result
    }

    async fn resolve_tactic(&self, name: &str) -> Result<(&'static str, Arc<dyn Tactic>), EngineError> {
        if let Some(template) = self.store.load_template(name).await? {
            let tactic: Arc<dyn Tactic> = Arc::new(TemplateTactic::new(template));
            return Ok(("template", tactic));
        }
        self.tactics
            .get(name)
            .map(|t| ("builtin", t))
            .ok_or_else(|| EngineError::UnknownTactic(name.to_string()))
    }
}
