use std::io::{self, Read};
use std::sync::Arc;

use tracing::info;

use muster::arrange::{sort_actors, ArrangementTemplate, SortKey, Tactic, TacticTable, TemplateTactic};
use muster::model::ActorProfile;

/// Batch arrangement: read actors as JSON (from `MUSTER_ACTORS` or stdin),
/// split them with a template or a built-in tactic, print the groups as JSON.
fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().with_writer(io::stderr).init();

    let sort: SortKey = std::env::var("MUSTER_SORT")
        .ok()
        .map(|s| s.parse())
        .transpose()?
        .unwrap_or_default();
    let tactic_name = std::env::var("MUSTER_TACTIC").unwrap_or_else(|_| "rally".into());

    let actors_json = match std::env::var("MUSTER_ACTORS") {
        Ok(path) => std::fs::read_to_string(path)?,
        Err(_) => {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };
    let mut actors: Vec<ActorProfile> = serde_json::from_str(&actors_json)?;
    sort_actors(&mut actors, sort);

    let tactic: Arc<dyn Tactic> = match std::env::var("MUSTER_TEMPLATE") {
        Ok(path) => {
            let template = ArrangementTemplate::from_json(&std::fs::read_to_string(path)?)?;
            Arc::new(TemplateTactic::new(template))
        }
        Err(_) => {
            let table = TacticTable::builtin();
            table.get(&tactic_name).ok_or_else(|| {
                format!("unknown tactic {tactic_name:?}; built-ins: {}", table.names().join(", "))
            })?
        }
    };

    info!("arranging {} actors with {} sorted by {sort}", actors.len(), tactic.name());
    let groups = tactic.arrange(&actors)?;
    println!("{}", serde_json::to_string_pretty(&groups)?);
    Ok(())
}
