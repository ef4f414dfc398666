use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::store::InMemoryStore;

/// Background task that compacts the store's WAL once enough appends have
/// piled up since the last compaction.
pub async fn run_compactor(store: Arc<InMemoryStore>, threshold: u64) {
    let mut interval = tokio::time::interval(Duration::from_secs(5));
    loop {
        interval.tick().await;
        compact_if_needed(&store, threshold).await;
    }
}

/// One compaction check. Returns whether a compaction ran and succeeded.
pub async fn compact_if_needed(store: &InMemoryStore, threshold: u64) -> bool {
    if !store.is_durable() {
        return false;
    }
    let appends = store.wal_appends_since_compact().await;
    if appends < threshold {
        return false;
    }
    match store.compact_wal().await {
        Ok(()) => {
            info!("compacted WAL after {appends} appends");
            true
        }
        Err(e) => {
            warn!("WAL compaction failed: {e}");
            false
        }
    }
}
