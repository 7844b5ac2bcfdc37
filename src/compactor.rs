use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::engine::Engine;

const CHECK_INTERVAL: Duration = Duration::from_secs(30);

/// Background task that compacts the WAL once enough appends accumulated.
pub async fn run_compactor(engine: Arc<Engine>, threshold: u64) {
    let mut interval = tokio::time::interval(CHECK_INTERVAL);
    loop {
        interval.tick().await;
        compact_if_due(&engine, threshold).await;
    }
}

/// One compactor pass. Returns true if a compaction ran and succeeded.
pub async fn compact_if_due(engine: &Engine, threshold: u64) -> bool {
    let appends = engine.wal_appends_since_compact().await;
    if appends < threshold.max(1) {
        return false;
    }
    match engine.compact_wal().await {
        Ok(()) => {
            info!(appends, "compacted WAL");
            true
        }
        Err(e) => {
            tracing::error!(error = %e, "WAL compaction failed");
            false
        }
    }
}
