use chrono::{DateTime, Duration, Utc};
use tracing::{info, warn};

use crate::error::StoreError;
use crate::store::metrics::MetricStore;

/// Convenience: compute cutoff like "now - N days"
pub fn cutoff_days(days: i64) -> DateTime<Utc> {
    Utc::now() - Duration::days(days)
}

pub fn cutoff_hours(hours: i64) -> DateTime<Utc> {
    Utc::now() - Duration::hours(hours)
}

/// One retention pass over the metric table: delete rows past the cutoff,
/// then compact if anything was removed. Returns the number deleted.
pub async fn sweep_metrics(
    store: &MetricStore,
    cutoff: DateTime<Utc>,
) -> Result<u64, StoreError> {
    let deleted = store.delete_older_than(cutoff).await?;
    if deleted > 0 {
        info!(deleted, "metric retention sweep");
        if let Err(err) = store.compact().await {
            // Compaction is physical-only; a failed vacuum leaves the
            // store logically intact.
            warn!(%err, "compaction failed");
        }
    }
    Ok(deleted)
}
