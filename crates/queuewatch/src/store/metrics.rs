use chrono::{DateTime, Duration, Utc};
use sqlx::SqlitePool;

use crate::error::StoreError;
use crate::store::model::{to_millis, MetricBucket, MetricRecord, MetricRow, MetricType};

/// Append-only time-series store over the local `metrics` table.
///
/// Rows are immutable once written; the only delete path is the retention
/// sweep. Reads always observe whole rows (every write is a single
/// statement in its own transaction).
#[derive(Clone)]
pub struct MetricStore {
    pool: SqlitePool,
}

impl MetricStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert one record. A duplicate id is an integrity error, not an
    /// overwrite.
    pub async fn append(&self, record: &MetricRecord) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO metrics (id, ts_ms, queue_name, metric_type, value, metadata)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(record.id.to_string())
        .bind(to_millis(record.at))
        .bind(record.queue_name.as_deref())
        .bind(record.metric_type.as_str())
        .bind(record.value)
        .bind(record.metadata.as_deref())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(err) if is_unique_violation(&err) => Err(StoreError::DuplicateMetricId(record.id)),
            Err(err) => Err(err.into()),
        }
    }

    /// Rows of one metric type, newest first, optionally filtered by queue
    /// and time range.
    pub async fn query(
        &self,
        metric_type: MetricType,
        queue_name: Option<&str>,
        since: Option<DateTime<Utc>>,
        until: Option<DateTime<Utc>>,
    ) -> Result<Vec<MetricRecord>, StoreError> {
        let mut sql = String::from(
            "SELECT id, ts_ms, queue_name, metric_type, value, metadata \
             FROM metrics WHERE metric_type = ?",
        );
        if queue_name.is_some() {
            sql.push_str(" AND queue_name = ?");
        }
        if since.is_some() {
            sql.push_str(" AND ts_ms >= ?");
        }
        if until.is_some() {
            sql.push_str(" AND ts_ms <= ?");
        }
        sql.push_str(" ORDER BY ts_ms DESC");

        let mut query = sqlx::query_as::<_, MetricRow>(&sql).bind(metric_type.as_str());
        if let Some(queue) = queue_name {
            query = query.bind(queue);
        }
        if let Some(since) = since {
            query = query.bind(to_millis(since));
        }
        if let Some(until) = until {
            query = query.bind(to_millis(until));
        }

        let rows = query.fetch_all(&self.pool).await?;
        rows.into_iter().map(MetricRecord::try_from).collect()
    }

    /// Mean value per bucket of `bucket_width`, ascending. Bucket start is
    /// `floor(ts / width) * width`; empty buckets are omitted, not
    /// zero-filled.
    pub async fn aggregate(
        &self,
        metric_type: MetricType,
        queue_name: Option<&str>,
        since: DateTime<Utc>,
        bucket_width: Duration,
    ) -> Result<Vec<MetricBucket>, StoreError> {
        let width_ms = bucket_width.num_milliseconds();
        if width_ms <= 0 {
            return Err(StoreError::InvalidBucketWidth);
        }

        let mut sql = String::from(
            "SELECT (ts_ms / ?) * ? AS bucket_ms, AVG(value) AS mean_value \
             FROM metrics WHERE metric_type = ? AND ts_ms >= ?",
        );
        if queue_name.is_some() {
            sql.push_str(" AND queue_name = ?");
        }
        sql.push_str(" GROUP BY bucket_ms ORDER BY bucket_ms ASC");

        let mut query = sqlx::query_as::<_, (i64, f64)>(&sql)
            .bind(width_ms)
            .bind(width_ms)
            .bind(metric_type.as_str())
            .bind(to_millis(since));
        if let Some(queue) = queue_name {
            query = query.bind(queue);
        }

        let rows = query.fetch_all(&self.pool).await?;
        rows.into_iter()
            .map(|(bucket_ms, mean_value)| {
                Ok(MetricBucket {
                    bucket_start: crate::store::model::from_millis(bucket_ms)?,
                    mean_value,
                })
            })
            .collect()
    }

    /// Retention sweep: drop rows strictly older than `cutoff`. Returns
    /// the number removed.
    pub async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
        let deleted = sqlx::query("DELETE FROM metrics WHERE ts_ms < ?")
            .bind(to_millis(cutoff))
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(deleted)
    }

    pub async fn count(&self) -> Result<i64, StoreError> {
        let n = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM metrics")
            .fetch_one(&self.pool)
            .await?;
        Ok(n)
    }

    /// Database footprint in bytes.
    pub async fn size_on_disk(&self) -> Result<i64, StoreError> {
        let page_count = sqlx::query_scalar::<_, i64>("PRAGMA page_count")
            .fetch_one(&self.pool)
            .await?;
        let page_size = sqlx::query_scalar::<_, i64>("PRAGMA page_size")
            .fetch_one(&self.pool)
            .await?;
        Ok(page_count * page_size)
    }

    /// Reclaim space freed by the retention sweep. Physical only; no
    /// logical effect.
    pub async fn compact(&self) -> Result<(), StoreError> {
        sqlx::query("VACUUM").execute(&self.pool).await?;
        Ok(())
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => db.is_unique_violation(),
        _ => false,
    }
}
