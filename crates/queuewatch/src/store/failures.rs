use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::error::StoreError;
use crate::store::model::{to_millis, FailedJobRecord, FailedJobRow, NewFailedJob};

const SELECT_COLUMNS: &str = "id, job_id, queue_name, asset_id, asset_name, error_message, \
     stack_trace, failed_at_ms, retry_count, file_type, file_size, metadata_json, thumbnail_path";

/// Durable store of observed job failures.
///
/// Rows are written when a failure is observed, have their retry count
/// bumped on retry attempts, and are removed only by an explicit delete.
#[derive(Clone)]
pub struct FailureLedger {
    pool: SqlitePool,
}

impl FailureLedger {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn record(&self, entry: NewFailedJob) -> Result<FailedJobRecord, StoreError> {
        let record = FailedJobRecord {
            id: Uuid::new_v4(),
            job_id: entry.job_id,
            queue_name: entry.queue_name,
            asset_id: entry.asset_id,
            asset_name: entry.asset_name,
            error_message: entry.error_message,
            stack_trace: entry.stack_trace,
            failed_at: entry.failed_at,
            retry_count: 0,
            file_type: entry.file_type,
            file_size: entry.file_size,
            metadata_json: entry.metadata_json,
            thumbnail_path: entry.thumbnail_path,
        };

        sqlx::query(
            r#"
            INSERT INTO failed_jobs (
                id, job_id, queue_name, asset_id, asset_name,
                error_message, stack_trace, failed_at_ms, retry_count,
                file_type, file_size, metadata_json, thumbnail_path
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(record.id.to_string())
        .bind(&record.job_id)
        .bind(&record.queue_name)
        .bind(record.asset_id.as_deref())
        .bind(record.asset_name.as_deref())
        .bind(&record.error_message)
        .bind(record.stack_trace.as_deref())
        .bind(to_millis(record.failed_at))
        .bind(record.retry_count)
        .bind(record.file_type.as_deref())
        .bind(record.file_size)
        .bind(record.metadata_json.as_deref())
        .bind(record.thumbnail_path.as_deref())
        .execute(&self.pool)
        .await?;

        Ok(record)
    }

    /// Failure records, newest first. `limit` is clamped to [1, 500].
    pub async fn list(
        &self,
        queue_name: Option<&str>,
        since: Option<DateTime<Utc>>,
        limit: i64,
    ) -> Result<Vec<FailedJobRecord>, StoreError> {
        let limit = limit.clamp(1, 500);

        let mut sql = format!("SELECT {SELECT_COLUMNS} FROM failed_jobs WHERE 1 = 1");
        if queue_name.is_some() {
            sql.push_str(" AND queue_name = ?");
        }
        if since.is_some() {
            sql.push_str(" AND failed_at_ms >= ?");
        }
        sql.push_str(" ORDER BY failed_at_ms DESC LIMIT ?");

        let mut query = sqlx::query_as::<_, FailedJobRow>(&sql);
        if let Some(queue) = queue_name {
            query = query.bind(queue);
        }
        if let Some(since) = since {
            query = query.bind(to_millis(since));
        }
        query = query.bind(limit);

        let rows = query.fetch_all(&self.pool).await?;
        rows.into_iter().map(FailedJobRecord::try_from).collect()
    }

    /// Atomic `retry_count += 1` across every record of `job_id`. Returns
    /// false when the id is unknown; absence is reported, not fatal.
    pub async fn increment_retry_count(&self, job_id: &str) -> Result<bool, StoreError> {
        let updated = sqlx::query("UPDATE failed_jobs SET retry_count = retry_count + 1 WHERE job_id = ?")
            .bind(job_id)
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(updated > 0)
    }

    /// Explicit user-driven delete; returns false when the row was
    /// already gone.
    pub async fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        let deleted = sqlx::query("DELETE FROM failed_jobs WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(deleted > 0)
    }

    pub async fn count(&self) -> Result<i64, StoreError> {
        let n = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM failed_jobs")
            .fetch_one(&self.pool)
            .await?;
        Ok(n)
    }
}
