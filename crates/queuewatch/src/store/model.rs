use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::StoreError;

/// Kinds of persisted metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricType {
    ProcessingRate,
    ActiveWorkers,
    FailedJobs,
    QueueWaiting,
}

impl MetricType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricType::ProcessingRate => "processing_rate",
            MetricType::ActiveWorkers => "active_workers",
            MetricType::FailedJobs => "failed_jobs",
            MetricType::QueueWaiting => "queue_waiting",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "processing_rate" => Some(MetricType::ProcessingRate),
            "active_workers" => Some(MetricType::ActiveWorkers),
            "failed_jobs" => Some(MetricType::FailedJobs),
            "queue_waiting" => Some(MetricType::QueueWaiting),
            _ => None,
        }
    }
}

/// One persisted time-series point. Immutable once written; removed only
/// by the retention sweep.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricRecord {
    pub id: Uuid,
    pub at: DateTime<Utc>,
    pub queue_name: Option<String>,
    pub metric_type: MetricType,
    pub value: f64,
    pub metadata: Option<String>,
}

impl MetricRecord {
    pub fn at(
        at: DateTime<Utc>,
        queue_name: Option<String>,
        metric_type: MetricType,
        value: f64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            at,
            queue_name,
            metric_type,
            value,
            metadata: None,
        }
    }

    pub fn now(queue_name: Option<String>, metric_type: MetricType, value: f64) -> Self {
        Self::at(Utc::now(), queue_name, metric_type, value)
    }
}

/// One aggregation bucket: `(bucket start, mean of values inside)`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricBucket {
    pub bucket_start: DateTime<Utc>,
    pub mean_value: f64,
}

/// Fields supplied when a failure is first observed. `id` and
/// `retry_count` are assigned by the ledger.
#[derive(Debug, Clone)]
pub struct NewFailedJob {
    pub job_id: String,
    pub queue_name: String,
    pub asset_id: Option<String>,
    pub asset_name: Option<String>,
    pub error_message: String,
    pub stack_trace: Option<String>,
    pub failed_at: DateTime<Utc>,
    pub file_type: Option<String>,
    pub file_size: Option<i64>,
    pub metadata_json: Option<String>,
    pub thumbnail_path: Option<String>,
}

/// A persisted failure record. `retry_count` only moves up, via
/// [`FailureLedger::increment_retry_count`](crate::store::FailureLedger::increment_retry_count).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailedJobRecord {
    pub id: Uuid,
    pub job_id: String,
    pub queue_name: String,
    pub asset_id: Option<String>,
    pub asset_name: Option<String>,
    pub error_message: String,
    pub stack_trace: Option<String>,
    pub failed_at: DateTime<Utc>,
    pub retry_count: i64,
    pub file_type: Option<String>,
    pub file_size: Option<i64>,
    pub metadata_json: Option<String>,
    pub thumbnail_path: Option<String>,
}

// Timestamps live in the database as integer unix milliseconds so cutoff
// comparisons and bucket arithmetic stay integer math.

pub(crate) fn to_millis(at: DateTime<Utc>) -> i64 {
    at.timestamp_millis()
}

pub(crate) fn from_millis(ms: i64) -> Result<DateTime<Utc>, StoreError> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .ok_or_else(|| StoreError::Corrupt(format!("timestamp out of range: {ms}")))
}

#[derive(sqlx::FromRow)]
pub(crate) struct MetricRow {
    pub id: String,
    pub ts_ms: i64,
    pub queue_name: Option<String>,
    pub metric_type: String,
    pub value: f64,
    pub metadata: Option<String>,
}

impl TryFrom<MetricRow> for MetricRecord {
    type Error = StoreError;

    fn try_from(row: MetricRow) -> Result<Self, StoreError> {
        Ok(MetricRecord {
            id: Uuid::parse_str(&row.id)
                .map_err(|_| StoreError::Corrupt(format!("bad metric id: {}", row.id)))?,
            at: from_millis(row.ts_ms)?,
            queue_name: row.queue_name,
            metric_type: MetricType::parse(&row.metric_type).ok_or_else(|| {
                StoreError::Corrupt(format!("unknown metric type: {}", row.metric_type))
            })?,
            value: row.value,
            metadata: row.metadata,
        })
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct FailedJobRow {
    pub id: String,
    pub job_id: String,
    pub queue_name: String,
    pub asset_id: Option<String>,
    pub asset_name: Option<String>,
    pub error_message: String,
    pub stack_trace: Option<String>,
    pub failed_at_ms: i64,
    pub retry_count: i64,
    pub file_type: Option<String>,
    pub file_size: Option<i64>,
    pub metadata_json: Option<String>,
    pub thumbnail_path: Option<String>,
}

impl TryFrom<FailedJobRow> for FailedJobRecord {
    type Error = StoreError;

    fn try_from(row: FailedJobRow) -> Result<Self, StoreError> {
        Ok(FailedJobRecord {
            id: Uuid::parse_str(&row.id)
                .map_err(|_| StoreError::Corrupt(format!("bad record id: {}", row.id)))?,
            job_id: row.job_id,
            queue_name: row.queue_name,
            asset_id: row.asset_id,
            asset_name: row.asset_name,
            error_message: row.error_message,
            stack_trace: row.stack_trace,
            failed_at: from_millis(row.failed_at_ms)?,
            retry_count: row.retry_count,
            file_type: row.file_type,
            file_size: row.file_size,
            metadata_json: row.metadata_json,
            thumbnail_path: row.thumbnail_path,
        })
    }
}
