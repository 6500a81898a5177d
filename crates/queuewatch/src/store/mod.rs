pub mod failures;
pub mod maintenance;
pub mod metrics;
pub mod model;

pub use failures::FailureLedger;
pub use maintenance::{cutoff_days, cutoff_hours, sweep_metrics};
pub use metrics::MetricStore;
pub use model::{FailedJobRecord, MetricBucket, MetricRecord, MetricType, NewFailedJob};
