pub mod client;
pub mod config;
pub mod controls;
pub mod db;
pub mod error;
pub mod poll;
pub mod store;

pub use client::{ClientConfig, JobServerClient, QueueSnapshot, SnapshotSource};
pub use config::Config;
pub use controls::QueueControls;
pub use error::{ConfigError, ControlError, FetchError, StoreError};
pub use poll::{Connection, PollStatus, Poller, PollerConfig, RateEstimator, ServerStats};
pub use store::{FailureLedger, MetricStore};
