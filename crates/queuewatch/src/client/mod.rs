pub mod fetcher;
pub mod models;

pub use fetcher::{ClientConfig, JobServerClient, SnapshotSource};
pub use models::{normalize, QueueCountsDto, QueueMapDto, QueueSnapshot, QueueStatusDto};
