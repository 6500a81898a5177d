pub mod backoff;
pub mod poller;
pub mod rate;
pub mod scheduler;
pub mod status;

pub use backoff::BackoffConfig;
pub use poller::{Poller, PollerConfig};
pub use rate::{RateEstimator, RateSample};
pub use scheduler::{ScheduleHandle, ScheduledTask, Scheduler, TokioScheduler};
pub use status::{Connection, PollStatus, ServerStats, StatusBus, Subscription};
