use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// A recurring unit of work. Each invocation produces one future to run to
/// completion before the next tick is honored.
pub type ScheduledTask = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

/// Recurring-timer seam.
///
/// Production uses [`TokioScheduler`]; tests inject an implementation that
/// fires ticks on demand instead of sleeping on wall-clock timers.
pub trait Scheduler: Send + Sync {
    fn schedule(&self, every: Duration, task: ScheduledTask) -> Box<dyn ScheduleHandle>;
}

/// Cancellation handle for a scheduled task.
pub trait ScheduleHandle: Send {
    /// Stop future ticks. Idempotent.
    fn cancel(&mut self);
}

/// Wall-clock scheduler on the tokio runtime.
///
/// The first tick fires immediately; ticks missed while a task runs long
/// are delayed rather than bursted.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioScheduler;

impl Scheduler for TokioScheduler {
    fn schedule(&self, every: Duration, task: ScheduledTask) -> Box<dyn ScheduleHandle> {
        let join = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                task().await;
            }
        });
        Box::new(TokioScheduleHandle { join: Some(join) })
    }
}

struct TokioScheduleHandle {
    join: Option<JoinHandle<()>>,
}

impl ScheduleHandle for TokioScheduleHandle {
    fn cancel(&mut self) {
        if let Some(join) = self.join.take() {
            join.abort();
        }
    }
}

// A dropped handle must not leave a timer running.
impl Drop for TokioScheduleHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}
