#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;

use queuewatch::client::{QueueSnapshot, SnapshotSource};
use queuewatch::db;
use queuewatch::error::FetchError;
use queuewatch::poll::{ScheduleHandle, ScheduledTask, Scheduler};

pub async fn setup_db() -> SqlitePool {
    // One connection keeps the in-memory database alive and shared.
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("failed to open in-memory database");

    db::run_migrations(&pool).await.expect("migrations failed");

    pool
}

pub fn snapshot(name: &str, waiting: i64, active: i64) -> QueueSnapshot {
    QueueSnapshot {
        name: name.to_string(),
        waiting,
        active,
        completed: 0,
        failed: 0,
        paused: 0,
        delayed: 0,
        is_paused: false,
    }
}

/// Scripted snapshot source: hand it a queue of responses, it replays them
/// in order.
pub struct StubSource {
    responses: Mutex<VecDeque<Result<Vec<QueueSnapshot>, FetchError>>>,
}

impl StubSource {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(VecDeque::new()),
        })
    }

    pub fn push_ok(&self, snapshots: Vec<QueueSnapshot>) {
        self.responses.lock().unwrap().push_back(Ok(snapshots));
    }

    pub fn push_err(&self, err: FetchError) {
        self.responses.lock().unwrap().push_back(Err(err));
    }
}

#[async_trait]
impl SnapshotSource for StubSource {
    async fn fetch(&self) -> Result<Vec<QueueSnapshot>, FetchError> {
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(FetchError::Transport("stub exhausted".to_string())))
    }
}

/// Scheduler that fires only when the test says so.
pub struct ManualScheduler {
    schedules: Mutex<Vec<(ScheduledTask, Arc<AtomicBool>)>>,
}

impl ManualScheduler {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            schedules: Mutex::new(Vec::new()),
        })
    }

    /// Fire one tick on every live schedule.
    pub async fn tick(&self) {
        let tasks: Vec<ScheduledTask> = self
            .schedules
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, cancelled)| !cancelled.load(Ordering::Acquire))
            .map(|(task, _)| Arc::clone(task))
            .collect();

        for task in tasks {
            task().await;
        }
    }

    /// Schedules registered and not yet cancelled.
    pub fn live_count(&self) -> usize {
        self.schedules
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, cancelled)| !cancelled.load(Ordering::Acquire))
            .count()
    }
}

impl Scheduler for ManualScheduler {
    fn schedule(&self, _every: Duration, task: ScheduledTask) -> Box<dyn ScheduleHandle> {
        let cancelled = Arc::new(AtomicBool::new(false));
        self.schedules
            .lock()
            .unwrap()
            .push((task, Arc::clone(&cancelled)));
        Box::new(ManualHandle { cancelled })
    }
}

struct ManualHandle {
    cancelled: Arc<AtomicBool>,
}

impl ScheduleHandle for ManualHandle {
    fn cancel(&mut self) {
        self.cancelled.store(true, Ordering::Release);
    }
}
