use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::client::QueueSnapshot;
use crate::poll::rate::RateEstimator;

/// Aggregates derived from one successful cycle. Momentary read model,
/// never persisted as a row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServerStats {
    pub active_workers: i64,
    /// Sum of the failed counts the server reports right now. Despite the
    /// name this is not windowed to the local day.
    pub jobs_failed_today: i64,
    pub jobs_processed_since_start: u64,
    pub average_rate_per_minute: f64,
    pub at: DateTime<Utc>,
}

impl ServerStats {
    pub fn from_cycle(
        now: DateTime<Utc>,
        snapshots: &[QueueSnapshot],
        estimator: &RateEstimator,
    ) -> Self {
        Self {
            active_workers: snapshots.iter().map(|s| s.active).sum(),
            jobs_failed_today: snapshots.iter().map(|s| s.failed).sum(),
            jobs_processed_since_start: estimator.processed_since_start(),
            average_rate_per_minute: estimator.average_per_minute(),
            at: now,
        }
    }
}

/// Binary connection state with the last error message attached.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Connection {
    Connected,
    Disconnected { message: String },
}

impl Connection {
    pub fn is_connected(&self) -> bool {
        matches!(self, Connection::Connected)
    }
}

/// The full consolidated status published after each cycle.
///
/// While disconnected, `stats`, `snapshots`, and `updated_at` keep their
/// last good values so a dashboard can keep rendering stale data under a
/// disconnected banner.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PollStatus {
    pub connection: Connection,
    pub stats: Option<ServerStats>,
    pub snapshots: Vec<QueueSnapshot>,
    /// When the data last changed, i.e. the last successful cycle.
    pub updated_at: Option<DateTime<Utc>>,
}

impl PollStatus {
    pub fn idle() -> Self {
        Self {
            connection: Connection::Disconnected {
                message: "not started".to_string(),
            },
            stats: None,
            snapshots: Vec::new(),
            updated_at: None,
        }
    }
}

type Callback = Box<dyn Fn(&PollStatus) + Send + Sync>;

struct BusInner {
    subscribers: Mutex<Vec<(u64, Callback)>>,
    latest: Mutex<PollStatus>,
    next_id: AtomicU64,
}

/// Subscriber list for published status objects.
///
/// Callbacks always receive the full consolidated status, never partial
/// deltas, and only after a cycle's data is completely assembled.
#[derive(Clone)]
pub struct StatusBus {
    inner: Arc<BusInner>,
}

impl Default for StatusBus {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusBus {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(BusInner {
                subscribers: Mutex::new(Vec::new()),
                latest: Mutex::new(PollStatus::idle()),
                next_id: AtomicU64::new(0),
            }),
        }
    }

    /// Register a callback. Dropping the returned handle (or calling
    /// `unsubscribe`) removes it.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&PollStatus) + Send + Sync + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner
            .subscribers
            .lock()
            .expect("subscriber list poisoned")
            .push((id, Box::new(callback)));
        Subscription {
            id,
            bus: Arc::downgrade(&self.inner),
        }
    }

    /// Broadcast to all current listeners and remember the status for
    /// late subscribers.
    pub fn publish(&self, status: PollStatus) {
        *self.inner.latest.lock().expect("latest status poisoned") = status.clone();
        let subscribers = self.inner.subscribers.lock().expect("subscriber list poisoned");
        for (_, callback) in subscribers.iter() {
            callback(&status);
        }
    }

    /// Last published status; the idle placeholder before the first cycle.
    pub fn latest(&self) -> PollStatus {
        self.inner.latest.lock().expect("latest status poisoned").clone()
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.lock().expect("subscriber list poisoned").len()
    }
}

/// Handle returned by [`StatusBus::subscribe`]; unsubscribes on drop.
pub struct Subscription {
    id: u64,
    bus: Weak<BusInner>,
}

impl Subscription {
    pub fn unsubscribe(self) {
        // Drop does the work.
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(inner) = self.bus.upgrade() {
            let mut subscribers = inner.subscribers.lock().expect("subscriber list poisoned");
            subscribers.retain(|(id, _)| *id != self.id);
        }
    }
}
