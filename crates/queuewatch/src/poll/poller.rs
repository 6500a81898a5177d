use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, warn};

use crate::client::SnapshotSource;
use crate::error::FetchError;
use crate::poll::backoff::{next_delay_seconds, BackoffConfig};
use crate::poll::rate::RateEstimator;
use crate::poll::scheduler::{ScheduleHandle, Scheduler};
use crate::poll::status::{Connection, PollStatus, ServerStats, StatusBus, Subscription};
use crate::store::metrics::MetricStore;
use crate::store::model::{MetricRecord, MetricType};

#[derive(Debug, Clone)]
pub struct PollerConfig {
    pub interval: Duration,
    /// Persist selected stats as metric rows after each successful cycle.
    pub persist_metrics: bool,
    /// Optional capped backoff on consecutive fetch failures. `None`
    /// retries at the fixed interval indefinitely.
    pub backoff: Option<BackoffConfig>,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            persist_metrics: true,
            backoff: None,
        }
    }
}

/// Drives the poll cycle: fetch snapshots, update the rate estimate,
/// publish the consolidated status, persist metrics best-effort.
///
/// Two states: idle (no schedule) and polling. `start` schedules recurring
/// ticks and fires cycle 0 immediately; `stop` cancels the schedule and
/// abandons any scheduled cycle in flight. Ticks that land while a cycle
/// is still running are dropped, so a slow network stretches the effective
/// interval instead of queueing cycles.
pub struct Poller {
    source: Arc<dyn SnapshotSource>,
    metrics: MetricStore,
    scheduler: Arc<dyn Scheduler>,
    config: Mutex<PollerConfig>,
    bus: StatusBus,
    estimator: Mutex<RateEstimator>,
    schedule: Mutex<Option<Box<dyn ScheduleHandle>>>,
    in_flight: AtomicBool,
    consecutive_failures: AtomicU32,
    suspended_until: Mutex<Option<DateTime<Utc>>>,
}

impl Poller {
    pub fn new(
        source: Arc<dyn SnapshotSource>,
        metrics: MetricStore,
        scheduler: Arc<dyn Scheduler>,
        config: PollerConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            source,
            metrics,
            scheduler,
            config: Mutex::new(config),
            bus: StatusBus::new(),
            estimator: Mutex::new(RateEstimator::new()),
            schedule: Mutex::new(None),
            in_flight: AtomicBool::new(false),
            consecutive_failures: AtomicU32::new(0),
            suspended_until: Mutex::new(None),
        })
    }

    /// Register a status subscriber. Every published status is the full
    /// consolidated object.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&PollStatus) + Send + Sync + 'static,
    {
        self.bus.subscribe(callback)
    }

    /// Last published status, for subscribers that arrive late.
    pub fn latest_status(&self) -> PollStatus {
        self.bus.latest()
    }

    pub fn is_polling(&self) -> bool {
        self.schedule.lock().expect("schedule slot poisoned").is_some()
    }

    /// Idle → polling. Calling it while already polling cancels the old
    /// schedule first, so exactly one timer is ever live.
    pub fn start(self: &Arc<Self>) {
        let interval = self.config.lock().expect("poller config poisoned").interval;
        let poller = Arc::clone(self);
        let task: crate::poll::scheduler::ScheduledTask = Arc::new(move || {
            let poller = Arc::clone(&poller);
            Box::pin(async move {
                poller.run_cycle().await;
            })
        });

        let mut slot = self.schedule.lock().expect("schedule slot poisoned");
        if let Some(mut old) = slot.take() {
            old.cancel();
        }
        *slot = Some(self.scheduler.schedule(interval, task));
    }

    /// Polling → idle. Safe to call twice; the second call is a no-op.
    pub fn stop(&self) {
        let mut slot = self.schedule.lock().expect("schedule slot poisoned");
        if let Some(mut handle) = slot.take() {
            handle.cancel();
        }
    }

    /// Swap the poll interval. Equivalent to `stop` then `start`: no
    /// partial-interval carryover.
    pub fn reconfigure(self: &Arc<Self>, interval: Duration) {
        self.config.lock().expect("poller config poisoned").interval = interval;
        if self.is_polling() {
            self.start();
        }
    }

    /// Manual refresh: one cycle outside the schedule, same guard rules.
    pub async fn poll_now(&self) {
        self.run_cycle().await;
    }

    async fn run_cycle(&self) {
        // skip-if-busy: drop this tick if a cycle is already running.
        if self.in_flight.swap(true, Ordering::AcqRel) {
            debug!("cycle already in flight, dropping tick");
            return;
        }

        // The guard also releases the flag when an aborted schedule drops
        // the cycle future mid-fetch.
        let _guard = InFlightGuard(&self.in_flight);
        self.run_cycle_inner().await;
    }

    async fn run_cycle_inner(&self) {
        let now = Utc::now();

        if let Some(until) = *self.suspended_until.lock().expect("backoff slot poisoned") {
            if now < until {
                debug!(%until, "backing off, dropping tick");
                return;
            }
        }

        match self.source.fetch().await {
            Ok(snapshots) => {
                self.consecutive_failures.store(0, Ordering::Relaxed);
                *self.suspended_until.lock().expect("backoff slot poisoned") = None;

                let stats = {
                    let mut estimator = self.estimator.lock().expect("estimator poisoned");
                    estimator.update(now, &snapshots);
                    ServerStats::from_cycle(now, &snapshots, &estimator)
                };

                let status = PollStatus {
                    connection: Connection::Connected,
                    stats: Some(stats.clone()),
                    snapshots: snapshots.clone(),
                    updated_at: Some(now),
                };
                self.bus.publish(status);
                debug!(
                    queues = snapshots.len(),
                    rate = stats.average_rate_per_minute,
                    "cycle complete"
                );

                let persist = self.config.lock().expect("poller config poisoned").persist_metrics;
                if persist {
                    self.persist_cycle_metrics(now, &stats, &snapshots).await;
                }
            }
            Err(err) => {
                self.note_failure(now, &err);

                let previous = self.bus.latest();
                let status = PollStatus {
                    connection: Connection::Disconnected {
                        message: err.to_string(),
                    },
                    stats: previous.stats,
                    snapshots: previous.snapshots,
                    updated_at: previous.updated_at,
                };
                self.bus.publish(status);
            }
        }
    }

    fn note_failure(&self, now: DateTime<Utc>, err: &FetchError) {
        let failures = self.consecutive_failures.fetch_add(1, Ordering::Relaxed) + 1;
        warn!(%err, failures, "fetch failed");

        let backoff = self.config.lock().expect("poller config poisoned").backoff.clone();
        if let Some(cfg) = backoff {
            let mut rng = StdRng::from_entropy();
            let delay = next_delay_seconds(failures, &cfg, &mut rng);
            *self.suspended_until.lock().expect("backoff slot poisoned") =
                Some(now + chrono::Duration::seconds(delay));
        }
    }

    /// Best-effort: a failed write is logged and the cycle's published
    /// state stands.
    async fn persist_cycle_metrics(
        &self,
        now: DateTime<Utc>,
        stats: &ServerStats,
        snapshots: &[crate::client::QueueSnapshot],
    ) {
        let mut records = vec![
            MetricRecord::at(now, None, MetricType::ProcessingRate, stats.average_rate_per_minute),
            MetricRecord::at(now, None, MetricType::ActiveWorkers, stats.active_workers as f64),
            MetricRecord::at(now, None, MetricType::FailedJobs, stats.jobs_failed_today as f64),
        ];
        for snapshot in snapshots {
            records.push(MetricRecord::at(
                now,
                Some(snapshot.name.clone()),
                MetricType::QueueWaiting,
                snapshot.waiting as f64,
            ));
        }

        for record in &records {
            if let Err(err) = self.metrics.append(record).await {
                warn!(%err, metric = record.metric_type.as_str(), "metric write failed");
            }
        }
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        self.stop();
    }
}

struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}
