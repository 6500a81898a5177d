use std::collections::VecDeque;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::client::QueueSnapshot;

/// How long rate samples are kept before eviction.
const SAMPLE_RETENTION_SECS: i64 = 60 * 60;

/// How many of the newest samples feed the published average.
const AVERAGE_WINDOW: usize = 10;

/// One point of the rate history. Never negative.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RateSample {
    pub at: DateTime<Utc>,
    pub per_minute: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct QueueTotals {
    waiting: i64,
    active: i64,
}

/// Derives a jobs-per-minute estimate from successive queue snapshots.
///
/// A shrinking waiting total is the authoritative completion signal; while
/// the queue holds steady or grows with busy workers, the active count
/// stands in as a lower-bound throughput proxy. Raw single-cycle rates are
/// noisy, so consumers read the windowed average rather than the last
/// sample.
#[derive(Debug, Default)]
pub struct RateEstimator {
    last_totals: Option<QueueTotals>,
    last_sample_at: Option<DateTime<Utc>>,
    history: VecDeque<RateSample>,
    processed_since_start: u64,
}

impl RateEstimator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one cycle's snapshots into the estimator.
    ///
    /// The first call only seeds the baseline and returns a zero sample
    /// without recording it. A non-advancing clock (`now <= last`) is
    /// skipped entirely: no sample, no baseline update.
    pub fn update(&mut self, now: DateTime<Utc>, snapshots: &[QueueSnapshot]) -> RateSample {
        let totals = QueueTotals {
            waiting: snapshots.iter().map(|s| s.waiting.max(0)).sum(),
            active: snapshots.iter().map(|s| s.active).sum(),
        };

        let (last_totals, last_at) = match (self.last_totals, self.last_sample_at) {
            (Some(t), Some(at)) => (t, at),
            _ => {
                self.last_totals = Some(totals);
                self.last_sample_at = Some(now);
                return RateSample { at: now, per_minute: 0.0 };
            }
        };

        let elapsed_secs = (now - last_at).num_milliseconds() as f64 / 1000.0;
        if elapsed_secs <= 0.0 {
            return RateSample { at: now, per_minute: 0.0 };
        }

        let waiting_decrease = last_totals.waiting - totals.waiting;
        let per_minute = if waiting_decrease > 0 {
            // Jobs actually left the queue.
            self.processed_since_start += waiting_decrease as u64;
            waiting_decrease as f64 / (elapsed_secs / 60.0)
        } else if totals.active > 0 {
            // Queue did not shrink but workers are busy; approximate from
            // the active count rather than report a stall.
            totals.active as f64 * (60.0 / elapsed_secs)
        } else {
            0.0
        };

        let sample = RateSample { at: now, per_minute };
        self.history.push_back(sample);
        self.evict_older_than(now - Duration::seconds(SAMPLE_RETENTION_SECS));

        self.last_totals = Some(totals);
        self.last_sample_at = Some(now);

        sample
    }

    /// Mean of the newest `min(10, len)` samples; zero when empty.
    pub fn average_per_minute(&self) -> f64 {
        let window = self.history.len().min(AVERAGE_WINDOW);
        if window == 0 {
            return 0.0;
        }
        let sum: f64 = self
            .history
            .iter()
            .rev()
            .take(window)
            .map(|s| s.per_minute)
            .sum();
        sum / window as f64
    }

    /// Total waiting-count decrease observed since construction.
    pub fn processed_since_start(&self) -> u64 {
        self.processed_since_start
    }

    /// Retained samples, oldest first.
    pub fn history(&self) -> impl Iterator<Item = &RateSample> + '_ {
        self.history.iter()
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    // Samples exactly at the cutoff survive.
    fn evict_older_than(&mut self, cutoff: DateTime<Utc>) {
        while let Some(front) = self.history.front() {
            if front.at < cutoff {
                self.history.pop_front();
            } else {
                break;
            }
        }
    }
}
