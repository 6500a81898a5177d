mod common;

use chrono::{DateTime, Duration, TimeZone, Utc};
use common::snapshot;
use queuewatch::poll::RateEstimator;

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
}

#[test]
fn bootstrap_sample_is_zero_and_unrecorded() {
    let mut est = RateEstimator::new();

    let sample = est.update(t0(), &[snapshot("thumbs", 100, 5)]);

    assert_eq!(sample.per_minute, 0.0);
    assert_eq!(est.history_len(), 0);
    assert_eq!(est.processed_since_start(), 0);
}

#[test]
fn measured_decrease_gives_exact_rate_and_counter() {
    let mut est = RateEstimator::new();
    est.update(t0(), &[snapshot("thumbs", 100, 5)]);

    let sample = est.update(t0() + Duration::seconds(60), &[snapshot("thumbs", 80, 5)]);

    assert_eq!(sample.per_minute, 20.0);
    assert_eq!(est.processed_since_start(), 20);
    assert_eq!(est.history_len(), 1);
    // Only one non-bootstrap sample, so the window average equals it.
    assert_eq!(est.average_per_minute(), 20.0);
}

#[test]
fn busy_workers_without_drain_use_active_proxy() {
    let mut est = RateEstimator::new();
    est.update(t0(), &[snapshot("thumbs", 100, 5)]);

    // Waiting grew: new work arrived faster than it drained.
    let sample = est.update(t0() + Duration::seconds(30), &[snapshot("thumbs", 120, 5)]);

    assert_eq!(sample.per_minute, 5.0 * (60.0 / 30.0));
    assert_eq!(est.processed_since_start(), 0);
}

#[test]
fn idle_system_reports_zero() {
    let mut est = RateEstimator::new();
    est.update(t0(), &[snapshot("thumbs", 100, 0)]);

    let sample = est.update(t0() + Duration::seconds(60), &[snapshot("thumbs", 100, 0)]);

    assert_eq!(sample.per_minute, 0.0);
    assert_eq!(est.processed_since_start(), 0);
    assert_eq!(est.history_len(), 1);
}

#[test]
fn stalled_clock_is_skipped_entirely() {
    let mut est = RateEstimator::new();
    est.update(t0(), &[snapshot("thumbs", 100, 5)]);

    // Same instant again: no sample, no baseline movement.
    let sample = est.update(t0(), &[snapshot("thumbs", 50, 5)]);
    assert_eq!(sample.per_minute, 0.0);
    assert_eq!(est.history_len(), 0);
    assert_eq!(est.processed_since_start(), 0);

    // The next real cycle still deltas against the original baseline.
    est.update(t0() + Duration::seconds(60), &[snapshot("thumbs", 80, 5)]);
    assert_eq!(est.processed_since_start(), 20);
}

#[test]
fn rates_are_never_negative_or_non_finite() {
    let mut est = RateEstimator::new();
    let series: &[(i64, i64, i64)] = &[
        // (seconds offset, waiting, active)
        (0, 100, 0),
        (1, 500, 3),
        (1, 500, 3), // repeated instant
        (2, 499, 0),
        (2, 700, 0), // repeated instant, queue grew
        (62, 0, 12),
        (63, 0, 0),
        (120, 10_000, 1),
    ];

    for &(offset, waiting, active) in series {
        let sample = est.update(t0() + Duration::seconds(offset), &[snapshot("q", waiting, active)]);
        assert!(sample.per_minute.is_finite(), "rate must be finite");
        assert!(sample.per_minute >= 0.0, "rate must not be negative");
    }
    assert!(est.average_per_minute().is_finite());
    assert!(est.average_per_minute() >= 0.0);
}

#[test]
fn totals_are_summed_across_queues() {
    let mut est = RateEstimator::new();
    est.update(
        t0(),
        &[snapshot("thumbs", 60, 2), snapshot("exif", 40, 3)],
    );

    // 100 -> 70 across both queues.
    let sample = est.update(
        t0() + Duration::seconds(60),
        &[snapshot("thumbs", 50, 2), snapshot("exif", 20, 3)],
    );

    assert_eq!(sample.per_minute, 30.0);
    assert_eq!(est.processed_since_start(), 30);
}

#[test]
fn negative_waiting_counts_are_clamped() {
    let mut est = RateEstimator::new();
    est.update(t0(), &[snapshot("thumbs", 10, 0), snapshot("bad", -50, 0)]);

    // Clamped baseline is 10, so a clean drain reports 10, not 60.
    let sample = est.update(
        t0() + Duration::seconds(60),
        &[snapshot("thumbs", 0, 0), snapshot("bad", -50, 0)],
    );

    assert_eq!(sample.per_minute, 10.0);
    assert_eq!(est.processed_since_start(), 10);
}

#[test]
fn history_evicts_samples_older_than_one_hour_inclusive() {
    let mut est = RateEstimator::new();
    est.update(t0(), &[snapshot("q", 10_000, 1)]);

    // One sample every 10 minutes for two hours.
    for i in 1..=12 {
        let now = t0() + Duration::minutes(10 * i);
        est.update(now, &[snapshot("q", 10_000 - 10 * i, 1)]);
    }

    let last = t0() + Duration::minutes(120);
    let cutoff = last - Duration::hours(1);

    assert!(est.history().all(|s| s.at >= cutoff));
    // The sample exactly at the cutoff survives.
    assert!(est.history().any(|s| s.at == cutoff));
    assert_eq!(est.history_len(), 7);
}

#[test]
fn average_uses_at_most_the_ten_newest_samples() {
    let mut est = RateEstimator::new();
    est.update(t0(), &[snapshot("q", 10_000, 0)]);

    // 15 samples, each draining 1..=15 jobs over a minute: rates 1..=15.
    let mut waiting = 10_000;
    for i in 1..=15_i64 {
        waiting -= i;
        est.update(t0() + Duration::minutes(i), &[snapshot("q", waiting, 0)]);
    }

    // Mean of rates 6..=15.
    let expected = (6..=15).sum::<i64>() as f64 / 10.0;
    assert_eq!(est.average_per_minute(), expected);
}

#[test]
fn average_is_zero_with_no_history() {
    let est = RateEstimator::new();
    assert_eq!(est.average_per_minute(), 0.0);
}
