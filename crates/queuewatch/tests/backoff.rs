use queuewatch::poll::backoff::{next_delay_seconds, BackoffConfig};
use rand::rngs::StdRng;
use rand::SeedableRng;

#[test]
fn delay_doubles_per_consecutive_failure() {
    let cfg = BackoffConfig {
        base_seconds: 2,
        max_seconds: 600,
        jitter_pct: 0.0, // deterministic test
    };
    let mut rng = StdRng::seed_from_u64(7);

    let delays: Vec<i64> = (1..=5)
        .map(|n| next_delay_seconds(n, &cfg, &mut rng))
        .collect();
    assert_eq!(delays, vec![2, 4, 8, 16, 32]);
}

#[test]
fn delay_is_capped() {
    let cfg = BackoffConfig {
        base_seconds: 2,
        max_seconds: 15,
        jitter_pct: 0.0,
    };
    let mut rng = StdRng::seed_from_u64(7);

    assert_eq!(next_delay_seconds(10, &cfg, &mut rng), 15);
    // An absurd failure count must not overflow either.
    assert_eq!(next_delay_seconds(u32::MAX, &cfg, &mut rng), 15);
}

#[test]
fn jitter_stays_inside_its_band() {
    let cfg = BackoffConfig {
        base_seconds: 10,
        max_seconds: 600,
        jitter_pct: 0.2,
    };
    let mut rng = StdRng::seed_from_u64(42);

    for _ in 0..200 {
        let delay = next_delay_seconds(1, &cfg, &mut rng);
        assert!((8..=12).contains(&delay), "delay {delay} outside jitter band");
    }
}

#[test]
fn zeroth_failure_is_treated_as_the_first() {
    let cfg = BackoffConfig {
        base_seconds: 3,
        max_seconds: 600,
        jitter_pct: 0.0,
    };
    let mut rng = StdRng::seed_from_u64(7);

    assert_eq!(next_delay_seconds(0, &cfg, &mut rng), 3);
}
