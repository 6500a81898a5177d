use rand::Rng;

/// Capped exponential backoff for consecutive fetch failures.
///
/// Off by default: failed fetches normally retry at the fixed poll
/// interval indefinitely. Enabling this suspends cycles for a growing,
/// jittered delay instead.
#[derive(Debug, Clone)]
pub struct BackoffConfig {
    pub base_seconds: i64,
    pub max_seconds: i64,
    pub jitter_pct: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            base_seconds: 2,
            max_seconds: 5 * 60,
            jitter_pct: 0.20,
        }
    }
}

pub fn next_delay_seconds(failure_no: u32, cfg: &BackoffConfig, rng: &mut impl Rng) -> i64 {
    let failure_no = failure_no.max(1);

    // exponent = failure_no - 1
    let exp = failure_no.saturating_sub(1);

    // Compute 2^exp safely. If exp is too large, treat multiplier as huge and let cap handle it.
    let pow2 = 1_i64.checked_shl(exp).unwrap_or(i64::MAX);

    // base * 2^(failure_no-1) with overflow protection
    let mut delay = cfg.base_seconds.saturating_mul(pow2);

    // cap
    if delay > cfg.max_seconds {
        delay = cfg.max_seconds;
    }

    // jitter in range [-jitter_pct, +jitter_pct]
    let jitter_range = (delay as f64) * cfg.jitter_pct;
    let jitter = if jitter_range > 0.0 {
        rng.gen_range(-jitter_range..=jitter_range)
    } else {
        0.0
    };

    let jittered = (delay as f64 + jitter).round() as i64;
    jittered.clamp(0, cfg.max_seconds)
}
