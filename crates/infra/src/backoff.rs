//! The dispatcher's capped exponential backoff schedule.

use chrono::Duration as ChronoDuration;

/// Backoff floor for each attempt number, attempt 5 and beyond hold at the
/// final band. `attempt` is the attempt that just failed (1-indexed).
fn floor_seconds(attempt: i64) -> i64 {
    match attempt {
        1 => 30,
        2 => 120,
        3 => 300,
        4 => 900,
        _ => 1800,
    }
}

/// Computes the delay before the next attempt, given the attempt number that
/// just failed. Jitters up to +10% above the floor; never goes below it.
pub fn delay_for_attempt(attempt: i64) -> ChronoDuration {
    let floor = floor_seconds(attempt);
    let jitter = deterministic_jitter_fraction(attempt) * (floor as f64) * 0.10;
    ChronoDuration::seconds(floor + jitter.round() as i64)
}

/// Deterministic pseudo-jitter in `[0, 1)`, avoiding a dependency on a RNG
/// crate for what is a cosmetic smoothing of retry stampedes.
fn deterministic_jitter_fraction(attempt: i64) -> f64 {
    ((attempt as f64 * 37.0) % 100.0) / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn never_goes_below_the_band_floor() {
        for attempt in 1..=8 {
            let delay = delay_for_attempt(attempt);
            assert!(delay.num_seconds() >= floor_seconds(attempt));
        }
    }

    #[test]
    fn jitter_never_exceeds_ten_percent_above_floor() {
        for attempt in 1..=8 {
            let floor = floor_seconds(attempt);
            let delay = delay_for_attempt(attempt).num_seconds();
            assert!(delay <= floor + (floor / 10) + 1);
        }
    }

    #[test]
    fn schedule_matches_the_documented_bands() {
        assert_eq!(floor_seconds(1), 30);
        assert_eq!(floor_seconds(2), 120);
        assert_eq!(floor_seconds(3), 300);
        assert_eq!(floor_seconds(4), 900);
        assert_eq!(floor_seconds(5), 1800);
        assert_eq!(floor_seconds(6), 1800);
    }
}
