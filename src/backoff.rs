use std::time::Duration;

use rand::Rng;

/// Exponential growth is capped here before jitter is applied.
pub(crate) const MAX_BACKOFF_SECONDS: f64 = 60.0;

/// Computes the wait before retry number `attempt` (zero-based).
///
/// The capped exponential term is `min(backoff_factor * 2^attempt, 60.0)`;
/// `jitter_unit` (sampled from `[0, 1)`) adds up to 100% of that same term on
/// top, so the actual wait lands between 1x and 2x the capped value. The
/// jitter sample is passed in rather than drawn here, keeping the function
/// pure.
pub(crate) fn backoff_delay(attempt: u32, backoff_factor: f64, jitter_unit: f64) -> Duration {
    let exponent = attempt.min(1024) as i32;
    let capped = (backoff_factor * 2_f64.powi(exponent)).min(MAX_BACKOFF_SECONDS);
    let jitter = jitter_unit.clamp(0.0, 1.0) * capped;
    Duration::from_secs_f64(capped + jitter)
}

pub(crate) fn sample_jitter_unit() -> f64 {
    rand::rng().random::<f64>()
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{MAX_BACKOFF_SECONDS, backoff_delay, sample_jitter_unit};

    #[test]
    fn zero_jitter_matches_capped_exponential() {
        assert_eq!(backoff_delay(0, 1.0, 0.0), Duration::from_secs_f64(1.0));
        assert_eq!(backoff_delay(1, 1.0, 0.0), Duration::from_secs_f64(2.0));
        assert_eq!(backoff_delay(2, 1.0, 0.0), Duration::from_secs_f64(4.0));
        assert_eq!(backoff_delay(3, 0.5, 0.0), Duration::from_secs_f64(4.0));
    }

    #[test]
    fn zero_jitter_is_non_decreasing_until_the_cap() {
        let mut previous = Duration::ZERO;
        for attempt in 0..16 {
            let delay = backoff_delay(attempt, 1.0, 0.0);
            assert!(delay >= previous, "attempt {attempt} decreased the delay");
            previous = delay;
        }
        assert_eq!(previous, Duration::from_secs_f64(MAX_BACKOFF_SECONDS));
    }

    #[test]
    fn exponential_term_caps_at_sixty_seconds() {
        assert_eq!(
            backoff_delay(30, 1.0, 0.0),
            Duration::from_secs_f64(MAX_BACKOFF_SECONDS)
        );
        // Full jitter on top of the cap doubles it at most.
        assert_eq!(
            backoff_delay(30, 1.0, 1.0),
            Duration::from_secs_f64(MAX_BACKOFF_SECONDS * 2.0)
        );
    }

    #[test]
    fn jitter_stays_between_one_and_two_times_the_capped_value() {
        for _ in 0..256 {
            let delay = backoff_delay(2, 1.0, sample_jitter_unit());
            assert!(delay >= Duration::from_secs_f64(4.0));
            assert!(delay < Duration::from_secs_f64(8.0));
        }
    }

    #[test]
    fn huge_attempt_numbers_do_not_overflow() {
        assert_eq!(
            backoff_delay(u32::MAX, 1.0, 0.0),
            Duration::from_secs_f64(MAX_BACKOFF_SECONDS)
        );
    }
}
