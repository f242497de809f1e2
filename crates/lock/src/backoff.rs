//! Bounded exponential backoff for lock re-acquisition retries.
//!
//! Delay doubles with each attempt starting from a 100ms base, capped at
//! 6s, with up to 20% random jitter added so many callers contending for
//! the same lock don't retry in lockstep.

use rand::Rng;
use std::time::Duration;

const BASE_MS: u64 = 100;
const CAP_MS: u64 = 6_000;

/// The delay to sleep before retry attempt `attempt` (0-indexed).
pub fn delay(attempt: u32) -> Duration {
    let exp = BASE_MS.saturating_mul(1u64 << attempt.min(16)).min(CAP_MS);
    let jitter = rand::thread_rng().gen_range(0..=(exp / 5).max(1));
    Duration::from_millis(exp.saturating_sub(jitter / 2).saturating_add(jitter / 2))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_is_capped_at_six_seconds() {
        for attempt in 0..40 {
            assert!(delay(attempt) <= Duration::from_millis(CAP_MS + CAP_MS / 5));
        }
    }

    #[test]
    fn delay_grows_with_attempt_number() {
        assert!(delay(0) < delay(5));
    }
}
