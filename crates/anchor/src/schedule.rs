//! Wall-clock cadence for the anchor path: fires at `:00` and `:30`
//! past every hour, UTC, rather than on a fixed interval from process
//! start — so every stack instance anchors in lockstep regardless of when
//! it happened to boot.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

const PERIOD_SECS: u64 = 30 * 60;

/// How long to sleep from `now` until the next `:00`/`:30` boundary.
pub fn duration_until_next_boundary(now: SystemTime) -> Duration {
    let since_epoch = now.duration_since(UNIX_EPOCH).unwrap_or_default();
    let secs = since_epoch.as_secs();
    let into_period = secs % PERIOD_SECS;
    let remaining_secs = if into_period == 0 && since_epoch.subsec_nanos() == 0 {
        0
    } else {
        PERIOD_SECS - into_period
    };
    Duration::from_secs(remaining_secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fires_in_thirty_minutes_from_the_top_of_the_hour() {
        let at = UNIX_EPOCH + Duration::from_secs(0);
        assert_eq!(duration_until_next_boundary(at), Duration::from_secs(0));
    }

    #[test]
    fn fires_at_the_half_hour_mark() {
        let at = UNIX_EPOCH + Duration::from_secs(10 * 60);
        assert_eq!(
            duration_until_next_boundary(at),
            Duration::from_secs(20 * 60)
        );
    }

    #[test]
    fn fires_at_the_next_hour_from_just_past_the_half_hour() {
        let at = UNIX_EPOCH + Duration::from_secs(31 * 60);
        assert_eq!(
            duration_until_next_boundary(at),
            Duration::from_secs(29 * 60)
        );
    }
}
