//! Wall-clock cadence helper for the Audit Engine's two periodic
//! activities: challenge generation ticks at `period` from the top
//! of the hour; the audit round ticks at the same `period` but offset by
//! half a period, so the two activities never compete for the same instant.
//!
//! Generalizes the anchor path's fixed `:00`/`:30` boundary (see
//! `chronicle-anchor`'s own `schedule.rs`) to an arbitrary configured period
//! and phase.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// How long to sleep from `now` until the next tick of a `period`-spaced,
/// `phase`-shifted cadence (ticks occur at `phase, phase+period,...` from
/// the Unix epoch).
pub fn duration_until_next_tick(now: SystemTime, period: Duration, phase: Duration) -> Duration {
    let period_secs = period.as_secs().max(1);
    let phase_secs = phase.as_secs() % period_secs;
    let secs = now.duration_since(UNIX_EPOCH).unwrap_or_default().as_secs();
    let period_start = secs - (secs % period_secs);
    let mut target = period_start + phase_secs;
    if target < secs {
        target += period_secs;
    }
    Duration::from_secs(target - secs)
}

/// The audit round's phase offset: half a period past the challenge
/// generation tick.
pub fn half_period_offset(period: Duration) -> Duration {
    period / 2
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fires_immediately_on_the_boundary() {
        let at = UNIX_EPOCH + Duration::from_secs(3600);
        assert_eq!(
            duration_until_next_tick(at, Duration::from_secs(3600), Duration::ZERO),
            Duration::from_secs(0)
        );
    }

    #[test]
    fn fires_at_the_next_hour_mark() {
        let at = UNIX_EPOCH + Duration::from_secs(10 * 60);
        assert_eq!(
            duration_until_next_tick(at, Duration::from_secs(3600), Duration::ZERO),
            Duration::from_secs(50 * 60)
        );
    }

    #[test]
    fn half_period_offset_splits_an_hour_into_two_ticks() {
        let period = Duration::from_secs(3600);
        let at = UNIX_EPOCH + Duration::from_secs(0);
        assert_eq!(
            duration_until_next_tick(at, period, half_period_offset(period)),
            Duration::from_secs(1800)
        );
        let past_half = UNIX_EPOCH + Duration::from_secs(1801);
        assert_eq!(
            duration_until_next_tick(past_half, period, half_period_offset(period)),
            Duration::from_secs(3599)
        );
    }
}
