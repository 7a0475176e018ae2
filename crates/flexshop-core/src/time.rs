//! Integer-minute time arithmetic, relative to a horizon's `start` instant.
//!
//! CP solvers work efficiently over bounded integer domains, and every
//! quantity in the data model (durations, calendar windows) is
//! minute-granular, so the constraint model is built entirely on an integer
//! minute axis with origin at `horizon.start`. This module is the only place
//! that conversion happens.

use crate::{Horizon, Instant};

/// Convert an instant to whole minutes elapsed since `reference`, rounding
/// down (floor division of the second-delta by 60).
///
/// `reference` is always a horizon's `start` in this crate's usage, but the
/// function itself is reference-agnostic.
pub fn to_minutes(instant: Instant, reference: Instant) -> i64 {
    instant.0.signed_duration_since(reference.0).num_seconds().div_euclid(60)
}

/// Convert a minute offset from `reference` back to an instant.
pub fn from_minutes(minutes: i64, reference: Instant) -> Instant {
    Instant(reference.0 + chrono::Duration::minutes(minutes))
}

/// The universal upper bound `H` for every time variable in the constraint
/// model: the horizon's end, expressed in minutes from its own start.
pub fn horizon_bound(horizon: &Horizon) -> i64 {
    to_minutes(horizon.end, horizon.start)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn instant(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> Instant {
        Instant(Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap())
    }

    #[test]
    fn to_minutes_is_zero_at_reference() {
        let r = instant(2025, 11, 3, 8, 0);
        assert_eq!(to_minutes(r, r), 0);
    }

    #[test]
    fn to_minutes_rounds_down() {
        let r = instant(2025, 11, 3, 8, 0);
        let t = Instant(r.0 + chrono::Duration::seconds(90));
        assert_eq!(to_minutes(t, r), 1);
    }

    #[test]
    fn from_minutes_round_trips_with_to_minutes() {
        let r = instant(2025, 11, 3, 8, 0);
        let t = instant(2025, 11, 3, 12, 30);
        let m = to_minutes(t, r);
        assert_eq!(from_minutes(m, r).0, t.0);
    }

    #[test]
    fn horizon_bound_is_span_in_minutes() {
        let h = Horizon {
            start: instant(2025, 11, 3, 8, 0),
            end: instant(2025, 11, 3, 16, 0),
        };
        assert_eq!(horizon_bound(&h), 8 * 60);
    }
}
