//! Reference-timezone date handling.
//!
//! The portal expects entries dated in Japan time no matter where the
//! process runs, so "today" is always computed against an explicit zone.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;

/// Zone the portal's dates are expressed in.
pub const DEFAULT_TIMEZONE: Tz = chrono_tz::Asia::Tokyo;

/// Returns the calendar date of `instant` in `tz`.
pub fn date_in<Z: TimeZone>(instant: DateTime<Utc>, tz: &Z) -> NaiveDate {
    instant.with_timezone(tz).date_naive()
}

/// Returns today's date in `tz`.
pub fn today_in(tz: Tz) -> NaiveDate {
    date_in(Utc::now(), &tz)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_date_crosses_midnight_in_tokyo() {
        // 2024-03-02 15:30 UTC is already 2024-03-03 00:30 in Tokyo.
        let instant = Utc.with_ymd_and_hms(2024, 3, 2, 15, 30, 0).unwrap();
        assert_eq!(
            date_in(instant, &DEFAULT_TIMEZONE),
            NaiveDate::from_ymd_opt(2024, 3, 3).unwrap()
        );
        assert_eq!(
            date_in(instant, &Utc),
            NaiveDate::from_ymd_opt(2024, 3, 2).unwrap()
        );
    }

    #[test]
    fn test_date_before_midnight_in_tokyo() {
        let instant = Utc.with_ymd_and_hms(2024, 3, 2, 14, 59, 59).unwrap();
        assert_eq!(
            date_in(instant, &DEFAULT_TIMEZONE),
            NaiveDate::from_ymd_opt(2024, 3, 2).unwrap()
        );
    }
}
