//! Calendar helpers for rule and UNTIL dates.
//!
//! Everything is proleptic Gregorian and leans on `chrono::NaiveDate`, which
//! comfortably covers the `MIN_YEAR..=MAX_UNTIL_YEAR` sentinel range.

use chrono::{Datelike, Duration, NaiveDate, Weekday};

use crate::types::DaySpec;

/// Days between 0001-01-01 (day 1 of the common era) and 1970-01-01.
const UNIX_EPOCH_DAYS_FROM_CE: i64 = 719_163;

pub fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

pub fn days_in_month(year: i32, month: u32) -> u32 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 if is_leap_year(year) => 29,
        2 => 28,
        _ => 0,
    }
}

/// Concrete date selected by `spec` in `year`/`month`.
///
/// `Sun>=N`, `Sun<=N` and `lastSun` may land in a neighbouring month (or
/// year); the returned date reflects that shift. `None` means `spec` names
/// a day that does not exist, such as `Feb 30`.
pub fn occurrence(year: i32, month: u32, spec: DaySpec) -> Option<NaiveDate> {
    match spec {
        DaySpec::Day(day) => NaiveDate::from_ymd_opt(year, month, day),
        DaySpec::Last(wd) => {
            let last = NaiveDate::from_ymd_opt(year, month, days_in_month(year, month))?;
            Some(last - Duration::days(days_back(last.weekday(), wd)))
        }
        DaySpec::OnOrAfter(wd, day) => {
            let limit = NaiveDate::from_ymd_opt(year, month, day)?;
            Some(limit + Duration::days(days_back(wd, limit.weekday())))
        }
        DaySpec::OnOrBefore(wd, day) => {
            let limit = NaiveDate::from_ymd_opt(year, month, day)?;
            Some(limit - Duration::days(days_back(limit.weekday(), wd)))
        }
    }
}

/// Days to step back from a `from` weekday to reach `to` (0..=6).
fn days_back(from: Weekday, to: Weekday) -> i64 {
    let from = from.num_days_from_monday() as i64;
    let to = to.num_days_from_monday() as i64;
    (from - to).rem_euclid(7)
}

/// Seconds since the Unix epoch for a date plus a (possibly >24h) time of day.
pub fn epoch_seconds(date: NaiveDate, seconds_of_day: i32) -> i64 {
    let days = date.num_days_from_ce() as i64 - UNIX_EPOCH_DAYS_FROM_CE;
    days * 86_400 + seconds_of_day as i64
}

/// Whether `spec` in `month` can select a date in another year.
pub fn may_leave_year(month: u32, spec: DaySpec) -> bool {
    match spec {
        DaySpec::OnOrAfter(_, day) => month == 12 && day > 25,
        DaySpec::OnOrBefore(_, day) => month == 1 && day < 7,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn last_sunday_of_march() {
        assert_eq!(occurrence(2025, 3, DaySpec::Last(Weekday::Sun)), Some(ymd(2025, 3, 30)));
        assert_eq!(occurrence(2020, 3, DaySpec::Last(Weekday::Sun)), Some(ymd(2020, 3, 29)));
    }

    #[test]
    fn on_or_after_can_cross_into_next_month() {
        assert_eq!(occurrence(2020, 11, DaySpec::OnOrAfter(Weekday::Sun, 1)), Some(ymd(2020, 11, 1)));
        // 2021-04-30 is a Friday; the next Sunday is in May.
        assert_eq!(occurrence(2021, 4, DaySpec::OnOrAfter(Weekday::Sun, 30)), Some(ymd(2021, 5, 2)));
    }

    #[test]
    fn on_or_before_steps_backwards() {
        // 2024-10-25 is a Friday.
        assert_eq!(occurrence(2024, 10, DaySpec::OnOrBefore(Weekday::Sun, 25)), Some(ymd(2024, 10, 20)));
        assert_eq!(occurrence(2024, 10, DaySpec::OnOrBefore(Weekday::Fri, 25)), Some(ymd(2024, 10, 25)));
    }

    #[test]
    fn exact_day_must_exist() {
        assert_eq!(occurrence(2023, 2, DaySpec::Day(29)), None);
        assert_eq!(occurrence(2024, 2, DaySpec::Day(29)), Some(ymd(2024, 2, 29)));
    }

    #[test]
    fn epoch_seconds_matches_known_instants() {
        assert_eq!(epoch_seconds(ymd(1970, 1, 1), 0), 0);
        // 2025-03-30 is epoch day 20177.
        assert_eq!(epoch_seconds(ymd(2025, 3, 30), 3600), 20_177 * 86_400 + 3600);
        assert_eq!(epoch_seconds(ymd(1969, 12, 31), 25 * 3600), 3600);
    }

    #[test]
    fn sentinel_years_are_representable() {
        assert!(occurrence(crate::types::MIN_YEAR, 1, DaySpec::Day(1)).is_some());
        assert!(occurrence(crate::types::MAX_UNTIL_YEAR, 12, DaySpec::Last(Weekday::Sun)).is_some());
    }

    #[test]
    fn year_leaving_specs_are_detected() {
        assert!(may_leave_year(12, DaySpec::OnOrAfter(Weekday::Sun, 29)));
        assert!(may_leave_year(1, DaySpec::OnOrBefore(Weekday::Sun, 1)));
        assert!(!may_leave_year(12, DaySpec::Last(Weekday::Sun)));
        assert!(!may_leave_year(3, DaySpec::OnOrAfter(Weekday::Sun, 29)));
    }
}
