//! Time bucketing: mapping timestamps to their enclosing ISO week interval.
//!
//! The week interval `[Monday 00:00:00, Sunday 23:59:59]` is the stable
//! document key granularity for every measurement collection, used both when
//! choosing a bucket on ingestion and when filtering buckets on queries.

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime};

/// Returns the ISO week interval containing `datetime`: the Monday at
/// 00:00:00 and the following Sunday at 23:59:59. Pure and total.
pub fn week_period(datetime: NaiveDateTime) -> (NaiveDateTime, NaiveDateTime) {
    week_period_of_day(datetime.date())
}

/// [`week_period`] for a plain calendar date.
pub fn week_period_of_day(day: NaiveDate) -> (NaiveDateTime, NaiveDateTime) {
    let monday = day - Duration::days(day.weekday().num_days_from_monday() as i64);
    let sunday = monday + Duration::days(6);
    (monday.and_time(NaiveTime::MIN), sunday.and_time(end_of_day()))
}

/// Returns the inclusive datetime bounds of a calendar day,
/// `[00:00:00, 23:59:59]`.
pub fn day_bounds(day: NaiveDate) -> (NaiveDateTime, NaiveDateTime) {
    (day.and_time(NaiveTime::MIN), day.and_time(end_of_day()))
}

fn end_of_day() -> NaiveTime {
    NaiveTime::from_hms_opt(23, 59, 59).expect("23:59:59 is a valid time")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Weekday;
    use rstest::rstest;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[rstest]
    // Monday maps to its own week
    #[case(date(2020, 1, 27), date(2020, 1, 27), date(2020, 2, 2))]
    // mid-week
    #[case(date(2020, 1, 29), date(2020, 1, 27), date(2020, 2, 2))]
    // Sunday is the last day of the week, not the first of the next
    #[case(date(2020, 2, 2), date(2020, 1, 27), date(2020, 2, 2))]
    // year boundary: 2019-12-31 belongs to the week starting Monday 2019-12-30
    #[case(date(2019, 12, 31), date(2019, 12, 30), date(2020, 1, 5))]
    // leap day
    #[case(date(2020, 2, 29), date(2020, 2, 24), date(2020, 3, 1))]
    fn week_period_bounds(
        #[case] input: NaiveDate,
        #[case] expected_monday: NaiveDate,
        #[case] expected_sunday: NaiveDate,
    ) {
        let (start, end) = week_period_of_day(input);
        assert_eq!(start.date(), expected_monday);
        assert_eq!(end.date(), expected_sunday);
        assert_eq!(start.time(), NaiveTime::MIN);
        assert_eq!(end.time(), NaiveTime::from_hms_opt(23, 59, 59).unwrap());
    }

    #[test]
    fn every_day_falls_within_its_own_week() {
        let mut day = date(2019, 12, 1);
        let last = date(2020, 3, 1);
        while day <= last {
            let (start, end) = week_period_of_day(day);
            assert_eq!(start.weekday(), Weekday::Mon);
            assert_eq!(end.weekday(), Weekday::Sun);
            let midday = day.and_hms_opt(12, 0, 0).unwrap();
            assert!(start <= midday && midday <= end, "{} outside its week", day);
            day = day.succ_opt().unwrap();
        }
    }

    #[test]
    fn datetime_variant_matches_date_variant() {
        let dt = date(2020, 1, 29).and_hms_opt(17, 30, 12).unwrap();
        assert_eq!(week_period(dt), week_period_of_day(date(2020, 1, 29)));
    }

    #[test]
    fn day_bounds_are_inclusive_full_day() {
        let (start, end) = day_bounds(date(2020, 1, 27));
        assert_eq!(start, date(2020, 1, 27).and_hms_opt(0, 0, 0).unwrap());
        assert_eq!(end, date(2020, 1, 27).and_hms_opt(23, 59, 59).unwrap());
    }
}
