use std::collections::HashSet;

use chrono::{Datelike, Duration, NaiveDate, Weekday};

fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Working days in the inclusive range, skipping weekends and holidays.
/// An inverted range counts as zero. Runs in time bounded by the holiday
/// set, not by the length of the range.
pub fn business_days(from: NaiveDate, to: NaiveDate, holidays: &HashSet<NaiveDate>) -> i32 {
    if from > to {
        return 0;
    }

    let span = (to - from).num_days() + 1;
    let full_weeks = span / 7;
    // at most six trailing days after the whole weeks
    let tail = from
        .checked_add_signed(Duration::days(full_weeks * 7))
        .map_or(0, |start| {
            start
                .iter_days()
                .take((span % 7) as usize)
                .filter(|d| !is_weekend(*d))
                .count()
        }) as i64;
    let closed = holidays
        .iter()
        .filter(|d| **d >= from && **d <= to && !is_weekend(**d))
        .count() as i64;

    i32::try_from(full_weeks * 5 + tail - closed).unwrap_or(i32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn counts_weekdays_only() {
        // Mon 2026-10-19 .. Sun 2026-10-25
        assert_eq!(business_days(date("2026-10-19"), date("2026-10-25"), &HashSet::new()), 5);
        assert_eq!(business_days(date("2026-10-24"), date("2026-10-25"), &HashSet::new()), 0);
    }

    #[test]
    fn skips_holidays_inside_range() {
        let holidays = HashSet::from([date("2026-12-25")]);
        // Thu 24th, Fri 25th (holiday), Mon 28th
        assert_eq!(business_days(date("2026-12-24"), date("2026-12-28"), &holidays), 2);
    }

    #[test]
    fn matches_day_by_day_count() {
        let holidays = HashSet::from([date("2026-10-21"), date("2026-10-31"), date("2026-11-03")]);
        for start in 0..7 {
            let from = date("2026-10-19") + Duration::days(start);
            for len in 0..40 {
                let to = from + Duration::days(len);
                let expected = from
                    .iter_days()
                    .take_while(|d| *d <= to)
                    .filter(|d| !is_weekend(*d) && !holidays.contains(d))
                    .count() as i32;
                assert_eq!(business_days(from, to, &holidays), expected, "{from} .. {to}");
            }
        }
    }

    #[test]
    fn huge_ranges_are_counted_without_walking_them() {
        let days = business_days(NaiveDate::MIN, NaiveDate::MAX, &HashSet::new());
        let span = (NaiveDate::MAX - NaiveDate::MIN).num_days() + 1;
        assert!((i64::from(days) - span * 5 / 7).abs() <= 5);
    }

    #[test]
    fn single_day_and_inverted_ranges() {
        assert_eq!(business_days(date("2026-10-20"), date("2026-10-20"), &HashSet::new()), 1);
        assert_eq!(business_days(date("2026-10-22"), date("2026-10-20"), &HashSet::new()), 0);
    }
}
