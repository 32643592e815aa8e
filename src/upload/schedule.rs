// sqlbackup/src/upload/schedule.rs
use chrono::{Datelike, NaiveDate, Weekday};

use crate::errors::{BackupError, Result};

/// When a finished run should push its artifacts to the remote server.
/// Parsed once from configuration; unknown values fail the load, so
/// `should_upload` never sees an invalid variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadSchedule {
    Daily,
    FirstDayOfMonth,
    LastDayOfMonth,
    Weekday(Weekday),
    NumericDay(u32),
}

impl UploadSchedule {
    pub fn parse(raw: &str) -> Result<Self> {
        let value = raw.trim().to_ascii_lowercase();
        let schedule = match value.as_str() {
            "daily" => UploadSchedule::Daily,
            "first_day" => UploadSchedule::FirstDayOfMonth,
            "last_day" => UploadSchedule::LastDayOfMonth,
            "monday" => UploadSchedule::Weekday(Weekday::Mon),
            "tuesday" => UploadSchedule::Weekday(Weekday::Tue),
            "wednesday" => UploadSchedule::Weekday(Weekday::Wed),
            "thursday" => UploadSchedule::Weekday(Weekday::Thu),
            "friday" => UploadSchedule::Weekday(Weekday::Fri),
            "saturday" => UploadSchedule::Weekday(Weekday::Sat),
            "sunday" => UploadSchedule::Weekday(Weekday::Sun),
            other => match other.parse::<u32>() {
                Ok(day) if (1..=31).contains(&day) => UploadSchedule::NumericDay(day),
                _ => {
                    return Err(BackupError::ConfigInvalid(format!(
                        "unknown upload_schedule '{}' (expected daily, first_day, last_day, \
                         a weekday name, or a day number 1-31)",
                        raw.trim()
                    )))
                }
            },
        };
        Ok(schedule)
    }
}

/// Pure scheduling decision: does `now` satisfy the schedule?
/// Months shorter than a configured numeric day simply never match; there
/// is no clamping to the month's end.
pub fn should_upload(schedule: &UploadSchedule, now: NaiveDate) -> bool {
    match schedule {
        UploadSchedule::Daily => true,
        UploadSchedule::FirstDayOfMonth => now.day() == 1,
        UploadSchedule::LastDayOfMonth => now.day() == last_day_of_month(now),
        UploadSchedule::Weekday(day) => now.weekday() == *day,
        UploadSchedule::NumericDay(day) => now.day() == *day,
    }
}

fn last_day_of_month(date: NaiveDate) -> u32 {
    let (year, month) = if date.month() == 12 {
        (date.year() + 1, 1)
    } else {
        (date.year(), date.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1)
        .and_then(|first_of_next| first_of_next.pred_opt())
        .map(|last| last.day())
        .unwrap_or(31)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn daily_always_uploads() {
        assert!(should_upload(&UploadSchedule::Daily, date(2026, 8, 30)));
        assert!(should_upload(&UploadSchedule::Daily, date(2026, 2, 1)));
    }

    #[test]
    fn first_day_matches_only_the_first() {
        let schedule = UploadSchedule::FirstDayOfMonth;
        assert!(should_upload(&schedule, date(2026, 3, 1)));
        assert!(!should_upload(&schedule, date(2026, 3, 2)));
    }

    #[test]
    fn last_day_accounts_for_leap_years() {
        let schedule = UploadSchedule::LastDayOfMonth;
        assert!(should_upload(&schedule, date(2024, 2, 29)));
        assert!(!should_upload(&schedule, date(2024, 2, 28)));
        assert!(should_upload(&schedule, date(2025, 2, 28)));
        assert!(should_upload(&schedule, date(2026, 12, 31)));
        assert!(!should_upload(&schedule, date(2026, 4, 29)));
    }

    #[test]
    fn numeric_day_never_clamps_in_short_months() {
        let schedule = UploadSchedule::NumericDay(31);
        assert!(!should_upload(&schedule, date(2026, 4, 30)));
        assert!(should_upload(&schedule, date(2026, 5, 31)));
        assert!(!should_upload(&schedule, date(2026, 2, 28)));
    }

    #[test]
    fn weekday_matches_the_named_day() {
        let schedule = UploadSchedule::Weekday(Weekday::Fri);
        // 2026-08-28 is a Friday, 2026-08-29 a Saturday.
        assert!(should_upload(&schedule, date(2026, 8, 28)));
        assert!(!should_upload(&schedule, date(2026, 8, 29)));
    }

    #[test]
    fn parse_accepts_the_documented_tokens() {
        assert_eq!(UploadSchedule::parse("daily").unwrap(), UploadSchedule::Daily);
        assert_eq!(
            UploadSchedule::parse("first_day").unwrap(),
            UploadSchedule::FirstDayOfMonth
        );
        assert_eq!(
            UploadSchedule::parse("LAST_DAY").unwrap(),
            UploadSchedule::LastDayOfMonth
        );
        assert_eq!(
            UploadSchedule::parse("Friday").unwrap(),
            UploadSchedule::Weekday(Weekday::Fri)
        );
        assert_eq!(
            UploadSchedule::parse("15").unwrap(),
            UploadSchedule::NumericDay(15)
        );
    }

    #[test]
    fn parse_fails_closed_on_unknown_values() {
        assert!(UploadSchedule::parse("fortnightly").is_err());
        assert!(UploadSchedule::parse("0").is_err());
        assert!(UploadSchedule::parse("32").is_err());
        assert!(UploadSchedule::parse("").is_err());
    }
}
