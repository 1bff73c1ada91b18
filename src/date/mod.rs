//! Date parsing and calendar arithmetic
//!
//! Dates are `chrono::DateTime<Utc>` values that round-trip through the
//! data files as epoch seconds. This module provides the parser (formats,
//! synonyms) and the calendar helpers the recurrence engine steps with.
//! Parsing never reads the system clock; callers pass the invocation's
//! `now` so every component computes from the same instant.

pub mod parser;
pub mod synonyms;

use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Timelike, Utc, Weekday};

use crate::error::DateError;

// Re-export main types
pub use parser::DateParser;
pub use synonyms::DateSynonym;

/// Trait for date parsing functionality
pub trait DateParsing {
    /// Parse a date string in any accepted form, relative to `now`.
    fn parse_date(&self, input: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>, DateError>;

    /// Parse a date synonym (now, today, monday, eom, ...) relative to `now`.
    fn parse_synonym(&self, synonym: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>, DateError>;

    /// Parse with an explicit format string such as `m/d/Y`.
    fn parse_with_format(&self, input: &str, format: &str) -> Result<DateTime<Utc>, DateError>;

    /// Format a date with this parser's format string.
    fn format_date(&self, date: DateTime<Utc>) -> String;
}

/// Convert epoch seconds to a date. Fails on out-of-range values.
pub fn from_epoch(secs: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_opt(secs, 0).single()
}

/// The date's epoch second count.
pub fn to_epoch(date: DateTime<Utc>) -> i64 {
    date.timestamp()
}

/// Midnight at the start of the date's day.
pub fn start_of_day(date: DateTime<Utc>) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.date_naive().and_hms_opt(0, 0, 0).unwrap_or_default())
}

/// Midnight at the start of the week containing `date`, where weeks
/// begin on `weekstart`.
pub fn start_of_week(date: DateTime<Utc>, weekstart: Weekday) -> DateTime<Utc> {
    let today = start_of_day(date);
    let offset = (7 + date.weekday().num_days_from_monday() as i64
        - weekstart.num_days_from_monday() as i64)
        % 7;
    today - Duration::days(offset)
}

/// Midnight on the first of the date's month.
pub fn start_of_month(date: DateTime<Utc>) -> DateTime<Utc> {
    let first = NaiveDate::from_ymd_opt(date.year(), date.month(), 1).unwrap_or_default();
    Utc.from_utc_datetime(&first.and_hms_opt(0, 0, 0).unwrap_or_default())
}

/// Midnight on January 1 of the date's year.
pub fn start_of_year(date: DateTime<Utc>) -> DateTime<Utc> {
    let first = NaiveDate::from_ymd_opt(date.year(), 1, 1).unwrap_or_default();
    Utc.from_utc_datetime(&first.and_hms_opt(0, 0, 0).unwrap_or_default())
}

/// True when both dates fall on the same calendar day.
pub fn same_day(a: DateTime<Utc>, b: DateTime<Utc>) -> bool {
    a.date_naive() == b.date_naive()
}

/// True when both dates fall in the same calendar month.
pub fn same_month(a: DateTime<Utc>, b: DateTime<Utc>) -> bool {
    a.year() == b.year() && a.month() == b.month()
}

/// True when both dates fall in the same calendar year.
pub fn same_year(a: DateTime<Utc>, b: DateTime<Utc>) -> bool {
    a.year() == b.year()
}

pub fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

/// Number of days in the given month.
pub fn days_in_month(year: i32, month: u32) -> u32 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 => {
            if is_leap_year(year) {
                29
            } else {
                28
            }
        }
        _ => 0,
    }
}

/// Step a date forward by calendar months, clamping the day of month to
/// the target month's maximum (Jan 31 + 1 month = Feb 28/29). The time
/// of day is preserved.
pub fn add_months(date: DateTime<Utc>, months: i64) -> Result<DateTime<Utc>, DateError> {
    let total = date.year() as i64 * 12 + date.month0() as i64 + months;
    let year = total.div_euclid(12) as i32;
    let month = total.rem_euclid(12) as u32 + 1;
    let day = date.day().min(days_in_month(year, month));

    let naive = NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|d| d.and_hms_opt(date.hour(), date.minute(), date.second()))
        .ok_or_else(|| DateError::OutOfRange {
            input: format!("{date} + {months} months"),
        })?;
    Ok(Utc.from_utc_datetime(&naive))
}

/// Step a date forward by calendar years, clamping Feb 29 to Feb 28 in
/// non-leap years.
pub fn add_years(date: DateTime<Utc>, years: i64) -> Result<DateTime<Utc>, DateError> {
    add_months(date, years * 12)
}

/// English month name, 1-based.
pub fn month_name(month: u32) -> &'static str {
    match month {
        1 => "January",
        2 => "February",
        3 => "March",
        4 => "April",
        5 => "May",
        6 => "June",
        7 => "July",
        8 => "August",
        9 => "September",
        10 => "October",
        11 => "November",
        12 => "December",
        _ => "",
    }
}

/// English day name.
pub fn day_name(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

/// Week number within the year, counting from the first week containing
/// January 1, with weeks starting on `weekstart`.
pub fn week_of_year(date: DateTime<Utc>, weekstart: Weekday) -> u32 {
    let jan1 = start_of_year(date);
    let first_week = start_of_week(jan1, weekstart);
    let days = (start_of_day(date) - first_week).num_days();
    (days / 7) as u32 + 1
}
