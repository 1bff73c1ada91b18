//! Date parser implementation
//!
//! Parses dates from epoch seconds, named synonyms, format-string dates
//! (default `m/d/Y`) and ISO-8601. Format strings use the taskrc tokens:
//! `m`/`d` match one or two digits, `M`/`D` exactly two, `y` a two-digit
//! year (2000-based), `Y` four digits, `H`/`N`/`S` two-digit time parts.
//! Anything else in the format must match literally.

use std::str::FromStr;

use chrono::{DateTime, Datelike, NaiveDate, Timelike, Utc, Weekday};
use chrono_tz::Tz;

use crate::date::{synonyms::DateSynonym, DateParsing};
use crate::error::DateError;
use crate::nibbler::Nibbler;

/// Main date parser implementation
#[derive(Debug, Clone)]
pub struct DateParser {
    /// Timezone in which day boundaries are computed (defaults to UTC)
    timezone: Tz,
    /// Format string from `dateformat`
    date_format: String,
    /// First day of the week, from `weekstart`
    weekstart: Weekday,
}

impl Default for DateParser {
    fn default() -> Self {
        Self::new()
    }
}

impl DateParser {
    /// Create a parser with the default `m/d/Y` format and Sunday weeks.
    pub fn new() -> Self {
        Self {
            timezone: Tz::UTC,
            date_format: "m/d/Y".to_string(),
            weekstart: Weekday::Sun,
        }
    }

    /// Create a parser with a specific timezone
    pub fn with_timezone(timezone: Tz) -> Self {
        Self {
            timezone,
            ..Self::new()
        }
    }

    /// Override the format string (the `dateformat` setting).
    pub fn set_format(&mut self, format: &str) {
        self.date_format = format.to_string();
    }

    /// Override the first day of the week (the `weekstart` setting).
    pub fn set_weekstart(&mut self, weekstart: Weekday) {
        self.weekstart = weekstart;
    }

    pub fn weekstart(&self) -> Weekday {
        self.weekstart
    }

    fn naive_to_utc(&self, naive: chrono::NaiveDateTime) -> Result<DateTime<Utc>, DateError> {
        use chrono::TimeZone;
        self.timezone
            .from_local_datetime(&naive)
            .single()
            .map(|t| t.with_timezone(&Utc))
            .ok_or_else(|| DateError::Timezone {
                message: "Ambiguous local date".to_string(),
            })
    }

    /// The calendar day containing `now`, in this parser's timezone,
    /// expressed as a UTC instant at local midnight.
    fn local_midnight(&self, now: DateTime<Utc>) -> Result<DateTime<Utc>, DateError> {
        let local = now.with_timezone(&self.timezone);
        self.naive_to_utc(
            local
                .date_naive()
                .and_hms_opt(0, 0, 0)
                .ok_or_else(|| DateError::OutOfRange {
                    input: now.to_string(),
                })?,
        )
    }

    fn next_weekday(
        &self,
        now: DateTime<Utc>,
        target: Weekday,
    ) -> Result<DateTime<Utc>, DateError> {
        let today = self.local_midnight(now)?;
        let current = now.with_timezone(&self.timezone).weekday();
        let mut ahead = (target.num_days_from_monday() as i64
            - current.num_days_from_monday() as i64
            + 7)
            % 7;
        if ahead == 0 {
            ahead = 7;
        }
        Ok(today + chrono::Duration::days(ahead))
    }

    fn start_of_quarter(
        &self,
        now: DateTime<Utc>,
        quarter: u32,
    ) -> Result<DateTime<Utc>, DateError> {
        let local = now.with_timezone(&self.timezone);
        let month = (quarter - 1) * 3 + 1;
        let naive = NaiveDate::from_ymd_opt(local.year(), month, 1)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .ok_or_else(|| DateError::OutOfRange {
                input: format!("q{quarter}"),
            })?;
        self.naive_to_utc(naive)
    }
}

impl DateParsing for DateParser {
    fn parse_date(&self, input: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>, DateError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(DateError::InvalidFormat {
                input: input.to_string(),
            });
        }

        // Named synonym
        if let Ok(date) = self.parse_synonym(input, now) {
            return Ok(date);
        }

        // Raw epoch seconds, as stored in the data files
        if input.bytes().all(|b| b.is_ascii_digit()) {
            let secs: i64 = input.parse().map_err(|_| DateError::OutOfRange {
                input: input.to_string(),
            })?;
            return crate::date::from_epoch(secs).ok_or_else(|| DateError::OutOfRange {
                input: input.to_string(),
            });
        }

        // Configured format
        if let Ok(date) = self.parse_with_format(input, &self.date_format) {
            return Ok(date);
        }

        // ISO-8601
        let mut n = Nibbler::new(input);
        if let Some(date) = n.get_date_iso() {
            if n.depleted() {
                let naive = date.naive_utc();
                return self.naive_to_utc(naive);
            }
        }

        Err(DateError::InvalidFormat {
            input: input.to_string(),
        })
    }

    fn parse_synonym(&self, synonym: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>, DateError> {
        let parsed = DateSynonym::from_str(synonym).map_err(|_| DateError::UnknownSynonym {
            synonym: synonym.to_string(),
        })?;

        if let Some(weekday) = parsed.weekday() {
            return self.next_weekday(now, weekday);
        }

        let today = self.local_midnight(now)?;
        let day = chrono::Duration::days(1);

        match parsed {
            DateSynonym::Now => Ok(now),
            DateSynonym::Today | DateSynonym::Sod => Ok(today),
            DateSynonym::Yesterday => Ok(today - day),
            DateSynonym::Tomorrow | DateSynonym::Eod => Ok(today + day),
            DateSynonym::Sow => Ok(crate::date::start_of_week(today, self.weekstart)),
            DateSynonym::Eow => {
                Ok(crate::date::start_of_week(today, self.weekstart) + chrono::Duration::days(7))
            }
            DateSynonym::Som => Ok(crate::date::start_of_month(today)),
            DateSynonym::Eom => crate::date::add_months(crate::date::start_of_month(today), 1)
                .map_err(|_| DateError::OutOfRange {
                    input: synonym.to_string(),
                }),
            DateSynonym::Soy => Ok(crate::date::start_of_year(today)),
            DateSynonym::Eoy => crate::date::add_years(crate::date::start_of_year(today), 1)
                .map_err(|_| DateError::OutOfRange {
                    input: synonym.to_string(),
                }),
            DateSynonym::Q1 => self.start_of_quarter(now, 1),
            DateSynonym::Q2 => self.start_of_quarter(now, 2),
            DateSynonym::Q3 => self.start_of_quarter(now, 3),
            DateSynonym::Q4 => self.start_of_quarter(now, 4),
            _ => unreachable!("weekdays handled above"),
        }
    }

    fn parse_with_format(&self, input: &str, format: &str) -> Result<DateTime<Utc>, DateError> {
        let mut n = Nibbler::new(input);
        let mut month: Option<u32> = None;
        let mut day: Option<u32> = None;
        let mut year: Option<i32> = None;
        let mut hour: u32 = 0;
        let mut minute: u32 = 0;
        let mut second: u32 = 0;

        let fail = || DateError::InvalidFormat {
            input: input.to_string(),
        };

        for token in format.chars() {
            match token {
                'm' => month = Some(get_flex_digits(&mut n, 1, 12).ok_or_else(fail)? as u32),
                'd' => day = Some(get_flex_digits(&mut n, 1, 31).ok_or_else(fail)? as u32),
                'M' => month = Some(get_two_digits(&mut n, 1, 12).ok_or_else(fail)? as u32),
                'D' => day = Some(get_two_digits(&mut n, 1, 31).ok_or_else(fail)? as u32),
                'y' => year = Some(get_two_digits(&mut n, 0, 99).ok_or_else(fail)? as i32 + 2000),
                'Y' => {
                    let rest = 4;
                    let mut value = 0i32;
                    for _ in 0..rest {
                        let c = n.get_any_char().ok_or_else(fail)?;
                        let digit = c.to_digit(10).ok_or_else(fail)?;
                        value = value * 10 + digit as i32;
                    }
                    year = Some(value);
                }
                'H' => hour = get_two_digits(&mut n, 0, 23).ok_or_else(fail)? as u32,
                'N' => minute = get_two_digits(&mut n, 0, 59).ok_or_else(fail)? as u32,
                'S' => second = get_two_digits(&mut n, 0, 59).ok_or_else(fail)? as u32,
                literal => {
                    if !n.skip(literal) {
                        return Err(fail());
                    }
                }
            }
        }

        if !n.depleted() {
            return Err(fail());
        }

        let (year, month, day) = match (year, month, day) {
            (Some(y), Some(m), Some(d)) => (y, m, d),
            _ => return Err(fail()),
        };

        let naive = NaiveDate::from_ymd_opt(year, month, day)
            .and_then(|d| d.and_hms_opt(hour, minute, second))
            .ok_or_else(fail)?;
        self.naive_to_utc(naive)
    }

    fn format_date(&self, date: DateTime<Utc>) -> String {
        let local = date.with_timezone(&self.timezone);
        let mut out = String::new();
        for token in self.date_format.chars() {
            match token {
                'm' => out.push_str(&local.month().to_string()),
                'd' => out.push_str(&local.day().to_string()),
                'M' => out.push_str(&format!("{:02}", local.month())),
                'D' => out.push_str(&format!("{:02}", local.day())),
                'y' => out.push_str(&format!("{:02}", local.year() % 100)),
                'Y' => out.push_str(&format!("{:04}", local.year())),
                'H' => out.push_str(&format!("{:02}", local.hour())),
                'N' => out.push_str(&format!("{:02}", local.minute())),
                'S' => out.push_str(&format!("{:02}", local.second())),
                literal => out.push(literal),
            }
        }
        out
    }
}

/// One or two digits within an inclusive range.
fn get_flex_digits(n: &mut Nibbler, min: u64, max: u64) -> Option<u64> {
    n.save();
    let value = n.get_uint()?;
    if value < min || value > max {
        n.restore();
        return None;
    }
    Some(value)
}

/// Exactly two digits within an inclusive range.
fn get_two_digits(n: &mut Nibbler, min: u64, max: u64) -> Option<u64> {
    n.save();
    let a = n.get_any_char()?.to_digit(10);
    let b = n.get_any_char().and_then(|c| c.to_digit(10));
    match (a, b) {
        (Some(a), Some(b)) => {
            let value = (a * 10 + b) as u64;
            if value < min || value > max {
                n.restore();
                None
            } else {
                Some(value)
            }
        }
        _ => {
            n.restore();
            None
        }
    }
}
