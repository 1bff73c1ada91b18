//! Duration parsing and formatting
//!
//! Durations are signed second counts parsed from `<number><unit>`
//! strings such as `3d`, `2wks` or `quarterly`. The unit may be any
//! alias in the table below, or a unique prefix of one. A bare `-`
//! parses to zero.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ParseError;
use crate::nibbler::Nibbler;

const SECONDS_PER_DAY: i64 = 86_400;

/// Unit aliases and their second values. Calendar-flavored units use the
/// fixed approximations the data files have always used (30-day months,
/// 91-day quarters, 365-day years).
const UNITS: &[(&str, i64)] = &[
    ("annual", 365 * SECONDS_PER_DAY),
    ("biannual", 730 * SECONDS_PER_DAY),
    ("bimonthly", 61 * SECONDS_PER_DAY),
    ("biweekly", 14 * SECONDS_PER_DAY),
    ("biyearly", 730 * SECONDS_PER_DAY),
    ("daily", SECONDS_PER_DAY),
    ("days", SECONDS_PER_DAY),
    ("day", SECONDS_PER_DAY),
    ("d", SECONDS_PER_DAY),
    ("fortnight", 14 * SECONDS_PER_DAY),
    ("hours", 3_600),
    ("hrs", 3_600),
    ("hr", 3_600),
    ("h", 3_600),
    ("minutes", 60),
    ("mins", 60),
    ("min", 60),
    ("m", 60),
    ("mnths", 30 * SECONDS_PER_DAY),
    ("monthly", 30 * SECONDS_PER_DAY),
    ("months", 30 * SECONDS_PER_DAY),
    ("month", 30 * SECONDS_PER_DAY),
    ("mos", 30 * SECONDS_PER_DAY),
    ("mo", 30 * SECONDS_PER_DAY),
    ("mths", 30 * SECONDS_PER_DAY),
    ("quarterly", 91 * SECONDS_PER_DAY),
    ("quarters", 91 * SECONDS_PER_DAY),
    ("qrtrs", 91 * SECONDS_PER_DAY),
    ("qtrs", 91 * SECONDS_PER_DAY),
    ("q", 91 * SECONDS_PER_DAY),
    ("seconds", 1),
    ("secs", 1),
    ("sec", 1),
    ("s", 1),
    ("semiannual", 183 * SECONDS_PER_DAY),
    ("sennight", 7 * SECONDS_PER_DAY),
    ("weekdays", SECONDS_PER_DAY),
    ("weekly", 7 * SECONDS_PER_DAY),
    ("weeks", 7 * SECONDS_PER_DAY),
    ("wks", 7 * SECONDS_PER_DAY),
    ("wk", 7 * SECONDS_PER_DAY),
    ("w", 7 * SECONDS_PER_DAY),
    ("yearly", 365 * SECONDS_PER_DAY),
    ("years", 365 * SECONDS_PER_DAY),
    ("yrs", 365 * SECONDS_PER_DAY),
    ("yr", 365 * SECONDS_PER_DAY),
    ("y", 365 * SECONDS_PER_DAY),
];

/// A signed duration, stored as a magnitude plus sign flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Duration {
    secs: u64,
    negative: bool,
}

impl Duration {
    /// Construct from a signed second count.
    pub fn from_seconds(seconds: i64) -> Self {
        if seconds < 0 {
            Self {
                secs: seconds.unsigned_abs(),
                negative: true,
            }
        } else {
            Self {
                secs: seconds as u64,
                negative: false,
            }
        }
    }

    /// The signed second count.
    pub fn seconds(&self) -> i64 {
        if self.negative {
            -(self.secs as i64)
        } else {
            self.secs as i64
        }
    }

    pub fn is_negative(&self) -> bool {
        self.negative
    }

    pub fn is_zero(&self) -> bool {
        self.secs == 0
    }

    /// Parse a duration string. Accepts an optional sign, an optional
    /// ordinal (default 1, decimals allowed), and a unit alias or
    /// unique unit prefix. A bare `-` yields zero.
    pub fn parse(input: &str) -> Result<Self, ParseError> {
        let trimmed = input.trim();
        if trimmed == "-" {
            return Ok(Self::from_seconds(0));
        }

        let lower = trimmed.to_lowercase();
        let mut n = Nibbler::new(&lower);

        let negative = n.skip('-');
        if !negative {
            n.skip('+');
        }

        let ordinal = n.get_number().unwrap_or(1.0);
        let unit = n.get_rest().unwrap_or_default();
        if !n.depleted() || ordinal < 0.0 {
            return Err(ParseError::UnknownDuration {
                input: input.to_string(),
            });
        }

        let unit_secs = Self::resolve_unit(&unit, input)?;
        let total = (ordinal * unit_secs as f64) as i64;
        Ok(Self {
            secs: total.unsigned_abs(),
            negative: negative && total != 0,
        })
    }

    /// Look up a unit alias, falling back to unique-prefix completion.
    /// A prefix is unique when every alias it matches has the same
    /// second value.
    fn resolve_unit(unit: &str, original: &str) -> Result<i64, ParseError> {
        if unit.is_empty() {
            return Err(ParseError::UnknownDuration {
                input: original.to_string(),
            });
        }

        if let Some((_, secs)) = UNITS.iter().find(|(alias, _)| *alias == unit) {
            return Ok(*secs);
        }

        let mut candidates = UNITS
            .iter()
            .filter(|(alias, _)| alias.starts_with(unit))
            .map(|(_, secs)| *secs);

        match candidates.next() {
            None => Err(ParseError::UnknownDuration {
                input: original.to_string(),
            }),
            Some(first) => {
                if candidates.all(|secs| secs == first) {
                    Ok(first)
                } else {
                    Err(ParseError::AmbiguousDuration {
                        input: original.to_string(),
                        unit: unit.to_string(),
                    })
                }
            }
        }
    }

    /// Compact human form: `3d`, `2wk`, `1.1y`, or `-` for zero.
    pub fn format_compact(&self) -> String {
        let sign = if self.negative { "-" } else { "" };
        let secs = self.secs;
        let days = secs as f64 / SECONDS_PER_DAY as f64;

        if secs >= 365 * SECONDS_PER_DAY as u64 {
            format!("{sign}{:.1}y", days / 365.0)
        } else if secs >= 84 * SECONDS_PER_DAY as u64 {
            format!("{sign}{}mo", (days / 30.6) as i64)
        } else if secs >= 13 * SECONDS_PER_DAY as u64 {
            format!("{sign}{}wk", (days / 7.0) as i64)
        } else if secs >= SECONDS_PER_DAY as u64 {
            format!("{sign}{}d", days as i64)
        } else if secs >= 3_600 {
            format!("{sign}{}h", secs / 3_600)
        } else if secs >= 60 {
            format!("{sign}{}m", secs / 60)
        } else if secs >= 1 {
            format!("{sign}{secs}s")
        } else {
            "-".to_string()
        }
    }
}

impl fmt::Display for Duration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.seconds())
    }
}

impl FromStr for Duration {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl PartialOrd for Duration {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Duration {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.seconds().cmp(&other.seconds())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn simple_units() {
        assert_eq!(Duration::parse("5s").unwrap().seconds(), 5);
        assert_eq!(Duration::parse("3m").unwrap().seconds(), 180);
        assert_eq!(Duration::parse("2h").unwrap().seconds(), 7_200);
        assert_eq!(Duration::parse("1d").unwrap().seconds(), 86_400);
        assert_eq!(Duration::parse("2w").unwrap().seconds(), 1_209_600);
    }

    #[test]
    fn word_units() {
        assert_eq!(Duration::parse("weekly").unwrap().seconds(), 604_800);
        assert_eq!(Duration::parse("sennight").unwrap().seconds(), 604_800);
        assert_eq!(Duration::parse("fortnight").unwrap().seconds(), 1_209_600);
        assert_eq!(
            Duration::parse("monthly").unwrap().seconds(),
            30 * 86_400
        );
        assert_eq!(
            Duration::parse("quarterly").unwrap().seconds(),
            91 * 86_400
        );
        assert_eq!(
            Duration::parse("semiannual").unwrap().seconds(),
            183 * 86_400
        );
        assert_eq!(Duration::parse("yearly").unwrap().seconds(), 365 * 86_400);
        assert_eq!(
            Duration::parse("biannual").unwrap().seconds(),
            730 * 86_400
        );
    }

    #[test]
    fn ordinal_defaults_to_one() {
        assert_eq!(Duration::parse("day").unwrap().seconds(), 86_400);
        assert_eq!(Duration::parse("4days").unwrap().seconds(), 4 * 86_400);
    }

    #[test]
    fn bare_dash_is_zero() {
        let d = Duration::parse("-").unwrap();
        assert!(d.is_zero());
        assert!(!d.is_negative());
    }

    #[test]
    fn negative_durations() {
        let d = Duration::parse("-3d").unwrap();
        assert!(d.is_negative());
        assert_eq!(d.seconds(), -3 * 86_400);
    }

    #[test]
    fn prefix_completion() {
        // "mont" only reaches month/months/monthly, all 30 days.
        assert_eq!(Duration::parse("3mont").unwrap().seconds(), 90 * 86_400);
        // "se" reaches seconds, semiannual and sennight: ambiguous.
        assert_matches!(
            Duration::parse("2se"),
            Err(ParseError::AmbiguousDuration { .. })
        );
    }

    #[test]
    fn unknown_unit_rejected() {
        assert_matches!(
            Duration::parse("3parsecs"),
            Err(ParseError::UnknownDuration { .. })
        );
        assert_matches!(Duration::parse(""), Err(ParseError::UnknownDuration { .. }));
    }

    #[test]
    fn compact_formatting() {
        assert_eq!(Duration::parse("2d").unwrap().format_compact(), "2d");
        assert_eq!(Duration::parse("3w").unwrap().format_compact(), "3wk");
        assert_eq!(
            Duration::from_seconds(400 * 86_400).format_compact(),
            "1.1y"
        );
        assert_eq!(Duration::from_seconds(0).format_compact(), "-");
        assert_eq!(Duration::from_seconds(-7_200).format_compact(), "-2h");
    }

    #[test]
    fn display_is_signed_seconds() {
        assert_eq!(Duration::parse("-2h").unwrap().to_string(), "-7200");
        assert_eq!(Duration::parse("90s").unwrap().to_string(), "90");
    }

    #[test]
    fn ordering_respects_sign() {
        let neg = Duration::parse("-1d").unwrap();
        let pos = Duration::parse("1h").unwrap();
        assert!(neg < pos);
    }
}
