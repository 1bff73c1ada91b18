//! Date synonym definitions
//!
//! This module contains the enumeration of all supported date synonyms.
//! Resolution against a clock lives in the parser; this is just the
//! vocabulary.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Named dates accepted wherever a date is expected.
///
/// Boundary synonyms resolve to exclusive end instants: `eod` is the
/// next midnight, `eow`/`eom`/`eoy` are the first instant of the next
/// week/month/year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DateSynonym {
    // Absolute time references
    Now,
    Today,
    Sod,
    Yesterday,
    Tomorrow,

    // Day boundary
    Eod,

    // Week boundaries
    Sow,
    Eow,

    // Month boundaries
    Som,
    Eom,

    // Year boundaries
    Soy,
    Eoy,

    // Weekdays (resolve to the next occurrence, strictly in the future)
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,

    // Quarter starts
    Q1,
    Q2,
    Q3,
    Q4,
}

impl DateSynonym {
    /// Get all available date synonyms
    pub fn all() -> Vec<DateSynonym> {
        vec![
            DateSynonym::Now,
            DateSynonym::Today,
            DateSynonym::Sod,
            DateSynonym::Yesterday,
            DateSynonym::Tomorrow,
            DateSynonym::Eod,
            DateSynonym::Sow,
            DateSynonym::Eow,
            DateSynonym::Som,
            DateSynonym::Eom,
            DateSynonym::Soy,
            DateSynonym::Eoy,
            DateSynonym::Monday,
            DateSynonym::Tuesday,
            DateSynonym::Wednesday,
            DateSynonym::Thursday,
            DateSynonym::Friday,
            DateSynonym::Saturday,
            DateSynonym::Sunday,
            DateSynonym::Q1,
            DateSynonym::Q2,
            DateSynonym::Q3,
            DateSynonym::Q4,
        ]
    }

    /// Check if this synonym names a weekday
    pub fn weekday(&self) -> Option<chrono::Weekday> {
        match self {
            DateSynonym::Monday => Some(chrono::Weekday::Mon),
            DateSynonym::Tuesday => Some(chrono::Weekday::Tue),
            DateSynonym::Wednesday => Some(chrono::Weekday::Wed),
            DateSynonym::Thursday => Some(chrono::Weekday::Thu),
            DateSynonym::Friday => Some(chrono::Weekday::Fri),
            DateSynonym::Saturday => Some(chrono::Weekday::Sat),
            DateSynonym::Sunday => Some(chrono::Weekday::Sun),
            _ => None,
        }
    }
}

impl fmt::Display for DateSynonym {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DateSynonym::Now => "now",
            DateSynonym::Today => "today",
            DateSynonym::Sod => "sod",
            DateSynonym::Yesterday => "yesterday",
            DateSynonym::Tomorrow => "tomorrow",
            DateSynonym::Eod => "eod",
            DateSynonym::Sow => "sow",
            DateSynonym::Eow => "eow",
            DateSynonym::Som => "som",
            DateSynonym::Eom => "eom",
            DateSynonym::Soy => "soy",
            DateSynonym::Eoy => "eoy",
            DateSynonym::Monday => "monday",
            DateSynonym::Tuesday => "tuesday",
            DateSynonym::Wednesday => "wednesday",
            DateSynonym::Thursday => "thursday",
            DateSynonym::Friday => "friday",
            DateSynonym::Saturday => "saturday",
            DateSynonym::Sunday => "sunday",
            DateSynonym::Q1 => "q1",
            DateSynonym::Q2 => "q2",
            DateSynonym::Q3 => "q3",
            DateSynonym::Q4 => "q4",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for DateSynonym {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s_lower = s.to_lowercase();
        match s_lower.as_str() {
            "now" => Ok(DateSynonym::Now),
            "today" => Ok(DateSynonym::Today),
            "sod" => Ok(DateSynonym::Sod),
            "yesterday" => Ok(DateSynonym::Yesterday),
            "tomorrow" => Ok(DateSynonym::Tomorrow),
            "eod" => Ok(DateSynonym::Eod),
            "sow" => Ok(DateSynonym::Sow),
            "eow" => Ok(DateSynonym::Eow),
            "som" => Ok(DateSynonym::Som),
            "eom" => Ok(DateSynonym::Eom),
            "soy" => Ok(DateSynonym::Soy),
            "eoy" => Ok(DateSynonym::Eoy),
            "monday" | "mon" => Ok(DateSynonym::Monday),
            "tuesday" | "tue" => Ok(DateSynonym::Tuesday),
            "wednesday" | "wed" => Ok(DateSynonym::Wednesday),
            "thursday" | "thu" => Ok(DateSynonym::Thursday),
            "friday" | "fri" => Ok(DateSynonym::Friday),
            "saturday" | "sat" => Ok(DateSynonym::Saturday),
            "sunday" | "sun" => Ok(DateSynonym::Sunday),
            "q1" => Ok(DateSynonym::Q1),
            "q2" => Ok(DateSynonym::Q2),
            "q3" => Ok(DateSynonym::Q3),
            "q4" => Ok(DateSynonym::Q4),
            _ => Err(()),
        }
    }
}
