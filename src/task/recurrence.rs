//! Recurrence engine
//!
//! A recurring parent (status `recurring`, a `due`, a `recur` period)
//! spawns concrete pending children over time. The parent's `mask`
//! records one character per occurrence: `-` materialized and pending,
//! `+` completed, `X` deleted, `?` unknown. A child points back with
//! `parent` and its `imask` index; only the parent holds authoritative
//! mask state.
//!
//! Calendar periods (months, quarters, years) step by calendar
//! arithmetic with day-of-month clamping, not by fixed seconds.

use chrono::{DateTime, Utc};
use log::{debug, warn};

use crate::date;
use crate::duration::Duration;
use crate::error::{DateError, ParseError};
use crate::nibbler::Nibbler;
use crate::task::model::{Task, TaskStatus};

/// A recurrence period. Second-based periods step by fixed arithmetic;
/// month- and year-based periods step by the calendar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recurrence {
    Seconds(i64),
    Months(i64),
    Years(i64),
}

impl Recurrence {
    /// Parse a `recur` value. Calendar units are recognized first; in a
    /// recurrence context `3m` means three months, unlike plain
    /// durations where `m` is minutes. Everything else falls back to
    /// the duration table.
    pub fn parse(input: &str) -> Result<Self, ParseError> {
        let trimmed = input.trim().to_lowercase();
        let invalid = || ParseError::InvalidRecurrence {
            period: input.to_string(),
        };

        let mut n = Nibbler::new(&trimmed);
        let ordinal = n.get_uint().unwrap_or(1) as i64;
        let unit = n.get_rest().unwrap_or_default();

        let calendar = match unit.as_str() {
            "m" | "mo" | "mos" | "mths" | "mnths" | "month" | "months" | "monthly" => {
                Some(Recurrence::Months(ordinal))
            }
            "bimonthly" => Some(Recurrence::Months(2 * ordinal)),
            "q" | "qtrs" | "qrtrs" | "quarter" | "quarters" | "quarterly" => {
                Some(Recurrence::Months(3 * ordinal))
            }
            "semiannual" => Some(Recurrence::Months(6 * ordinal)),
            "y" | "yr" | "yrs" | "year" | "years" | "yearly" | "annual" => {
                Some(Recurrence::Years(ordinal))
            }
            "biannual" | "biyearly" => Some(Recurrence::Years(2 * ordinal)),
            _ => None,
        };

        let recurrence = match calendar {
            Some(r) => r,
            None => {
                let duration = Duration::parse(&trimmed).map_err(|_| invalid())?;
                Recurrence::Seconds(duration.seconds())
            }
        };

        let positive = match recurrence {
            Recurrence::Seconds(n) => n > 0,
            Recurrence::Months(n) => n > 0,
            Recurrence::Years(n) => n > 0,
        };
        if !positive {
            return Err(invalid());
        }

        Ok(recurrence)
    }

    /// The due date one period after `from`.
    pub fn next(&self, from: DateTime<Utc>) -> Result<DateTime<Utc>, DateError> {
        match self {
            Recurrence::Seconds(secs) => Ok(from + chrono::Duration::seconds(*secs)),
            Recurrence::Months(months) => date::add_months(from, *months),
            Recurrence::Years(years) => date::add_years(from, *years),
        }
    }
}

/// Mask characters.
pub const MASK_PENDING: char = '-';
pub const MASK_COMPLETED: char = '+';
pub const MASK_DELETED: char = 'X';
pub const MASK_UNKNOWN: char = '?';

/// Compute the due-date sequence for a recurring parent, as of `now`.
///
/// Generation stops at the first date past `now` that is not already
/// covered by the mask, or past `until` when one is set.
pub fn due_sequence(parent: &Task, now: DateTime<Utc>) -> Result<Vec<DateTime<Utc>>, DateError> {
    let due = parent.get_date("due").ok_or_else(|| DateError::InvalidFormat {
        input: parent.get("due").unwrap_or("").to_string(),
    })?;
    let recur = Recurrence::parse(parent.get("recur").unwrap_or("")).map_err(|_| {
        DateError::InvalidFormat {
            input: parent.get("recur").unwrap_or("").to_string(),
        }
    })?;
    let until = parent.get_date("until");
    let mask_len = parent.get("mask").map(|m| m.chars().count()).unwrap_or(0);

    let mut dates = Vec::new();
    let mut date = due;
    loop {
        if until.is_some_and(|u| date > u) {
            break;
        }
        if date > now && dates.len() >= mask_len {
            break;
        }
        dates.push(date);
        date = recur.next(date)?;
    }
    Ok(dates)
}

/// Materialize any overdue child occurrences for a recurring parent.
/// The parent's mask grows one `-` per new child; the children are
/// returned for the caller to add to the working set.
pub fn materialize_children(
    parent: &mut Task,
    now: DateTime<Utc>,
) -> Result<Vec<Task>, DateError> {
    let dates = due_sequence(parent, now)?;
    let mut mask: String = parent.get("mask").unwrap_or("").to_string();
    let mut children = Vec::new();

    for (index, due) in dates.iter().enumerate() {
        if index < mask.chars().count() {
            continue;
        }
        mask.push(MASK_PENDING);
        children.push(spawn_child(parent, index, *due));
    }

    if !children.is_empty() {
        parent.set("mask", &mask);
        debug!(
            "materialized {} occurrence(s) for recurring task {}",
            children.len(),
            parent.uuid().map(|u| u.to_string()).unwrap_or_default()
        );
    }
    if mask.chars().count() > 10_000 {
        warn!(
            "recurring task {} has {} mask entries",
            parent.uuid().map(|u| u.to_string()).unwrap_or_default(),
            mask.chars().count()
        );
    }

    Ok(children)
}

/// One concrete occurrence of a recurring parent.
fn spawn_child(parent: &Task, index: usize, due: DateTime<Utc>) -> Task {
    let mut child = parent.duplicate();
    child.set_status(TaskStatus::Pending);
    child.remove("mask");
    child.remove("wait");
    if let Some(uuid) = parent.uuid() {
        child.set("parent", &uuid.to_string());
    }
    child.set("imask", &index.to_string());
    child.set_date("due", due);
    child
}

/// Propagate a child's terminal transition into the parent's mask.
pub fn update_parent_mask(parent: &mut Task, imask: usize, status: TaskStatus) {
    let code = match status {
        TaskStatus::Completed => MASK_COMPLETED,
        TaskStatus::Deleted => MASK_DELETED,
        TaskStatus::Pending | TaskStatus::Waiting => MASK_PENDING,
        TaskStatus::Recurring => MASK_UNKNOWN,
    };

    let mut mask: Vec<char> = parent.get("mask").unwrap_or("").chars().collect();
    while mask.len() <= imask {
        mask.push(MASK_UNKNOWN);
    }
    mask[imask] = code;
    parent.set("mask", &mask.iter().collect::<String>());
}

/// A parent whose `until` has passed and whose occurrences are all
/// resolved has nothing left to spawn; it is deleted on load.
pub fn parent_has_expired(parent: &Task, now: DateTime<Utc>) -> bool {
    if parent.status() != TaskStatus::Recurring {
        return false;
    }
    let Some(until) = parent.get_date("until") else {
        return false;
    };
    if until > now {
        return false;
    }
    !parent
        .get("mask")
        .unwrap_or("")
        .chars()
        .any(|c| c == MASK_PENDING)
}
