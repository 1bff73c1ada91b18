//! Urgency scoring
//!
//! Urgency is a weighted sum of component scores, each in [0, 1].
//! Coefficients come from `urgency.<component>.coefficient` settings
//! with documented defaults; given equal task state, configuration
//! snapshot and clock, the score is always the same.

use chrono::{DateTime, Utc};

use crate::config::Configuration;
use crate::deps;
use crate::task::{Priority, Task, TaskStatus};

/// Coefficients captured from configuration at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct UrgencySnapshot {
    pub priority: f64,
    pub project: f64,
    pub active: f64,
    pub waiting: f64,
    pub blocked: f64,
    pub blocking: f64,
    pub annotations: f64,
    pub tags: f64,
    pub next: f64,
    pub due: f64,
    pub age: f64,
}

impl Default for UrgencySnapshot {
    fn default() -> Self {
        Self {
            priority: 6.0,
            project: 1.0,
            active: 4.0,
            waiting: -3.0,
            blocked: -5.0,
            blocking: 8.0,
            annotations: 1.0,
            tags: 1.0,
            next: 15.0,
            due: 12.0,
            age: 2.0,
        }
    }
}

impl UrgencySnapshot {
    /// Read every coefficient, falling back to its default.
    pub fn from_config(config: &Configuration) -> Self {
        let defaults = Self::default();
        Self {
            priority: config.urgency_coefficient("priority", defaults.priority),
            project: config.urgency_coefficient("project", defaults.project),
            active: config.urgency_coefficient("active", defaults.active),
            waiting: config.urgency_coefficient("waiting", defaults.waiting),
            blocked: config.urgency_coefficient("blocked", defaults.blocked),
            blocking: config.urgency_coefficient("blocking", defaults.blocking),
            annotations: config.urgency_coefficient("annotations", defaults.annotations),
            tags: config.urgency_coefficient("tags", defaults.tags),
            next: config.urgency_coefficient("next", defaults.next),
            due: config.urgency_coefficient("due", defaults.due),
            age: config.urgency_coefficient("age", defaults.age),
        }
    }

    /// Compute the urgency of a task, with blocked/blocking already
    /// derived from the working set.
    pub fn score(
        &self,
        task: &Task,
        now: DateTime<Utc>,
        blocked: bool,
        blocking: bool,
    ) -> f64 {
        let mut urgency = 0.0;
        urgency += self.priority * priority_score(task);
        urgency += self.project * if task.project().is_some_and(|p| !p.is_empty()) { 1.0 } else { 0.0 };
        urgency += self.active * if task.is_active() { 1.0 } else { 0.0 };
        urgency += self.waiting * if task.status() == TaskStatus::Waiting { 1.0 } else { 0.0 };
        urgency += self.blocked * if blocked { 1.0 } else { 0.0 };
        urgency += self.blocking * if blocking { 1.0 } else { 0.0 };
        urgency += self.annotations * capped_thirds(task.annotation_count());
        urgency += self.tags * capped_thirds(task.tag_count());
        urgency += self.next * if task.has_tag("next") { 1.0 } else { 0.0 };
        urgency += self.due * due_score(task, now);
        urgency += self.age * age_score(task, now);
        urgency
    }
}

/// Convenience wrapper deriving blocked/blocking from the working set.
pub fn urgency(
    task: &Task,
    tasks: &[Task],
    snapshot: &UrgencySnapshot,
    now: DateTime<Utc>,
) -> f64 {
    let blocked = deps::is_blocked(task, tasks);
    let blocking = deps::is_blocking(task, tasks);
    snapshot.score(task, now, blocked, blocking)
}

fn priority_score(task: &Task) -> f64 {
    match task.priority() {
        Some(Priority::High) => 1.0,
        Some(Priority::Medium) => 0.65,
        Some(Priority::Low) => 0.3,
        None => 0.0,
    }
}

/// min(count, 3) / 3: the first three items matter, further ones don't.
fn capped_thirds(count: usize) -> f64 {
    (count.min(3) as f64) / 3.0
}

/// Piecewise linear ramp: 1.0 when a week or more overdue, falling to
/// 0.2 at fourteen days out, flat 0.2 beyond.
fn due_score(task: &Task, now: DateTime<Utc>) -> f64 {
    let Some(due) = task.get_date("due") else {
        return 0.0;
    };
    let days_overdue = (now - due).num_seconds() as f64 / 86_400.0;
    if days_overdue >= 7.0 {
        1.0
    } else if days_overdue >= -14.0 {
        ((days_overdue + 14.0) * 0.8 / 21.0) + 0.2
    } else {
        0.2
    }
}

/// Tasks gather urgency with age, saturating after a year.
fn age_score(task: &Task, now: DateTime<Utc>) -> f64 {
    let Some(entry) = task.get_date("entry") else {
        return 0.0;
    };
    let days = (now - entry).num_seconds() as f64 / 86_400.0;
    (days / 365.0).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
    }

    fn now() -> DateTime<Utc> {
        at(2024, 1, 22)
    }

    #[test]
    fn bare_task_scores_near_zero() {
        let task = Task::new("plain", now());
        let snapshot = UrgencySnapshot::default();
        let score = snapshot.score(&task, now(), false, false);
        assert!(score.abs() < 1e-9);
    }

    #[test]
    fn component_weights_accumulate() {
        let snapshot = UrgencySnapshot::default();
        let mut task = Task::new("loaded", now());
        task.set("priority", "H");
        assert!((snapshot.score(&task, now(), false, false) - 6.0).abs() < 1e-9);

        task.set("project", "Home");
        assert!((snapshot.score(&task, now(), false, false) - 7.0).abs() < 1e-9);

        task.add_tag("next").unwrap();
        // next (15.0) plus one tag (1/3 of 1.0).
        let expected = 6.0 + 1.0 + 15.0 + 1.0 / 3.0;
        assert!((snapshot.score(&task, now(), false, false) - expected).abs() < 1e-9);
    }

    #[test]
    fn due_ramp_boundaries() {
        let snapshot = UrgencySnapshot::default();
        let mut task = Task::new("due test", now());

        // A week or more overdue pins the component at its maximum.
        task.set_date("due", now() - chrono::Duration::days(10));
        assert!((snapshot.score(&task, now(), false, false) - 12.0).abs() < 1e-9);

        // Due right now sits on the ramp.
        task.set_date("due", now());
        let on_ramp = snapshot.score(&task, now(), false, false);
        assert!(on_ramp > 12.0 * 0.2 && on_ramp < 12.0);

        // Far future flattens to 0.2.
        task.set_date("due", now() + chrono::Duration::days(30));
        assert!((snapshot.score(&task, now(), false, false) - 12.0 * 0.2).abs() < 1e-9);
    }

    #[test]
    fn blocked_is_negative_blocking_is_positive() {
        let snapshot = UrgencySnapshot::default();
        let task = Task::new("graph", now());
        assert!((snapshot.score(&task, now(), true, false) - -5.0).abs() < 1e-9);
        assert!((snapshot.score(&task, now(), false, true) - 8.0).abs() < 1e-9);
    }

    #[test]
    fn age_saturates_after_a_year() {
        let snapshot = UrgencySnapshot::default();
        let old = Task::new("ancient", now() - chrono::Duration::days(900));
        assert!((snapshot.score(&old, now(), false, false) - 2.0).abs() < 1e-9);

        let young = Task::new("fresh", now() - chrono::Duration::days(36));
        let expected = 2.0 * 36.0 / 365.0;
        assert!((snapshot.score(&young, now(), false, false) - expected).abs() < 1e-6);
    }

    #[test]
    fn annotation_and_tag_caps() {
        let snapshot = UrgencySnapshot::default();
        let mut task = Task::new("capped", now());
        for i in 0..5 {
            task.add_tag(&format!("t{i}")).unwrap();
            task.add_annotation(now() + chrono::Duration::seconds(i), "note");
        }
        // Both components cap at 1.0 each.
        let score = snapshot.score(&task, now(), false, false);
        assert!((score - 2.0).abs() < 1e-9);
    }

    #[test]
    fn coefficients_come_from_config() {
        let mut config = Configuration::default();
        config.set("urgency.priority.coefficient", "0");
        let snapshot = UrgencySnapshot::from_config(&config);

        let mut task = Task::new("deprioritized", now());
        task.set("priority", "H");
        assert!(snapshot.score(&task, now(), false, false).abs() < 1e-9);
    }

    #[test]
    fn equal_state_equal_score() {
        let snapshot = UrgencySnapshot::default();
        let mut a = Task::new("same", now());
        a.set("priority", "M");
        a.set_date("due", now() + chrono::Duration::days(2));
        let b = a.clone();
        assert_eq!(
            snapshot.score(&a, now(), false, false),
            snapshot.score(&b, now(), false, false)
        );
    }
}
