//! Read-only commands
//!
//! These select and aggregate tasks for an external renderer: nothing
//! here mutates the task set or commits.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::context::Session;
use crate::error::TaskError;
use crate::expr::Filter;
use crate::io;
use crate::task::{Task, TaskStatus};

/// `list`: pending tasks matching the filter, most urgent first.
/// Waiting tasks and recurring parent templates are hidden.
pub fn list(session: &Session, filter: &Filter) -> Result<Vec<Task>, TaskError> {
    let mut tasks: Vec<Task> = session
        .filtered_pending(filter)?
        .into_iter()
        .filter(|t| t.status() == TaskStatus::Pending)
        .collect();
    tasks.sort_by(|a, b| {
        session
            .urgency_of(b)
            .partial_cmp(&session.urgency_of(a))
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    Ok(tasks)
}

/// `info`: every matching task from the working set, unsorted.
pub fn info(session: &Session, filter: &Filter) -> Result<Vec<Task>, TaskError> {
    session.filtered_pending(filter)
}

/// `all`: matching tasks across pending and completed files.
pub fn all(session: &mut Session, filter: &Filter) -> Result<Vec<Task>, TaskError> {
    session.db.ensure_completed_loaded()?;
    session.filtered_all(filter)
}

/// `export`: matching tasks (pending and completed) as a JSON array.
pub fn export(session: &mut Session, filter: &Filter) -> Result<String, TaskError> {
    let tasks = all(session, filter)?;
    io::export_json(&tasks)
}

/// `ids`: working-set IDs of matching pending tasks.
pub fn ids(session: &Session, filter: &Filter) -> Result<Vec<u32>, TaskError> {
    Ok(session
        .filtered_pending(filter)?
        .iter()
        .map(|t| t.id())
        .filter(|id| *id > 0)
        .collect())
}

/// `uuids`: UUIDs of matching pending tasks.
pub fn uuids(session: &Session, filter: &Filter) -> Result<Vec<Uuid>, TaskError> {
    Ok(session
        .filtered_pending(filter)?
        .iter()
        .filter_map(|t| t.uuid())
        .collect())
}

/// `projects`: project name to pending-task count.
pub fn projects(session: &Session, filter: &Filter) -> Result<BTreeMap<String, usize>, TaskError> {
    let mut counts = BTreeMap::new();
    for task in session.filtered_pending(filter)? {
        if let Some(project) = task.project() {
            if !project.is_empty() {
                *counts.entry(project.to_string()).or_insert(0) += 1;
            }
        }
    }
    Ok(counts)
}

/// `tags`: tag to pending-task count.
pub fn tags(session: &Session, filter: &Filter) -> Result<BTreeMap<String, usize>, TaskError> {
    let mut counts = BTreeMap::new();
    for task in session.filtered_pending(filter)? {
        for tag in task.tags() {
            *counts.entry(tag).or_insert(0) += 1;
        }
    }
    Ok(counts)
}

/// Aggregate statistics over the whole task set.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Stats {
    pub pending: usize,
    pub completed: usize,
    pub deleted: usize,
    pub waiting: usize,
    pub recurring: usize,
    pub total: usize,
    pub annotations: usize,
    pub unique_tags: usize,
    pub projects: usize,
    pub blocked: usize,
    pub blocking: usize,
    pub oldest_entry: Option<DateTime<Utc>>,
    pub newest_entry: Option<DateTime<Utc>>,
    pub average_age_days: f64,
}

/// `stats`: counts and ages across pending and completed files.
pub fn stats(session: &mut Session) -> Result<Stats, TaskError> {
    session.db.ensure_completed_loaded()?;

    let mut stats = Stats::default();
    let mut tag_set = std::collections::BTreeSet::new();
    let mut project_set = std::collections::BTreeSet::new();
    let mut age_total_days = 0.0;
    let mut aged = 0usize;

    let pending_set: Vec<Task> = session.db.pending_tasks().to_vec();
    for task in session.db.all_tasks() {
        stats.total += 1;
        match task.status() {
            TaskStatus::Pending => stats.pending += 1,
            TaskStatus::Completed => stats.completed += 1,
            TaskStatus::Deleted => stats.deleted += 1,
            TaskStatus::Waiting => stats.waiting += 1,
            TaskStatus::Recurring => stats.recurring += 1,
        }
        stats.annotations += task.annotation_count();
        for tag in task.tags() {
            tag_set.insert(tag);
        }
        if let Some(project) = task.project() {
            if !project.is_empty() {
                project_set.insert(project.to_string());
            }
        }
        if crate::deps::is_blocked(task, &pending_set) {
            stats.blocked += 1;
        }
        if crate::deps::is_blocking(task, &pending_set) {
            stats.blocking += 1;
        }
        if let Some(entry) = task.get_date("entry") {
            stats.oldest_entry = Some(match stats.oldest_entry {
                Some(oldest) if oldest <= entry => oldest,
                _ => entry,
            });
            stats.newest_entry = Some(match stats.newest_entry {
                Some(newest) if newest >= entry => newest,
                _ => entry,
            });
            age_total_days += (session.env.now - entry).num_seconds() as f64 / 86_400.0;
            aged += 1;
        }
    }

    stats.unique_tags = tag_set.len();
    stats.projects = project_set.len();
    if aged > 0 {
        stats.average_age_days = age_total_days / aged as f64;
    }
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::add::add;
    use crate::commands::done::done;
    use crate::commands::tests_support::test_session;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn filter(list: &[&str]) -> Filter {
        Filter::parse(&args(list)).unwrap()
    }

    #[test]
    fn list_sorts_by_urgency() {
        let (_dir, mut session) = test_session();
        add(&mut session, &args(&["low", "key"])).unwrap();
        add(&mut session, &args(&["priority:H", "+next", "on", "fire"])).unwrap();

        let tasks = list(&session, &filter(&[])).unwrap();
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].description(), "on fire");
    }

    #[test]
    fn list_hides_waiting_tasks() {
        let (_dir, mut session) = test_session();
        add(&mut session, &args(&["visible"])).unwrap();
        add(&mut session, &args(&["wait:tomorrow", "hidden"])).unwrap();

        let tasks = list(&session, &filter(&[])).unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].description(), "visible");
    }

    #[test]
    fn project_and_tag_aggregation() {
        let (_dir, mut session) = test_session();
        add(&mut session, &args(&["project:Home", "+diy", "a"])).unwrap();
        add(&mut session, &args(&["project:Home", "+diy", "+paint", "b"])).unwrap();
        add(&mut session, &args(&["project:Work", "c"])).unwrap();

        let projects = projects(&session, &filter(&[])).unwrap();
        assert_eq!(projects.get("Home"), Some(&2));
        assert_eq!(projects.get("Work"), Some(&1));

        let tags = tags(&session, &filter(&[])).unwrap();
        assert_eq!(tags.get("diy"), Some(&2));
        assert_eq!(tags.get("paint"), Some(&1));
    }

    #[test]
    fn ids_and_uuids() {
        let (_dir, mut session) = test_session();
        add(&mut session, &args(&["one"])).unwrap();
        add(&mut session, &args(&["two"])).unwrap();

        assert_eq!(ids(&session, &filter(&[])).unwrap(), vec![1, 2]);
        assert_eq!(uuids(&session, &filter(&[])).unwrap().len(), 2);
    }

    #[test]
    fn stats_counts_statuses() {
        let (_dir, mut session) = test_session();
        add(&mut session, &args(&["open"])).unwrap();
        add(&mut session, &args(&["closing"])).unwrap();
        done(&mut session, &filter(&["2"]), false, false).unwrap();

        let stats = stats(&mut session).unwrap();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.pending, 1);
        assert_eq!(stats.completed, 1);
        assert!(stats.average_age_days.abs() < 1e-9);
    }

    #[test]
    fn export_produces_json() {
        let (_dir, mut session) = test_session();
        add(&mut session, &args(&["exported"])).unwrap();
        let rendered = export(&mut session, &filter(&[])).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&rendered).unwrap();
        assert_eq!(parsed[0]["description"], "exported");
    }
}
