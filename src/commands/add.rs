//! The add and log commands
//!
//! `add` creates a pending task from the modification args; `log`
//! records an already-completed one. A `recur` modification turns the
//! new task into a recurring parent template.

use crate::commands::{apply_dependency_edits, CommandOutcome, Modification};
use crate::context::Session;
use crate::error::{TaskError, ValidationError};
use crate::task::{Task, TaskStatus};

/// Create a pending (or waiting, or recurring) task.
pub fn add(session: &mut Session, modifications: &[String]) -> Result<CommandOutcome, TaskError> {
    let modification = Modification::parse(modifications);
    let description = modification
        .description()
        .ok_or(ValidationError::EmptyDescription)?;

    let mut task = Task::new(&description, session.env.now);
    let mut warnings = modification.apply(&mut task, session)?;
    apply_dependency_edits(session, &mut task, &modification)?;

    if task.has("recur") {
        task.set_status(TaskStatus::Recurring);
        if !task.has("due") {
            return Err(ValidationError::RecurringWithoutDue.into());
        }
    }

    task.validate().map_err(TaskError::from)?;

    let id = session.db.add_task(task.clone());
    let mut outcome = CommandOutcome {
        affected: 1,
        feedback: Vec::new(),
        tasks: vec![session.db.get_by_id(id).cloned().unwrap_or(task)],
    };
    outcome.note(format!("Created task {id}"));
    outcome.feedback.append(&mut warnings);
    Ok(outcome)
}

/// Record a task that is already done: completed on entry.
pub fn log(session: &mut Session, modifications: &[String]) -> Result<CommandOutcome, TaskError> {
    let modification = Modification::parse(modifications);
    let description = modification
        .description()
        .ok_or(ValidationError::EmptyDescription)?;

    let mut task = Task::new(&description, session.env.now);
    let mut warnings = modification.apply(&mut task, session)?;
    task.complete(session.env.now);
    task.validate().map_err(TaskError::from)?;

    session.db.add_task(task.clone());
    session.db.gc()?;
    let mut outcome = CommandOutcome {
        affected: 1,
        feedback: Vec::new(),
        tasks: vec![task],
    };
    outcome.note("Logged task".to_string());
    outcome.feedback.append(&mut warnings);
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::tests_support::test_session;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn add_builds_task_from_mods() {
        let (_dir, mut session) = test_session();
        let outcome = add(
            &mut session,
            &args(&["project:Home", "priority:H", "Buy", "milk"]),
        )
        .unwrap();
        assert_eq!(outcome.affected, 1);

        let task = session.db.get_by_id(1).unwrap();
        assert_eq!(task.description(), "Buy milk");
        assert_eq!(task.get("project"), Some("Home"));
        assert_eq!(task.get("priority"), Some("H"));
        assert_eq!(task.status(), TaskStatus::Pending);
        assert_eq!(task.get_date("entry"), Some(session.env.now));
    }

    #[test]
    fn add_requires_a_description() {
        let (_dir, mut session) = test_session();
        let err = add(&mut session, &args(&["project:Home"])).unwrap_err();
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn add_with_recur_becomes_recurring_parent() {
        let (_dir, mut session) = test_session();
        add(
            &mut session,
            &args(&["due:tomorrow", "recur:weekly", "Water", "plants"]),
        )
        .unwrap();
        let task = session.db.get_by_id(1).unwrap();
        assert_eq!(task.status(), TaskStatus::Recurring);

        let err = add(&mut session, &args(&["recur:weekly", "No", "due"])).unwrap_err();
        assert!(matches!(
            err,
            TaskError::Validation {
                source: ValidationError::RecurringWithoutDue
            }
        ));
    }

    #[test]
    fn add_with_future_wait_is_waiting() {
        let (_dir, mut session) = test_session();
        add(&mut session, &args(&["wait:tomorrow", "Mail", "letter"])).unwrap();
        let task = session.db.get_by_id(1).unwrap();
        assert_eq!(task.status(), TaskStatus::Waiting);
    }

    #[test]
    fn log_creates_completed_task() {
        let (_dir, mut session) = test_session();
        log(&mut session, &args(&["Paid", "the", "rent"])).unwrap();
        // GC already moved it out of the pending set.
        assert!(session.db.pending_tasks().is_empty());
        let task = session.db.completed_tasks().first().unwrap();
        assert_eq!(task.status(), TaskStatus::Completed);
        assert_eq!(task.get_date("end"), Some(session.env.now));
    }
}
