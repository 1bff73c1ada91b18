//! The delete command
//!
//! Marks the selected tasks deleted: sets `end`, flips status, pushes
//! `X` into a recurring parent's mask, and garbage-collects.

use crate::commands::done::update_parent_mask;
use crate::commands::{confirm_bulk_change, CommandOutcome};
use crate::context::Session;
use crate::error::TaskError;
use crate::expr::Filter;
use crate::task::TaskStatus;

pub fn delete(
    session: &mut Session,
    filter: &Filter,
    filter_was_empty: bool,
    confirmed: bool,
) -> Result<CommandOutcome, TaskError> {
    confirm_bulk_change(session, filter_was_empty, confirmed, "delete all tasks")?;

    let selected = session.filtered_pending(filter)?;
    let mut outcome = CommandOutcome::default();
    if selected.is_empty() {
        outcome.note("No tasks matched the filter".to_string());
        return Ok(outcome);
    }

    for mut task in selected {
        if task.status().is_terminal() {
            outcome.note(format!("Task {} is already {}", task.id(), task.status()));
            continue;
        }

        task.delete(session.env.now);
        update_parent_mask(session, &task, TaskStatus::Deleted)?;
        outcome.note(format!(
            "Deleted task {} '{}'",
            task.id(),
            task.description()
        ));
        session.db.apply(task)?;
        outcome.affected += 1;
    }

    session.db.gc()?;
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::add::add;
    use crate::commands::tests_support::test_session;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn filter(list: &[&str]) -> Filter {
        Filter::parse(&args(list)).unwrap()
    }

    #[test]
    fn delete_marks_and_collects() {
        let (_dir, mut session) = test_session();
        add(&mut session, &args(&["doomed"])).unwrap();
        add(&mut session, &args(&["spared"])).unwrap();

        let outcome = delete(&mut session, &filter(&["1"]), false, false).unwrap();
        assert_eq!(outcome.affected, 1);
        assert_eq!(session.db.pending_tasks().len(), 1);

        session.db.ensure_completed_loaded().unwrap();
        let deleted = session
            .db
            .completed_tasks()
            .iter()
            .find(|t| t.description() == "doomed")
            .unwrap();
        assert_eq!(deleted.status(), TaskStatus::Deleted);
        assert_eq!(deleted.get_date("end"), Some(session.env.now));
    }

    #[test]
    fn delete_everything_requires_confirmation() {
        let (_dir, mut session) = test_session();
        add(&mut session, &args(&["a"])).unwrap();
        let err = delete(&mut session, &filter(&[]), true, false).unwrap_err();
        assert!(matches!(err, TaskError::ConfirmationRequired { .. }));
    }

    #[test]
    fn empty_selection_is_a_warning_not_an_error() {
        let (_dir, mut session) = test_session();
        add(&mut session, &args(&["only"])).unwrap();
        let outcome = delete(&mut session, &filter(&["99"]), false, false).unwrap();
        assert_eq!(outcome.affected, 0);
        assert!(outcome.feedback[0].contains("No tasks matched"));
    }
}
