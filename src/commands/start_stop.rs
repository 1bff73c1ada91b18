//! The start and stop commands
//!
//! `start` stamps the selected tasks with a start time (presence of
//! `start` marks a task active); `stop` clears it.

use crate::commands::{confirm_bulk_change, CommandOutcome};
use crate::context::Session;
use crate::error::TaskError;
use crate::expr::Filter;

pub fn start(
    session: &mut Session,
    filter: &Filter,
    filter_was_empty: bool,
    confirmed: bool,
) -> Result<CommandOutcome, TaskError> {
    confirm_bulk_change(session, filter_was_empty, confirmed, "start all tasks")?;

    let selected = session.filtered_pending(filter)?;
    let mut outcome = CommandOutcome::default();
    if selected.is_empty() {
        outcome.note("No tasks matched the filter".to_string());
        return Ok(outcome);
    }

    for mut task in selected {
        if task.is_active() {
            outcome.note(format!("Task {} is already started", task.id()));
            continue;
        }
        task.start(session.env.now);
        outcome.note(format!(
            "Started task {} '{}'",
            task.id(),
            task.description()
        ));
        session.db.apply(task)?;
        outcome.affected += 1;
    }
    Ok(outcome)
}

pub fn stop(
    session: &mut Session,
    filter: &Filter,
    filter_was_empty: bool,
    confirmed: bool,
) -> Result<CommandOutcome, TaskError> {
    confirm_bulk_change(session, filter_was_empty, confirmed, "stop all tasks")?;

    let selected = session.filtered_pending(filter)?;
    let mut outcome = CommandOutcome::default();
    if selected.is_empty() {
        outcome.note("No tasks matched the filter".to_string());
        return Ok(outcome);
    }

    for mut task in selected {
        if !task.is_active() {
            outcome.note(format!("Task {} is not started", task.id()));
            continue;
        }
        task.stop();
        outcome.note(format!(
            "Stopped task {} '{}'",
            task.id(),
            task.description()
        ));
        session.db.apply(task)?;
        outcome.affected += 1;
    }
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
    fn start_then_stop() {
        let (_dir, mut session) = test_session();
        add(&mut session, &args(&["work", "on", "it"])).unwrap();

        let outcome = start(&mut session, &filter(&["1"]), false, false).unwrap();
        assert_eq!(outcome.affected, 1);
        assert!(session.db.get_by_id(1).unwrap().is_active());

        // Starting again is a warning, not a change.
        let outcome = start(&mut session, &filter(&["1"]), false, false).unwrap();
        assert_eq!(outcome.affected, 0);

        let outcome = stop(&mut session, &filter(&["1"]), false, false).unwrap();
        assert_eq!(outcome.affected, 1);
        assert!(!session.db.get_by_id(1).unwrap().is_active());
    }
}
