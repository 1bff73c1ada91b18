//! The done command
//!
//! Completes the selected pending tasks: sets `end`, flips status,
//! pushes `+` into a recurring parent's mask, reports newly unblocked
//! dependents, and garbage-collects.

use log::debug;

use crate::commands::{confirm_bulk_change, CommandOutcome};
use crate::context::Session;
use crate::deps;
use crate::error::TaskError;
use crate::expr::Filter;
use crate::task::{recurrence, TaskStatus};

pub fn done(
    session: &mut Session,
    filter: &Filter,
    filter_was_empty: bool,
    confirmed: bool,
) -> Result<CommandOutcome, TaskError> {
    confirm_bulk_change(session, filter_was_empty, confirmed, "mark all tasks done")?;

    let selected = session.filtered_pending(filter)?;
    let mut outcome = CommandOutcome::default();
    if selected.is_empty() {
        outcome.note("No tasks matched the filter".to_string());
        return Ok(outcome);
    }

    for mut task in selected {
        match task.status() {
            TaskStatus::Pending | TaskStatus::Waiting => {}
            other => {
                outcome.note(format!(
                    "Task {} is {other}; not completed",
                    task.id()
                ));
                continue;
            }
        }

        task.complete(session.env.now);
        debug!("completed task {}", task.id());

        update_parent_mask(session, &task, TaskStatus::Completed)?;

        // Dependents this task was the last blocker for.
        let mut resolved = session.db.pending_tasks().to_vec();
        if let Some(slot) = resolved
            .iter_mut()
            .find(|t| t.uuid() == task.uuid())
        {
            slot.complete(session.env.now);
        }
        for unblocked in deps::newly_unblocked(&task, &resolved) {
            if let Some(dependent) = session.db.get_by_uuid(unblocked) {
                outcome.note(format!(
                    "Unblocked task {} '{}'",
                    dependent.id(),
                    dependent.description()
                ));
            }
        }

        outcome.note(format!("Completed task {} '{}'", task.id(), task.description()));
        session.db.apply(task)?;
        outcome.affected += 1;
    }

    session.db.gc()?;
    Ok(outcome)
}

/// Push a child's terminal state into its recurring parent's mask.
pub(crate) fn update_parent_mask(
    session: &mut Session,
    child: &crate::task::Task,
    status: TaskStatus,
) -> Result<(), TaskError> {
    let Some(parent_uuid) = child
        .get("parent")
        .and_then(|p| uuid::Uuid::parse_str(p).ok())
    else {
        return Ok(());
    };
    let Some(imask) = child.get_integer("imask") else {
        return Ok(());
    };
    let Some(parent) = session.db.get_by_uuid(parent_uuid) else {
        return Ok(());
    };

    let mut parent = parent.clone();
    recurrence::update_parent_mask(&mut parent, imask as usize, status);
    session.db.apply(parent)?;
    Ok(())
}
