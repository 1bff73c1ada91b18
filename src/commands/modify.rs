//! The modify command
//!
//! Applies a modification list to the filtered selection. On a
//! recurring child the scope decision (this instance or every pending
//! sibling) comes from the caller. A due date that slips later can
//! cascade to blocked dependents when `dependency.shift` is on.

use crate::commands::{
    apply_dependency_edits, confirm_bulk_change, CommandOutcome, Modification, RecurrenceScope,
};
use crate::context::Session;
use crate::deps;
use crate::error::TaskError;
use crate::expr::Filter;
use crate::task::Task;

pub fn modify(
    session: &mut Session,
    filter: &Filter,
    filter_was_empty: bool,
    confirmed: bool,
    modifications: &[String],
    scope: RecurrenceScope,
) -> Result<CommandOutcome, TaskError> {
    confirm_bulk_change(session, filter_was_empty, confirmed, "modify all tasks")?;

    let modification = Modification::parse(modifications);
    let mut selected = session.filtered_pending(filter)?;
    let mut outcome = CommandOutcome::default();
    if selected.is_empty() {
        outcome.note("No tasks matched the filter".to_string());
        return Ok(outcome);
    }

    // Widen a recurring child's selection to its pending siblings when
    // the caller opted into all-instance modification.
    if scope == RecurrenceScope::AllPending {
        let mut extra: Vec<Task> = Vec::new();
        for task in &selected {
            let Some(parent) = task.get("parent") else {
                continue;
            };
            for sibling in session.db.pending_tasks() {
                if sibling.get("parent") == Some(parent)
                    && sibling.uuid() != task.uuid()
                    && !selected.iter().any(|t| t.uuid() == sibling.uuid())
                    && !extra.iter().any(|t| t.uuid() == sibling.uuid())
                {
                    extra.push(sibling.clone());
                }
            }
        }
        selected.extend(extra);
    }

    for mut task in selected {
        let due_before = task.get_date("due");

        let mut warnings = modification.apply(&mut task, session)?;
        apply_dependency_edits(session, &mut task, &modification)?;
        task.validate().map_err(TaskError::from)?;

        outcome.feedback.append(&mut warnings);
        outcome.note(format!(
            "Modified task {} '{}'",
            task.id(),
            task.description()
        ));

        // Due slipped later: optionally drag dependents along.
        let due_after = task.get_date("due");
        let shift = match (due_before, due_after) {
            (Some(before), Some(after)) if after > before => (after - before).num_seconds(),
            _ => 0,
        };
        let uuid = task.uuid();
        session.db.apply(task)?;
        outcome.affected += 1;

        if shift > 0 && session.env.config.dependency_shift() {
            if let Some(uuid) = uuid {
                let mut tasks: Vec<Task> = session.db.pending_tasks().to_vec();
                let shifted = deps::cascade_due_shift(uuid, shift, &mut tasks);
                for task in tasks {
                    if task.uuid().is_some_and(|u| shifted.contains(&u)) {
                        outcome.note(format!(
                            "Shifted due date of dependent task {}",
                            task.id()
                        ));
                        session.db.apply(task)?;
                    }
                }
            }
        }
    }

    Ok(outcome)
}
