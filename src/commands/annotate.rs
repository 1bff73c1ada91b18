//! The annotate and denotate commands
//!
//! `annotate` attaches a timestamped note to the selected tasks;
//! `denotate` removes notes whose text contains the given pattern.

use crate::commands::{confirm_bulk_change, CommandOutcome, Modification};
use crate::context::Session;
use crate::error::{TaskError, ValidationError};
use crate::expr::Filter;

pub fn annotate(
    session: &mut Session,
    filter: &Filter,
    filter_was_empty: bool,
    confirmed: bool,
    modifications: &[String],
) -> Result<CommandOutcome, TaskError> {
    confirm_bulk_change(session, filter_was_empty, confirmed, "annotate all tasks")?;

    let text = Modification::parse(modifications)
        .description()
        .ok_or(ValidationError::EmptyDescription)?;

    let selected = session.filtered_pending(filter)?;
    let mut outcome = CommandOutcome::default();
    if selected.is_empty() {
        outcome.note("No tasks matched the filter".to_string());
        return Ok(outcome);
    }

    for mut task in selected {
        task.add_annotation(session.env.now, &text);
        outcome.note(format!("Annotated task {}", task.id()));
        session.db.apply(task)?;
        outcome.affected += 1;
    }
    Ok(outcome)
}

pub fn denotate(
    session: &mut Session,
    filter: &Filter,
    filter_was_empty: bool,
    confirmed: bool,
    modifications: &[String],
) -> Result<CommandOutcome, TaskError> {
    confirm_bulk_change(session, filter_was_empty, confirmed, "denotate all tasks")?;

    let pattern = Modification::parse(modifications)
        .description()
        .ok_or(ValidationError::EmptyDescription)?;

    let selected = session.filtered_pending(filter)?;
    let mut outcome = CommandOutcome::default();
    if selected.is_empty() {
        outcome.note("No tasks matched the filter".to_string());
        return Ok(outcome);
    }

    for mut task in selected {
        let removed = task.remove_annotations_matching(&pattern);
        if removed == 0 {
            outcome.note(format!(
                "Task {} has no annotation matching '{pattern}'",
                task.id()
            ));
            continue;
        }
        outcome.note(format!(
            "Removed {removed} annotation(s) from task {}",
            task.id()
        ));
        session.db.apply(task)?;
        outcome.affected += 1;
    }
    Ok(outcome)
}
