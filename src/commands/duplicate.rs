//! The duplicate command
//!
//! Copies the selected tasks as fresh pending records: new UUID, new
//! entry time, no start/end, and no recurring machinery carried over.

use crate::commands::{confirm_bulk_change, CommandOutcome};
use crate::context::Session;
use crate::error::TaskError;
use crate::expr::Filter;
use crate::task::TaskStatus;

pub fn duplicate(
    session: &mut Session,
    filter: &Filter,
    filter_was_empty: bool,
    confirmed: bool,
) -> Result<CommandOutcome, TaskError> {
    confirm_bulk_change(session, filter_was_empty, confirmed, "duplicate all tasks")?;

    let selected = session.filtered_pending(filter)?;
    let mut outcome = CommandOutcome::default();
    if selected.is_empty() {
        outcome.note("No tasks matched the filter".to_string());
        return Ok(outcome);
    }

    for task in selected {
        let mut copy = task.duplicate();
        copy.set_status(TaskStatus::Pending);
        copy.set_date("entry", session.env.now);
        copy.remove("start");
        copy.remove("end");
        copy.remove("wait");
        copy.remove("mask");
        copy.remove("imask");
        copy.remove("parent");
        copy.remove("recur");

        let id = session.db.add_task(copy);
        outcome.note(format!(
            "Duplicated task {} as task {id}",
            task.id()
        ));
        outcome.affected += 1;
    }
    Ok(outcome)
}
