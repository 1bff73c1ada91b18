//! The undo command
//!
//! Pops the last transaction from the undo journal and restores the
//! recorded "before" state (or removes the task when there was none).

use crate::commands::CommandOutcome;
use crate::context::Session;
use crate::error::TaskError;

pub fn undo(session: &mut Session) -> Result<CommandOutcome, TaskError> {
    let description = session.db.undo_last(session.env.now)?;
    let mut outcome = CommandOutcome {
        affected: 1,
        ..Default::default()
    };
    outcome.note(description);
    Ok(outcome)
}
