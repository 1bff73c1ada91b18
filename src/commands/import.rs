//! The import command
//!
//! Reads F4 lines from a file (or any reader the caller supplies) and
//! merges them into the working set.

use std::io::Read;
use std::path::Path;

use crate::commands::CommandOutcome;
use crate::context::Session;
use crate::error::TaskError;
use crate::io;

pub fn import_file(session: &mut Session, path: &Path) -> Result<CommandOutcome, TaskError> {
    let result = io::import_from_file(session, path)?;
    Ok(outcome_from(result))
}

pub fn import_reader<R: Read>(
    session: &mut Session,
    reader: &mut R,
) -> Result<CommandOutcome, TaskError> {
    let result = io::import_from_reader(session, reader, "<stdin>")?;
    Ok(outcome_from(result))
}

fn outcome_from(result: io::ImportResult) -> CommandOutcome {
    let mut outcome = CommandOutcome {
        affected: result.added + result.updated,
        ..Default::default()
    };
    outcome.note(format!(
        "Imported {} task(s), updated {}",
        result.added, result.updated
    ));
    outcome
}
