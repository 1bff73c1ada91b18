//! Task import
//!
//! Reads F4 lines from a reader, a file, or stdin and merges them into
//! the working set: unknown UUIDs are added, known UUIDs are replaced.

use std::fs;
use std::io::Read;
use std::path::Path;

use crate::context::Session;
use crate::error::TaskError;
use crate::task::parse_line;

/// Import result statistics
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ImportResult {
    pub added: usize,
    pub updated: usize,
}

/// Import F4 lines from any reader.
pub fn import_from_reader<R: Read>(
    session: &mut Session,
    reader: &mut R,
    source_name: &str,
) -> Result<ImportResult, TaskError> {
    let mut content = String::new();
    reader.read_to_string(&mut content)?;
    import_from_str(session, &content, source_name)
}

/// Import F4 lines from a file on disk.
pub fn import_from_file(session: &mut Session, path: &Path) -> Result<ImportResult, TaskError> {
    let content = fs::read_to_string(path)?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string());
    import_from_str(session, &content, &name)
}

fn import_from_str(
    session: &mut Session,
    content: &str,
    source_name: &str,
) -> Result<ImportResult, TaskError> {
    let mut result = ImportResult::default();

    for (index, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let task = parse_line(line, source_name, index + 1)?;
        task.validate().map_err(TaskError::from)?;

        match task.uuid().and_then(|uuid| session.db.get_by_uuid(uuid)) {
            Some(_) => {
                session.db.apply(task)?;
                result.updated += 1;
            }
            None => {
                session.db.add_task(task);
                result.added += 1;
            }
        }
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::tests_support::test_session;
    use crate::task::{compose_f4, Task};

    #[test]
    fn import_adds_and_updates() {
        let (_dir, mut session) = test_session();

        let task = Task::new("imported once", session.env.now);
        let line = compose_f4(&task).unwrap();
        let result = import_from_str(&mut session, &line, "stdin").unwrap();
        assert_eq!(result.added, 1);
        assert_eq!(result.updated, 0);

        // Re-importing the same uuid replaces in place.
        let mut changed = task.clone();
        changed.set_description("imported twice");
        let line = compose_f4(&changed).unwrap();
        let result = import_from_str(&mut session, &line, "stdin").unwrap();
        assert_eq!(result.added, 0);
        assert_eq!(result.updated, 1);
        assert_eq!(session.db.pending_tasks().len(), 1);
        assert_eq!(session.db.pending_tasks()[0].description(), "imported twice");
    }

    #[test]
    fn import_rejects_invalid_lines() {
        let (_dir, mut session) = test_session();
        let err = import_from_str(&mut session, "not an f4 line", "stdin").unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }
}
