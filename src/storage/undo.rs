//! The undo journal
//!
//! `undo.data` is an append-only transaction log. Each record is:
//!
//! ```text
//! time <epoch>
//! old <F4-line>      (absent for pure additions)
//! new <F4-line>      (absent for pure deletions)
//! ---
//! ```
//!
//! Undo pops the last record and restores the `old` state, or removes
//! the task entirely when there was no `old`.

use std::fs;
use std::io::Write;
use std::path::Path;

use chrono::{DateTime, Utc};

use crate::date;
use crate::error::StorageError;

/// One transaction in the undo journal.
#[derive(Debug, Clone, PartialEq)]
pub struct UndoRecord {
    pub time: DateTime<Utc>,
    /// F4 line of the task before the change; absent for additions.
    pub old: Option<String>,
    /// F4 line of the task after the change; absent for deletions.
    pub new: Option<String>,
}

impl UndoRecord {
    pub fn new(time: DateTime<Utc>, old: Option<String>, new: Option<String>) -> Self {
        Self { time, old, new }
    }
}

fn io_error(path: &Path, source: std::io::Error) -> StorageError {
    StorageError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Append transaction records to the journal.
pub fn append(path: &Path, records: &[UndoRecord]) -> Result<(), StorageError> {
    if records.is_empty() {
        return Ok(());
    }

    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| io_error(path, e))?;

    let mut buffer = String::new();
    for record in records {
        buffer.push_str(&format!("time {}\n", record.time.timestamp()));
        if let Some(old) = &record.old {
            buffer.push_str(&format!("old {old}\n"));
        }
        if let Some(new) = &record.new {
            buffer.push_str(&format!("new {new}\n"));
        }
        buffer.push_str("---\n");
    }

    file.write_all(buffer.as_bytes())
        .map_err(|e| io_error(path, e))?;
    Ok(())
}

/// Read the whole journal. A missing file is an empty journal.
pub fn read_all(path: &Path) -> Result<Vec<UndoRecord>, StorageError> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let content = fs::read_to_string(path).map_err(|e| io_error(path, e))?;

    let mut records = Vec::new();
    let mut time: Option<DateTime<Utc>> = None;
    let mut old: Option<String> = None;
    let mut new: Option<String> = None;

    for (index, line) in content.lines().enumerate() {
        let corrupt = || StorageError::CorruptUndo { line: index + 1 };

        if let Some(epoch) = line.strip_prefix("time ") {
            if time.is_some() {
                return Err(corrupt());
            }
            let secs: i64 = epoch.trim().parse().map_err(|_| corrupt())?;
            time = Some(date::from_epoch(secs).ok_or_else(corrupt)?);
        } else if let Some(value) = line.strip_prefix("old ") {
            old = Some(value.to_string());
        } else if let Some(value) = line.strip_prefix("new ") {
            new = Some(value.to_string());
        } else if line == "---" {
            let time = time.take().ok_or_else(corrupt)?;
            if old.is_none() && new.is_none() {
                return Err(corrupt());
            }
            records.push(UndoRecord {
                time,
                old: old.take(),
                new: new.take(),
            });
        } else if !line.is_empty() {
            return Err(corrupt());
        }
    }

    if time.is_some() || old.is_some() || new.is_some() {
        // Truncated trailing record, e.g. from an interrupted write.
        return Err(StorageError::CorruptUndo {
            line: content.lines().count(),
        });
    }

    Ok(records)
}

/// Remove and return the journal's last record, rewriting the file.
pub fn pop_last(path: &Path) -> Result<Option<UndoRecord>, StorageError> {
    let mut records = read_all(path)?;
    let Some(last) = records.pop() else {
        return Ok(None);
    };
    append_replacing(path, &records)?;
    Ok(Some(last))
}

/// Rewrite the journal to contain exactly `records`, atomically.
fn append_replacing(path: &Path, records: &[UndoRecord]) -> Result<(), StorageError> {
    let temp = path.with_extension("data.tmp");
    {
        let mut file = fs::File::create(&temp).map_err(|e| io_error(&temp, e))?;
        let mut buffer = String::new();
        for record in records {
            buffer.push_str(&format!("time {}\n", record.time.timestamp()));
            if let Some(old) = &record.old {
                buffer.push_str(&format!("old {old}\n"));
            }
            if let Some(new) = &record.new {
                buffer.push_str(&format!("new {new}\n"));
            }
            buffer.push_str("---\n");
        }
        file.write_all(buffer.as_bytes())
            .map_err(|e| io_error(&temp, e))?;
    }
    fs::rename(&temp, path).map_err(|e| io_error(path, e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::tempdir;

    fn when() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 22, 8, 0, 0).unwrap()
    }

    #[test]
    fn append_and_read_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("undo.data");

        let records = vec![
            UndoRecord::new(when(), None, Some("[uuid:\"a\" status:\"P\"]".to_string())),
            UndoRecord::new(
                when(),
                Some("[uuid:\"a\" status:\"P\"]".to_string()),
                Some("[uuid:\"a\" status:\"C\"]".to_string()),
            ),
        ];
        append(&path, &records).unwrap();

        let read = read_all(&path).unwrap();
        assert_eq!(read, records);
    }

    #[test]
    fn missing_journal_is_empty() {
        let dir = tempdir().unwrap();
        assert!(read_all(&dir.path().join("undo.data")).unwrap().is_empty());
    }

    #[test]
    fn pop_removes_only_the_last() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("undo.data");

        let first = UndoRecord::new(when(), None, Some("[a]".to_string()));
        let second = UndoRecord::new(when(), Some("[a]".to_string()), Some("[b]".to_string()));
        append(&path, &[first.clone(), second.clone()]).unwrap();

        assert_eq!(pop_last(&path).unwrap(), Some(second));
        assert_eq!(read_all(&path).unwrap(), vec![first.clone()]);
        assert_eq!(pop_last(&path).unwrap(), Some(first));
        assert_eq!(pop_last(&path).unwrap(), None);
    }

    #[test]
    fn truncated_journal_is_corrupt() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("undo.data");
        fs::write(&path, "time 1705910400\nnew [a]\n").unwrap();

        assert!(matches!(
            read_all(&path),
            Err(StorageError::CorruptUndo { .. })
        ));
    }

    #[test]
    fn garbage_line_is_corrupt() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("undo.data");
        fs::write(&path, "time 1705910400\nwat\n---\n").unwrap();

        match read_all(&path) {
            Err(StorageError::CorruptUndo { line }) => assert_eq!(line, 2),
            other => panic!("expected corrupt undo, got {other:?}"),
        }
    }
}
