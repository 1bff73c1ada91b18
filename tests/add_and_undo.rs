//! End-to-end: add a task, list it, modify it, undo the modification.

mod common;

use std::fs;

use common::{args, filter, monday_morning, session_at};
use tempfile::TempDir;

use taskdatalib::commands::{add::add, modify::modify, reports, undo::undo, RecurrenceScope};
use taskdatalib::TaskStatus;

#[test]
fn add_then_list() {
    let dir = TempDir::new().unwrap();
    let now = monday_morning();

    let mut session = session_at(&dir, now);
    add(
        &mut session,
        &args(&["project:Home", "priority:H", "Buy", "milk"]),
    )
    .unwrap();
    session.commit().unwrap();

    // Exactly one F4 line on disk with the expected fields.
    let content = fs::read_to_string(dir.path().join("pending.data")).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines.len(), 1);
    let line = lines[0];
    assert!(line.starts_with('['));
    assert!(line.contains("status:\"P\""));
    assert!(line.contains("project:\"Home\""));
    assert!(line.contains("priority:\"H\""));
    assert!(line.contains("description:\"Buy milk\""));
    assert!(line.contains(&format!("entry:\"{}\"", now.timestamp())));
    assert!(line.contains("uuid:\""));

    // A fresh invocation lists one row, ID 1.
    let session = session_at(&dir, now);
    let tasks = reports::list(&session, &filter(&[])).unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].id(), 1);
    assert_eq!(tasks[0].status(), TaskStatus::Pending);
}

#[test]
fn undo_restores_modified_priority() {
    let dir = TempDir::new().unwrap();
    let now = monday_morning();

    let mut session = session_at(&dir, now);
    add(
        &mut session,
        &args(&["project:Home", "priority:H", "Buy", "milk"]),
    )
    .unwrap();
    session.commit().unwrap();

    let mut session = session_at(&dir, now);
    modify(
        &mut session,
        &filter(&["1"]),
        false,
        false,
        &args(&["priority:L"]),
        RecurrenceScope::ThisTask,
    )
    .unwrap();
    session.commit().unwrap();

    let mut session = session_at(&dir, now);
    assert_eq!(session.db.get_by_id(1).unwrap().get("priority"), Some("L"));
    undo(&mut session).unwrap();
    assert_eq!(session.db.get_by_id(1).unwrap().get("priority"), Some("H"));

    // The popped record is gone from the journal; the add remains.
    let journal = fs::read_to_string(dir.path().join("undo.data")).unwrap();
    assert_eq!(journal.matches("---").count(), 1);

    // Undo survives a reload.
    let session = session_at(&dir, now);
    assert_eq!(session.db.get_by_id(1).unwrap().get("priority"), Some("H"));
}

#[test]
fn undo_is_a_left_inverse_of_any_single_mutation() {
    let dir = TempDir::new().unwrap();
    let now = monday_morning();

    let mut session = session_at(&dir, now);
    add(&mut session, &args(&["+tagged", "due:tomorrow", "steady", "state"])).unwrap();
    session.commit().unwrap();
    let before = fs::read_to_string(dir.path().join("pending.data")).unwrap();

    let mut session = session_at(&dir, now);
    modify(
        &mut session,
        &filter(&["1"]),
        false,
        false,
        &args(&["project:New", "+extra", "-tagged"]),
        RecurrenceScope::ThisTask,
    )
    .unwrap();
    session.commit().unwrap();
    assert_ne!(
        before,
        fs::read_to_string(dir.path().join("pending.data")).unwrap()
    );

    let mut session = session_at(&dir, now);
    undo(&mut session).unwrap();
    let after = fs::read_to_string(dir.path().join("pending.data")).unwrap();
    assert_eq!(before, after);
}
