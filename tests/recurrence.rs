//! End-to-end recurrence: materialization on load, mask maintenance,
//! and parent expiration.

mod common;

use chrono::{TimeZone, Utc};
use common::{args, filter, session_at};
use tempfile::TempDir;

use taskdatalib::commands::{add::add, done::done};
use taskdatalib::{Task, TaskStatus};

#[test]
fn weekly_parent_materializes_four_children() {
    let dir = TempDir::new().unwrap();
    let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();

    let mut session = session_at(&dir, start);
    add(
        &mut session,
        &args(&["due:2024-01-01", "recur:weekly", "Pay", "rent"]),
    )
    .unwrap();
    session.commit().unwrap();

    // Load three weeks later.
    let load_time = Utc.with_ymd_and_hms(2024, 1, 22, 0, 0, 0).unwrap();
    let mut session = session_at(&dir, load_time);

    let parent: Task = session
        .db
        .pending_tasks()
        .iter()
        .find(|t| t.status() == TaskStatus::Recurring)
        .cloned()
        .unwrap();
    assert_eq!(parent.get("mask"), Some("----"));

    let mut children: Vec<Task> = session
        .db
        .pending_tasks()
        .iter()
        .filter(|t| t.has("parent"))
        .cloned()
        .collect();
    children.sort_by_key(|t| t.get_integer("imask"));

    assert_eq!(children.len(), 4);
    let expected_dues = [
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        Utc.with_ymd_and_hms(2024, 1, 8, 0, 0, 0).unwrap(),
        Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap(),
        Utc.with_ymd_and_hms(2024, 1, 22, 0, 0, 0).unwrap(),
    ];
    for (index, child) in children.iter().enumerate() {
        assert_eq!(child.status(), TaskStatus::Pending);
        assert_eq!(child.get("parent"), parent.get("uuid"));
        assert_eq!(child.get_integer("imask"), Some(index as i64));
        assert_eq!(child.get_date("due"), Some(expected_dues[index]));
    }

    // Persist and reload: the count is stable.
    session.commit().unwrap();
    let session = session_at(&dir, load_time);
    assert_eq!(session.db.pending_tasks().len(), 5);
}

#[test]
fn completing_a_child_marks_the_parent_mask() {
    let dir = TempDir::new().unwrap();
    let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();

    let mut session = session_at(&dir, start);
    add(
        &mut session,
        &args(&["due:2024-01-01", "recur:weekly", "Water", "plants"]),
    )
    .unwrap();
    session.commit().unwrap();

    let load_time = Utc.with_ymd_and_hms(2024, 1, 8, 0, 0, 0).unwrap();
    let mut session = session_at(&dir, load_time);
    let first_child_uuid = session
        .db
        .pending_tasks()
        .iter()
        .find(|t| t.get_integer("imask") == Some(0))
        .and_then(|t| t.uuid())
        .unwrap();

    done(
        &mut session,
        &filter(&[&first_child_uuid.to_string()]),
        false,
        false,
    )
    .unwrap();

    let parent = session
        .db
        .pending_tasks()
        .iter()
        .find(|t| t.status() == TaskStatus::Recurring)
        .unwrap();
    assert_eq!(parent.get("mask"), Some("+-"));
}

#[test]
fn monthly_recurrence_clamps_to_month_end() {
    let dir = TempDir::new().unwrap();
    let start = Utc.with_ymd_and_hms(2024, 1, 31, 0, 0, 0).unwrap();

    let mut session = session_at(&dir, start);
    add(
        &mut session,
        &args(&["due:2024-01-31", "recur:monthly", "Invoice"]),
    )
    .unwrap();
    session.commit().unwrap();

    let load_time = Utc.with_ymd_and_hms(2024, 3, 31, 0, 0, 0).unwrap();
    let mut session = session_at(&dir, load_time);
    let mut dues: Vec<_> = session
        .db
        .pending_tasks()
        .iter()
        .filter(|t| t.has("parent"))
        .filter_map(|t| t.get_date("due"))
        .collect();
    dues.sort();

    assert_eq!(
        dues,
        vec![
            Utc.with_ymd_and_hms(2024, 1, 31, 0, 0, 0).unwrap(),
            // February clamps to its last day.
            Utc.with_ymd_and_hms(2024, 2, 29, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 3, 29, 0, 0, 0).unwrap(),
        ]
    );
    session.commit().unwrap();
}

#[test]
fn expired_parent_is_deleted_once_mask_resolves() {
    let dir = TempDir::new().unwrap();
    let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();

    let mut session = session_at(&dir, start);
    add(
        &mut session,
        &args(&[
            "due:2024-01-01",
            "recur:weekly",
            "until:2024-01-10",
            "Trial",
            "period",
        ]),
    )
    .unwrap();
    session.commit().unwrap();

    // Materialize both occurrences, then resolve them.
    let mid = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();
    let mut session = session_at(&dir, mid);
    let child_uuids: Vec<String> = session
        .db
        .pending_tasks()
        .iter()
        .filter(|t| t.has("parent"))
        .filter_map(|t| t.uuid())
        .map(|u| u.to_string())
        .collect();
    assert_eq!(child_uuids.len(), 2);
    for uuid in &child_uuids {
        done(&mut session, &filter(&[uuid]), false, false).unwrap();
    }
    session.commit().unwrap();

    // On the next load the spent parent transitions to deleted.
    let later = Utc.with_ymd_and_hms(2024, 2, 2, 0, 0, 0).unwrap();
    let session = session_at(&dir, later);
    let parent = session
        .db
        .pending_tasks()
        .iter()
        .find(|t| t.has("mask"))
        .unwrap();
    assert_eq!(parent.status(), TaskStatus::Deleted);
}
