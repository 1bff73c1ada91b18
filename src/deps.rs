//! Dependency graph operations
//!
//! Dependencies are directed edges stored on each task as a
//! comma-joined `depends` list: "this task is blocked by those". The
//! graph must stay acyclic; every edge insertion is checked with a DFS
//! over the current working set.

use std::collections::{HashMap, HashSet};

use log::debug;
use uuid::Uuid;

use crate::error::ValidationError;
use crate::task::{Task, TaskStatus};

/// A dependency still counts while its task can still be worked.
fn unresolved(status: TaskStatus) -> bool {
    matches!(status, TaskStatus::Pending | TaskStatus::Waiting)
}

fn by_uuid(tasks: &[Task]) -> HashMap<Uuid, &Task> {
    tasks
        .iter()
        .filter_map(|t| t.uuid().map(|u| (u, t)))
        .collect()
}

/// Add `dependency` to `task`'s depends list. Rejects self-references,
/// duplicates, and anything that would close a cycle.
pub fn add_dependency(
    task: &mut Task,
    dependency: Uuid,
    tasks: &[Task],
) -> Result<(), ValidationError> {
    let task_uuid = task.uuid();
    if task_uuid == Some(dependency) {
        return Err(ValidationError::SelfDependency);
    }
    if task.has_dependency(dependency) {
        return Err(ValidationError::DuplicateDependency {
            task: task_uuid.unwrap_or(Uuid::nil()),
            dependency,
        });
    }
    if let Some(task_uuid) = task_uuid {
        if reaches(dependency, task_uuid, tasks) {
            return Err(ValidationError::CircularDependency { dependency });
        }
    }

    task.push_dependency(dependency);
    debug!(
        "task {} now depends on {dependency}",
        task_uuid.map(|u| u.to_string()).unwrap_or_default()
    );
    Ok(())
}

/// Remove a dependency edge; absent edges are a no-op.
pub fn remove_dependency(task: &mut Task, dependency: Uuid) -> bool {
    task.drop_dependency(dependency)
}

/// Depth-first search: does any dependency path lead from `from` to
/// `target`? Visited tracking keeps this O(V+E) even on dense graphs.
fn reaches(from: Uuid, target: Uuid, tasks: &[Task]) -> bool {
    let index = by_uuid(tasks);
    let mut visited: HashSet<Uuid> = HashSet::new();
    let mut stack = vec![from];

    while let Some(current) = stack.pop() {
        if current == target {
            return true;
        }
        if !visited.insert(current) {
            continue;
        }
        if let Some(task) = index.get(&current) {
            stack.extend(task.depends());
        }
    }
    false
}

/// A task is blocked while at least one of its dependencies is
/// unresolved.
pub fn is_blocked(task: &Task, tasks: &[Task]) -> bool {
    let index = by_uuid(tasks);
    task.depends()
        .iter()
        .any(|dep| index.get(dep).is_some_and(|t| unresolved(t.status())))
}

/// A task is blocking while some unresolved task depends on it.
pub fn is_blocking(task: &Task, tasks: &[Task]) -> bool {
    let Some(uuid) = task.uuid() else {
        return false;
    };
    tasks
        .iter()
        .any(|other| unresolved(other.status()) && other.has_dependency(uuid))
}

/// The tasks blocking `task` (its unresolved dependencies).
pub fn blocked_by<'a>(task: &Task, tasks: &'a [Task]) -> Vec<&'a Task> {
    let index = by_uuid(tasks);
    task.depends()
        .iter()
        .filter_map(|dep| index.get(dep).copied())
        .filter(|t| unresolved(t.status()))
        .collect()
}

/// The unresolved tasks that `task` blocks.
pub fn blocking<'a>(task: &Task, tasks: &'a [Task]) -> Vec<&'a Task> {
    let Some(uuid) = task.uuid() else {
        return Vec::new();
    };
    tasks
        .iter()
        .filter(|other| unresolved(other.status()) && other.has_dependency(uuid))
        .collect()
}

/// After `completed` resolves, find the dependents it was the last
/// blocker for. These feed the "task X is now unblocked" feedback.
pub fn newly_unblocked(completed: &Task, tasks: &[Task]) -> Vec<Uuid> {
    let Some(uuid) = completed.uuid() else {
        return Vec::new();
    };
    tasks
        .iter()
        .filter(|other| {
            unresolved(other.status())
                && other.has_dependency(uuid)
                && !is_blocked(other, tasks)
        })
        .filter_map(|t| t.uuid())
        .collect()
}

/// When a blocker's due date slips later, optionally push dependents'
/// due dates by the same delta (`dependency.shift`).
pub fn cascade_due_shift(
    blocker: Uuid,
    delta_seconds: i64,
    tasks: &mut [Task],
) -> Vec<Uuid> {
    if delta_seconds <= 0 {
        return Vec::new();
    }
    let mut shifted = Vec::new();
    for task in tasks.iter_mut() {
        if !unresolved(task.status()) || !task.has_dependency(blocker) {
            continue;
        }
        if let Some(due) = task.get_date("due") {
            task.set_date("due", due + chrono::Duration::seconds(delta_seconds));
            if let Some(uuid) = task.uuid() {
                shifted.push(uuid);
            }
        }
    }
    shifted
}
