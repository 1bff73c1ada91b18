//! Storage layer (TDB2)
//!
//! Owns the four files under the data directory: `pending.data`,
//! `completed.data`, `undo.data` and `backlog.data`. Loading assigns
//! working-set IDs, flips tasks between waiting and pending per their
//! wait dates, and materializes recurring children. Committing writes
//! undo records
//! first, then rewrites the data files through a temp-file rename so a
//! crash mid-write leaves the originals intact.

pub mod lock;
pub mod serialization;
pub mod undo;

use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use uuid::Uuid;

use crate::config::Configuration;
use crate::error::{StorageError, TaskError};
use crate::task::recurrence;
use crate::task::{compose_f4, parse_line, Task, TaskStatus};

pub use lock::FileLock;
pub use undo::UndoRecord;

/// The task database: loaded working set plus commit bookkeeping.
#[derive(Debug)]
pub struct TaskDb {
    data_dir: PathBuf,
    locking: bool,
    lock: Option<FileLock>,

    pending: Vec<Task>,
    completed: Vec<Task>,
    completed_loaded: bool,

    uuid_to_id: HashMap<Uuid, u32>,
    id_to_uuid: HashMap<u32, Uuid>,
    next_id: u32,

    /// Task states as loaded, keyed by uuid; the undo "old" side.
    baseline: HashMap<Uuid, Task>,
    /// Tasks changed or added since load, in deterministic order.
    dirty: BTreeSet<Uuid>,

    pending_changed: bool,
    completed_changed: bool,
    gc_ran: bool,
    loaded: bool,
}

impl TaskDb {
    pub fn new(config: &Configuration) -> Self {
        Self::with_data_dir(config.data_dir.clone(), config.locking())
    }

    pub fn with_data_dir(data_dir: PathBuf, locking: bool) -> Self {
        Self {
            data_dir,
            locking,
            lock: None,
            pending: Vec::new(),
            completed: Vec::new(),
            completed_loaded: false,
            uuid_to_id: HashMap::new(),
            id_to_uuid: HashMap::new(),
            next_id: 1,
            baseline: HashMap::new(),
            dirty: BTreeSet::new(),
            pending_changed: false,
            completed_changed: false,
            gc_ran: false,
            loaded: false,
        }
    }

    pub fn pending_path(&self) -> PathBuf {
        self.data_dir.join("pending.data")
    }

    pub fn completed_path(&self) -> PathBuf {
        self.data_dir.join("completed.data")
    }

    pub fn undo_path(&self) -> PathBuf {
        self.data_dir.join("undo.data")
    }

    pub fn backlog_path(&self) -> PathBuf {
        self.data_dir.join("backlog.data")
    }

    // -- Load ----------------------------------------------------------------

    /// Load pending.data: parse every line, assign IDs 1..N in file
    /// order, reconcile waiting state, then run the recurrence engine.
    pub fn load(&mut self, now: DateTime<Utc>, recurrence_enabled: bool) -> Result<(), TaskError> {
        if self.loaded {
            return Ok(());
        }
        if !self.data_dir.is_dir() {
            return Err(StorageError::MissingDataDirectory {
                path: self.data_dir.clone(),
            }
            .into());
        }

        // One lock guards the whole directory for the invocation; it is
        // taken before the initial read so the snapshot stays consistent
        // through commit.
        self.lock = Some(FileLock::acquire(&self.pending_path(), self.locking)?);

        let (tasks, saw_legacy) = read_data_file(&self.pending_path())?;
        self.pending = tasks;
        if saw_legacy {
            // Legacy lines upgrade to F4 at the next commit.
            self.pending_changed = true;
        }
        for task in &mut self.pending {
            let id = self.next_id;
            self.next_id += 1;
            task.set_id(id);
            if let Some(uuid) = task.uuid() {
                self.uuid_to_id.insert(uuid, id);
                self.id_to_uuid.insert(id, uuid);
                self.baseline.insert(uuid, task.clone());
            }
        }
        debug!(
            "loaded {} task(s) from {}",
            self.pending.len(),
            self.pending_path().display()
        );

        self.reconcile_waiting(now);
        if recurrence_enabled {
            self.run_recurrence(now)?;
        }
        self.verify_undo_consistency();

        self.loaded = true;
        Ok(())
    }

    /// Reconcile waiting state with the clock, in both directions:
    /// waiting tasks whose wait has arrived return to pending, and
    /// pending tasks carrying a future wait are hidden again.
    fn reconcile_waiting(&mut self, now: DateTime<Utc>) {
        let mut released = 0;
        let mut hidden = 0;
        for task in &mut self.pending {
            if task.wait_has_expired(now) {
                task.set_status(TaskStatus::Pending);
                task.remove("wait");
                if let Some(uuid) = task.uuid() {
                    self.dirty.insert(uuid);
                }
                self.pending_changed = true;
                released += 1;
            } else if task.status() == TaskStatus::Pending
                && task.get_date("wait").is_some_and(|wait| wait > now)
            {
                task.set_status(TaskStatus::Waiting);
                if let Some(uuid) = task.uuid() {
                    self.dirty.insert(uuid);
                }
                self.pending_changed = true;
                hidden += 1;
            }
        }
        if released > 0 {
            info!("released {released} waiting task(s)");
        }
        if hidden > 0 {
            info!("hid {hidden} task(s) until their wait date");
        }
    }

    /// Materialize overdue recurring children and expire spent parents.
    fn run_recurrence(&mut self, now: DateTime<Utc>) -> Result<(), TaskError> {
        let mut spawned: Vec<Task> = Vec::new();

        for task in &mut self.pending {
            if task.status() != TaskStatus::Recurring {
                continue;
            }

            let before_mask = task.get("mask").map(|m| m.to_string());
            let children = recurrence::materialize_children(task, now)?;
            if task.get("mask").map(|m| m.to_string()) != before_mask {
                if let Some(uuid) = task.uuid() {
                    self.dirty.insert(uuid);
                }
                self.pending_changed = true;
            }
            spawned.extend(children);

            if recurrence::parent_has_expired(task, now) {
                task.delete(now);
                if let Some(uuid) = task.uuid() {
                    self.dirty.insert(uuid);
                }
                self.pending_changed = true;
            }
        }

        for child in spawned {
            self.add_task(child);
        }
        Ok(())
    }

    /// An interrupted commit leaves an undo record whose "after" state
    /// never reached the data files. Detect and report it.
    fn verify_undo_consistency(&self) {
        let records = match undo::read_all(&self.undo_path()) {
            Ok(records) => records,
            Err(e) => {
                warn!("unreadable undo journal: {e}");
                return;
            }
        };
        let Some(last) = records.last() else {
            return;
        };
        let Some(new_line) = &last.new else {
            return;
        };
        let Ok(expected) = parse_line(new_line, "undo.data", 0) else {
            return;
        };
        let Some(uuid) = expected.uuid() else {
            return;
        };

        let current = self.pending.iter().find(|t| t.uuid() == Some(uuid));
        if let Some(current) = current {
            let mut unnumbered = current.clone();
            unnumbered.set_id(0);
            if unnumbered != expected {
                warn!("undo journal is ahead of the data files for task {uuid}");
            }
        }
        // Absent tasks may simply have been moved by GC; not conclusive.
    }

    /// Read completed.data, once, when a report needs it.
    pub fn ensure_completed_loaded(&mut self) -> Result<(), TaskError> {
        if self.completed_loaded {
            return Ok(());
        }
        let (tasks, saw_legacy) = read_data_file(&self.completed_path())?;
        self.completed = tasks;
        if saw_legacy {
            self.completed_changed = true;
        }
        for task in &self.completed {
            if let Some(uuid) = task.uuid() {
                self.baseline.entry(uuid).or_insert_with(|| task.clone());
            }
        }
        self.completed_loaded = true;
        debug!("loaded {} completed task(s)", self.completed.len());
        Ok(())
    }

    // -- Working set ---------------------------------------------------------

    pub fn pending_tasks(&self) -> &[Task] {
        &self.pending
    }

    pub fn completed_tasks(&self) -> &[Task] {
        &self.completed
    }

    /// Pending plus (if loaded) completed tasks.
    pub fn all_tasks(&self) -> impl Iterator<Item = &Task> {
        self.pending.iter().chain(self.completed.iter())
    }

    pub fn get_by_id(&self, id: u32) -> Option<&Task> {
        self.pending.iter().find(|t| t.id() == id)
    }

    pub fn get_by_uuid(&self, uuid: Uuid) -> Option<&Task> {
        self.all_tasks().find(|t| t.uuid() == Some(uuid))
    }

    pub fn id_for_uuid(&self, uuid: Uuid) -> Option<u32> {
        self.uuid_to_id.get(&uuid).copied()
    }

    pub fn uuid_for_id(&self, id: u32) -> Option<Uuid> {
        self.id_to_uuid.get(&id).copied()
    }

    /// Add a new task to the working set, assigning the next ID.
    pub fn add_task(&mut self, mut task: Task) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        task.set_id(id);
        if let Some(uuid) = task.uuid() {
            self.uuid_to_id.insert(uuid, id);
            self.id_to_uuid.insert(id, uuid);
            self.dirty.insert(uuid);
        }
        self.pending.push(task);
        self.pending_changed = true;
        id
    }

    /// Replace a task (matched by uuid) with its modified state.
    pub fn apply(&mut self, task: Task) -> Result<(), TaskError> {
        let Some(uuid) = task.uuid() else {
            return Err(TaskError::NotFound { id: Uuid::nil() });
        };

        if let Some(slot) = self.pending.iter_mut().find(|t| t.uuid() == Some(uuid)) {
            *slot = task;
            self.pending_changed = true;
        } else if let Some(slot) = self.completed.iter_mut().find(|t| t.uuid() == Some(uuid)) {
            *slot = task;
            self.completed_changed = true;
        } else {
            return Err(TaskError::NotFound { id: uuid });
        }
        self.dirty.insert(uuid);
        Ok(())
    }

    /// True when some change is waiting for commit.
    pub fn has_changes(&self) -> bool {
        !self.dirty.is_empty() || self.pending_changed || self.completed_changed
    }

    // -- GC ------------------------------------------------------------------

    /// Move terminal tasks from pending.data to completed.data and
    /// renumber the remainder. Runs at most once per invocation.
    pub fn gc(&mut self) -> Result<usize, TaskError> {
        if self.gc_ran {
            return Ok(0);
        }
        self.gc_ran = true;
        self.ensure_completed_loaded()?;

        let (terminal, keep): (Vec<Task>, Vec<Task>) = self
            .pending
            .drain(..)
            .partition(|t| t.status().is_terminal());
        let moved = terminal.len();

        for mut task in terminal {
            task.set_id(0);
            self.completed.push(task);
        }

        self.pending = keep;
        self.uuid_to_id.clear();
        self.id_to_uuid.clear();
        self.next_id = 1;
        for task in &mut self.pending {
            let id = self.next_id;
            self.next_id += 1;
            task.set_id(id);
            if let Some(uuid) = task.uuid() {
                self.uuid_to_id.insert(uuid, id);
                self.id_to_uuid.insert(id, uuid);
            }
        }

        if moved > 0 {
            info!("gc moved {moved} task(s) to completed.data");
            self.pending_changed = true;
            self.completed_changed = true;
        }
        Ok(moved)
    }

    // -- Commit --------------------------------------------------------------

    /// Persist all changes: undo records first, then the data files via
    /// temp-file rename, then the backlog. Releases the lock.
    pub fn commit(&mut self, now: DateTime<Utc>) -> Result<(), TaskError> {
        if !self.has_changes() {
            self.lock.take();
            return Ok(());
        }

        // Undo journal before the data files: a crash in between is
        // detected on the next load.
        let mut records = Vec::new();
        let mut backlog_lines = String::new();
        for uuid in &self.dirty {
            let current = self.all_tasks().find(|t| t.uuid() == Some(*uuid));
            let old = self
                .baseline
                .get(uuid)
                .map(compose_f4)
                .transpose()?;
            let new = current.map(compose_f4).transpose()?;
            if old == new {
                continue;
            }
            records.push(UndoRecord::new(now, old, new));
            if let Some(task) = current {
                backlog_lines.push_str(&serialization::task_to_json_line(task));
            }
        }
        undo::append(&self.undo_path(), &records)?;

        if self.pending_changed {
            write_data_file(&self.pending_path(), &self.pending)?;
        }
        if self.completed_changed {
            write_data_file(&self.completed_path(), &self.completed)?;
        }
        if !backlog_lines.is_empty() {
            append_backlog(&self.backlog_path(), &backlog_lines)?;
        }

        info!(
            "committed {} change(s) to {}",
            records.len(),
            self.data_dir.display()
        );

        // Reset bookkeeping so the state reflects disk again.
        self.baseline.clear();
        for task in self.pending.iter().chain(self.completed.iter()) {
            if let Some(uuid) = task.uuid() {
                self.baseline.insert(uuid, task.clone());
            }
        }
        self.dirty.clear();
        self.pending_changed = false;
        self.completed_changed = false;
        self.lock.take();
        Ok(())
    }

    // -- Undo ----------------------------------------------------------------

    /// Pop the last undo transaction and restore its "before" state.
    /// Returns a description of what was restored.
    pub fn undo_last(&mut self, _now: DateTime<Utc>) -> Result<String, TaskError> {
        let record = undo::pop_last(&self.undo_path())?.ok_or(TaskError::NothingToUndo)?;

        let outcome = match (&record.old, &record.new) {
            (Some(old_line), _) => {
                let restored = parse_line(old_line, "undo.data", 0)?;
                let uuid = restored.uuid().ok_or(TaskError::NothingToUndo)?;
                self.restore_task(uuid, restored)?;
                format!("restored task {uuid}")
            }
            (None, Some(new_line)) => {
                let added = parse_line(new_line, "undo.data", 0)?;
                let uuid = added.uuid().ok_or(TaskError::NothingToUndo)?;
                self.remove_task(uuid);
                format!("removed task {uuid}")
            }
            (None, None) => return Err(TaskError::NothingToUndo),
        };

        // Undo writes the data files directly; it must not generate new
        // undo records for the rollback itself.
        write_data_file(&self.pending_path(), &self.pending)?;
        if self.completed_loaded {
            write_data_file(&self.completed_path(), &self.completed)?;
        }
        for task in self.pending.iter().chain(self.completed.iter()) {
            if let Some(uuid) = task.uuid() {
                self.baseline.insert(uuid, task.clone());
            }
        }
        self.pending_changed = false;
        self.completed_changed = false;
        Ok(outcome)
    }

    fn restore_task(&mut self, uuid: Uuid, mut restored: Task) -> Result<(), TaskError> {
        if let Some(slot) = self.pending.iter_mut().find(|t| t.uuid() == Some(uuid)) {
            restored.set_id(slot.id());
            *slot = restored;
            return Ok(());
        }
        self.ensure_completed_loaded()?;
        if let Some(slot) = self.completed.iter_mut().find(|t| t.uuid() == Some(uuid)) {
            *slot = restored;
            return Ok(());
        }
        // Not present anywhere: bring it back into the pending set.
        self.add_task(restored);
        self.dirty.remove(&uuid);
        Ok(())
    }

    fn remove_task(&mut self, uuid: Uuid) {
        self.pending.retain(|t| t.uuid() != Some(uuid));
        self.completed.retain(|t| t.uuid() != Some(uuid));
        if let Some(id) = self.uuid_to_id.remove(&uuid) {
            self.id_to_uuid.remove(&id);
        }
        self.baseline.remove(&uuid);
        self.dirty.remove(&uuid);
    }
}

/// Parse a whole data file, reporting the failing line on error. A
/// missing file is an empty task set. The flag reports whether any
/// line was in a legacy (pre-F4) format.
fn read_data_file(path: &Path) -> Result<(Vec<Task>, bool), TaskError> {
    if !path.exists() {
        return Ok((Vec::new(), false));
    }
    let content = fs::read_to_string(path).map_err(|e| StorageError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    let mut tasks = Vec::new();
    let mut saw_legacy = false;
    for (index, line) in content.lines().enumerate() {
        if line.is_empty() {
            continue;
        }
        if crate::task::detect(line) != Some(crate::task::FileFormat::F4) {
            saw_legacy = true;
        }
        tasks.push(parse_line(line, &file_name, index + 1)?);
    }
    Ok((tasks, saw_legacy))
}

/// Rewrite a data file atomically: write a temp file in the same
/// directory, then rename over the target.
fn write_data_file(path: &Path, tasks: &[Task]) -> Result<(), TaskError> {
    let temp = path.with_extension("data.tmp");
    {
        let mut file = fs::File::create(&temp).map_err(|e| StorageError::Io {
            path: temp.clone(),
            source: e,
        })?;
        let mut buffer = String::new();
        for task in tasks {
            buffer.push_str(&compose_f4(task)?);
            buffer.push('\n');
        }
        file.write_all(buffer.as_bytes())
            .map_err(|e| StorageError::Io {
                path: temp.clone(),
                source: e,
            })?;
    }
    fs::rename(&temp, path).map_err(|e| StorageError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    Ok(())
}

fn append_backlog(path: &Path, lines: &str) -> Result<(), StorageError> {
    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| StorageError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
    file.write_all(lines.as_bytes())
        .map_err(|e| StorageError::Io {
            path: path.to_path_buf(),
            source: e,
        })
}
