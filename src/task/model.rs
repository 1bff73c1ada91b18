//! Task model definitions
//!
//! A task is a mapping from attribute name to attribute value, exactly
//! as it appears in the data files. The map is authoritative; typed
//! views (`AttributeValue`, dates, durations, tag and dependency sets)
//! are derived on access. Attribute values stay strings at the file
//! boundary so any format round-trips losslessly.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::date;
use crate::duration::Duration;
use crate::error::ValidationError;
use crate::task::Annotation;

/// Reserved attributes whose values are epoch-second dates.
pub const DATE_ATTRIBUTES: &[&str] =
    &["entry", "start", "end", "due", "wait", "until", "scheduled"];

/// Attribute names with engine-defined meaning. UDA declarations may
/// not use any of these.
pub const RESERVED_ATTRIBUTES: &[&str] = &[
    "uuid",
    "status",
    "entry",
    "start",
    "end",
    "due",
    "wait",
    "until",
    "scheduled",
    "recur",
    "mask",
    "imask",
    "parent",
    "description",
    "project",
    "priority",
    "tags",
    "depends",
];

/// Task status enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskStatus {
    /// Task is pending (not completed)
    Pending,
    /// Task has been completed
    Completed,
    /// Task has been deleted
    Deleted,
    /// Task is a recurring parent template
    Recurring,
    /// Task is waiting (hidden until wait date)
    Waiting,
}

impl Default for TaskStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl TaskStatus {
    /// Single-letter code used by the F4 format.
    pub fn code(&self) -> char {
        match self {
            TaskStatus::Pending => 'P',
            TaskStatus::Completed => 'C',
            TaskStatus::Deleted => 'D',
            TaskStatus::Recurring => 'R',
            TaskStatus::Waiting => 'W',
        }
    }

    pub fn from_code(code: char) -> Option<Self> {
        match code {
            'P' => Some(TaskStatus::Pending),
            'C' => Some(TaskStatus::Completed),
            'D' => Some(TaskStatus::Deleted),
            'R' => Some(TaskStatus::Recurring),
            'W' => Some(TaskStatus::Waiting),
            _ => None,
        }
    }

    /// A terminal task no longer participates in reports or blocking.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Deleted)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Completed => "completed",
            TaskStatus::Deleted => "deleted",
            TaskStatus::Recurring => "recurring",
            TaskStatus::Waiting => "waiting",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TaskStatus::Pending),
            "completed" => Ok(TaskStatus::Completed),
            "deleted" => Ok(TaskStatus::Deleted),
            "recurring" => Ok(TaskStatus::Recurring),
            "waiting" => Ok(TaskStatus::Waiting),
            _ => Err(()),
        }
    }
}

/// Task priority levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Priority {
    pub fn from_letter(letter: &str) -> Option<Self> {
        match letter {
            "L" => Some(Priority::Low),
            "M" => Some(Priority::Medium),
            "H" => Some(Priority::High),
            _ => None,
        }
    }

    pub fn letter(&self) -> &'static str {
        match self {
            Priority::Low => "L",
            Priority::Medium => "M",
            Priority::High => "H",
        }
    }
}

/// Typed view of an attribute value. Files store strings; in memory a
/// value is interpreted late according to the attribute's declared type.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    Text(String),
    Integer(i64),
    Date(DateTime<Utc>),
    Duration(Duration),
}

impl AttributeValue {
    /// The storage string for this value.
    pub fn storage(&self) -> String {
        match self {
            AttributeValue::Text(s) => s.clone(),
            AttributeValue::Integer(i) => i.to_string(),
            AttributeValue::Date(d) => d.timestamp().to_string(),
            AttributeValue::Duration(d) => d.to_string(),
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.storage())
    }
}

/// The central task record: a working-set ID plus the attribute map.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Task {
    /// Transient 1-based ID, assigned at load from the task's position
    /// in pending.data. Zero means no ID (completed/deleted tasks).
    id: u32,
    data: BTreeMap<String, String>,
}

impl Task {
    /// Create a pending task with a fresh UUID.
    pub fn new(description: &str, entry: DateTime<Utc>) -> Self {
        let mut task = Self::default();
        task.data
            .insert("uuid".to_string(), Uuid::new_v4().to_string());
        task.data
            .insert("status".to_string(), TaskStatus::Pending.to_string());
        task.data
            .insert("entry".to_string(), entry.timestamp().to_string());
        task.data
            .insert("description".to_string(), description.to_string());
        task
    }

    /// Reconstruct a task from a parsed attribute map.
    pub fn from_attributes(data: BTreeMap<String, String>) -> Self {
        Self { id: 0, data }
    }

    /// The working-set ID (0 when none is assigned).
    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn set_id(&mut self, id: u32) {
        self.id = id;
    }

    /// The task's UUID. Every stored task has one; a default-constructed
    /// task does not until one is assigned.
    pub fn uuid(&self) -> Option<Uuid> {
        self.data.get("uuid").and_then(|v| Uuid::parse_str(v).ok())
    }

    /// Assign the UUID. Fails if one is already set; uuid is write-once.
    pub fn set_uuid(&mut self, uuid: Uuid) -> Result<(), ValidationError> {
        if self.data.contains_key("uuid") {
            return Err(ValidationError::ImmutableUuid);
        }
        self.data.insert("uuid".to_string(), uuid.to_string());
        Ok(())
    }

    pub fn status(&self) -> TaskStatus {
        self.data
            .get("status")
            .and_then(|v| v.parse().ok())
            .unwrap_or_default()
    }

    pub fn set_status(&mut self, status: TaskStatus) {
        self.data.insert("status".to_string(), status.to_string());
    }

    // -- Raw attribute access ------------------------------------------------

    pub fn get(&self, name: &str) -> Option<&str> {
        self.data.get(name).map(|v| v.as_str())
    }

    pub fn has(&self, name: &str) -> bool {
        self.data.contains_key(name)
    }

    pub fn set(&mut self, name: &str, value: &str) {
        self.data.insert(name.to_string(), value.to_string());
    }

    pub fn remove(&mut self, name: &str) {
        self.data.remove(name);
    }

    /// Iterate over all attributes in name order.
    pub fn attributes(&self) -> impl Iterator<Item = (&String, &String)> {
        self.data.iter()
    }

    /// Attribute names present on this task but not reserved and not
    /// annotations: candidate UDAs.
    pub fn uda_names(&self) -> Vec<&str> {
        self.data
            .keys()
            .map(|k| k.as_str())
            .filter(|k| !RESERVED_ATTRIBUTES.contains(k) && !k.starts_with("annotation_"))
            .collect()
    }

    // -- Typed access --------------------------------------------------------

    /// Read a date attribute stored as epoch seconds.
    pub fn get_date(&self, name: &str) -> Option<DateTime<Utc>> {
        self.data
            .get(name)
            .and_then(|v| v.parse::<i64>().ok())
            .and_then(date::from_epoch)
    }

    pub fn set_date(&mut self, name: &str, value: DateTime<Utc>) {
        self.data
            .insert(name.to_string(), value.timestamp().to_string());
    }

    pub fn get_integer(&self, name: &str) -> Option<i64> {
        self.data.get(name).and_then(|v| v.parse().ok())
    }

    pub fn get_duration(&self, name: &str) -> Option<Duration> {
        self.data.get(name).and_then(|v| Duration::parse(v).ok())
    }

    pub fn description(&self) -> &str {
        self.data.get("description").map(|v| v.as_str()).unwrap_or("")
    }

    pub fn set_description(&mut self, description: &str) {
        self.data
            .insert("description".to_string(), description.to_string());
    }

    pub fn priority(&self) -> Option<Priority> {
        self.data
            .get("priority")
            .and_then(|v| Priority::from_letter(v))
    }

    pub fn project(&self) -> Option<&str> {
        self.data.get("project").map(|v| v.as_str())
    }

    // -- Tags ----------------------------------------------------------------

    /// All tags, in stored order.
    pub fn tags(&self) -> Vec<String> {
        match self.data.get("tags") {
            Some(joined) if !joined.is_empty() => {
                joined.split(',').map(|t| t.to_string()).collect()
            }
            _ => Vec::new(),
        }
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags().iter().any(|t| t == tag)
    }

    pub fn tag_count(&self) -> usize {
        self.tags().len()
    }

    /// Add a tag. Duplicates are ignored; empty or whitespace-bearing
    /// tags are rejected.
    pub fn add_tag(&mut self, tag: &str) -> Result<(), ValidationError> {
        if tag.is_empty() {
            return Err(ValidationError::EmptyTag);
        }
        if tag.chars().any(char::is_whitespace) {
            return Err(ValidationError::InvalidTag {
                tag: tag.to_string(),
            });
        }

        let mut tags = self.tags();
        if !tags.iter().any(|t| t == tag) {
            tags.push(tag.to_string());
            self.data.insert("tags".to_string(), tags.join(","));
        }
        Ok(())
    }

    pub fn remove_tag(&mut self, tag: &str) -> bool {
        let mut tags = self.tags();
        let before = tags.len();
        tags.retain(|t| t != tag);
        if tags.len() == before {
            return false;
        }
        if tags.is_empty() {
            self.data.remove("tags");
        } else {
            self.data.insert("tags".to_string(), tags.join(","));
        }
        true
    }

    // -- Annotations ---------------------------------------------------------

    /// All annotations, ordered by timestamp.
    pub fn annotations(&self) -> Vec<Annotation> {
        let mut result: Vec<Annotation> = self
            .data
            .iter()
            .filter_map(|(name, value)| {
                let epoch: i64 = name.strip_prefix("annotation_")?.parse().ok()?;
                Some(Annotation::new(date::from_epoch(epoch)?, value.clone()))
            })
            .collect();
        result.sort_by_key(|a| a.entry);
        result
    }

    pub fn annotation_count(&self) -> usize {
        self.data
            .keys()
            .filter(|k| k.starts_with("annotation_"))
            .count()
    }

    /// Add an annotation at the given time. Text is sanitized; when a
    /// second annotation lands on the same second, the timestamp is
    /// nudged forward to keep the key unique.
    pub fn add_annotation(&mut self, when: DateTime<Utc>, text: &str) {
        let mut epoch = when.timestamp();
        while self.data.contains_key(&format!("annotation_{epoch}")) {
            epoch += 1;
        }
        self.data
            .insert(format!("annotation_{epoch}"), Annotation::sanitize(text));
    }

    /// Remove annotations whose text contains `pattern`. Returns the
    /// number removed.
    pub fn remove_annotations_matching(&mut self, pattern: &str) -> usize {
        let keys: Vec<String> = self
            .data
            .iter()
            .filter(|(name, value)| {
                name.starts_with("annotation_") && value.contains(pattern)
            })
            .map(|(name, _)| name.clone())
            .collect();
        for key in &keys {
            self.data.remove(key);
        }
        keys.len()
    }

    // -- Dependencies --------------------------------------------------------

    /// UUIDs of the tasks this task is blocked by.
    pub fn depends(&self) -> Vec<Uuid> {
        match self.data.get("depends") {
            Some(joined) if !joined.is_empty() => joined
                .split(',')
                .filter_map(|u| Uuid::parse_str(u).ok())
                .collect(),
            _ => Vec::new(),
        }
    }

    pub fn has_dependency(&self, other: Uuid) -> bool {
        self.depends().contains(&other)
    }

    /// Record a dependency edge. Graph-level checks (self, duplicate,
    /// cycle) are the dependency module's responsibility.
    pub fn push_dependency(&mut self, other: Uuid) {
        let mut depends = self.depends();
        depends.push(other);
        let joined: Vec<String> = depends.iter().map(|u| u.to_string()).collect();
        self.data.insert("depends".to_string(), joined.join(","));
    }

    pub fn drop_dependency(&mut self, other: Uuid) -> bool {
        let mut depends = self.depends();
        let before = depends.len();
        depends.retain(|u| *u != other);
        if depends.len() == before {
            return false;
        }
        if depends.is_empty() {
            self.data.remove("depends");
        } else {
            let joined: Vec<String> = depends.iter().map(|u| u.to_string()).collect();
            self.data.insert("depends".to_string(), joined.join(","));
        }
        true
    }

    // -- Lifecycle -----------------------------------------------------------

    /// Mark the task completed.
    pub fn complete(&mut self, now: DateTime<Utc>) {
        self.set_status(TaskStatus::Completed);
        self.set_date("end", now);
        self.data.remove("start");
    }

    /// Mark the task deleted.
    pub fn delete(&mut self, now: DateTime<Utc>) {
        self.set_status(TaskStatus::Deleted);
        self.set_date("end", now);
        self.data.remove("start");
    }

    /// Begin working on the task.
    pub fn start(&mut self, now: DateTime<Utc>) {
        self.set_date("start", now);
    }

    /// Stop working on the task.
    pub fn stop(&mut self) {
        self.data.remove("start");
    }

    /// Presence of `start` marks the task active.
    pub fn is_active(&self) -> bool {
        self.data.contains_key("start")
    }

    /// A waiting task whose wait has arrived belongs back in pending.
    pub fn wait_has_expired(&self, now: DateTime<Utc>) -> bool {
        self.status() == TaskStatus::Waiting
            && self.get_date("wait").is_none_or(|wait| wait <= now)
    }

    // -- Validation ----------------------------------------------------------

    /// Check the record-level invariants. Graph- and schema-level checks
    /// (dependency cycles, UDA types) live with their owners.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let description = self.description();
        if description.is_empty() {
            return Err(ValidationError::EmptyDescription);
        }
        if description.chars().any(|c| c.is_control() && c != '\t') {
            return Err(ValidationError::ControlCharacters);
        }

        for tag in self.tags() {
            if tag.is_empty() {
                return Err(ValidationError::EmptyTag);
            }
            if tag.chars().any(char::is_whitespace) {
                return Err(ValidationError::InvalidTag { tag });
            }
        }

        if self.status() == TaskStatus::Recurring {
            if !self.has("due") {
                return Err(ValidationError::RecurringWithoutDue);
            }
            if !self.has("recur") {
                return Err(ValidationError::RecurringWithoutRecur);
            }
        }

        if let Some(priority) = self.get("priority") {
            if !priority.is_empty() && Priority::from_letter(priority).is_none() {
                return Err(ValidationError::InvalidPriority {
                    priority: priority.to_string(),
                });
            }
        }

        Ok(())
    }

    /// Clone this task as a new record: fresh UUID, no working-set ID.
    /// Used by `duplicate` and by recurrence materialization.
    pub fn duplicate(&self) -> Self {
        let mut copy = self.clone();
        copy.id = 0;
        copy.data
            .insert("uuid".to_string(), Uuid::new_v4().to_string());
        copy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 22, 8, 0, 0).unwrap()
    }

    #[test]
    fn new_task_has_required_attributes() {
        let task = Task::new("Buy milk", now());
        assert!(task.uuid().is_some());
        assert_eq!(task.status(), TaskStatus::Pending);
        assert_eq!(task.description(), "Buy milk");
        assert_eq!(task.get_date("entry"), Some(now()));
        assert!(task.validate().is_ok());
    }

    #[test]
    fn uuid_is_write_once() {
        let mut task = Task::new("Test", now());
        let err = task.set_uuid(Uuid::new_v4());
        assert!(matches!(err, Err(ValidationError::ImmutableUuid)));
    }

    #[test]
    fn tag_round_trip() {
        let mut task = Task::new("Test", now());
        task.add_tag("home").unwrap();
        task.add_tag("urgent").unwrap();
        task.add_tag("home").unwrap(); // duplicate ignored
        assert_eq!(task.tags(), vec!["home", "urgent"]);
        assert_eq!(task.get("tags"), Some("home,urgent"));
        assert!(task.has_tag("urgent"));

        assert!(task.remove_tag("home"));
        assert!(!task.remove_tag("home"));
        assert_eq!(task.tags(), vec!["urgent"]);
    }

    #[test]
    fn invalid_tags_rejected() {
        let mut task = Task::new("Test", now());
        assert!(matches!(
            task.add_tag("has space"),
            Err(ValidationError::InvalidTag { .. })
        ));
        assert!(matches!(task.add_tag(""), Err(ValidationError::EmptyTag)));
    }

    #[test]
    fn annotations_are_epoch_keyed() {
        let mut task = Task::new("Test", now());
        task.add_annotation(now(), "first note");
        task.add_annotation(now(), "second note");

        // Same-second annotations get distinct keys.
        assert_eq!(task.annotation_count(), 2);
        let annotations = task.annotations();
        assert_eq!(annotations[0].description, "first note");
        assert_eq!(annotations[1].description, "second note");
    }

    #[test]
    fn annotation_text_is_sanitized() {
        let mut task = Task::new("Test", now());
        task.add_annotation(now(), "see [1] and \"2\"");
        assert_eq!(task.annotations()[0].description, "see (1) and '2'");
    }

    #[test]
    fn denotate_by_pattern() {
        let mut task = Task::new("Test", now());
        task.add_annotation(now(), "call the plumber");
        task.add_annotation(now() + chrono::Duration::seconds(5), "buy pipe");
        assert_eq!(task.remove_annotations_matching("plumber"), 1);
        assert_eq!(task.annotation_count(), 1);
    }

    #[test]
    fn dependency_list_round_trip() {
        let mut task = Task::new("Test", now());
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        task.push_dependency(a);
        task.push_dependency(b);
        assert_eq!(task.depends(), vec![a, b]);
        assert!(task.has_dependency(a));

        assert!(task.drop_dependency(a));
        assert!(!task.drop_dependency(a));
        assert_eq!(task.depends(), vec![b]);
    }

    #[test]
    fn lifecycle_transitions() {
        let mut task = Task::new("Test", now());
        task.start(now());
        assert!(task.is_active());

        let later = now() + chrono::Duration::hours(1);
        task.complete(later);
        assert_eq!(task.status(), TaskStatus::Completed);
        assert_eq!(task.get_date("end"), Some(later));
        assert!(!task.is_active());
    }

    #[test]
    fn waiting_reaper_boundary() {
        let mut task = Task::new("Test", now());
        task.set_status(TaskStatus::Waiting);
        task.set_date("wait", now());
        // wait == now counts as expired.
        assert!(task.wait_has_expired(now()));
        task.set_date("wait", now() + chrono::Duration::seconds(1));
        assert!(!task.wait_has_expired(now()));
    }

    #[test]
    fn validation_catches_bad_records() {
        let mut task = Task::new("Test", now());
        task.set_description("");
        assert!(matches!(
            task.validate(),
            Err(ValidationError::EmptyDescription)
        ));

        let task = Task::new("has\nnewline", now());
        assert!(matches!(
            task.validate(),
            Err(ValidationError::ControlCharacters)
        ));

        let mut task = Task::new("tabs\tallowed", now());
        assert!(task.validate().is_ok());
        task.set_status(TaskStatus::Recurring);
        assert!(matches!(
            task.validate(),
            Err(ValidationError::RecurringWithoutDue)
        ));
    }

    #[test]
    fn duplicate_gets_fresh_identity() {
        let mut task = Task::new("Test", now());
        task.set_id(4);
        task.add_tag("keep").unwrap();
        let copy = task.duplicate();
        assert_ne!(copy.uuid(), task.uuid());
        assert_eq!(copy.id(), 0);
        assert!(copy.has_tag("keep"));
    }

    #[test]
    fn typed_accessors() {
        let mut task = Task::new("Test", now());
        task.set("recur", "weekly");
        assert_eq!(task.get_duration("recur").unwrap().seconds(), 604_800);
        task.set("imask", "3");
        assert_eq!(task.get_integer("imask"), Some(3));
    }
}
