//! Command surface
//!
//! The general invocation form is `[<filter>] <command> [<modifications>]`.
//! This module splits the argument vector around the first recognized
//! command name, compiles the filter, parses the modification list, and
//! dispatches. Mutating commands on an empty filter touch every task
//! and are gated behind confirmation unless `confirmation=off`.

pub mod add;
pub mod annotate;
pub mod delete;
pub mod done;
pub mod duplicate;
pub mod import;
pub mod modify;
pub mod reports;
pub mod start_stop;
pub mod undo;

use std::str::FromStr;

use uuid::Uuid;

use crate::config::Configuration;
use crate::context::Session;
use crate::error::{TaskError, ValidationError};
use crate::expr::Filter;
use crate::task::recurrence::Recurrence;
use crate::task::{Task, TaskStatus, DATE_ATTRIBUTES, RESERVED_ATTRIBUTES};

/// Every command the engine executes. Read-only commands hand their
/// data to an external renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Add,
    Log,
    Modify,
    Done,
    Delete,
    Start,
    Stop,
    Annotate,
    Denotate,
    Duplicate,
    Undo,
    Import,
    Info,
    List,
    All,
    Export,
    Projects,
    Tags,
    Stats,
    Ids,
    Uuids,
}

impl Command {
    /// Whether this command writes to the task set.
    pub fn mutates(&self) -> bool {
        matches!(
            self,
            Command::Add
                | Command::Log
                | Command::Modify
                | Command::Done
                | Command::Delete
                | Command::Start
                | Command::Stop
                | Command::Annotate
                | Command::Denotate
                | Command::Duplicate
                | Command::Undo
                | Command::Import
        )
    }

    /// Whether the command operates on a filtered selection (so an
    /// empty filter means "every task").
    pub fn takes_filter(&self) -> bool {
        !matches!(self, Command::Add | Command::Log | Command::Undo | Command::Import)
    }
}

impl FromStr for Command {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "add" => Ok(Command::Add),
            "log" => Ok(Command::Log),
            "modify" => Ok(Command::Modify),
            "done" => Ok(Command::Done),
            "delete" => Ok(Command::Delete),
            "start" => Ok(Command::Start),
            "stop" => Ok(Command::Stop),
            "annotate" => Ok(Command::Annotate),
            "denotate" => Ok(Command::Denotate),
            "duplicate" => Ok(Command::Duplicate),
            "undo" => Ok(Command::Undo),
            "import" => Ok(Command::Import),
            "info" => Ok(Command::Info),
            "list" => Ok(Command::List),
            "all" => Ok(Command::All),
            "export" => Ok(Command::Export),
            "projects" => Ok(Command::Projects),
            "tags" => Ok(Command::Tags),
            "stats" => Ok(Command::Stats),
            "ids" => Ok(Command::Ids),
            "uuids" => Ok(Command::Uuids),
            _ => Err(()),
        }
    }
}

/// A parsed invocation: filter, command, and raw modification args.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub filter: Filter,
    pub filter_was_empty: bool,
    pub command: Command,
    pub modifications: Vec<String>,
}

/// Split the argument vector: `rc.<key>=<value>` overrides apply to the
/// configuration wherever they appear, the first recognized command
/// name divides filter from modifications.
pub fn parse_invocation(
    args: &[String],
    config: &mut Configuration,
) -> Result<Invocation, TaskError> {
    let mut remaining: Vec<String> = Vec::new();
    for arg in args {
        if !config.apply_override(arg) {
            remaining.push(arg.clone());
        }
    }

    let command_position = remaining
        .iter()
        .position(|arg| Command::from_str(arg).is_ok());

    let Some(position) = command_position else {
        return Err(crate::error::QueryError::UnrecognizedToken {
            token: remaining.first().cloned().unwrap_or_default(),
            index: 0,
        }
        .into());
    };

    let command = Command::from_str(&remaining[position]).unwrap_or(Command::List);
    let filter_args = &remaining[..position];
    let modifications = remaining[position + 1..].to_vec();

    Ok(Invocation {
        filter: Filter::parse(filter_args)?,
        filter_was_empty: filter_args.is_empty(),
        command,
        modifications,
    })
}

/// What a command did, plus feedback lines for the external renderer.
#[derive(Debug, Default)]
pub struct CommandOutcome {
    pub affected: usize,
    pub feedback: Vec<String>,
    pub tasks: Vec<Task>,
}

impl CommandOutcome {
    pub fn note<S: Into<String>>(&mut self, line: S) {
        self.feedback.push(line.into());
    }
}

/// Whether a modify on a recurring child touches just that instance or
/// every pending sibling. The decision comes from the caller's
/// feedback interface; the engine never guesses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecurrenceScope {
    #[default]
    ThisTask,
    AllPending,
}

/// A description substitution: `/from/to/` or `/from/to/g`.
#[derive(Debug, Clone, PartialEq)]
pub struct Substitution {
    pub from: String,
    pub to: String,
    pub global: bool,
}

impl Substitution {
    fn parse(arg: &str) -> Option<Self> {
        let body = arg.strip_prefix('/')?;
        let (from, rest) = body.split_once('/')?;
        let (to, tail) = rest.split_once('/')?;
        let global = match tail {
            "" => false,
            "g" => true,
            _ => return None,
        };
        if from.is_empty() {
            return None;
        }
        Some(Self {
            from: from.to_string(),
            to: to.to_string(),
            global,
        })
    }

    pub fn apply(&self, text: &str) -> String {
        if self.global {
            text.replace(&self.from, &self.to)
        } else {
            text.replacen(&self.from, &self.to, 1)
        }
    }
}

/// Parsed modification arguments.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Modification {
    /// `name:value` assignments with non-empty values.
    pub sets: Vec<(String, String)>,
    /// `name:` clears.
    pub removes: Vec<String>,
    pub add_tags: Vec<String>,
    pub remove_tags: Vec<String>,
    /// `depends:` references to add (IDs or UUIDs, resolved later).
    pub depends_add: Vec<String>,
    /// `depends:-N` references to remove.
    pub depends_remove: Vec<String>,
    pub substitution: Option<Substitution>,
    /// Bare words; they become the description (add/log/annotate) or
    /// replace it (modify).
    pub words: Vec<String>,
}

impl Modification {
    pub fn parse(args: &[String]) -> Self {
        let mut modification = Self::default();

        for arg in args {
            if let Some(subst) = Substitution::parse(arg) {
                modification.substitution = Some(subst);
                continue;
            }

            if let Some(tag) = arg.strip_prefix('+') {
                if !tag.is_empty() && !tag.contains(char::is_whitespace) {
                    modification.add_tags.push(tag.to_string());
                    continue;
                }
            }
            if let Some(tag) = arg.strip_prefix('-') {
                if !tag.is_empty()
                    && !tag.contains(char::is_whitespace)
                    && !tag.bytes().all(|b| b.is_ascii_digit())
                {
                    modification.remove_tags.push(tag.to_string());
                    continue;
                }
            }

            if let Some((name, value)) = arg.split_once(':') {
                if is_attribute_name(name) {
                    if name == "depends" {
                        for element in value.split(',').filter(|e| !e.is_empty()) {
                            match element.strip_prefix('-') {
                                Some(reference) => modification
                                    .depends_remove
                                    .push(reference.to_string()),
                                None => {
                                    modification.depends_add.push(element.to_string())
                                }
                            }
                        }
                    } else if value.is_empty() {
                        modification.removes.push(name.to_string());
                    } else {
                        modification
                            .sets
                            .push((name.to_string(), value.to_string()));
                    }
                    continue;
                }
            }

            modification.words.push(arg.clone());
        }

        modification
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// The description assembled from the bare words.
    pub fn description(&self) -> Option<String> {
        if self.words.is_empty() {
            None
        } else {
            Some(self.words.join(" "))
        }
    }

    /// Apply attribute assignments, tag edits and the substitution to a
    /// task. Dependency references are resolved by the caller (they
    /// need the working set). Returns semantic warnings.
    pub fn apply(&self, task: &mut Task, session: &Session) -> Result<Vec<String>, TaskError> {
        let mut warnings = Vec::new();
        let schema = session.env.config.uda_schema()?;

        for (name, value) in &self.sets {
            set_attribute(task, name, value, &schema, session)?;
        }
        for name in &self.removes {
            if name == "uuid" {
                return Err(ValidationError::ImmutableUuid.into());
            }
            task.remove(name);
        }

        for tag in &self.add_tags {
            task.add_tag(tag).map_err(TaskError::from)?;
        }
        for tag in &self.remove_tags {
            task.remove_tag(tag);
        }

        if let Some(subst) = &self.substitution {
            let replaced = subst.apply(task.description());
            task.set_description(&replaced);
        }

        if let Some(description) = self.description() {
            task.set_description(&description);
        }

        // A wait in the future hides the task; a past or removed wait
        // surfaces it again.
        match task.get_date("wait") {
            Some(wait) if wait > session.env.now => {
                if task.status() == TaskStatus::Pending {
                    task.set_status(TaskStatus::Waiting);
                }
            }
            _ => {
                if task.status() == TaskStatus::Waiting {
                    task.set_status(TaskStatus::Pending);
                    task.remove("wait");
                }
            }
        }

        // Semantic warnings, reported but not fatal.
        if let (Some(start), Some(end)) = (task.get_date("start"), task.get_date("end")) {
            if start > end {
                warnings.push("Warning: start is later than end".to_string());
            }
        }
        if let (Some(until), Some(due)) = (task.get_date("until"), task.get_date("due")) {
            if until < due {
                warnings.push("Warning: until is earlier than due".to_string());
            }
        }

        Ok(warnings)
    }
}

fn is_attribute_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn set_attribute(
    task: &mut Task,
    name: &str,
    value: &str,
    schema: &std::collections::BTreeMap<String, crate::config::UdaType>,
    session: &Session,
) -> Result<(), TaskError> {
    use crate::config::UdaType;
    use crate::date::DateParsing;

    match name {
        "uuid" => return Err(ValidationError::ImmutableUuid.into()),
        "status" => {
            return Err(ValidationError::InvalidStatusTransition {
                from: task.status().to_string(),
                to: value.to_string(),
            }
            .into())
        }
        "priority" => {
            if !value.is_empty() && crate::task::Priority::from_letter(value).is_none() {
                return Err(ValidationError::InvalidPriority {
                    priority: value.to_string(),
                }
                .into());
            }
            task.set(name, value);
        }
        "recur" => {
            Recurrence::parse(value)?;
            task.set(name, value);
        }
        "imask" => {
            let _: u64 = value.parse().map_err(|_| ValidationError::InvalidUdaValue {
                name: name.to_string(),
                uda_type: "numeric".to_string(),
                value: value.to_string(),
            })?;
            task.set(name, value);
        }
        _ if DATE_ATTRIBUTES.contains(&name) => {
            let date = session.env.date_parser.parse_date(value, session.env.now)?;
            task.set_date(name, date);
        }
        _ if RESERVED_ATTRIBUTES.contains(&name) => {
            task.set(name, value);
        }
        _ => match schema.get(name) {
            Some(UdaType::Text) => task.set(name, value),
            Some(UdaType::Numeric) => {
                let _: f64 = value.parse().map_err(|_| ValidationError::InvalidUdaValue {
                    name: name.to_string(),
                    uda_type: "numeric".to_string(),
                    value: value.to_string(),
                })?;
                task.set(name, value);
            }
            Some(UdaType::Date) => {
                let date = session
                    .env
                    .date_parser
                    .parse_date(value, session.env.now)
                    .map_err(|_| ValidationError::InvalidUdaValue {
                        name: name.to_string(),
                        uda_type: "date".to_string(),
                        value: value.to_string(),
                    })?;
                task.set_date(name, date);
            }
            Some(UdaType::Duration) => {
                crate::duration::Duration::parse(value).map_err(|_| {
                    ValidationError::InvalidUdaValue {
                        name: name.to_string(),
                        uda_type: "duration".to_string(),
                        value: value.to_string(),
                    }
                })?;
                task.set(name, value);
            }
            None => {
                return Err(ValidationError::UnknownAttribute {
                    name: name.to_string(),
                }
                .into())
            }
        },
    }
    Ok(())
}

/// Resolve an ID or UUID reference against the working set.
pub fn resolve_reference(session: &Session, reference: &str) -> Result<Uuid, TaskError> {
    if let Ok(id) = reference.parse::<u32>() {
        return session
            .db
            .uuid_for_id(id)
            .ok_or(TaskError::NoSuchId { id });
    }
    let uuid = Uuid::parse_str(reference).map_err(|_| crate::error::ParseError::InvalidUuid {
        token: reference.to_string(),
    })?;
    if session.db.get_by_uuid(uuid).is_none() {
        return Err(TaskError::NotFound { id: uuid });
    }
    Ok(uuid)
}

/// Gate for mutating commands whose filter selects everything.
pub fn confirm_bulk_change(
    session: &Session,
    filter_was_empty: bool,
    confirmed: bool,
    action: &str,
) -> Result<(), TaskError> {
    if filter_was_empty && session.env.config.confirmation() && !confirmed {
        return Err(TaskError::ConfirmationRequired {
            action: action.to_string(),
        });
    }
    Ok(())
}

/// Resolve dependency references parsed out of `depends:` mods and
/// attach them with full graph checks.
pub fn apply_dependency_edits(
    session: &Session,
    task: &mut Task,
    modification: &Modification,
) -> Result<(), TaskError> {
    for reference in &modification.depends_add {
        let dependency = resolve_reference(session, reference)?;
        let snapshot: Vec<Task> = session.db.pending_tasks().to_vec();
        crate::deps::add_dependency(task, dependency, &snapshot)
            .map_err(TaskError::from)?;
    }
    for reference in &modification.depends_remove {
        if let Ok(dependency) = resolve_reference(session, reference) {
            crate::deps::remove_dependency(task, dependency);
        }
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests_support {
    use chrono::TimeZone;
    use tempfile::TempDir;

    use crate::config::Configuration;
    use crate::context::{Env, Session};

    /// A loaded session over a fresh temp data directory, with the
    /// clock pinned to 2024-01-22 08:00 UTC.
    pub fn test_session() -> (TempDir, Session) {
        let dir = TempDir::new().expect("tempdir");
        let mut config = Configuration::default();
        config.data_dir = dir.path().to_path_buf();
        let env = Env::at(
            config,
            chrono::Utc.with_ymd_and_hms(2024, 1, 22, 8, 0, 0).unwrap(),
        );
        let mut session = Session::new(env);
        session.load().expect("load");
        (dir, session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn invocation_splits_on_command() {
        let mut config = Configuration::default();
        let invocation = parse_invocation(
            &args(&["+home", "list"]),
            &mut config,
        )
        .unwrap();
        assert_eq!(invocation.command, Command::List);
        assert!(!invocation.filter.is_empty());
        assert!(invocation.modifications.is_empty());

        let invocation = parse_invocation(
            &args(&["add", "project:Home", "Buy", "milk"]),
            &mut config,
        )
        .unwrap();
        assert_eq!(invocation.command, Command::Add);
        assert!(invocation.filter_was_empty);
        assert_eq!(invocation.modifications.len(), 3);
    }

    #[test]
    fn rc_overrides_are_consumed() {
        let mut config = Configuration::default();
        let invocation = parse_invocation(
            &args(&["rc.confirmation=off", "1", "done"]),
            &mut config,
        )
        .unwrap();
        assert!(!config.confirmation());
        assert_eq!(invocation.command, Command::Done);
        assert!(!invocation.filter_was_empty);
    }

    #[test]
    fn missing_command_is_a_parse_error() {
        let mut config = Configuration::default();
        let err = parse_invocation(&args(&["+home"]), &mut config).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn modification_classification() {
        let m = Modification::parse(&args(&[
            "project:Home",
            "due:",
            "+urgent",
            "-someday",
            "depends:3,-4",
            "/cat/dog/g",
            "walk",
            "the",
            "dog",
        ]));
        assert_eq!(m.sets, vec![("project".to_string(), "Home".to_string())]);
        assert_eq!(m.removes, vec!["due".to_string()]);
        assert_eq!(m.add_tags, vec!["urgent".to_string()]);
        assert_eq!(m.remove_tags, vec!["someday".to_string()]);
        assert_eq!(m.depends_add, vec!["3".to_string()]);
        assert_eq!(m.depends_remove, vec!["4".to_string()]);
        assert_eq!(
            m.substitution,
            Some(Substitution {
                from: "cat".to_string(),
                to: "dog".to_string(),
                global: true,
            })
        );
        assert_eq!(m.description(), Some("walk the dog".to_string()));
    }

    #[test]
    fn substitution_forms() {
        let single = Substitution::parse("/a/b/").unwrap();
        assert!(!single.global);
        assert_eq!(single.apply("a a a"), "b a a");

        let global = Substitution::parse("/a/b/g").unwrap();
        assert!(global.global);
        assert_eq!(global.apply("a a a"), "b b b");

        assert!(Substitution::parse("/a/b").is_none());
        assert!(Substitution::parse("//b/").is_none());
    }
}
