//! Error types for the task data engine
//!
//! This module defines all error types used throughout the library,
//! using thiserror for idiomatic Rust error handling. Errors fall into
//! the categories the invocation boundary cares about: parse errors
//! (exit code 2), validation/storage/configuration errors (exit code 1).

use std::path::PathBuf;
use uuid::Uuid;

/// Main error type for task operations
#[derive(thiserror::Error, Debug)]
pub enum TaskError {
    #[error("Task not found: {id}")]
    NotFound { id: Uuid },

    #[error("No task with ID {id}")]
    NoSuchId { id: u32 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Parse error")]
    Parse {
        #[from]
        source: ParseError,
    },

    #[error("Date parsing error")]
    Date {
        #[from]
        source: DateError,
    },

    #[error("Validation error")]
    Validation {
        #[from]
        source: ValidationError,
    },

    #[error("Storage error")]
    Storage {
        #[from]
        source: StorageError,
    },

    #[error("Configuration error")]
    Configuration {
        #[from]
        source: ConfigError,
    },

    #[error("Query error")]
    Query {
        #[from]
        source: QueryError,
    },

    #[error("Command requires confirmation: {action}")]
    ConfirmationRequired { action: String },

    #[error("Nothing to undo")]
    NothingToUndo,
}

impl TaskError {
    /// Map an error to the process exit code the CLI surface reports:
    /// 2 for parse errors, 1 for everything else.
    pub fn exit_code(&self) -> i32 {
        match self {
            TaskError::Parse { .. } | TaskError::Date { .. } => 2,
            TaskError::Query { source } if source.is_parse() => 2,
            _ => 1,
        }
    }
}

/// Errors from parsing task lines, durations and filter tokens
#[derive(thiserror::Error, Debug)]
pub enum ParseError {
    #[error("Unrecognized task file format in {file} at line {line}")]
    UnknownFormat { file: String, line: usize },

    #[error("Malformed {format} record in {file} at line {line}: {message}")]
    MalformedRecord {
        format: &'static str,
        file: String,
        line: usize,
        message: String,
    },

    #[error("Line {line} of {file} exceeds the {limit}-byte limit ({length} bytes)")]
    LineTooLong {
        file: String,
        line: usize,
        length: usize,
        limit: usize,
    },

    #[error("Unknown duration unit in '{input}'")]
    UnknownDuration { input: String },

    #[error("Ambiguous duration unit '{unit}' in '{input}'")]
    AmbiguousDuration { input: String, unit: String },

    #[error("Invalid UUID: {token}")]
    InvalidUuid { token: String },

    #[error("Invalid recurrence period: {period}")]
    InvalidRecurrence { period: String },
}

/// Date parsing errors
#[derive(thiserror::Error, Debug)]
pub enum DateError {
    #[error("Invalid date format: {input}")]
    InvalidFormat { input: String },

    #[error("Unknown date synonym: {synonym}")]
    UnknownSynonym { synonym: String },

    #[error("Date out of range: {input}")]
    OutOfRange { input: String },

    #[error("Timezone error: {message}")]
    Timezone { message: String },
}

/// Filter expression errors, carrying the offending token and its index
#[derive(thiserror::Error, Debug)]
pub enum QueryError {
    #[error("Unrecognized token '{token}' at position {index}")]
    UnrecognizedToken { token: String, index: usize },

    #[error("Unrecognized attribute modifier '{modifier}' at position {index}")]
    UnknownModifier { modifier: String, index: usize },

    #[error("Mismatched parentheses in filter expression")]
    UnbalancedParens,

    #[error("Invalid regular expression '{pattern}': {message}")]
    BadRegex { pattern: String, message: String },

    #[error("Malformed ID range '{range}' at position {index}")]
    MalformedRange { range: String, index: usize },

    #[error("Not enough operands for operator '{operator}'")]
    MissingOperand { operator: String },

    #[error("Unknown DOM reference '{reference}'")]
    UnknownDomReference { reference: String },

    #[error("Filter evaluation error: {message}")]
    Evaluation { message: String },
}

impl QueryError {
    /// Tokenizer and parser failures are parse errors (exit 2);
    /// evaluation failures are generic errors (exit 1).
    pub fn is_parse(&self) -> bool {
        !matches!(
            self,
            QueryError::Evaluation { .. } | QueryError::UnknownDomReference { .. }
        )
    }
}

/// Storage-related errors
#[derive(thiserror::Error, Debug)]
pub enum StorageError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Data location '{path}' does not exist, or is not readable and writable")]
    MissingDataDirectory { path: PathBuf },

    #[error("Could not lock {path} after {attempts} attempts")]
    LockTimeout { path: PathBuf, attempts: u32 },

    #[error("Undo journal is malformed at line {line}")]
    CorruptUndo { line: usize },

    #[error("Undo journal references a task not present in the data files: {uuid}")]
    DanglingUndo { uuid: Uuid },
}

/// Configuration-related errors
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("I/O error at path {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Parse error at line {line}: {content}")]
    ParseError { line: usize, content: String },

    #[error("Include nesting exceeds {depth} levels at {path}")]
    IncludeTooDeep { path: PathBuf, depth: usize },

    #[error("Invalid value for key '{key}': got '{value}', expected {expected}")]
    InvalidValue {
        key: String,
        value: String,
        expected: String,
    },

    #[error("Invalid UDA type '{declared}' for uda.{name}.type")]
    InvalidUdaType { name: String, declared: String },

    #[error("UDA name '{name}' collides with a reserved attribute")]
    ReservedUdaName { name: String },

    #[error("Directory discovery failed: {message}")]
    Discovery { message: String },
}

/// Validation errors for tasks
#[derive(thiserror::Error, Debug, Clone)]
pub enum ValidationError {
    #[error("Task description cannot be empty")]
    EmptyDescription,

    #[error("Task description may not contain control characters")]
    ControlCharacters,

    #[error("Tag cannot be empty")]
    EmptyTag,

    #[error("Invalid tag '{tag}': tags may not contain whitespace")]
    InvalidTag { tag: String },

    #[error("A task may not depend on itself")]
    SelfDependency,

    #[error("Task {task} already depends on {dependency}")]
    DuplicateDependency { task: Uuid, dependency: Uuid },

    #[error("Dependency on {dependency} would create a circular dependency")]
    CircularDependency { dependency: Uuid },

    #[error("A recurring task must have a due date")]
    RecurringWithoutDue,

    #[error("A recurring task must have a recurrence period")]
    RecurringWithoutRecur,

    #[error("Invalid status transition: from {from} to {to}")]
    InvalidStatusTransition { from: String, to: String },

    #[error("Invalid priority value: {priority}")]
    InvalidPriority { priority: String },

    #[error("The uuid attribute is immutable once set")]
    ImmutableUuid,

    #[error("Unknown attribute '{name}'; declare a UDA with uda.{name}.type")]
    UnknownAttribute { name: String },

    #[error("Invalid value '{value}' for {uda_type} UDA '{name}'")]
    InvalidUdaValue {
        name: String,
        uda_type: String,
        value: String,
    },
}
