//! Task records and file formats
//!
//! This module provides the task record itself (an attribute map with
//! typed views), the F1-F4 line formats, and the recurrence engine.

pub mod annotation;
pub mod format;
pub mod model;
pub mod recurrence;

// Re-export main types
pub use annotation::Annotation;
pub use format::{compose_f4, detect, parse_line, FileFormat, MAX_LINE_LENGTH};
pub use model::{
    AttributeValue, Priority, Task, TaskStatus, DATE_ATTRIBUTES, RESERVED_ATTRIBUTES,
};
pub use recurrence::Recurrence;
