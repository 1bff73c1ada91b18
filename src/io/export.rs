//! Task export
//!
//! Renders tasks as a JSON array (or as raw F4 lines) for external
//! consumers. The JSON shape matches the backlog lines: dates in
//! compact ISO form, tags and dependencies as arrays.

use std::io::Write;

use crate::error::TaskError;
use crate::storage::serialization::task_to_json;
use crate::task::{compose_f4, Task};

/// Export tasks as a pretty-printed JSON array.
pub fn export_json(tasks: &[Task]) -> Result<String, TaskError> {
    let values: Vec<serde_json::Value> = tasks.iter().map(task_to_json).collect();
    Ok(serde_json::to_string_pretty(&values)?)
}

/// Export tasks as F4 lines, one per task.
pub fn export_f4(tasks: &[Task]) -> Result<String, TaskError> {
    let mut out = String::new();
    for task in tasks {
        out.push_str(&compose_f4(task)?);
        out.push('\n');
    }
    Ok(out)
}

/// Write a JSON export to any writer.
pub fn write_json<W: Write>(tasks: &[Task], writer: &mut W) -> Result<(), TaskError> {
    let rendered = export_json(tasks)?;
    writer.write_all(rendered.as_bytes())?;
    writer.write_all(b"\n")?;
    Ok(())
}
