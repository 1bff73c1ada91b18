//! Task serialization for export and the backlog
//!
//! Renders tasks as JSON objects in the export shape: dates in compact
//! ISO form, tags and dependencies as arrays, annotations as objects.
//! The backlog file consumes the same shape, one object per line.

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{json, Map, Value};

use crate::task::{Task, DATE_ATTRIBUTES};

fn format_date(date: DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Render a task as a JSON object.
pub fn task_to_json(task: &Task) -> Value {
    let mut object = Map::new();

    if task.id() > 0 {
        object.insert("id".to_string(), json!(task.id()));
    }
    if let Some(uuid) = task.uuid() {
        object.insert("uuid".to_string(), json!(uuid.to_string()));
    }
    object.insert("status".to_string(), json!(task.status().to_string()));
    object.insert("description".to_string(), json!(task.description()));

    for &name in DATE_ATTRIBUTES {
        if let Some(date) = task.get_date(name) {
            object.insert(name.to_string(), json!(format_date(date)));
        }
    }

    let tags = task.tags();
    if !tags.is_empty() {
        object.insert("tags".to_string(), json!(tags));
    }

    let depends = task.depends();
    if !depends.is_empty() {
        let uuids: Vec<String> = depends.iter().map(|u| u.to_string()).collect();
        object.insert("depends".to_string(), json!(uuids));
    }

    let annotations = task.annotations();
    if !annotations.is_empty() {
        let rendered: Vec<Value> = annotations
            .iter()
            .map(|a| {
                json!({
                    "entry": format_date(a.entry),
                    "description": a.description,
                })
            })
            .collect();
        object.insert("annotations".to_string(), json!(rendered));
    }

    // Everything else (project, priority, recur, mask, UDAs, ...)
    // passes through as its storage string.
    for (name, value) in task.attributes() {
        if object.contains_key(name)
            || name.starts_with("annotation_")
            || DATE_ATTRIBUTES.contains(&name.as_str())
        {
            continue;
        }
        object.insert(name.clone(), json!(value));
    }

    Value::Object(object)
}

/// Render a task as a single JSON line, newline-terminated.
pub fn task_to_json_line(task: &Task) -> String {
    let mut line = task_to_json(task).to_string();
    line.push('\n');
    line
}
