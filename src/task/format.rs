//! Task line formats
//!
//! Each line of pending.data / completed.data is one task, in one of
//! four historical formats. All four are read; only F4 is written.
//!
//! - F4: `[name:"value" name:"value" ...]` with escape-encoded values
//! - F3: `uuid status [tags] [attributes] [annotations] description`
//! - F2: `uuid status [tags] [attributes] description`
//! - F1: `[tags] [attributes] description`, optional `X ` prefix for
//!   deleted; a UUID is synthesized on load
//!
//! If the detection code is inaccurate, data corruption ensues.

use std::collections::BTreeMap;

use uuid::Uuid;

use crate::error::ParseError;
use crate::nibbler::Nibbler;
use crate::task::model::{Task, TaskStatus};

/// Hard limit on the byte length of a single data-file line.
pub const MAX_LINE_LENGTH: usize = 32_768;

/// The four historical on-disk line formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    F1,
    F2,
    F3,
    F4,
}

/// Escape a value for embedding in an F4 line.
fn encode(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '"' => out.push_str("&dquot;"),
            '[' => out.push_str("&open;"),
            ']' => out.push_str("&close;"),
            '\t' => out.push_str("&tab;"),
            ',' => out.push_str("&comma;"),
            other => out.push(other),
        }
    }
    out
}

/// Reverse of `encode`.
fn decode(value: &str) -> String {
    if !value.contains('&') {
        return value.to_string();
    }
    value
        .replace("&dquot;", "\"")
        .replace("&open;", "[")
        .replace("&close;", "]")
        .replace("&tab;", "\t")
        .replace("&comma;", ",")
}

/// Attributes whose value is a comma-joined list. The joining commas
/// are structural and stay unescaped; commas can never occur inside the
/// list elements themselves.
fn is_list_attribute(name: &str) -> bool {
    name == "tags" || name == "depends"
}

/// Detect the format of a line.
///
/// F4 also opens with `[`, so it is recognized first by its `name:"..."`
/// shape; then the F1 check (`[` or `X`), then the uuid-prefixed F2/F3
/// distinguished by bracket-pair count.
pub fn detect(line: &str) -> Option<FileFormat> {
    let bytes = line.as_bytes();
    if bytes.is_empty() {
        return None;
    }

    if bytes[0] == b'[' && line.trim_end().ends_with(']') && line.contains(":\"") {
        return Some(FileFormat::F4);
    }

    if bytes[0] == b'[' || bytes[0] == b'X' {
        return Some(FileFormat::F1);
    }

    if bytes.len() > 37
        && bytes[8] == b'-'
        && bytes[13] == b'-'
        && bytes[18] == b'-'
        && bytes[23] == b'-'
        && bytes[36] == b' '
        && matches!(bytes[37], b'-' | b'+' | b'X' | b'r' | b'W')
    {
        // Three bracket pairs means annotations are present (F3).
        let pairs = line.matches("] [").count();
        return Some(if pairs >= 2 { FileFormat::F3 } else { FileFormat::F2 });
    }

    None
}

/// Parse one data-file line into a task, auto-detecting the format.
/// `file` and `line_number` are carried into any error.
pub fn parse_line(line: &str, file: &str, line_number: usize) -> Result<Task, ParseError> {
    let line = line.strip_suffix('\n').unwrap_or(line);
    // The limit counts the newline, mirroring compose.
    if line.len() + 1 > MAX_LINE_LENGTH {
        return Err(ParseError::LineTooLong {
            file: file.to_string(),
            line: line_number,
            length: line.len() + 1,
            limit: MAX_LINE_LENGTH,
        });
    }
    match detect(line) {
        Some(FileFormat::F4) => parse_f4(line, file, line_number),
        Some(FileFormat::F3) => parse_legacy(line, file, line_number, true),
        Some(FileFormat::F2) => parse_legacy(line, file, line_number, false),
        Some(FileFormat::F1) => parse_f1(line, file, line_number),
        None => Err(ParseError::UnknownFormat {
            file: file.to_string(),
            line: line_number,
        }),
    }
}

/// Compose the canonical F4 line for a task, without trailing newline.
pub fn compose_f4(task: &Task) -> Result<String, ParseError> {
    let mut parts: Vec<String> = Vec::new();
    for (name, value) in task.attributes() {
        let encoded = if name == "status" {
            task.status().code().to_string()
        } else if is_list_attribute(name) {
            value
                .split(',')
                .map(encode)
                .collect::<Vec<_>>()
                .join(",")
        } else {
            encode(value)
        };
        parts.push(format!("{name}:\"{encoded}\""));
    }

    let line = format!("[{}]", parts.join(" "));
    if line.len() + 1 > MAX_LINE_LENGTH {
        return Err(ParseError::LineTooLong {
            file: "<compose>".to_string(),
            line: 0,
            length: line.len() + 1,
            limit: MAX_LINE_LENGTH,
        });
    }
    Ok(line)
}

fn parse_f4(line: &str, file: &str, line_number: usize) -> Result<Task, ParseError> {
    let malformed = |message: &str| ParseError::MalformedRecord {
        format: "F4",
        file: file.to_string(),
        line: line_number,
        message: message.to_string(),
    };

    let mut n = Nibbler::new(line);
    if !n.skip('[') {
        return Err(malformed("missing opening bracket"));
    }

    let mut data = BTreeMap::new();
    loop {
        n.skip_ws();
        if n.skip(']') {
            break;
        }

        let name = n
            .get_until_one_of(":]")
            .filter(|name| !name.is_empty())
            .ok_or_else(|| malformed("missing attribute name"))?;
        if !n.skip(':') {
            return Err(malformed("missing colon after attribute name"));
        }
        let raw = n
            .get_quoted('"', false)
            .ok_or_else(|| malformed("missing quoted attribute value"))?;

        let value = if name == "status" {
            let code = raw.chars().next().ok_or_else(|| malformed("empty status"))?;
            TaskStatus::from_code(code)
                .ok_or_else(|| malformed("unknown status code"))?
                .to_string()
        } else {
            decode(&raw)
        };

        data.insert(name, value);
    }

    if !n.depleted() {
        return Err(malformed("trailing garbage after closing bracket"));
    }
    if !data.contains_key("uuid") {
        return Err(malformed("record has no uuid"));
    }

    Ok(Task::from_attributes(data))
}

fn legacy_status(code: u8) -> TaskStatus {
    match code {
        b'+' => TaskStatus::Completed,
        b'X' => TaskStatus::Deleted,
        b'r' => TaskStatus::Recurring,
        b'W' => TaskStatus::Waiting,
        _ => TaskStatus::Pending,
    }
}

/// Extract the text between the next `[` `]` pair.
fn bracketed(n: &mut Nibbler, malformed: &impl Fn(&str) -> ParseError) -> Result<String, ParseError> {
    n.skip_ws();
    if !n.skip('[') {
        return Err(malformed("missing opening bracket"));
    }
    let content = n
        .get_until(']')
        .ok_or_else(|| malformed("missing closing bracket"))?;
    if !n.skip(']') {
        return Err(malformed("missing closing bracket"));
    }
    Ok(content)
}

fn insert_tags(data: &mut BTreeMap<String, String>, raw: &str) {
    let tags: Vec<&str> = raw.split_whitespace().collect();
    if !tags.is_empty() {
        data.insert("tags".to_string(), tags.join(","));
    }
}

fn insert_attributes(
    data: &mut BTreeMap<String, String>,
    raw: &str,
    malformed: &impl Fn(&str) -> ParseError,
) -> Result<(), ParseError> {
    for pair in raw.split_whitespace() {
        let (name, value) = pair
            .split_once(':')
            .ok_or_else(|| malformed("attribute without colon"))?;
        if !value.is_empty() {
            data.insert(name.to_string(), value.to_string());
        }
    }
    Ok(())
}

/// Annotations in F3 are `<epoch>:"text"` pairs separated by spaces.
/// The text may itself contain colons and spaces, so scanning is
/// quote-driven.
fn insert_annotations(
    data: &mut BTreeMap<String, String>,
    raw: &str,
    malformed: &impl Fn(&str) -> ParseError,
) -> Result<(), ParseError> {
    let mut n = Nibbler::new(raw);
    loop {
        n.skip_ws();
        if n.depleted() {
            return Ok(());
        }
        let epoch = n
            .get_uint()
            .ok_or_else(|| malformed("annotation without epoch key"))?;
        if !n.skip(':') {
            return Err(malformed("annotation epoch without colon"));
        }
        let text = n
            .get_quoted('"', false)
            .ok_or_else(|| malformed("annotation without quoted text"))?;
        data.insert(format!("annotation_{epoch}"), text);
    }
}

fn parse_legacy(
    line: &str,
    file: &str,
    line_number: usize,
    with_annotations: bool,
) -> Result<Task, ParseError> {
    let format: &'static str = if with_annotations { "F3" } else { "F2" };
    let malformed = move |message: &str| ParseError::MalformedRecord {
        format,
        file: file.to_string(),
        line: line_number,
        message: message.to_string(),
    };

    let mut data = BTreeMap::new();
    let mut n = Nibbler::new(line);

    let uuid = n.get_uuid().ok_or_else(|| malformed("bad uuid"))?;
    data.insert("uuid".to_string(), uuid);

    n.skip_ws();
    let status = n
        .get_any_char()
        .ok_or_else(|| malformed("missing status character"))?;
    data.insert(
        "status".to_string(),
        legacy_status(status as u8).to_string(),
    );

    insert_tags(&mut data, &bracketed(&mut n, &malformed)?);
    insert_attributes(&mut data, &bracketed(&mut n, &malformed)?, &malformed)?;
    if with_annotations {
        insert_annotations(&mut data, &bracketed(&mut n, &malformed)?, &malformed)?;
    }

    n.skip(' ');
    let description = n.get_rest().unwrap_or_default();
    if description.is_empty() {
        return Err(malformed("missing description"));
    }
    data.insert("description".to_string(), description);

    Ok(Task::from_attributes(data))
}

fn parse_f1(line: &str, file: &str, line_number: usize) -> Result<Task, ParseError> {
    let malformed = |message: &str| ParseError::MalformedRecord {
        format: "F1",
        file: file.to_string(),
        line: line_number,
        message: message.to_string(),
    };

    let mut data = BTreeMap::new();
    let mut n = Nibbler::new(line);

    // `X ` prefix marks a deleted task.
    let status = if n.get_literal("X ") {
        TaskStatus::Deleted
    } else {
        TaskStatus::Pending
    };
    data.insert("status".to_string(), status.to_string());

    // No uuid on disk; synthesize one for forward support.
    data.insert("uuid".to_string(), Uuid::new_v4().to_string());

    insert_tags(&mut data, &bracketed(&mut n, &malformed)?);
    insert_attributes(&mut data, &bracketed(&mut n, &malformed)?, &malformed)?;

    n.skip(' ');
    let description = n.get_rest().unwrap_or_default();
    if description.is_empty() {
        return Err(malformed("missing description"));
    }
    data.insert("description".to_string(), description);

    Ok(Task::from_attributes(data))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_task() -> Task {
        let entry = chrono::Utc.with_ymd_and_hms(2024, 1, 22, 8, 0, 0).unwrap();
        let mut task = Task::new("Buy milk", entry);
        task.set("project", "Home");
        task.set("priority", "H");
        task.add_tag("errand").unwrap();
        task.add_tag("weekly").unwrap();
        task.add_annotation(entry, "whole milk, not skim");
        task
    }

    #[test]
    fn f4_round_trip() {
        let task = sample_task();
        let line = compose_f4(&task).unwrap();
        assert!(line.starts_with('['));
        assert!(line.ends_with(']'));
        assert!(line.contains("status:\"P\""));
        assert!(line.contains("tags:\"errand,weekly\""));

        let parsed = parse_line(&line, "pending.data", 1).unwrap();
        assert_eq!(parsed, task);
    }

    #[test]
    fn f4_escapes_round_trip() {
        let entry = chrono::Utc.with_ymd_and_hms(2024, 1, 22, 8, 0, 0).unwrap();
        let mut task = Task::new("odd [chars], \"quoted\"\tand, more", entry);
        task.set("project", "a,b");

        let line = compose_f4(&task).unwrap();
        assert!(line.contains("&open;"));
        assert!(line.contains("&close;"));
        assert!(line.contains("&dquot;"));
        assert!(line.contains("&tab;"));
        assert!(line.contains("&comma;"));

        let parsed = parse_line(&line, "pending.data", 1).unwrap();
        assert_eq!(parsed, task);
    }

    #[test]
    fn f4_all_statuses() {
        for status in [
            TaskStatus::Pending,
            TaskStatus::Completed,
            TaskStatus::Deleted,
            TaskStatus::Recurring,
            TaskStatus::Waiting,
        ] {
            let entry = chrono::Utc.with_ymd_and_hms(2024, 1, 22, 8, 0, 0).unwrap();
            let mut task = Task::new("status test", entry);
            task.set_status(status);
            if status == TaskStatus::Recurring {
                task.set("due", "1705881600");
                task.set("recur", "weekly");
            }
            let line = compose_f4(&task).unwrap();
            let parsed = parse_line(&line, "pending.data", 1).unwrap();
            assert_eq!(parsed.status(), status);
        }
    }

    #[test]
    fn detection() {
        assert_eq!(
            detect(r#"[description:"x" status:"P" uuid:"a"]"#),
            Some(FileFormat::F4)
        );
        assert_eq!(detect("[one two] [due:123] fix the gate"), Some(FileFormat::F1));
        assert_eq!(detect("X [one] [] fix the gate"), Some(FileFormat::F1));
        assert_eq!(
            detect("a1b2c3d4-e5f6-a7b8-c9d0-e1f2a3b4c5d6 - [] [] fix the gate"),
            Some(FileFormat::F2)
        );
        assert_eq!(
            detect("a1b2c3d4-e5f6-a7b8-c9d0-e1f2a3b4c5d6 - [] [] [] fix the gate"),
            Some(FileFormat::F3)
        );
        assert_eq!(detect("complete junk"), None);
    }

    #[test]
    fn f1_parse_synthesizes_uuid() {
        let task = parse_line(
            "[home errand] [due:1705881600 priority:H] Buy milk",
            "pending.data",
            3,
        )
        .unwrap();
        assert!(task.uuid().is_some());
        assert_eq!(task.status(), TaskStatus::Pending);
        assert_eq!(task.tags(), vec!["home", "errand"]);
        assert_eq!(task.get("due"), Some("1705881600"));
        assert_eq!(task.get("priority"), Some("H"));
        assert_eq!(task.description(), "Buy milk");

        let deleted = parse_line("X [] [] old chore", "pending.data", 4).unwrap();
        assert_eq!(deleted.status(), TaskStatus::Deleted);
    }

    #[test]
    fn f2_parse() {
        let task = parse_line(
            "a1b2c3d4-e5f6-a7b8-c9d0-e1f2a3b4c5d6 + [work] [entry:1600000000 end:1600001000] Ship the release",
            "completed.data",
            1,
        )
        .unwrap();
        assert_eq!(
            task.uuid().unwrap().to_string(),
            "a1b2c3d4-e5f6-a7b8-c9d0-e1f2a3b4c5d6"
        );
        assert_eq!(task.status(), TaskStatus::Completed);
        assert_eq!(task.tags(), vec!["work"]);
        assert_eq!(task.description(), "Ship the release");
    }

    #[test]
    fn f3_parse_with_annotations() {
        let task = parse_line(
            "a1b2c3d4-e5f6-a7b8-c9d0-e1f2a3b4c5d6 - [] [entry:1600000000] [1600000500:\"waiting on: parts\" 1600000600:\"called shop\"] Fix the car",
            "pending.data",
            2,
        )
        .unwrap();
        assert_eq!(task.status(), TaskStatus::Pending);
        assert_eq!(task.annotation_count(), 2);
        let annotations = task.annotations();
        assert_eq!(annotations[0].description, "waiting on: parts");
        assert_eq!(annotations[1].description, "called shop");
        assert_eq!(task.description(), "Fix the car");
    }

    #[test]
    fn f3_malformed_annotation_is_fatal() {
        let result = parse_line(
            "a1b2c3d4-e5f6-a7b8-c9d0-e1f2a3b4c5d6 - [] [] [badness] Fix the car",
            "pending.data",
            9,
        );
        match result {
            Err(ParseError::MalformedRecord { line, .. }) => assert_eq!(line, 9),
            other => panic!("expected malformed record, got {other:?}"),
        }
    }

    #[test]
    fn oversize_line_rejected() {
        let entry = chrono::Utc.with_ymd_and_hms(2024, 1, 22, 8, 0, 0).unwrap();
        let task = Task::new(&"x".repeat(MAX_LINE_LENGTH), entry);
        assert!(matches!(
            compose_f4(&task),
            Err(ParseError::LineTooLong { .. })
        ));

        let long_line = format!("[{}]", "y".repeat(MAX_LINE_LENGTH));
        assert!(matches!(
            parse_line(&long_line, "pending.data", 1),
            Err(ParseError::LineTooLong { .. })
        ));
    }

    #[test]
    fn errors_carry_location() {
        let result = parse_line("[unclosed:\"value\"", "pending.data", 17);
        match result {
            Err(ParseError::UnknownFormat { file, line }) => {
                assert_eq!(file, "pending.data");
                assert_eq!(line, 17);
            }
            other => panic!("expected unknown format, got {other:?}"),
        }
    }
}
