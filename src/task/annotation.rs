//! Annotation types for tasks
//!
//! Annotations are timestamped notes. On disk they live as
//! `annotation_<epoch>` attributes; this is the in-memory view.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Notes attached to tasks with timestamps
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotation {
    /// When annotation was added
    pub entry: DateTime<Utc>,
    /// Annotation text
    pub description: String,
}

impl Annotation {
    /// Create an annotation with a specific timestamp
    pub fn new(entry: DateTime<Utc>, description: String) -> Self {
        Self { entry, description }
    }

    /// The attribute name this annotation is stored under.
    pub fn attribute_name(&self) -> String {
        format!("annotation_{}", self.entry.timestamp())
    }

    /// Sanitize annotation text so it can never corrupt the bracketed
    /// line formats: double quotes become single quotes, brackets
    /// become parentheses.
    pub fn sanitize(text: &str) -> String {
        text.chars()
            .map(|c| match c {
                '"' => '\'',
                '[' => '(',
                ']' => ')',
                other => other,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn attribute_name_encodes_timestamp() {
        let entry = Utc.timestamp_opt(1_705_881_600, 0).unwrap();
        let annotation = Annotation::new(entry, "Test note".to_string());
        assert_eq!(annotation.attribute_name(), "annotation_1705881600");
    }

    #[test]
    fn sanitize_replaces_risky_characters() {
        assert_eq!(
            Annotation::sanitize("say \"hi\" [now]"),
            "say 'hi' (now)"
        );
        assert_eq!(Annotation::sanitize("plain"), "plain");
    }
}
