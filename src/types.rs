use std::fmt;

use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

/// Server-issued task identifier. Opaque to the client.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TaskId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectiveId(String);

impl ObjectiveId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectiveId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ObjectiveId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Correlates the log lines of a single pickup-to-drop gesture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DragSessionId(Uuid);

impl DragSessionId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for DragSessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "drag-{}", self.0.simple())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Hash, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Low => "LOW",
            Priority::Medium => "MEDIUM",
            Priority::High => "HIGH",
        }
    }

    pub fn from_raw(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "low" => Priority::Low,
            "medium" => Priority::Medium,
            "high" => Priority::High,
            other => {
                warn!(priority = other, "unknown task priority; treating as MEDIUM");
                Priority::Medium
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Todo,
    InProgress,
    Paused,
    Done,
}

impl TaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Todo => "TODO",
            TaskStatus::InProgress => "IN_PROGRESS",
            TaskStatus::Paused => "PAUSED",
            TaskStatus::Done => "DONE",
        }
    }

    /// Accepts both the board spelling and the server bucket spelling.
    pub fn from_raw(raw: &str) -> Option<Self> {
        let normalized = raw.trim().to_ascii_lowercase().replace('-', "_");
        match normalized.as_str() {
            "todo" | "to_do" | "not_started" => Some(TaskStatus::Todo),
            "in_progress" => Some(TaskStatus::InProgress),
            "paused" => Some(TaskStatus::Paused),
            "done" | "completed" => Some(TaskStatus::Done),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct TaskRecord {
    pub id: TaskId,
    pub title: String,
    pub description: Option<String>,
    pub priority: Priority,
    pub due_date: Option<NaiveDate>,
    pub status: TaskStatus,
}

impl TaskRecord {
    pub fn new(id: impl Into<String>, title: impl Into<String>, status: TaskStatus) -> Self {
        Self {
            id: TaskId::new(id),
            title: title.into(),
            description: None,
            priority: Priority::default(),
            due_date: None,
            status,
        }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_due_date(mut self, due_date: NaiveDate) -> Self {
        self.due_date = Some(due_date);
        self
    }
}

/// Parses `YYYY-MM-DD` or the date part of an RFC 3339 timestamp.
pub fn parse_due_date(raw: &str) -> Option<NaiveDate> {
    let value = raw.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Some(date);
    }

    match DateTime::parse_from_rfc3339(value) {
        Ok(timestamp) => Some(timestamp.date_naive()),
        Err(err) => {
            debug!(raw = value, error = %err, "ignoring unparseable due date");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_from_raw() {
        assert_eq!(Priority::from_raw("low"), Priority::Low);
        assert_eq!(Priority::from_raw("  HIGH "), Priority::High);
        assert_eq!(Priority::from_raw("Medium"), Priority::Medium);
        assert_eq!(Priority::from_raw("urgent"), Priority::Medium);
    }

    #[test]
    fn task_status_from_raw_accepts_server_spellings() {
        assert_eq!(TaskStatus::from_raw("NOT_STARTED"), Some(TaskStatus::Todo));
        assert_eq!(TaskStatus::from_raw("todo"), Some(TaskStatus::Todo));
        assert_eq!(
            TaskStatus::from_raw("in-progress"),
            Some(TaskStatus::InProgress)
        );
        assert_eq!(TaskStatus::from_raw("completed"), Some(TaskStatus::Done));
        assert_eq!(TaskStatus::from_raw("PAUSED"), Some(TaskStatus::Paused));
        assert_eq!(TaskStatus::from_raw("archived"), None);
    }

    #[test]
    fn task_status_serializes_screaming_snake_case() {
        let json = serde_json::to_string(&TaskStatus::InProgress).expect("status serializes");
        assert_eq!(json, "\"IN_PROGRESS\"");
    }

    #[test]
    fn parse_due_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 3, 9).expect("valid date");
        assert_eq!(parse_due_date("2024-03-09"), Some(expected));
        assert_eq!(parse_due_date("2024-03-09T10:30:00Z"), Some(expected));
        assert_eq!(parse_due_date("2024-03-09T23:30:00-02:00"), Some(expected));
        assert_eq!(parse_due_date(""), None);
        assert_eq!(parse_due_date("next tuesday"), None);
    }

    #[test]
    fn task_record_builder() {
        let task = TaskRecord::new("t-1", "Write summary", TaskStatus::Todo)
            .with_priority(Priority::High)
            .with_description("one page");
        assert_eq!(task.id.as_str(), "t-1");
        assert_eq!(task.priority, Priority::High);
        assert_eq!(task.description.as_deref(), Some("one page"));
        assert!(task.due_date.is_none());
    }

    #[test]
    fn drag_session_id_display_prefix() {
        let id = DragSessionId::generate();
        assert!(id.to_string().starts_with("drag-"));
        assert_ne!(id, DragSessionId::generate());
    }
}
