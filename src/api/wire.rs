//! JSON shapes exchanged with the objectives API.

use serde::{Deserialize, Serialize};

use crate::board::ServerColumn;
use crate::types::{Priority, TaskId, TaskRecord, TaskStatus, parse_due_date};

/// Body of `PATCH /objectives/{id}/kanban/move`.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct MoveRequest {
    pub task_id: TaskId,
    pub from_column: ServerColumn,
    pub to_column: ServerColumn,
    pub new_position: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Server view of one task placement.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq, Default)]
#[serde(default)]
pub struct MovedTask {
    pub id: String,
    pub status: String,
    pub column: String,
    pub position: i64,
}

impl MovedTask {
    pub fn server_column(&self) -> Option<ServerColumn> {
        ServerColumn::from_raw(&self.column)
    }
}

/// Successful move response. Only used to trigger invalidation, so every
/// field is optional.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq, Default)]
#[serde(default)]
pub struct MoveResult {
    pub message: String,
    pub data: Option<MovedTask>,
    pub old: Option<MovedTask>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct TaskItem {
    pub task_id: String,
    pub title: String,
    pub description: Option<String>,
    pub task_type: Option<String>,
    pub status: Option<String>,
    pub priority: Option<String>,
    pub due_date: Option<String>,
    pub is_optional: bool,
}

impl TaskItem {
    /// The record takes the status of the bucket it was delivered in, not
    /// the item's own `status` field.
    pub fn to_record(&self, status: TaskStatus) -> TaskRecord {
        TaskRecord {
            id: TaskId::new(self.task_id.clone()),
            title: self.title.clone(),
            description: self
                .description
                .as_deref()
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(str::to_string),
            priority: self
                .priority
                .as_deref()
                .map(Priority::from_raw)
                .unwrap_or_default(),
            due_date: self.due_date.as_deref().and_then(parse_due_date),
            status,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct TaskBucket {
    pub page: u32,
    pub per_page: u32,
    pub total: u64,
    pub total_pages: u32,
    pub has_next: bool,
    pub items: Vec<TaskItem>,
}

/// Board fetch payload: one page per status bucket.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct BoardResponse {
    pub not_started: TaskBucket,
    pub in_progress: TaskBucket,
    pub completed: TaskBucket,
    pub paused: TaskBucket,
}

impl BoardResponse {
    pub fn bucket(&self, column: ServerColumn) -> &TaskBucket {
        match column {
            ServerColumn::NotStarted => &self.not_started,
            ServerColumn::InProgress => &self.in_progress,
            ServerColumn::Completed => &self.completed,
            ServerColumn::Paused => &self.paused,
        }
    }
}
