//! Board model for one objective: four fixed status columns.

pub mod controller;
pub mod planner;
pub mod resolver;

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::api::wire::BoardResponse;
use crate::types::{ObjectiveId, TaskId, TaskRecord, TaskStatus};

pub use controller::{BoardController, DragError, DragPhase, DropOutcome, MoveCommand, MoveSink};
pub use planner::{AbortReason, MovePlan};
pub use resolver::{DropIndicator, DropTarget, Edge, Resolution};

/// Column identifiers as the board uses them.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum ColumnId {
    Todo,
    InProgress,
    Paused,
    Done,
}

/// Display order of the columns, left to right.
pub const COLUMN_ORDER: [ColumnId; 4] = [
    ColumnId::Todo,
    ColumnId::InProgress,
    ColumnId::Paused,
    ColumnId::Done,
];

impl ColumnId {
    pub fn as_str(self) -> &'static str {
        match self {
            ColumnId::Todo => "todo",
            ColumnId::InProgress => "in-progress",
            ColumnId::Paused => "paused",
            ColumnId::Done => "done",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            ColumnId::Todo => "To Do",
            ColumnId::InProgress => "In Progress",
            ColumnId::Paused => "Paused",
            ColumnId::Done => "Done",
        }
    }

    pub fn status(self) -> TaskStatus {
        match self {
            ColumnId::Todo => TaskStatus::Todo,
            ColumnId::InProgress => TaskStatus::InProgress,
            ColumnId::Paused => TaskStatus::Paused,
            ColumnId::Done => TaskStatus::Done,
        }
    }

    pub fn for_status(status: TaskStatus) -> Self {
        match status {
            TaskStatus::Todo => ColumnId::Todo,
            TaskStatus::InProgress => ColumnId::InProgress,
            TaskStatus::Paused => ColumnId::Paused,
            TaskStatus::Done => ColumnId::Done,
        }
    }

    pub fn to_server(self) -> ServerColumn {
        match self {
            ColumnId::Todo => ServerColumn::NotStarted,
            ColumnId::InProgress => ServerColumn::InProgress,
            ColumnId::Paused => ServerColumn::Paused,
            ColumnId::Done => ServerColumn::Completed,
        }
    }

    fn ordinal(self) -> usize {
        match self {
            ColumnId::Todo => 0,
            ColumnId::InProgress => 1,
            ColumnId::Paused => 2,
            ColumnId::Done => 3,
        }
    }
}

impl fmt::Display for ColumnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ColumnId {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "todo" | "to-do" => Ok(ColumnId::Todo),
            "in-progress" => Ok(ColumnId::InProgress),
            "paused" => Ok(ColumnId::Paused),
            "done" => Ok(ColumnId::Done),
            _ => Err(()),
        }
    }
}

/// Column identifiers as the server names them.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ServerColumn {
    NotStarted,
    InProgress,
    Completed,
    Paused,
}

impl ServerColumn {
    pub fn as_str(self) -> &'static str {
        match self {
            ServerColumn::NotStarted => "not_started",
            ServerColumn::InProgress => "in_progress",
            ServerColumn::Completed => "completed",
            ServerColumn::Paused => "paused",
        }
    }

    pub fn to_column(self) -> ColumnId {
        match self {
            ServerColumn::NotStarted => ColumnId::Todo,
            ServerColumn::InProgress => ColumnId::InProgress,
            ServerColumn::Completed => ColumnId::Done,
            ServerColumn::Paused => ColumnId::Paused,
        }
    }

    pub fn from_raw(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "not_started" => Some(ServerColumn::NotStarted),
            "in_progress" => Some(ServerColumn::InProgress),
            "completed" => Some(ServerColumn::Completed),
            "paused" => Some(ServerColumn::Paused),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct Column {
    pub id: ColumnId,
    pub title: String,
    pub tasks: Vec<TaskRecord>,
}

impl Column {
    pub fn empty(id: ColumnId) -> Self {
        Self {
            id,
            title: id.title().to_string(),
            tasks: Vec::new(),
        }
    }

    pub fn position_of(&self, task_id: &TaskId) -> Option<usize> {
        self.tasks.iter().position(|task| &task.id == task_id)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

/// Something wrong with a board's contents.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum BoardViolation {
    DuplicateTask(TaskId),
    StatusMismatch {
        task_id: TaskId,
        column: ColumnId,
        status: TaskStatus,
    },
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize)]
pub struct Completion {
    pub done: usize,
    pub total: usize,
}

impl Completion {
    pub fn percent(self) -> u8 {
        if self.total == 0 {
            return 0;
        }
        ((self.done * 100) / self.total) as u8
    }
}

/// Client-side mirror of an objective's tasks. Always exactly four
/// columns in [`COLUMN_ORDER`].
#[derive(Debug, Clone, Serialize, Eq, PartialEq)]
pub struct Board {
    pub objective_id: ObjectiveId,
    pub objective_title: String,
    columns: [Column; 4],
}

impl Board {
    pub fn new(objective_id: ObjectiveId, objective_title: impl Into<String>) -> Self {
        Self {
            objective_id,
            objective_title: objective_title.into(),
            columns: COLUMN_ORDER.map(Column::empty),
        }
    }

    /// Builds a board from explicit column contents, forcing each record's
    /// status to match its column and dropping repeated ids.
    pub fn from_columns(
        objective_id: ObjectiveId,
        objective_title: impl Into<String>,
        contents: impl IntoIterator<Item = (ColumnId, Vec<TaskRecord>)>,
    ) -> Self {
        let mut board = Self::new(objective_id, objective_title);
        let mut seen = HashSet::new();

        for (column, tasks) in contents {
            let status = column.status();
            for mut task in tasks {
                if !seen.insert(task.id.clone()) {
                    warn!(
                        objective_id = %board.objective_id,
                        task_id = %task.id,
                        column = %column,
                        "dropping task that already appears on the board"
                    );
                    continue;
                }
                task.status = status;
                board.columns[column.ordinal()].tasks.push(task);
            }
        }

        board
    }

    /// Builds a board from the fetch payload, using only each bucket's items.
    pub fn from_buckets(
        objective_id: ObjectiveId,
        objective_title: impl Into<String>,
        response: &BoardResponse,
    ) -> Self {
        let contents = COLUMN_ORDER.map(|column| {
            let status = column.status();
            let tasks = response
                .bucket(column.to_server())
                .items
                .iter()
                .map(|item| item.to_record(status))
                .collect::<Vec<_>>();
            (column, tasks)
        });

        Self::from_columns(objective_id, objective_title, contents)
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, id: ColumnId) -> &Column {
        &self.columns[id.ordinal()]
    }

    pub fn task(&self, task_id: &TaskId) -> Option<&TaskRecord> {
        let (column, index) = self.locate(task_id)?;
        self.column(column).tasks.get(index)
    }

    pub fn locate(&self, task_id: &TaskId) -> Option<(ColumnId, usize)> {
        self.columns
            .iter()
            .find_map(|column| column.position_of(task_id).map(|index| (column.id, index)))
    }

    pub fn total_tasks(&self) -> usize {
        self.columns.iter().map(Column::len).sum()
    }

    /// Every task id on the board, sorted, duplicates kept.
    pub fn task_ids(&self) -> Vec<TaskId> {
        let mut ids = self
            .columns
            .iter()
            .flat_map(|column| column.tasks.iter().map(|task| task.id.clone()))
            .collect::<Vec<_>>();
        ids.sort();
        ids
    }

    pub fn completion(&self) -> Completion {
        Completion {
            done: self.column(ColumnId::Done).len(),
            total: self.total_tasks(),
        }
    }

    pub fn check_invariants(&self) -> Vec<BoardViolation> {
        let mut violations = Vec::new();
        let mut seen = HashSet::new();

        for column in &self.columns {
            for task in &column.tasks {
                if !seen.insert(&task.id) {
                    violations.push(BoardViolation::DuplicateTask(task.id.clone()));
                }
                if task.status != column.id.status() {
                    violations.push(BoardViolation::StatusMismatch {
                        task_id: task.id.clone(),
                        column: column.id,
                        status: task.status,
                    });
                }
            }
        }

        violations
    }

    /// Swaps in a planned task list. Only the controller and the cache layer
    /// mutate boards.
    pub(crate) fn replace_tasks(&mut self, column: ColumnId, tasks: Vec<TaskRecord>) {
        self.columns[column.ordinal()].tasks = tasks;
    }

    /// Moves `task_id` into `to` at `position` (clamped), updating its status.
    /// Returns the final index, or `None` when the task is not on the board.
    pub(crate) fn relocate(
        &mut self,
        task_id: &TaskId,
        to: ColumnId,
        position: usize,
    ) -> Option<usize> {
        let (from, index) = self.locate(task_id)?;
        let mut task = self.columns[from.ordinal()].tasks.remove(index);
        task.status = to.status();

        let destination = &mut self.columns[to.ordinal()].tasks;
        let index = position.min(destination.len());
        destination.insert(index, task);
        Some(index)
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::{board_with, ids, titled};
    use super::*;
    use crate::api::wire::{TaskBucket, TaskItem};

    #[test]
    fn column_id_server_mapping_is_bijective() {
        for column in COLUMN_ORDER {
            assert_eq!(column.to_server().to_column(), column);
            assert_eq!(ColumnId::for_status(column.status()), column);
        }
        assert_eq!(ColumnId::Todo.to_server().as_str(), "not_started");
        assert_eq!(ColumnId::InProgress.to_server().as_str(), "in_progress");
        assert_eq!(ColumnId::Done.to_server().as_str(), "completed");
        assert_eq!(ColumnId::Paused.to_server().as_str(), "paused");
    }

    #[test]
    fn column_id_from_str() {
        assert_eq!("in_progress".parse::<ColumnId>(), Ok(ColumnId::InProgress));
        assert_eq!(" Done ".parse::<ColumnId>(), Ok(ColumnId::Done));
        assert_eq!("to-do".parse::<ColumnId>(), Ok(ColumnId::Todo));
        assert_eq!("backlog".parse::<ColumnId>(), Err(()));
    }

    #[test]
    fn new_board_has_four_columns_in_display_order() {
        let board = Board::new(ObjectiveId::new("o"), "Objective");
        let order = board.columns().iter().map(|c| c.id).collect::<Vec<_>>();
        assert_eq!(order, COLUMN_ORDER.to_vec());
        assert_eq!(board.column(ColumnId::Paused).title, "Paused");
        assert_eq!(board.total_tasks(), 0);
    }

    #[test]
    fn from_columns_forces_status_and_drops_duplicates() {
        let mut stray = titled(&["a"], ColumnId::Done);
        stray.extend(titled(&["b"], ColumnId::Todo));
        let board = Board::from_columns(
            ObjectiveId::new("o"),
            "Objective",
            [
                (ColumnId::Todo, stray),
                (ColumnId::Done, titled(&["a", "c"], ColumnId::Done)),
            ],
        );

        assert_eq!(ids(&board, ColumnId::Todo), vec!["a", "b"]);
        assert_eq!(ids(&board, ColumnId::Done), vec!["c"]);
        assert!(board.check_invariants().is_empty());
    }

    #[test]
    fn from_buckets_uses_bucket_status() {
        let item = |id: &str, status: &str| TaskItem {
            task_id: id.to_string(),
            title: id.to_string(),
            status: Some(status.to_string()),
            ..TaskItem::default()
        };
        let response = BoardResponse {
            not_started: TaskBucket {
                items: vec![item("a", "NOT_STARTED"), item("b", "COMPLETED")],
                ..TaskBucket::default()
            },
            paused: TaskBucket {
                items: vec![item("p", "PAUSED")],
                ..TaskBucket::default()
            },
            ..BoardResponse::default()
        };

        let board = Board::from_buckets(ObjectiveId::new("o"), "Objective", &response);

        assert_eq!(ids(&board, ColumnId::Todo), vec!["a", "b"]);
        assert_eq!(ids(&board, ColumnId::Paused), vec!["p"]);
        assert_eq!(
            board.task(&TaskId::new("b")).map(|task| task.status),
            Some(TaskStatus::Todo)
        );
        assert!(board.check_invariants().is_empty());
    }

    #[test]
    fn check_invariants_reports_violations() {
        let mut board = board_with(&[(ColumnId::Todo, &["a"]), (ColumnId::Done, &["b"])]);
        let mut tasks = board.column(ColumnId::Done).tasks.clone();
        tasks.push(TaskRecord::new("a", "dup", TaskStatus::Done));
        tasks.push(TaskRecord::new("z", "wrong", TaskStatus::Paused));
        board.replace_tasks(ColumnId::Done, tasks);

        let violations = board.check_invariants();
        assert!(violations.contains(&BoardViolation::DuplicateTask(TaskId::new("a"))));
        assert!(violations.contains(&BoardViolation::StatusMismatch {
            task_id: TaskId::new("z"),
            column: ColumnId::Done,
            status: TaskStatus::Paused,
        }));
    }

    #[test]
    fn relocate_clamps_and_updates_status() {
        let mut board = board_with(&[(ColumnId::Todo, &["a", "b"]), (ColumnId::Done, &["c"])]);

        assert_eq!(board.relocate(&TaskId::new("a"), ColumnId::Done, 99), Some(1));
        assert_eq!(ids(&board, ColumnId::Done), vec!["c", "a"]);
        assert_eq!(
            board.task(&TaskId::new("a")).map(|task| task.status),
            Some(TaskStatus::Done)
        );

        assert_eq!(board.relocate(&TaskId::new("missing"), ColumnId::Todo, 0), None);
        assert!(board.check_invariants().is_empty());
    }

    #[test]
    fn completion_counts_done_column() {
        let board = board_with(&[
            (ColumnId::Todo, &["a", "b"]),
            (ColumnId::Paused, &["p"]),
            (ColumnId::Done, &["d"]),
        ]);

        let completion = board.completion();
        assert_eq!(completion, Completion { done: 1, total: 4 });
        assert_eq!(completion.percent(), 25);
        assert_eq!(Board::new(ObjectiveId::new("o"), "").completion().percent(), 0);
    }
}
