//! Pure move planning. Nothing here touches a live board; plans are
//! computed from a borrowed board and applied by the caller.

use super::resolver::{Edge, Resolution, locate_source};
use super::{Board, ColumnId};
use crate::types::{TaskId, TaskRecord, TaskStatus};

/// Why a drop was dropped on the floor.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum AbortReason {
    NoTarget,
    SourceMissing,
    TargetCardMissing,
}

impl AbortReason {
    pub fn as_str(self) -> &'static str {
        match self {
            AbortReason::NoTarget => "no drop target",
            AbortReason::SourceMissing => "dragged task not in its source column",
            AbortReason::TargetCardMissing => "hovered card not in its column",
        }
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum MovePlan {
    Reorder {
        task_id: TaskId,
        column: ColumnId,
        start_index: usize,
        destination_index: usize,
        tasks: Vec<TaskRecord>,
    },
    Transfer {
        task_id: TaskId,
        from: ColumnId,
        to: ColumnId,
        start_index: usize,
        destination_index: usize,
        source: Vec<TaskRecord>,
        destination: Vec<TaskRecord>,
    },
}

impl MovePlan {
    pub fn task_id(&self) -> &TaskId {
        match self {
            MovePlan::Reorder { task_id, .. } | MovePlan::Transfer { task_id, .. } => task_id,
        }
    }

    pub fn from(&self) -> ColumnId {
        match self {
            MovePlan::Reorder { column, .. } => *column,
            MovePlan::Transfer { from, .. } => *from,
        }
    }

    pub fn to(&self) -> ColumnId {
        match self {
            MovePlan::Reorder { column, .. } => *column,
            MovePlan::Transfer { to, .. } => *to,
        }
    }

    pub fn start_index(&self) -> usize {
        match self {
            MovePlan::Reorder { start_index, .. } | MovePlan::Transfer { start_index, .. } => {
                *start_index
            }
        }
    }

    /// Final index of the task in the destination column.
    pub fn new_position(&self) -> usize {
        match self {
            MovePlan::Reorder {
                destination_index, ..
            }
            | MovePlan::Transfer {
                destination_index, ..
            } => *destination_index,
        }
    }

    pub fn reason(&self) -> String {
        match self {
            MovePlan::Reorder { column, .. } => {
                format!("Task reordered within {}", column.title())
            }
            MovePlan::Transfer { from, to, .. } => {
                format!("Task moved from {} to {}", from.title(), to.title())
            }
        }
    }

    pub(crate) fn apply(self, board: &mut Board) {
        match self {
            MovePlan::Reorder { column, tasks, .. } => board.replace_tasks(column, tasks),
            MovePlan::Transfer {
                from,
                to,
                source,
                destination,
                ..
            } => {
                board.replace_tasks(from, source);
                board.replace_tasks(to, destination);
            }
        }
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum PlanResult {
    Planned(MovePlan),
    /// The drop lands the task exactly where it already is.
    Unchanged,
    Aborted(AbortReason),
}

/// Same-column destination for a drop on `target_index` at `edge`, with the
/// shift caused by removing the source accounted for.
pub fn reorder_destination(start_index: usize, target_index: usize, edge: Edge) -> usize {
    if start_index == target_index {
        return start_index;
    }

    let after = edge == Edge::Bottom;
    if start_index < target_index {
        if after { target_index } else { target_index - 1 }
    } else if after {
        target_index + 1
    } else {
        target_index
    }
}

/// Moves the item at `start_index` to `destination_index`, keeping the rest
/// in relative order. Out-of-range starts leave the list as is.
pub fn reorder(tasks: &[TaskRecord], start_index: usize, destination_index: usize) -> Vec<TaskRecord> {
    let mut reordered = tasks.to_vec();
    if start_index >= reordered.len() {
        return reordered;
    }

    let task = reordered.remove(start_index);
    let destination_index = destination_index.min(reordered.len());
    reordered.insert(destination_index, task);
    reordered
}

/// Removes `task_id` from `source` (by id) and inserts it into `destination`
/// at `index` clamped to `[0, len]`, taking on `status`. Returns the new
/// source list, new destination list, and the index actually used.
pub fn move_across(
    source: &[TaskRecord],
    task_id: &TaskId,
    destination: &[TaskRecord],
    index: usize,
    status: TaskStatus,
) -> Option<(Vec<TaskRecord>, Vec<TaskRecord>, usize)> {
    let position = source.iter().position(|task| &task.id == task_id)?;

    let mut remaining = source.to_vec();
    let mut moved = remaining.remove(position);
    moved.status = status;

    let mut receiving = destination.to_vec();
    let index = index.min(receiving.len());
    receiving.insert(index, moved);

    Some((remaining, receiving, index))
}

pub fn plan_move(
    board: &Board,
    task_id: &TaskId,
    from: ColumnId,
    resolution: &Resolution,
) -> PlanResult {
    let Some(start_index) = locate_source(board, task_id, from) else {
        return PlanResult::Aborted(AbortReason::SourceMissing);
    };

    let to = resolution.column();
    let destination_tasks = &board.column(to).tasks;

    let hovered = match resolution {
        Resolution::ColumnSpace { .. } => None,
        Resolution::Card {
            task_id: target,
            edge,
            ..
        } => match board.column(to).position_of(target) {
            Some(index) => Some((index, *edge)),
            None => return PlanResult::Aborted(AbortReason::TargetCardMissing),
        },
    };

    if to == from {
        let destination_index = match hovered {
            Some((target_index, edge)) => reorder_destination(start_index, target_index, edge),
            None => destination_tasks.len().saturating_sub(1),
        };
        if destination_index == start_index {
            return PlanResult::Unchanged;
        }

        return PlanResult::Planned(MovePlan::Reorder {
            task_id: task_id.clone(),
            column: from,
            start_index,
            destination_index,
            tasks: reorder(destination_tasks, start_index, destination_index),
        });
    }

    // Empty space in another column inserts at the top.
    let requested = match hovered {
        Some((target_index, Edge::Top)) => target_index,
        Some((target_index, Edge::Bottom)) => target_index + 1,
        None => 0,
    };

    match move_across(
        &board.column(from).tasks,
        task_id,
        destination_tasks,
        requested,
        to.status(),
    ) {
        Some((source, destination, destination_index)) => PlanResult::Planned(MovePlan::Transfer {
            task_id: task_id.clone(),
            from,
            to,
            start_index,
            destination_index,
            source,
            destination,
        }),
        None => PlanResult::Aborted(AbortReason::SourceMissing),
    }
}
