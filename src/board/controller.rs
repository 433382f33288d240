//! Owns the live board and turns completed drag gestures into moves.
//!
//! Per gesture: `Idle -> Dragging -> Hovering* -> (drop | cancel) -> Idle`.
//! A drop is applied to the board synchronously before the move is handed
//! to the [`MoveSink`]; the controller never hears about network results
//! beyond [`BoardController::settle`] releasing the task for new drags.

use std::collections::HashSet;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use super::planner::{AbortReason, PlanResult, plan_move};
use super::resolver::{DropIndicator, DropTarget, hover_indicator, resolve_drop};
use super::{Board, ColumnId};
use crate::api::wire::MoveRequest;
use crate::types::{DragSessionId, ObjectiveId, TaskId};

/// A planned and locally applied move, ready to persist.
#[derive(Debug, Clone, Serialize, Eq, PartialEq)]
pub struct MoveCommand {
    pub objective_id: ObjectiveId,
    pub task_id: TaskId,
    pub from: ColumnId,
    pub to: ColumnId,
    pub new_position: usize,
    pub reason: String,
}

impl MoveCommand {
    pub fn to_request(&self) -> MoveRequest {
        MoveRequest {
            task_id: self.task_id.clone(),
            from_column: self.from.to_server(),
            to_column: self.to.to_server(),
            new_position: self.new_position,
            reason: Some(self.reason.clone()),
        }
    }
}

/// Receives every applied move. Must not block.
pub trait MoveSink {
    fn persist(&self, command: MoveCommand);
}

impl<F> MoveSink for F
where
    F: Fn(MoveCommand),
{
    fn persist(&self, command: MoveCommand) {
        self(command)
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum DragPhase {
    Idle,
    Dragging {
        session: DragSessionId,
        task_id: TaskId,
        source: ColumnId,
    },
    Hovering {
        session: DragSessionId,
        task_id: TaskId,
        source: ColumnId,
        indicator: DropIndicator,
    },
}

#[derive(Debug, Error, Clone, Eq, PartialEq)]
pub enum DragError {
    #[error("a drag is already in progress")]
    AlreadyDragging,
    #[error("task {0} is not on the board")]
    TaskNotFound(TaskId),
    #[error("task {0} is still being saved")]
    MoveInFlight(TaskId),
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum DropOutcome {
    Moved(MoveCommand),
    Unchanged,
    Aborted(AbortReason),
    NotDragging,
}

pub struct BoardController<S: MoveSink> {
    board: Board,
    phase: DragPhase,
    in_flight: HashSet<TaskId>,
    sink: S,
}

impl<S: MoveSink> BoardController<S> {
    pub fn new(board: Board, sink: S) -> Self {
        Self {
            board,
            phase: DragPhase::Idle,
            in_flight: HashSet::new(),
            sink,
        }
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn phase(&self) -> &DragPhase {
        &self.phase
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn is_in_flight(&self, task_id: &TaskId) -> bool {
        self.in_flight.contains(task_id)
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    /// Swaps in a freshly built board. A different objective discards all
    /// drag and in-flight bookkeeping.
    pub fn replace_board(&mut self, board: Board) {
        if board.objective_id != self.board.objective_id {
            debug!(
                from = %self.board.objective_id,
                to = %board.objective_id,
                "objective changed; rebuilding board"
            );
            self.phase = DragPhase::Idle;
            self.in_flight.clear();
        }
        self.board = board;
    }

    pub fn begin_drag(&mut self, task_id: &TaskId) -> Result<DragSessionId, DragError> {
        if self.phase != DragPhase::Idle {
            return Err(DragError::AlreadyDragging);
        }
        if self.in_flight.contains(task_id) {
            return Err(DragError::MoveInFlight(task_id.clone()));
        }
        let (source, _) = self
            .board
            .locate(task_id)
            .ok_or_else(|| DragError::TaskNotFound(task_id.clone()))?;

        let session = DragSessionId::generate();
        debug!(%session, %task_id, %source, "drag started");
        self.phase = DragPhase::Dragging {
            session,
            task_id: task_id.clone(),
            source,
        };
        Ok(session)
    }

    /// Records the targets under the pointer and returns what to highlight.
    pub fn hover(&mut self, targets: &[DropTarget]) -> Option<DropIndicator> {
        let (session, task_id, source) = match &self.phase {
            DragPhase::Idle => return None,
            DragPhase::Dragging {
                session,
                task_id,
                source,
            }
            | DragPhase::Hovering {
                session,
                task_id,
                source,
                ..
            } => (*session, task_id.clone(), *source),
        };

        let indicator = hover_indicator(targets, &task_id);
        self.phase = match indicator.clone() {
            Some(indicator) => DragPhase::Hovering {
                session,
                task_id,
                source,
                indicator,
            },
            None => DragPhase::Dragging {
                session,
                task_id,
                source,
            },
        };
        indicator
    }

    pub fn cancel(&mut self) {
        if let DragPhase::Dragging { session, .. } | DragPhase::Hovering { session, .. } =
            &self.phase
        {
            debug!(session = %session, "drag cancelled");
        }
        self.phase = DragPhase::Idle;
    }

    /// Resolves the drop, applies the planned move and hands it to the sink.
    pub fn drop(&mut self, targets: &[DropTarget]) -> DropOutcome {
        let (session, task_id, source) =
            match std::mem::replace(&mut self.phase, DragPhase::Idle) {
                DragPhase::Idle => return DropOutcome::NotDragging,
                DragPhase::Dragging {
                    session,
                    task_id,
                    source,
                }
                | DragPhase::Hovering {
                    session,
                    task_id,
                    source,
                    ..
                } => (session, task_id, source),
            };

        let Some(resolution) = resolve_drop(targets) else {
            debug!(%session, %task_id, "drop outside any column ignored");
            return DropOutcome::Aborted(AbortReason::NoTarget);
        };

        let plan = match plan_move(&self.board, &task_id, source, &resolution) {
            PlanResult::Planned(plan) => plan,
            PlanResult::Unchanged => {
                debug!(%session, %task_id, "drop leaves task in place");
                return DropOutcome::Unchanged;
            }
            PlanResult::Aborted(reason) => {
                debug!(%session, %task_id, reason = reason.as_str(), "drop aborted");
                return DropOutcome::Aborted(reason);
            }
        };

        let command = MoveCommand {
            objective_id: self.board.objective_id.clone(),
            task_id: task_id.clone(),
            from: plan.from(),
            to: plan.to(),
            new_position: plan.new_position(),
            reason: plan.reason(),
        };
        plan.apply(&mut self.board);

        info!(
            %session,
            %task_id,
            from = %command.from,
            to = %command.to,
            new_position = command.new_position,
            "task dropped"
        );
        self.in_flight.insert(task_id);
        self.sink.persist(command.clone());
        DropOutcome::Moved(command)
    }

    /// Releases a task once its move has been confirmed or rolled back.
    pub fn settle(&mut self, task_id: &TaskId) {
        self.in_flight.remove(task_id);
    }
}
