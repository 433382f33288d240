//! One objective's board: the controller the user drags on, plus the plumbing
//! that persists its moves and folds the results back in.

use thiserror::Error;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::api::ApiError;
use crate::board::{
    Board, BoardController, DragError, DragPhase, DropIndicator, DropOutcome, DropTarget,
};
use crate::sync::{MoveCoordinator, MoveDispatcher, SettledMove, lock};
use crate::types::{DragSessionId, ObjectiveId, TaskId};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("failed to load board: {0}")]
    Fetch(#[from] ApiError),
    #[error("board session needs a tokio runtime: {0}")]
    NoRuntime(String),
}

pub struct BoardSession {
    controller: BoardController<MoveDispatcher>,
    settled: mpsc::UnboundedReceiver<SettledMove>,
    synced_revision: Option<u64>,
}

impl BoardSession {
    /// Fetches the objective's board, seeds the cache and builds the
    /// controller. Must run on a tokio runtime.
    pub async fn load(
        coordinator: MoveCoordinator,
        objective_id: ObjectiveId,
        objective_title: impl Into<String>,
    ) -> Result<Self, SessionError> {
        let runtime =
            Handle::try_current().map_err(|err| SessionError::NoRuntime(err.to_string()))?;
        let board = fetch(&coordinator, objective_id, objective_title.into()).await?;
        let synced_revision = Some(lock(coordinator.cache()).set_board(board.clone()));

        let (dispatcher, settled) = MoveDispatcher::new(coordinator, runtime);
        Ok(Self {
            controller: BoardController::new(board, dispatcher),
            settled,
            synced_revision,
        })
    }

    pub fn board(&self) -> &Board {
        self.controller.board()
    }

    pub fn objective_id(&self) -> &ObjectiveId {
        &self.controller.board().objective_id
    }

    pub fn phase(&self) -> &DragPhase {
        self.controller.phase()
    }

    pub fn in_flight_count(&self) -> usize {
        self.controller.in_flight_count()
    }

    pub fn is_in_flight(&self, task_id: &TaskId) -> bool {
        self.controller.is_in_flight(task_id)
    }

    pub fn begin_drag(&mut self, task_id: &TaskId) -> Result<DragSessionId, DragError> {
        self.controller.begin_drag(task_id)
    }

    pub fn hover(&mut self, targets: &[DropTarget]) -> Option<DropIndicator> {
        self.controller.hover(targets)
    }

    pub fn cancel(&mut self) {
        self.controller.cancel();
    }

    /// Applies the drop locally; a resulting move is speculated into the
    /// cache and sent before this returns.
    pub fn drop(&mut self, targets: &[DropTarget]) -> DropOutcome {
        let outcome = self.controller.drop(targets);
        if matches!(outcome, DropOutcome::Moved(_)) {
            self.synced_revision = self.cache_revision();
        }
        outcome
    }

    /// Drains moves that have settled since the last call and brings the
    /// controller's board in line with the cache. Reconciliation waits while
    /// a drag is in progress.
    pub fn pump(&mut self) -> Vec<SettledMove> {
        let mut settled = Vec::new();
        while let Ok(settled_move) = self.settled.try_recv() {
            settled.push(settled_move);
        }
        self.absorb(&settled);
        settled
    }

    /// Waits for every in-flight move of this objective to settle.
    pub async fn wait_idle(&mut self) -> Vec<SettledMove> {
        let mut settled = self.pump();
        while self.controller.in_flight_count() > 0 {
            let Some(settled_move) = self.settled.recv().await else {
                break;
            };
            self.absorb(std::slice::from_ref(&settled_move));
            settled.push(settled_move);
        }
        settled
    }

    /// Refetches the current objective's board.
    pub async fn reload(&mut self) -> Result<(), SessionError> {
        let objective_id = self.objective_id().clone();
        let title = self.board().objective_title.clone();
        self.switch_objective(objective_id, title).await
    }

    /// Rebuilds the board for `objective_id`. A different objective drops
    /// any drag and in-flight bookkeeping of the previous one.
    pub async fn switch_objective(
        &mut self,
        objective_id: ObjectiveId,
        objective_title: impl Into<String>,
    ) -> Result<(), SessionError> {
        let coordinator = self.controller.sink().coordinator().clone();
        let board = fetch(&coordinator, objective_id, objective_title.into()).await?;
        self.synced_revision = Some(lock(coordinator.cache()).set_board(board.clone()));
        self.controller.replace_board(board);
        Ok(())
    }

    fn cache_revision(&self) -> Option<u64> {
        let cache = lock(self.controller.sink().coordinator().cache());
        cache.board_revision(self.objective_id())
    }

    fn absorb(&mut self, settled: &[SettledMove]) {
        for settled_move in settled {
            if &settled_move.command.objective_id != self.objective_id() {
                debug!(
                    task_id = %settled_move.command.task_id,
                    "ignoring move settled for another objective"
                );
                continue;
            }
            info!(
                task_id = %settled_move.command.task_id,
                persisted = settled_move.outcome.is_persisted(),
                "move settled"
            );
            self.controller.settle(&settled_move.command.task_id);
        }
        self.reconcile();
    }

    fn reconcile(&mut self) {
        if *self.controller.phase() != DragPhase::Idle {
            return;
        }

        let cached = {
            let cache = lock(self.controller.sink().coordinator().cache());
            let revision = cache.board_revision(self.objective_id());
            if revision == self.synced_revision {
                return;
            }
            cache
                .board(self.objective_id())
                .cloned()
                .map(|board| (board, revision))
        };

        if let Some((board, revision)) = cached {
            debug!(objective_id = %board.objective_id, "board reconciled from cache");
            self.controller.replace_board(board);
            self.synced_revision = revision;
        }
    }
}

async fn fetch(
    coordinator: &MoveCoordinator,
    objective_id: ObjectiveId,
    objective_title: String,
) -> Result<Board, ApiError> {
    let response = coordinator
        .api()
        .fetch_board(&objective_id, coordinator.page_size())
        .await?;
    let board = Board::from_buckets(objective_id, objective_title, &response);
    for violation in board.check_invariants() {
        debug!(?violation, "board violates an invariant after construction");
    }
    Ok(board)
}
