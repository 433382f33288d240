//! Optimistic move persistence: snapshot the cached board, speculate, send,
//! then either invalidate dependents or put the board back.

use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::cache::{CacheKey, QueryCache};
use super::{SharedCache, lock};
use crate::api::wire::MoveResult;
use crate::api::{BoardApi, MoveError};
use crate::board::{Board, ColumnId, MoveCommand, MoveSink};
use crate::notification::{Notifier, SelfEvaluationOpener, Severity};
use crate::types::{ObjectiveId, TaskId};

/// Pre-move state for a single move request.
#[derive(Debug, Clone)]
pub struct MoveSnapshot {
    objective_id: ObjectiveId,
    task_id: TaskId,
    previous: Option<Board>,
    origin: Option<(ColumnId, usize)>,
    applied_revision: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Restore {
    /// The cached board equals the snapshot.
    Exact,
    /// Other moves landed after this one; only this task was put back.
    Targeted,
    /// Nothing cached to restore into.
    Skipped,
}

impl MoveSnapshot {
    /// Records the cached board, then applies the move to it.
    pub fn capture(cache: &mut QueryCache, command: &MoveCommand) -> Self {
        let previous = cache.board(&command.objective_id).cloned();
        let origin = previous
            .as_ref()
            .and_then(|board| board.locate(&command.task_id));

        let speculated = cache
            .update_board(&command.objective_id, |board| {
                board.relocate(&command.task_id, command.to, command.new_position)
            })
            .flatten();
        if previous.is_some() && speculated.is_none() {
            debug!(
                task_id = %command.task_id,
                "moved task missing from cached board; nothing speculated"
            );
        }

        Self {
            objective_id: command.objective_id.clone(),
            task_id: command.task_id.clone(),
            previous,
            origin,
            applied_revision: cache.board_revision(&command.objective_id),
        }
    }

    pub fn task_id(&self) -> &TaskId {
        &self.task_id
    }

    pub fn previous(&self) -> Option<&Board> {
        self.previous.as_ref()
    }

    pub fn restore(self, cache: &mut QueryCache) -> Restore {
        let current = cache.board_revision(&self.objective_id);

        if let Some(previous) = self.previous
            && current.is_some()
            && current == self.applied_revision
        {
            // In place: a stale mark left by another move's success survives.
            cache.update_board(&self.objective_id, |board| *board = previous);
            return Restore::Exact;
        }

        let Some((column, index)) = self.origin else {
            return Restore::Skipped;
        };
        match cache
            .update_board(&self.objective_id, |board| {
                board.relocate(&self.task_id, column, index)
            })
            .flatten()
        {
            Some(_) => Restore::Targeted,
            None => Restore::Skipped,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoveOutcome {
    Persisted(MoveResult),
    SelfEvaluationRequired,
    RolledBack(MoveError),
}

impl MoveOutcome {
    pub fn is_persisted(&self) -> bool {
        matches!(self, MoveOutcome::Persisted(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettledMove {
    pub command: MoveCommand,
    pub outcome: MoveOutcome,
}

/// Runs moves against the API and keeps the shared cache consistent with
/// their results.
#[derive(Clone)]
pub struct MoveCoordinator {
    api: Arc<dyn BoardApi>,
    cache: SharedCache,
    notifier: Arc<dyn Notifier>,
    self_evaluation: Arc<dyn SelfEvaluationOpener>,
    page_size: u32,
}

impl MoveCoordinator {
    pub fn new(
        api: Arc<dyn BoardApi>,
        cache: SharedCache,
        notifier: Arc<dyn Notifier>,
        self_evaluation: Arc<dyn SelfEvaluationOpener>,
        page_size: u32,
    ) -> Self {
        Self {
            api,
            cache,
            notifier,
            self_evaluation,
            page_size,
        }
    }

    pub fn api(&self) -> &Arc<dyn BoardApi> {
        &self.api
    }

    pub fn cache(&self) -> &SharedCache {
        &self.cache
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Synchronous half of a move: snapshot and speculate.
    pub fn begin(&self, command: &MoveCommand) -> MoveSnapshot {
        let mut cache = lock(&self.cache);
        cache.move_started(&command.objective_id);
        MoveSnapshot::capture(&mut cache, command)
    }

    /// Sends the move and resolves it against the cache.
    pub async fn complete(&self, command: &MoveCommand, snapshot: MoveSnapshot) -> MoveOutcome {
        let request = command.to_request();
        let result = self.api.move_task(&command.objective_id, &request).await;

        let outcome = match result {
            Ok(result) => {
                lock(&self.cache).invalidate_after_move(&command.objective_id);
                info!(
                    task_id = %command.task_id,
                    to = %command.to,
                    new_position = command.new_position,
                    "move persisted"
                );
                MoveOutcome::Persisted(result)
            }
            Err(MoveError::SelfEvaluationRequired { task_id }) => {
                let restore = snapshot.restore(&mut lock(&self.cache));
                info!(%task_id, ?restore, "move needs self-evaluation; rolled back");
                self.self_evaluation.open_self_evaluation(&task_id);
                MoveOutcome::SelfEvaluationRequired
            }
            Err(err) => {
                let restore = snapshot.restore(&mut lock(&self.cache));
                warn!(
                    task_id = %command.task_id,
                    code = err.code(),
                    error = %err,
                    ?restore,
                    "move failed; rolled back"
                );
                self.notifier
                    .notify(&format!("Failed to move task: {err}"), Severity::Error);
                MoveOutcome::RolledBack(err)
            }
        };

        let remaining = lock(&self.cache).move_finished(&command.objective_id);
        if remaining == 0 {
            self.refresh_if_stale(&command.objective_id).await;
        } else {
            debug!(
                objective_id = %command.objective_id,
                remaining,
                "refetch deferred until other moves settle"
            );
        }

        outcome
    }

    pub async fn persist(&self, command: &MoveCommand) -> MoveOutcome {
        let snapshot = self.begin(command);
        self.complete(command, snapshot).await
    }

    /// Replaces a stale cached board with the server's copy. A refetch that
    /// races with a newly started move is discarded.
    pub async fn refresh_if_stale(&self, objective_id: &ObjectiveId) {
        let title = {
            let cache = lock(&self.cache);
            if !cache.is_stale(&CacheKey::ObjectiveBoard(objective_id.clone())) {
                return;
            }
            match cache.board(objective_id) {
                Some(board) => board.objective_title.clone(),
                None => return,
            }
        };

        match self.api.fetch_board(objective_id, self.page_size).await {
            Ok(response) => {
                let board = Board::from_buckets(objective_id.clone(), title, &response);
                let mut cache = lock(&self.cache);
                if cache.pending_moves(objective_id) > 0 {
                    debug!(%objective_id, "discarding refetch; a move started meanwhile");
                    return;
                }
                cache.set_board(board);
                debug!(%objective_id, "board refetched");
            }
            Err(err) => {
                warn!(%objective_id, error = %err, "board refetch failed; keeping stale copy");
            }
        }
    }
}

/// [`MoveSink`] that speculates synchronously and finishes each move on the
/// tokio runtime, reporting back over a channel.
pub struct MoveDispatcher {
    coordinator: MoveCoordinator,
    runtime: Handle,
    settled: mpsc::UnboundedSender<SettledMove>,
}

impl MoveDispatcher {
    pub fn new(
        coordinator: MoveCoordinator,
        runtime: Handle,
    ) -> (Self, mpsc::UnboundedReceiver<SettledMove>) {
        let (settled, receiver) = mpsc::unbounded_channel();
        (
            Self {
                coordinator,
                runtime,
                settled,
            },
            receiver,
        )
    }

    pub fn coordinator(&self) -> &MoveCoordinator {
        &self.coordinator
    }
}

impl MoveSink for MoveDispatcher {
    fn persist(&self, command: MoveCommand) {
        let snapshot = self.coordinator.begin(&command);
        let coordinator = self.coordinator.clone();
        let settled = self.settled.clone();

        self.runtime.spawn(async move {
            let outcome = coordinator.complete(&command, snapshot).await;
            if settled.send(SettledMove { command, outcome }).is_err() {
                debug!("move settled after its session closed");
            }
        });
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use crate::api::wire::{BoardResponse, MoveRequest, MoveResult, TaskBucket, TaskItem};
    use crate::api::{ApiError, BoardApi, MoveError};
    use crate::types::ObjectiveId;

    /// Scripted API: answers moves and fetches from queues, in order.
    #[derive(Default)]
    pub(crate) struct FakeApi {
        pub(crate) moves: Mutex<VecDeque<Result<MoveResult, MoveError>>>,
        pub(crate) fetches: Mutex<VecDeque<Result<BoardResponse, ApiError>>>,
        pub(crate) sent: Mutex<Vec<MoveRequest>>,
    }

    impl FakeApi {
        pub(crate) fn with_moves(moves: Vec<Result<MoveResult, MoveError>>) -> Self {
            Self {
                moves: Mutex::new(moves.into()),
                ..Self::default()
            }
        }

        pub(crate) fn push_fetch(&self, response: BoardResponse) {
            self.fetches
                .lock()
                .expect("fetch lock")
                .push_back(Ok(response));
        }

        pub(crate) fn sent(&self) -> Vec<MoveRequest> {
            self.sent.lock().expect("sent lock").clone()
        }
    }

    #[async_trait]
    impl BoardApi for FakeApi {
        async fn move_task(
            &self,
            _objective_id: &ObjectiveId,
            request: &MoveRequest,
        ) -> Result<MoveResult, MoveError> {
            self.sent.lock().expect("sent lock").push(request.clone());
            self.moves
                .lock()
                .expect("move lock")
                .pop_front()
                .unwrap_or_else(|| Ok(MoveResult::default()))
        }

        async fn fetch_board(
            &self,
            _objective_id: &ObjectiveId,
            _page_size: u32,
        ) -> Result<BoardResponse, ApiError> {
            self.fetches
                .lock()
                .expect("fetch lock")
                .pop_front()
                .unwrap_or_else(|| Err(ApiError::Transport("no scripted fetch".to_string())))
        }
    }

    fn bucket(ids: &[&str]) -> TaskBucket {
        TaskBucket {
            page: 1,
            per_page: 50,
            total: ids.len() as u64,
            total_pages: 1,
            has_next: false,
            items: ids
                .iter()
                .map(|id| TaskItem {
                    task_id: id.to_string(),
                    title: format!("Task {id}"),
                    ..TaskItem::default()
                })
                .collect(),
        }
    }

    /// Fetch payload matching `board_with` for the same ids.
    pub(crate) fn response(
        todo: &[&str],
        in_progress: &[&str],
        paused: &[&str],
        done: &[&str],
    ) -> BoardResponse {
        BoardResponse {
            not_started: bucket(todo),
            in_progress: bucket(in_progress),
            completed: bucket(done),
            paused: bucket(paused),
        }
    }
}
