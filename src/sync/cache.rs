//! In-memory query cache shared by the board screen and the screens that
//! show aggregates derived from it.

use std::collections::HashMap;
use std::fmt;

use serde_json::Value;
use tracing::debug;

use crate::board::Board;
use crate::types::ObjectiveId;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    ObjectiveBoard(ObjectiveId),
    ObjectiveDetail(ObjectiveId),
    ObjectiveList,
    GoalList,
    GoalDetail(String),
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ObjectiveBoard(id) => write!(f, "objective/{id}/board"),
            Self::ObjectiveDetail(id) => write!(f, "objective/{id}"),
            Self::ObjectiveList => f.write_str("objectives"),
            Self::GoalList => f.write_str("goals"),
            Self::GoalDetail(id) => write!(f, "goal/{id}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CachedValue {
    Board(Board),
    Json(Value),
}

#[derive(Debug, Clone, PartialEq)]
struct CacheEntry {
    value: CachedValue,
    stale: bool,
    revision: u64,
}

/// Every write stamps the entry with a fresh revision from one counter, so
/// an unchanged revision means nobody touched the entry in between.
#[derive(Debug, Default)]
pub struct QueryCache {
    entries: HashMap<CacheKey, CacheEntry>,
    revision: u64,
    pending_moves: HashMap<ObjectiveId, usize>,
}

impl QueryCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_revision(&mut self) -> u64 {
        self.revision += 1;
        self.revision
    }

    fn insert(&mut self, key: CacheKey, value: CachedValue) -> u64 {
        let revision = self.next_revision();
        self.entries.insert(
            key,
            CacheEntry {
                value,
                stale: false,
                revision,
            },
        );
        revision
    }

    /// Stores a canonical board, clearing any stale mark.
    pub fn set_board(&mut self, board: Board) -> u64 {
        let key = CacheKey::ObjectiveBoard(board.objective_id.clone());
        self.insert(key, CachedValue::Board(board))
    }

    pub fn board(&self, objective_id: &ObjectiveId) -> Option<&Board> {
        match self
            .entries
            .get(&CacheKey::ObjectiveBoard(objective_id.clone()))
        {
            Some(CacheEntry {
                value: CachedValue::Board(board),
                ..
            }) => Some(board),
            _ => None,
        }
    }

    pub fn board_revision(&self, objective_id: &ObjectiveId) -> Option<u64> {
        self.revision_of(&CacheKey::ObjectiveBoard(objective_id.clone()))
    }

    /// Edits the cached board in place and stamps a new revision. The stale
    /// flag is left as it was.
    pub fn update_board<R>(
        &mut self,
        objective_id: &ObjectiveId,
        edit: impl FnOnce(&mut Board) -> R,
    ) -> Option<R> {
        let revision = self.next_revision();
        let entry = self
            .entries
            .get_mut(&CacheKey::ObjectiveBoard(objective_id.clone()))?;
        let CachedValue::Board(board) = &mut entry.value else {
            return None;
        };

        let result = edit(board);
        entry.revision = revision;
        Some(result)
    }

    pub fn set_json(&mut self, key: CacheKey, value: Value) -> u64 {
        self.insert(key, CachedValue::Json(value))
    }

    pub fn json(&self, key: &CacheKey) -> Option<&Value> {
        match self.entries.get(key) {
            Some(CacheEntry {
                value: CachedValue::Json(value),
                ..
            }) => Some(value),
            _ => None,
        }
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn revision_of(&self, key: &CacheKey) -> Option<u64> {
        self.entries.get(key).map(|entry| entry.revision)
    }

    pub fn is_stale(&self, key: &CacheKey) -> bool {
        self.entries.get(key).is_some_and(|entry| entry.stale)
    }

    /// Marks one entry stale. Returns whether it existed.
    pub fn invalidate(&mut self, key: &CacheKey) -> bool {
        match self.entries.get_mut(key) {
            Some(entry) => {
                entry.stale = true;
                true
            }
            None => false,
        }
    }

    /// Marks the objective's board and every aggregate that counts its tasks
    /// as stale. Returns the keys that were marked.
    pub fn invalidate_after_move(&mut self, objective_id: &ObjectiveId) -> Vec<CacheKey> {
        let mut marked = Vec::new();
        for (key, entry) in &mut self.entries {
            let dependent = match key {
                CacheKey::ObjectiveBoard(id) | CacheKey::ObjectiveDetail(id) => id == objective_id,
                CacheKey::ObjectiveList | CacheKey::GoalList | CacheKey::GoalDetail(_) => true,
            };
            if dependent {
                entry.stale = true;
                marked.push(key.clone());
            }
        }

        debug!(%objective_id, count = marked.len(), "cache entries invalidated after move");
        marked
    }

    pub(crate) fn move_started(&mut self, objective_id: &ObjectiveId) {
        *self.pending_moves.entry(objective_id.clone()).or_default() += 1;
    }

    /// Returns the number of moves for the objective still unresolved.
    pub(crate) fn move_finished(&mut self, objective_id: &ObjectiveId) -> usize {
        let Some(count) = self.pending_moves.get_mut(objective_id) else {
            return 0;
        };
        *count = count.saturating_sub(1);
        let remaining = *count;
        if remaining == 0 {
            self.pending_moves.remove(objective_id);
        }
        remaining
    }

    pub fn pending_moves(&self, objective_id: &ObjectiveId) -> usize {
        self.pending_moves.get(objective_id).copied().unwrap_or(0)
    }
}
