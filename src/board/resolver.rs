//! Classifies what the drag engine reports under the pointer at drop time.
//!
//! The engine hands over every target whose region contains the pointer,
//! innermost first: a card hover yields `[Card, Column]`, empty column space
//! yields `[Column]`.

use serde::{Deserialize, Serialize};

use super::{Board, ColumnId};
use crate::types::TaskId;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Edge {
    Top,
    Bottom,
}

impl Edge {
    /// Upper half of the card (midpoint included) is `Top`.
    pub fn from_pointer(pointer_y: f64, card_top: f64, card_height: f64) -> Self {
        if pointer_y <= card_top + card_height / 2.0 {
            Edge::Top
        } else {
            Edge::Bottom
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum DropTarget {
    Column { column: ColumnId },
    Card { task_id: TaskId, edge: Option<Edge> },
}

impl DropTarget {
    pub fn column(column: ColumnId) -> Self {
        DropTarget::Column { column }
    }

    pub fn card(task_id: impl Into<String>, edge: Edge) -> Self {
        DropTarget::Card {
            task_id: TaskId::new(task_id),
            edge: Some(edge),
        }
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Resolution {
    /// Over the column but not over any card.
    ColumnSpace { column: ColumnId },
    /// Over a specific card in `column`.
    Card {
        column: ColumnId,
        task_id: TaskId,
        edge: Edge,
    },
}

impl Resolution {
    pub fn column(&self) -> ColumnId {
        match self {
            Resolution::ColumnSpace { column } | Resolution::Card { column, .. } => *column,
        }
    }
}

/// What the board should highlight while hovering.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum DropIndicator {
    Column(ColumnId),
    CardEdge { task_id: TaskId, edge: Edge },
}

/// Returns `None` when the drop must be ignored: nothing under the
/// pointer, or a card with no owning column reported.
pub fn resolve_drop(targets: &[DropTarget]) -> Option<Resolution> {
    let column = targets.iter().find_map(|target| match target {
        DropTarget::Column { column } => Some(*column),
        DropTarget::Card { .. } => None,
    })?;

    let card = targets.iter().find_map(|target| match target {
        DropTarget::Card { task_id, edge } => Some((task_id, *edge)),
        DropTarget::Column { .. } => None,
    });

    match card {
        Some((task_id, Some(edge))) => Some(Resolution::Card {
            column,
            task_id: task_id.clone(),
            edge,
        }),
        // A card without an edge means the pointer is not over its body.
        Some((_, None)) | None => Some(Resolution::ColumnSpace { column }),
    }
}

pub fn hover_indicator(targets: &[DropTarget], dragged: &TaskId) -> Option<DropIndicator> {
    match resolve_drop(targets)? {
        Resolution::Card { task_id, edge, .. } if &task_id != dragged => {
            Some(DropIndicator::CardEdge { task_id, edge })
        }
        resolution => Some(DropIndicator::Column(resolution.column())),
    }
}

/// Index of the dragged task in the column the engine says it came from.
/// `None` means the board changed under the gesture.
pub fn locate_source(board: &Board, task_id: &TaskId, column: ColumnId) -> Option<usize> {
    board.column(column).position_of(task_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::test_support::board_with;
    use rstest::rstest;

    #[test]
    fn empty_targets_resolve_to_nothing() {
        assert_eq!(resolve_drop(&[]), None);
    }

    #[test]
    fn single_column_target_is_column_space() {
        assert_eq!(
            resolve_drop(&[DropTarget::column(ColumnId::Done)]),
            Some(Resolution::ColumnSpace {
                column: ColumnId::Done
            })
        );
    }

    #[test]
    fn card_without_column_is_ignored() {
        assert_eq!(resolve_drop(&[DropTarget::card("b", Edge::Top)]), None);
    }

    #[rstest]
    #[case::top(Edge::Top)]
    #[case::bottom(Edge::Bottom)]
    fn card_and_column_resolve_to_card_with_edge(#[case] edge: Edge) {
        let targets = [
            DropTarget::card("c", edge),
            DropTarget::column(ColumnId::InProgress),
        ];

        assert_eq!(
            resolve_drop(&targets),
            Some(Resolution::Card {
                column: ColumnId::InProgress,
                task_id: TaskId::new("c"),
                edge,
            })
        );
    }

    #[test]
    fn target_order_does_not_matter() {
        let targets = [
            DropTarget::column(ColumnId::Paused),
            DropTarget::card("x", Edge::Bottom),
        ];
        assert_eq!(
            resolve_drop(&targets).map(|resolution| resolution.column()),
            Some(ColumnId::Paused)
        );
    }

    #[test]
    fn card_without_edge_degrades_to_column_space() {
        let targets = [
            DropTarget::Card {
                task_id: TaskId::new("x"),
                edge: None,
            },
            DropTarget::column(ColumnId::Todo),
        ];
        assert_eq!(
            resolve_drop(&targets),
            Some(Resolution::ColumnSpace {
                column: ColumnId::Todo
            })
        );
    }

    #[rstest]
    #[case::upper_quarter(110.0, Edge::Top)]
    #[case::midpoint(125.0, Edge::Top)]
    #[case::lower_half(126.0, Edge::Bottom)]
    #[case::below_card(400.0, Edge::Bottom)]
    fn edge_from_pointer_splits_card_in_half(#[case] pointer_y: f64, #[case] expected: Edge) {
        assert_eq!(Edge::from_pointer(pointer_y, 100.0, 50.0), expected);
    }

    #[test]
    fn hover_over_own_card_highlights_column_only() {
        let dragged = TaskId::new("a");
        let over_self = [
            DropTarget::card("a", Edge::Bottom),
            DropTarget::column(ColumnId::Todo),
        ];
        assert_eq!(
            hover_indicator(&over_self, &dragged),
            Some(DropIndicator::Column(ColumnId::Todo))
        );

        let over_other = [
            DropTarget::card("b", Edge::Top),
            DropTarget::column(ColumnId::Todo),
        ];
        assert_eq!(
            hover_indicator(&over_other, &dragged),
            Some(DropIndicator::CardEdge {
                task_id: TaskId::new("b"),
                edge: Edge::Top
            })
        );
        assert_eq!(hover_indicator(&[], &dragged), None);
    }

    #[test]
    fn locate_source_detects_stale_column() {
        let board = board_with(&[(ColumnId::Todo, &["a", "b"]), (ColumnId::Done, &["c"])]);
        assert_eq!(locate_source(&board, &TaskId::new("b"), ColumnId::Todo), Some(1));
        assert_eq!(locate_source(&board, &TaskId::new("c"), ColumnId::Todo), None);
    }

    #[test]
    fn drop_targets_decode_from_engine_payload() {
        let payload = r#"[{"kind": "card", "task_id": "b", "edge": "bottom"},
                          {"kind": "column", "column": "in-progress"}]"#;
        let targets: Vec<DropTarget> = serde_json::from_str(payload).expect("targets decode");
        assert_eq!(
            targets,
            vec![
                DropTarget::card("b", Edge::Bottom),
                DropTarget::column(ColumnId::InProgress)
            ]
        );
    }
}
