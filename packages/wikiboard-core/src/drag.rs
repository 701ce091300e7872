/// Drag-and-drop gestures.
///
/// `Idle -> Dragging -> {dropped on a node, dropped between nodes, dropped
/// outside} -> Idle`. The dragging state lives in a [`DragSession`] value
/// owned by the gesture; the board only remembers which node is in flight
/// so a second drag cannot start before the first one is resolved.
use chrono::{DateTime, Utc};

use crate::board::{Board, BoardError};
use crate::mutation::{InsertAt, MoveOutcome};
use crate::types::{ColumnId, NodeId};

/// Which third of the target node the pointer is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropZone {
    Before,
    Child,
    After,
}

impl DropZone {
    pub fn from_offset(offset_y: f64, height: f64) -> Self {
        if !(height > 0.0) {
            return DropZone::Child;
        }
        let third = height / 3.0;
        if offset_y < third {
            DropZone::Before
        } else if offset_y >= height - third {
            DropZone::After
        } else {
            DropZone::Child
        }
    }
}

/// Where the pointer was released.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DropPoint {
    /// Over a task, `offset_y` measured from the top of its row.
    OnNode {
        target: NodeId,
        offset_y: f64,
        height: f64,
    },
    /// In the gap before `before`, which must sit in `column`, or at the
    /// end of `column` when `None`.
    Between {
        column: ColumnId,
        before: Option<NodeId>,
    },
    Outside,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropResult {
    Reordered(Vec<NodeId>),
    Reparented(Vec<NodeId>),
    Unchanged,
    Cancelled,
}

impl DropResult {
    /// Only real moves go through the save cycle.
    pub fn needs_persist(&self) -> bool {
        matches!(self, DropResult::Reordered(_) | DropResult::Reparented(_))
    }

    fn reordered(outcome: MoveOutcome) -> Self {
        match outcome {
            MoveOutcome::Moved(ids) => DropResult::Reordered(ids),
            MoveOutcome::Unchanged => DropResult::Unchanged,
        }
    }

    fn reparented(outcome: MoveOutcome) -> Self {
        match outcome {
            MoveOutcome::Moved(ids) => DropResult::Reparented(ids),
            MoveOutcome::Unchanged => DropResult::Unchanged,
        }
    }
}

#[derive(Debug)]
pub struct DragSession {
    node: NodeId,
    origin_column: ColumnId,
    started_at: DateTime<Utc>,
}

impl Board {
    pub fn begin_drag(&mut self, node: NodeId) -> Result<DragSession, BoardError> {
        if let Some(active) = self.drag {
            return Err(BoardError::DragInProgress(active));
        }
        let (ci, _) = self.require(node)?;
        self.drag = Some(node);
        log::trace!(target: "wikiboard.drag", "Drag started for {:?}", node);
        Ok(DragSession {
            node,
            origin_column: self.columns[ci].id,
            started_at: Utc::now(),
        })
    }
}

impl DragSession {
    /// Resolve the gesture. The board leaves the dragging state whatever the
    /// result, errors included.
    pub fn drop_at(self, board: &mut Board, point: DropPoint) -> Result<DropResult, BoardError> {
        board.drag = None;
        let result = match point {
            DropPoint::Outside => DropResult::Cancelled,
            DropPoint::OnNode { target, .. } if target == self.node => DropResult::Unchanged,
            DropPoint::OnNode {
                target,
                offset_y,
                height,
            } => match DropZone::from_offset(offset_y, height) {
                DropZone::Before => {
                    DropResult::reordered(board.reorder(self.node, InsertAt::Before(target))?)
                }
                DropZone::After => {
                    DropResult::reordered(board.reorder(self.node, InsertAt::After(target))?)
                }
                DropZone::Child => DropResult::reparented(board.reparent(self.node, target)?),
            },
            DropPoint::Between { column, before } => {
                let ci = board.column_index(column)?;
                let to = match before {
                    Some(anchor) if board.require(anchor)?.0 != ci => {
                        return Err(BoardError::InvalidDropTarget(anchor));
                    }
                    Some(anchor) => InsertAt::Before(anchor),
                    None => InsertAt::End(column),
                };
                DropResult::reordered(board.reorder(self.node, to)?)
            }
        };
        log::debug!(
            target: "wikiboard.drag",
            "Drag of {:?} from column {:?} resolved as {:?} after {} ms",
            self.node,
            self.origin_column,
            result,
            (Utc::now() - self.started_at).num_milliseconds()
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = "\
## Todo
- [ ] Buy milk <!-- task-id: task_1 -->
  - [ ] 2% preferred <!-- task-id: task_2 -->
- [ ] Call mom <!-- task-id: task_3 -->

## Done
";

    fn board() -> Board {
        let mut board = Board::from_markdown(DOC);
        crate::matcher::reconcile(&mut board, &crate::extractor::extract(DOC));
        board
    }

    fn on(target: NodeId, offset_y: f64) -> DropPoint {
        DropPoint::OnNode {
            target,
            offset_y,
            height: 30.0,
        }
    }

    #[test]
    fn test_drop_zone_thirds() {
        assert_eq!(DropZone::from_offset(0.0, 30.0), DropZone::Before);
        assert_eq!(DropZone::from_offset(9.9, 30.0), DropZone::Before);
        assert_eq!(DropZone::from_offset(10.0, 30.0), DropZone::Child);
        assert_eq!(DropZone::from_offset(19.9, 30.0), DropZone::Child);
        assert_eq!(DropZone::from_offset(20.0, 30.0), DropZone::After);
        assert_eq!(DropZone::from_offset(5.0, 0.0), DropZone::Child);
    }

    #[test]
    fn test_second_drag_is_rejected_until_resolved() {
        let mut board = board();
        let first = board.find_task("task_1").unwrap();
        let second = board.find_task("task_3").unwrap();

        let session = board.begin_drag(first).unwrap();
        assert_eq!(board.drag, Some(first));
        assert_eq!(
            board.begin_drag(second).unwrap_err(),
            BoardError::DragInProgress(first)
        );

        assert_eq!(
            session.drop_at(&mut board, DropPoint::Outside),
            Ok(DropResult::Cancelled)
        );
        assert_eq!(board.drag, None);
        assert!(board.begin_drag(second).is_ok());
    }

    #[test]
    fn test_drop_outside_cancels() {
        let mut board = board();
        let node = board.find_task("task_3").unwrap();
        let session = board.begin_drag(node).unwrap();
        let result = session.drop_at(&mut board, DropPoint::Outside).unwrap();
        assert_eq!(result, DropResult::Cancelled);
        assert!(!result.needs_persist());
        assert_eq!(board.dirty_count(), 0);
    }

    #[test]
    fn test_drop_on_middle_reparents() {
        let mut board = board();
        let call = board.find_task("task_3").unwrap();
        let milk = board.find_task("task_1").unwrap();
        let session = board.begin_drag(call).unwrap();
        let result = session.drop_at(&mut board, on(milk, 15.0)).unwrap();
        assert_eq!(result, DropResult::Reparented(vec![call]));
        assert!(result.needs_persist());
        assert_eq!(board.locate(call), Some((0, 1)));
        assert_eq!(board.node(call).unwrap().indent_level, 1);
    }

    #[test]
    fn test_drop_on_top_third_reorders_before() {
        let mut board = board();
        let call = board.find_task("task_3").unwrap();
        let milk = board.find_task("task_1").unwrap();
        let session = board.begin_drag(call).unwrap();
        let result = session.drop_at(&mut board, on(milk, 2.0)).unwrap();
        assert_eq!(result, DropResult::Reordered(vec![call]));
        assert_eq!(board.locate(call), Some((0, 0)));
        assert_eq!(board.node(call).unwrap().indent_level, 0);
    }

    #[test]
    fn test_drop_between_into_empty_column() {
        let mut board = board();
        let milk = board.find_task("task_1").unwrap();
        let done = board.columns()[1].id;
        let session = board.begin_drag(milk).unwrap();
        let result = session
            .drop_at(
                &mut board,
                DropPoint::Between {
                    column: done,
                    before: None,
                },
            )
            .unwrap();
        assert_eq!(result, DropResult::Reordered(vec![milk, board.find_task("task_2").unwrap()]));
        assert_eq!(board.columns()[1].nodes.len(), 2);
    }

    #[test]
    fn test_drop_between_rejects_anchor_from_another_column() {
        let mut board = board();
        let milk = board.find_task("task_1").unwrap();
        let call = board.find_task("task_3").unwrap();
        let done = board.columns()[1].id;
        let before = board.nodes().map(|n| n.id).collect::<Vec<_>>();

        let session = board.begin_drag(milk).unwrap();
        assert_eq!(
            session.drop_at(
                &mut board,
                DropPoint::Between {
                    column: done,
                    before: Some(call),
                }
            ),
            Err(BoardError::InvalidDropTarget(call))
        );
        assert_eq!(board.drag, None);
        assert_eq!(board.nodes().map(|n| n.id).collect::<Vec<_>>(), before);
        assert!(board.columns()[1].nodes.is_empty());
    }

    #[test]
    fn test_drop_on_itself_or_back_in_place_is_unchanged() {
        let mut board = board();
        let milk = board.find_task("task_1").unwrap();
        let session = board.begin_drag(milk).unwrap();
        assert_eq!(
            session.drop_at(&mut board, on(milk, 15.0)).unwrap(),
            DropResult::Unchanged
        );

        let call = board.find_task("task_3").unwrap();
        let session = board.begin_drag(milk).unwrap();
        let result = session.drop_at(&mut board, on(call, 1.0)).unwrap();
        assert_eq!(result, DropResult::Unchanged);
        assert!(!result.needs_persist());
        assert_eq!(board.dirty_count(), 0);
    }

    #[test]
    fn test_drop_on_descendant_fails_and_ends_drag() {
        let mut board = board();
        let milk = board.find_task("task_1").unwrap();
        let child = board.find_task("task_2").unwrap();
        let session = board.begin_drag(milk).unwrap();
        assert_eq!(
            session.drop_at(&mut board, on(child, 15.0)),
            Err(BoardError::InvalidDropTarget(milk))
        );
        assert_eq!(board.drag, None);
    }
}
