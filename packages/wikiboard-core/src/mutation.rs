/// Structural moves over the flat node list.
///
/// Every move operates on a subtree: the node plus the contiguous following
/// nodes with a greater indent. The subtree is cut out, its levels are
/// recomputed from the root's new level, and it is spliced back in at the
/// destination. A move that lands where it started is reported as
/// `Unchanged` and leaves all dirty flags alone.
use chrono::{DateTime, Utc};

use crate::board::{Board, BoardError};
use crate::types::{ColumnId, NodeId, TaskNode};

/// Destination of a reorder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertAt {
    /// Directly before the given node.
    Before(NodeId),
    /// After the given node and all of its descendants.
    After(NodeId),
    Start(ColumnId),
    End(ColumnId),
}

#[derive(Debug, Clone, Copy)]
enum Anchor {
    At(InsertAt),
    FirstChildOf(NodeId),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoveOutcome {
    /// IDs of the moved nodes, subtree root first.
    Moved(Vec<NodeId>),
    Unchanged,
}

impl MoveOutcome {
    pub fn is_moved(&self) -> bool {
        matches!(self, MoveOutcome::Moved(_))
    }
}

impl Board {
    /// Move a node and its descendants to a new position, in the same or
    /// another column. Levels are kept as they are.
    pub fn reorder(&mut self, id: NodeId, to: InsertAt) -> Result<MoveOutcome, BoardError> {
        let (ci, ni) = self.require(id)?;
        if let InsertAt::Before(anchor) | InsertAt::After(anchor) = to {
            if anchor == id {
                return Ok(MoveOutcome::Unchanged);
            }
        }
        let level = self.columns[ci].nodes[ni].indent_level;
        self.move_subtree(id, Anchor::At(to), level)
    }

    /// Make a node the first child of `target`: its level becomes
    /// `target + 1` and its descendants shift along with it.
    pub fn reparent(&mut self, id: NodeId, target: NodeId) -> Result<MoveOutcome, BoardError> {
        self.require(id)?;
        if target == id {
            return Err(BoardError::InvalidDropTarget(id));
        }
        let (tci, tni) = self.require(target)?;
        let level = self.columns[tci].nodes[tni].indent_level + 1;
        self.move_subtree(id, Anchor::FirstChildOf(target), level)
    }

    /// Change a node's level in place. Descendants keep their distance to the
    /// node but never go below level 1.
    pub fn set_indent(&mut self, id: NodeId, level: usize) -> Result<MoveOutcome, BoardError> {
        let (ci, ni) = self.require(id)?;
        let len = Self::subtree_len(&self.columns[ci].nodes, ni);
        if self.columns[ci].nodes[ni].indent_level == level {
            return Ok(MoveOutcome::Unchanged);
        }
        let moved = relevel(
            &mut self.columns[ci].nodes[ni..ni + len],
            level,
            Utc::now(),
        );
        log::debug!(
            target: "wikiboard.mutation",
            "Set indent of {:?} to {} ({} nodes)",
            id,
            level,
            moved.len()
        );
        Ok(MoveOutcome::Moved(moved))
    }

    fn move_subtree(
        &mut self,
        id: NodeId,
        anchor: Anchor,
        level: usize,
    ) -> Result<MoveOutcome, BoardError> {
        let (ci, ni) = self.require(id)?;
        let len = Self::subtree_len(&self.columns[ci].nodes, ni);

        match anchor {
            Anchor::At(InsertAt::Before(node) | InsertAt::After(node))
            | Anchor::FirstChildOf(node) => {
                let (aci, ani) = self.require(node)?;
                if aci == ci && (ni..ni + len).contains(&ani) {
                    return Err(BoardError::InvalidDropTarget(id));
                }
            }
            Anchor::At(InsertAt::Start(column) | InsertAt::End(column)) => {
                self.column_index(column)?;
            }
        }

        let origin_next = self.columns[ci].nodes.get(ni + len).map(|n| n.id);
        let origin_level = self.columns[ci].nodes[ni].indent_level;
        let mut subtree: Vec<TaskNode> = self.columns[ci].nodes.drain(ni..ni + len).collect();

        let Some((tci, pos)) = self.insertion_point(anchor) else {
            insert_run(&mut self.columns[ci].nodes, ni, subtree);
            return Err(BoardError::NodeNotFound(id));
        };

        let next = self.columns[tci].nodes.get(pos).map(|n| n.id);
        if tci == ci && next == origin_next && level == origin_level {
            insert_run(&mut self.columns[ci].nodes, ni, subtree);
            return Ok(MoveOutcome::Unchanged);
        }

        let moved = relevel(&mut subtree, level, Utc::now());
        insert_run(&mut self.columns[tci].nodes, pos, subtree);
        log::debug!(
            target: "wikiboard.mutation",
            "Moved {:?} ({} nodes) to column {:?} at {}, level {}",
            id,
            moved.len(),
            self.columns[tci].id,
            pos,
            level
        );
        Ok(MoveOutcome::Moved(moved))
    }

    /// Column index and position for an anchor, computed with the moving
    /// subtree already removed.
    fn insertion_point(&self, anchor: Anchor) -> Option<(usize, usize)> {
        match anchor {
            Anchor::At(InsertAt::Before(node)) => self.locate(node),
            Anchor::At(InsertAt::After(node)) => self
                .locate(node)
                .map(|(c, i)| (c, i + Self::subtree_len(&self.columns[c].nodes, i))),
            Anchor::FirstChildOf(node) => self.locate(node).map(|(c, i)| (c, i + 1)),
            Anchor::At(InsertAt::Start(column)) => self.column_index(column).ok().map(|c| (c, 0)),
            Anchor::At(InsertAt::End(column)) => self
                .column_index(column)
                .ok()
                .map(|c| (c, self.columns[c].nodes.len())),
        }
    }
}

/// Put the subtree root at `level`, shift descendants by the same delta
/// (clamped to 1) and flag everything as moved.
fn relevel(subtree: &mut [TaskNode], level: usize, at: DateTime<Utc>) -> Vec<NodeId> {
    let Some(root_level) = subtree.first().map(|n| n.indent_level) else {
        return Vec::new();
    };
    let delta = level as isize - root_level as isize;
    for (i, node) in subtree.iter_mut().enumerate() {
        node.indent_level = if i == 0 {
            level
        } else {
            (node.indent_level as isize + delta).max(1) as usize
        };
        node.mark_moved(at);
    }
    subtree.iter().map(|n| n.id).collect()
}

fn insert_run(nodes: &mut Vec<TaskNode>, pos: usize, run: Vec<TaskNode>) {
    let tail = nodes.split_off(pos);
    nodes.extend(run);
    nodes.extend(tail);
}
