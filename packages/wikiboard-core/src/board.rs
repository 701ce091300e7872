/// In-memory kanban board.
///
/// A board is an ordered list of columns; each column is a flat list of
/// task nodes whose nesting is expressed only by indent level. The
/// descendants of a node are the contiguous following nodes with a
/// strictly greater indent, so every structural query is a forward scan.
use serde::Serialize;

use crate::extractor;
use crate::identity;
use crate::outline::{self, Outline};
use crate::types::{Column, ColumnId, ColumnSource, NodeId, TaskNode};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BoardError {
    #[error("Task node not found: {0:?}")]
    NodeNotFound(NodeId),

    #[error("Column not found: {0:?}")]
    ColumnNotFound(ColumnId),

    #[error("A drag of node {0:?} is still in progress")]
    DragInProgress(NodeId),

    #[error("Cannot drop node {0:?} onto itself or one of its descendants")]
    InvalidDropTarget(NodeId),

    #[error("Task content must not be empty")]
    EmptyContent,

    #[error("Column title must not be empty")]
    EmptyTitle,
}

/// Asks the user before a task and its subtasks are removed.
pub trait ConfirmDelete {
    fn confirm_delete(&self, task: &TaskNode, descendants: usize) -> bool;
}

impl<F> ConfirmDelete for F
where
    F: Fn(&TaskNode, usize) -> bool,
{
    fn confirm_delete(&self, task: &TaskNode, descendants: usize) -> bool {
        self(task, descendants)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DeleteOutcome {
    /// The removed nodes, root first.
    Deleted(Vec<TaskNode>),
    Declined,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Board {
    pub(crate) columns: Vec<Column>,
    #[serde(skip)]
    next_node: u64,
    #[serde(skip)]
    next_column: u64,
    #[serde(skip)]
    pub(crate) drag: Option<NodeId>,
}

impl Board {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the board a renderer would show for this markdown: one column per
    /// `## ` section, one node per task line. Task IDs are left unassigned;
    /// run [`crate::matcher::reconcile`] afterwards.
    pub fn from_markdown(markdown: &str) -> Self {
        Self::from_outline(&Outline::parse(markdown))
    }

    pub fn from_outline(outline: &Outline) -> Self {
        let mut board = Board::new();
        let titles = outline::display_titles(outline.sections.iter().map(|s| s.header.as_str()));

        for (section, title) in outline.sections.iter().zip(titles) {
            let column_id = board.alloc_column();
            let mut nodes = Vec::with_capacity(section.blocks.len());
            for block in &section.blocks {
                let record = &block.record;
                nodes.push(TaskNode {
                    id: board.alloc_node(),
                    task_id: None,
                    indent_level: record.indent_level,
                    checked: record.checked,
                    display_text: extractor::normalize_content(&record.raw_content),
                    original_markdown: None,
                    is_new: false,
                    was_moved: false,
                    moved_at: None,
                });
            }
            board.columns.push(Column {
                id: column_id,
                source: Some(ColumnSource {
                    header: section.header.clone(),
                    title: title.clone(),
                }),
                title,
                nodes,
            });
        }

        board
    }

    fn alloc_node(&mut self) -> NodeId {
        self.next_node += 1;
        NodeId(self.next_node)
    }

    fn alloc_column(&mut self) -> ColumnId {
        self.next_column += 1;
        ColumnId(self.next_column)
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub(crate) fn column_index(&self, id: ColumnId) -> Result<usize, BoardError> {
        self.columns
            .iter()
            .position(|c| c.id == id)
            .ok_or(BoardError::ColumnNotFound(id))
    }

    pub fn column_by_title(&self, title: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.title == title)
    }

    /// Every node in document order.
    pub fn nodes(&self) -> impl Iterator<Item = &TaskNode> {
        self.columns.iter().flat_map(|c| c.nodes.iter())
    }

    pub(crate) fn nodes_mut(&mut self) -> impl Iterator<Item = &mut TaskNode> {
        self.columns.iter_mut().flat_map(|c| c.nodes.iter_mut())
    }

    pub fn node(&self, id: NodeId) -> Option<&TaskNode> {
        self.nodes().find(|n| n.id == id)
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut TaskNode, BoardError> {
        self.nodes_mut()
            .find(|n| n.id == id)
            .ok_or(BoardError::NodeNotFound(id))
    }

    /// Column index and position of a node.
    pub fn locate(&self, id: NodeId) -> Option<(usize, usize)> {
        self.columns.iter().enumerate().find_map(|(ci, col)| {
            col.nodes
                .iter()
                .position(|n| n.id == id)
                .map(|ni| (ci, ni))
        })
    }

    pub(crate) fn require(&self, id: NodeId) -> Result<(usize, usize), BoardError> {
        self.locate(id).ok_or(BoardError::NodeNotFound(id))
    }

    pub fn find_task(&self, task_id: &str) -> Option<NodeId> {
        self.nodes()
            .find(|n| n.task_id.as_deref() == Some(task_id))
            .map(|n| n.id)
    }

    /// Number of nodes in the subtree rooted at `nodes[index]`, root included.
    pub(crate) fn subtree_len(nodes: &[TaskNode], index: usize) -> usize {
        let Some(root) = nodes.get(index) else {
            return 0;
        };
        1 + nodes[index + 1..]
            .iter()
            .take_while(|n| n.indent_level > root.indent_level)
            .count()
    }

    /// Nodes that still need to reach the document store.
    pub fn dirty_count(&self) -> usize {
        self.nodes().filter(|n| n.is_dirty()).count()
    }

    /// Clear `is_new` / `was_moved` after a successful save and adopt the
    /// headers that were written as the columns' new sources, so the next
    /// save finds renamed and new columns under their stored names.
    pub fn mark_persisted(&mut self, written_headers: &[(ColumnId, String)]) {
        for node in self.nodes_mut() {
            node.mark_clean();
        }
        for (column_id, header) in written_headers {
            if let Some(column) = self.columns.iter_mut().find(|c| c.id == *column_id) {
                column.source = Some(ColumnSource {
                    header: header.clone(),
                    title: column.title.clone(),
                });
            }
        }
    }

    pub fn add_column(&mut self, title: &str) -> Result<ColumnId, BoardError> {
        let title = title.trim();
        if title.is_empty() {
            return Err(BoardError::EmptyTitle);
        }
        let id = self.alloc_column();
        self.columns.push(Column {
            id,
            title: title.to_string(),
            source: None,
            nodes: Vec::new(),
        });
        Ok(id)
    }

    /// Rename a column. Duplicate titles are allowed; the serializer makes
    /// the stored header unique.
    pub fn rename_column(&mut self, id: ColumnId, title: &str) -> Result<(), BoardError> {
        let title = title.trim();
        if title.is_empty() {
            return Err(BoardError::EmptyTitle);
        }
        let ci = self.column_index(id)?;
        self.columns[ci].title = title.to_string();
        Ok(())
    }

    /// Add a new task. It is inserted before `before` (which must sit in the
    /// same column) or appended to the column.
    pub fn add_task(
        &mut self,
        column: ColumnId,
        markdown: &str,
        indent_level: usize,
        before: Option<NodeId>,
    ) -> Result<NodeId, BoardError> {
        let content = identity::strip_task_id(markdown.trim());
        if content.is_empty() {
            return Err(BoardError::EmptyContent);
        }
        let ci = self.column_index(column)?;
        let position = match before {
            Some(anchor) => match self.require(anchor)? {
                (aci, ani) if aci == ci => ani,
                _ => return Err(BoardError::NodeNotFound(anchor)),
            },
            None => self.columns[ci].nodes.len(),
        };

        let id = self.alloc_node();
        let node = TaskNode {
            id,
            task_id: Some(identity::generate_task_id()),
            indent_level,
            checked: false,
            display_text: extractor::normalize_content(&content),
            original_markdown: Some(content),
            is_new: true,
            was_moved: false,
            moved_at: None,
        };
        log::debug!(
            target: "wikiboard.board",
            "Added task {:?} to column {:?} at {}",
            node.task_id,
            column,
            position
        );
        self.columns[ci].nodes.insert(position, node);
        Ok(id)
    }

    /// Replace a task's markdown. The new text becomes the cached original
    /// markdown so the serializer writes it back exactly.
    pub fn edit_task(&mut self, id: NodeId, markdown: &str) -> Result<(), BoardError> {
        let content = identity::strip_task_id(markdown.trim());
        if content.is_empty() {
            return Err(BoardError::EmptyContent);
        }
        let node = self.node_mut(id)?;
        node.display_text = extractor::normalize_content(&content);
        node.original_markdown = Some(content);
        Ok(())
    }

    /// Returns true when the checked state actually changed.
    pub fn set_checked(&mut self, id: NodeId, checked: bool) -> Result<bool, BoardError> {
        let node = self.node_mut(id)?;
        let changed = node.checked != checked;
        node.checked = checked;
        Ok(changed)
    }

    /// Remove a task together with all of its descendants, after confirmation.
    pub fn delete_task(
        &mut self,
        id: NodeId,
        confirm: &dyn ConfirmDelete,
    ) -> Result<DeleteOutcome, BoardError> {
        let (ci, ni) = self.require(id)?;
        let len = Self::subtree_len(&self.columns[ci].nodes, ni);
        if !confirm.confirm_delete(&self.columns[ci].nodes[ni], len - 1) {
            return Ok(DeleteOutcome::Declined);
        }
        let removed: Vec<TaskNode> = self.columns[ci].nodes.drain(ni..ni + len).collect();
        log::debug!(
            target: "wikiboard.board",
            "Deleted task {:?} with {} descendants",
            removed[0].task_id,
            len - 1
        );
        Ok(DeleteOutcome::Deleted(removed))
    }
}
