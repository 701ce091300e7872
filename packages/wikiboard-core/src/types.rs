use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// List bullet used in front of a task checkbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ListMarker {
    #[default]
    #[serde(rename = "-")]
    Dash,
    #[serde(rename = "*")]
    Star,
    #[serde(rename = "+")]
    Plus,
}

impl ListMarker {
    pub fn from_char(c: char) -> Option<Self> {
        match c {
            '-' => Some(Self::Dash),
            '*' => Some(Self::Star),
            '+' => Some(Self::Plus),
            _ => None,
        }
    }

    pub fn as_char(self) -> char {
        match self {
            Self::Dash => '-',
            Self::Star => '*',
            Self::Plus => '+',
        }
    }
}

/// One task line as found in the markdown source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRecord {
    /// Stable identity: the embedded `task-id` comment or a freshly generated one.
    pub id: String,
    pub indent_level: usize,
    pub checked: bool,
    /// Task markdown with the identity comment removed.
    pub raw_content: String,
    pub list_marker: ListMarker,
    pub source_line_index: usize,
    /// Leading whitespace exactly as written.
    pub indent: String,
    /// Checkbox character exactly as written (`' '`, `'x'` or `'X'`).
    pub check_mark: char,
    /// True when `id` came from a comment rather than the generator.
    pub has_embedded_id: bool,
    /// The verbatim source line.
    pub line: String,
}

/// Opaque handle for a node on the board, standing in for element identity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u64);

/// Opaque handle for a column on the board.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ColumnId(pub u64);

/// A task as displayed on the board.
///
/// Hierarchy is implicit: the descendants of a node are the contiguous
/// following nodes in the same column whose indent level is strictly greater.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskNode {
    #[serde(skip)]
    pub id: NodeId,
    pub task_id: Option<String>,
    pub indent_level: usize,
    pub checked: bool,
    /// Plain text as rendered.
    pub display_text: String,
    /// Verbatim markdown cached on creation or edit, so the serializer never
    /// has to reconstruct markup from rendered text.
    pub original_markdown: Option<String>,
    pub is_new: bool,
    pub was_moved: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub moved_at: Option<DateTime<Utc>>,
}

impl TaskNode {
    pub fn is_dirty(&self) -> bool {
        self.is_new || self.was_moved
    }

    pub(crate) fn mark_moved(&mut self, at: DateTime<Utc>) {
        self.was_moved = true;
        self.moved_at = Some(at);
    }

    pub(crate) fn mark_clean(&mut self) {
        self.is_new = false;
        self.was_moved = false;
        self.moved_at = None;
    }
}

/// The header a column was loaded from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnSource {
    /// Header text as stored, e.g. `Todo (2)`.
    pub header: String,
    /// Title displayed for that header, e.g. `Todo`.
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Column {
    #[serde(skip)]
    pub id: ColumnId,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<ColumnSource>,
    pub nodes: Vec<TaskNode>,
}

impl Column {
    /// A column is renamed when its title no longer equals the title it was loaded with.
    pub fn is_renamed(&self) -> bool {
        self.source
            .as_ref()
            .map_or(false, |source| source.title != self.title)
    }
}
