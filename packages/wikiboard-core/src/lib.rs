/// Wikiboard core: task identity, board model, structural moves and the
/// markdown serializer. Pure library, no I/O.
pub mod board;
pub mod diff;
pub mod drag;
pub mod extractor;
pub mod identity;
pub mod matcher;
pub mod mutation;
pub mod outline;
pub mod serializer;
pub mod types;

pub use board::{Board, BoardError, ConfirmDelete, DeleteOutcome};
pub use drag::{DragSession, DropPoint, DropResult, DropZone};
pub use mutation::{InsertAt, MoveOutcome};
pub use types::{Column, ColumnId, ListMarker, NodeId, TaskNode, TaskRecord};
