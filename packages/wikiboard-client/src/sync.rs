/// Fetch-merge-save cycle between a board and its document.
///
/// Every mutation that changes the document re-fetches the current
/// markdown, merges the board onto it with the serializer and saves the
/// result. External edits to other parts of the document survive; there is
/// no concurrency token, so a concurrent edit to the same tasks is lost.
/// A failed save leaves the board as it is (dirty flags included) and the
/// next successful save carries the changes.
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use wikiboard_core::diff::{self, TaskChange};
use wikiboard_core::extractor;
use wikiboard_core::matcher::{self, ReconcileReport};
use wikiboard_core::mutation::{InsertAt, MoveOutcome};
use wikiboard_core::serializer;
use wikiboard_core::{
    Board, BoardError, ColumnId, ConfirmDelete, DeleteOutcome, DragSession, DropPoint, DropResult,
    NodeId, TaskNode,
};

use crate::store::{DocumentStore, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Board(#[from] BoardError),

    #[error("No task with id {0} on the board")]
    UnknownTask(String),

    #[error("No column titled {0:?} on the board")]
    UnknownColumn(String),

    #[error("Checkboxes are disabled while another toggle is saving")]
    Busy,

    #[error("Delete was declined")]
    Declined,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SyncState {
    #[default]
    Idle,
    Loading,
    Saving,
    Saved,
    Failed,
}

/// What a status indicator shows.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatus {
    pub state: SyncState,
    pub last_error: Option<String>,
    pub last_saved_at: Option<DateTime<Utc>>,
}

/// Shared "checkboxes disabled" flag. Held for the whole round trip of a
/// toggle; a toggle that finds it held is rejected, not queued.
#[derive(Debug, Clone, Default)]
pub struct CheckboxGate {
    busy: Arc<AtomicBool>,
}

pub struct GateGuard {
    busy: Arc<AtomicBool>,
}

impl CheckboxGate {
    pub fn try_acquire(&self) -> Option<GateGuard> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| GateGuard {
                busy: self.busy.clone(),
            })
    }
}

impl Drop for GateGuard {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}

/// Outcome of one save.
#[derive(Debug, Clone, PartialEq)]
pub struct SaveReport {
    /// False when the merged markdown equalled the fetched one and nothing
    /// was sent.
    pub written: bool,
    pub changes: Vec<TaskChange>,
}

pub struct BoardSync<S: DocumentStore> {
    store: S,
    path: String,
    board: Board,
    status: SyncStatus,
    gate: CheckboxGate,
}

impl<S: DocumentStore> BoardSync<S> {
    /// Fetch a document and build its board with task IDs assigned.
    pub async fn load(store: S, path: &str) -> Result<Self, SyncError> {
        let markdown = store.fetch_source(path).await?;
        let mut board = Board::from_markdown(&markdown);
        let report = matcher::reconcile_document(&mut board, &markdown);
        log::info!(
            target: "wikiboard.sync",
            "Loaded {}: {} columns, {} tasks ({} matched, {} minted)",
            path,
            board.columns().len(),
            board.nodes().count(),
            report.matched,
            report.minted
        );
        Ok(Self {
            store,
            path: path.to_string(),
            board,
            status: SyncStatus::default(),
            gate: CheckboxGate::default(),
        })
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn status(&self) -> &SyncStatus {
        &self.status
    }

    pub fn checkbox_gate(&self) -> CheckboxGate {
        self.gate.clone()
    }

    pub fn node_for(&self, task_id: &str) -> Result<NodeId, SyncError> {
        self.board
            .find_task(task_id)
            .ok_or_else(|| SyncError::UnknownTask(task_id.to_string()))
    }

    pub fn column_for(&self, title: &str) -> Result<ColumnId, SyncError> {
        self.board
            .column_by_title(title)
            .map(|c| c.id)
            .ok_or_else(|| SyncError::UnknownColumn(title.to_string()))
    }

    /// Re-run extraction and matching against the current document.
    pub async fn reconcile(&mut self) -> Result<ReconcileReport, SyncError> {
        self.status.state = SyncState::Loading;
        let markdown = match self.store.fetch_source(&self.path).await {
            Ok(markdown) => markdown,
            Err(e) => return Err(self.fail(e.into())),
        };
        let report = matcher::reconcile_document(&mut self.board, &markdown);
        self.status.state = SyncState::Idle;
        Ok(report)
    }

    /// Fetch, merge and save.
    pub async fn persist(&mut self) -> Result<SaveReport, SyncError> {
        self.status.state = SyncState::Saving;
        let current = match self.store.fetch_source(&self.path).await {
            Ok(markdown) => markdown,
            Err(e) => return Err(self.fail(e.into())),
        };

        let output = serializer::serialize_board(&current, &self.board);
        let changes = diff::diff_tasks(
            &extractor::extract(&current),
            &extractor::extract(&output.markdown),
        );
        let written = output.markdown != current;
        if written {
            if let Err(e) = self.store.save(&self.path, &output.markdown).await {
                return Err(self.fail(e.into()));
            }
        }

        self.board.mark_persisted(&output.column_headers);
        self.status = SyncStatus {
            state: SyncState::Saved,
            last_error: None,
            last_saved_at: Some(Utc::now()),
        };
        log::info!(
            target: "wikiboard.sync",
            "Saved {}: {} task changes{}",
            self.path,
            changes.len(),
            if written { "" } else { " (document already up to date)" }
        );
        for change in &changes {
            log::debug!(target: "wikiboard.sync", "  {:?}", change);
        }
        Ok(SaveReport { written, changes })
    }

    fn fail(&mut self, error: SyncError) -> SyncError {
        log::warn!(target: "wikiboard.sync", "Sync of {} failed: {}", self.path, error);
        self.status.state = SyncState::Failed;
        self.status.last_error = Some(error.to_string());
        error
    }

    /// Set a task's checkbox and save. Rejected while another toggle holds
    /// the checkbox gate.
    pub async fn toggle(&mut self, node: NodeId, checked: bool) -> Result<bool, SyncError> {
        let Some(_guard) = self.gate.try_acquire() else {
            return Err(SyncError::Busy);
        };
        if !self.board.set_checked(node, checked)? {
            return Ok(false);
        }
        self.persist().await?;
        Ok(true)
    }

    pub fn begin_drag(&mut self, node: NodeId) -> Result<DragSession, SyncError> {
        Ok(self.board.begin_drag(node)?)
    }

    /// Resolve a drag and save when it actually moved something.
    pub async fn finish_drag(
        &mut self,
        session: DragSession,
        point: DropPoint,
    ) -> Result<DropResult, SyncError> {
        let result = session.drop_at(&mut self.board, point)?;
        if result.needs_persist() {
            self.persist().await?;
        }
        Ok(result)
    }

    pub async fn move_task(&mut self, node: NodeId, to: InsertAt) -> Result<MoveOutcome, SyncError> {
        let outcome = self.board.reorder(node, to)?;
        self.persist_moved(outcome).await
    }

    pub async fn nest(&mut self, node: NodeId, target: NodeId) -> Result<MoveOutcome, SyncError> {
        let outcome = self.board.reparent(node, target)?;
        self.persist_moved(outcome).await
    }

    pub async fn set_indent(&mut self, node: NodeId, level: usize) -> Result<MoveOutcome, SyncError> {
        let outcome = self.board.set_indent(node, level)?;
        self.persist_moved(outcome).await
    }

    async fn persist_moved(&mut self, outcome: MoveOutcome) -> Result<MoveOutcome, SyncError> {
        if outcome.is_moved() {
            self.persist().await?;
        }
        Ok(outcome)
    }

    /// Delete a task with its subtasks once `confirm` agrees, then save.
    pub async fn delete(
        &mut self,
        node: NodeId,
        confirm: &(dyn ConfirmDelete + Sync),
    ) -> Result<Vec<TaskNode>, SyncError> {
        match self.board.delete_task(node, confirm)? {
            DeleteOutcome::Deleted(removed) => {
                self.persist().await?;
                Ok(removed)
            }
            DeleteOutcome::Declined => Err(SyncError::Declined),
        }
    }

    pub async fn add_task(
        &mut self,
        column: ColumnId,
        markdown: &str,
        indent_level: usize,
        before: Option<NodeId>,
    ) -> Result<NodeId, SyncError> {
        let node = self.board.add_task(column, markdown, indent_level, before)?;
        self.persist().await?;
        Ok(node)
    }

    pub async fn edit_task(&mut self, node: NodeId, markdown: &str) -> Result<(), SyncError> {
        self.board.edit_task(node, markdown)?;
        self.persist().await?;
        Ok(())
    }

    pub async fn add_column(&mut self, title: &str) -> Result<ColumnId, SyncError> {
        let column = self.board.add_column(title)?;
        self.persist().await?;
        Ok(column)
    }

    pub async fn rename_column(&mut self, column: ColumnId, title: &str) -> Result<(), SyncError> {
        self.board.rename_column(column, title)?;
        self.persist().await?;
        Ok(())
    }
}
